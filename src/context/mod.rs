//! Lexical context extraction for changed lines.
//!
//! For each queried line we report the innermost enclosing definition
//! (function or class) found by a single tree-sitter pass over the file.
//! The per-file outline maps every line number to the definitions whose
//! span contains it, discovered depth-first with parents before children,
//! so the last entry for a line is always the most deeply nested one.
//!
//! Results depend only on file content and the queried line set; nothing is
//! shared between files, so per-file calls are safe to run concurrently.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tracing::debug;
use tree_sitter::{Language, Node, Parser};

use crate::errors::ContextError;
use crate::types::{LineContext, SymbolType};

/// Returns the Python language for tree-sitter from the grammar crate.
#[inline]
fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

/// Computes enclosing-definition context for lines of files under a
/// read-only checkout root.
pub struct ContextExtractor {
    checkout_root: PathBuf,
}

/// One definition discovered by the outline scan.
struct OutlineSymbol {
    name: String,
    symbol_type: SymbolType,
    signature: String,
}

/// Per-file outline: flat symbol storage plus a line → indices map.
struct Outline {
    symbols: Vec<OutlineSymbol>,
    by_line: HashMap<u32, Vec<usize>>,
}

impl Outline {
    /// The innermost definition containing `line`: the last index recorded
    /// for it in discovery order.
    fn innermost(&self, line: u32) -> Option<&OutlineSymbol> {
        self.by_line
            .get(&line)
            .and_then(|ids| ids.last())
            .map(|&i| &self.symbols[i])
    }
}

impl ContextExtractor {
    pub fn new(checkout_root: impl Into<PathBuf>) -> Self {
        Self {
            checkout_root: checkout_root.into(),
        }
    }

    /// Resolve context for `lines` of `rel_path`, one record per requested
    /// line, in the caller-supplied order.
    ///
    /// The caller is expected to send only files it considers valid source;
    /// a missing file or one that does not parse is an error for this file
    /// alone.
    pub fn contexts(
        &self,
        rel_path: &str,
        lines: &[u32],
    ) -> Result<Vec<LineContext>, ContextError> {
        let source = fs::read_to_string(self.checkout_root.join(rel_path)).map_err(|e| {
            ContextError::Missing {
                path: rel_path.to_string(),
                source: e,
            }
        })?;
        let outline = build_outline(&source, rel_path)?;
        debug!(
            "context: {} definitions in {}, {} lines queried",
            outline.symbols.len(),
            rel_path,
            lines.len()
        );

        Ok(lines
            .iter()
            .map(|&line| match outline.innermost(line) {
                Some(sym) => LineContext {
                    path: rel_path.to_string(),
                    line,
                    symbol: Some(sym.name.clone()),
                    symbol_type: Some(sym.symbol_type),
                    signature: Some(sym.signature.clone()),
                },
                None => LineContext {
                    path: rel_path.to_string(),
                    line,
                    symbol: None,
                    symbol_type: None,
                    signature: None,
                },
            })
            .collect())
    }
}

/// Parse the file once and collect its definition outline.
fn build_outline(source: &str, rel_path: &str) -> Result<Outline, ContextError> {
    let mut parser = Parser::new();
    let lang = python_language();
    parser
        .set_language(&lang)
        .map_err(|_| ContextError::Language)?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ContextError::Parse {
            path: rel_path.to_string(),
        })?;
    if tree.root_node().has_error() {
        return Err(ContextError::Parse {
            path: rel_path.to_string(),
        });
    }

    let mut outline = Outline {
        symbols: Vec::new(),
        by_line: HashMap::new(),
    };
    visit(tree.root_node(), source, &mut outline);
    Ok(outline)
}

/// Depth-first scan, parent before child.
fn visit(node: Node, source: &str, outline: &mut Outline) {
    if let Some(sym) = symbol_of(node, source) {
        let idx = outline.symbols.len();
        let start = node.start_position().row as u32 + 1;
        let end = node.end_position().row as u32 + 1;
        for line in start..=end {
            outline.by_line.entry(line).or_default().push(idx);
        }
        outline.symbols.push(sym);
    }
    let mut walker = node.walk();
    for child in node.children(&mut walker) {
        visit(child, source, outline);
    }
}

/// Definition metadata for function/class nodes; `None` for everything else.
fn symbol_of(node: Node, source: &str) -> Option<OutlineSymbol> {
    match node.kind() {
        "function_definition" | "async_function_definition" => {
            let name = field_text(node, "name", source)?;
            let params = positional_params(node, source);
            let signature = format!("{name}({})", params.join(", "));
            Some(OutlineSymbol {
                name,
                symbol_type: SymbolType::Function,
                signature,
            })
        }
        "class_definition" => {
            let name = field_text(node, "name", source)?;
            let bases = base_names(node, source);
            let signature = format!("class {name}({})", bases.join(", "));
            Some(OutlineSymbol {
                name,
                symbol_type: SymbolType::Class,
                signature,
            })
        }
        _ => None,
    }
}

/// Positional parameter names, annotations and defaults stripped.
///
/// Splat parameters and everything after them (keyword-only) are excluded;
/// parameters before a `/` separator are positional-only and also excluded.
fn positional_params(node: Node, source: &str) -> Vec<String> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut walker = params.walk();
    for child in params.named_children(&mut walker) {
        match child.kind() {
            "identifier" => out.push(text(child, source)),
            "typed_parameter" => {
                if let Some(ident) = child.named_child(0).filter(|c| c.kind() == "identifier") {
                    out.push(text(ident, source));
                }
            }
            "default_parameter" | "typed_default_parameter" => {
                if let Some(name) = child
                    .child_by_field_name("name")
                    .filter(|c| c.kind() == "identifier")
                {
                    out.push(text(name, source));
                }
            }
            "list_splat_pattern" | "dictionary_splat_pattern" | "keyword_separator" => break,
            "positional_separator" => out.clear(),
            _ => {}
        }
    }
    out
}

/// Declared base names; `?` stands in for any base that is not a simple
/// identifier. Keyword arguments (metaclass=...) are not bases.
fn base_names(node: Node, source: &str) -> Vec<String> {
    let Some(args) = node.child_by_field_name("superclasses") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut walker = args.walk();
    for child in args.named_children(&mut walker) {
        match child.kind() {
            "identifier" => out.push(text(child, source)),
            "keyword_argument" | "comment" => {}
            _ => out.push("?".to_string()),
        }
    }
    out
}

fn field_text(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field).map(|n| text(n, source))
}

fn text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
import os


def foo(a, b):
    x = a + b
    return x


class Widget(Base):
    def render(self, canvas):
        return canvas

    value = 1
";

    fn extractor_with(source: &str) -> (tempfile::TempDir, ContextExtractor) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sample.py"), source).unwrap();
        let extractor = ContextExtractor::new(dir.path());
        (dir, extractor)
    }

    #[test]
    fn function_body_resolves_to_enclosing_function() {
        let (_dir, extractor) = extractor_with(SAMPLE);
        let got = extractor.contexts("sample.py", &[5]).unwrap();
        assert_eq!(got[0].symbol.as_deref(), Some("foo"));
        assert_eq!(got[0].symbol_type, Some(SymbolType::Function));
        assert_eq!(got[0].signature.as_deref(), Some("foo(a, b)"));
    }

    #[test]
    fn module_scope_has_no_symbol() {
        let (_dir, extractor) = extractor_with(SAMPLE);
        let got = extractor.contexts("sample.py", &[1]).unwrap();
        assert_eq!(got[0].symbol, None);
        assert_eq!(got[0].symbol_type, None);
        assert_eq!(got[0].signature, None);
    }

    #[test]
    fn method_reports_innermost_function() {
        let (_dir, extractor) = extractor_with(SAMPLE);
        let got = extractor.contexts("sample.py", &[11]).unwrap();
        assert_eq!(got[0].symbol.as_deref(), Some("render"));
        assert_eq!(got[0].signature.as_deref(), Some("render(self, canvas)"));
    }

    #[test]
    fn class_body_outside_methods_reports_class() {
        let (_dir, extractor) = extractor_with(SAMPLE);
        let got = extractor.contexts("sample.py", &[13]).unwrap();
        assert_eq!(got[0].symbol.as_deref(), Some("Widget"));
        assert_eq!(got[0].symbol_type, Some(SymbolType::Class));
        assert_eq!(got[0].signature.as_deref(), Some("class Widget(Base)"));
    }

    #[test]
    fn results_follow_caller_supplied_order() {
        let (_dir, extractor) = extractor_with(SAMPLE);
        let got = extractor.contexts("sample.py", &[13, 1, 5]).unwrap();
        let lines: Vec<u32> = got.iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![13, 1, 5]);
    }

    #[test]
    fn signature_drops_defaults_annotations_and_splats() {
        let source = "def bar(a, b: int = 2, *args, c=3, **kw):\n    return a\n";
        let (_dir, extractor) = extractor_with(source);
        let got = extractor.contexts("sample.py", &[2]).unwrap();
        assert_eq!(got[0].signature.as_deref(), Some("bar(a, b)"));
    }

    #[test]
    fn non_identifier_base_falls_back_to_placeholder() {
        let source = "import abc\n\nclass X(abc.ABC):\n    pass\n\nclass Y:\n    pass\n";
        let (_dir, extractor) = extractor_with(source);
        let got = extractor.contexts("sample.py", &[4, 7]).unwrap();
        assert_eq!(got[0].signature.as_deref(), Some("class X(?)"));
        assert_eq!(got[1].signature.as_deref(), Some("class Y()"));
    }

    #[test]
    fn missing_file_is_per_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = ContextExtractor::new(dir.path());
        let err = extractor.contexts("absent.py", &[1]).unwrap_err();
        assert!(matches!(err, ContextError::Missing { .. }));
    }

    #[test]
    fn invalid_syntax_is_per_file_error() {
        let (_dir, extractor) = extractor_with("def broken(:\n");
        let err = extractor.contexts("sample.py", &[1]).unwrap_err();
        assert!(matches!(err, ContextError::Parse { .. }));
    }
}
