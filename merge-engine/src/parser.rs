//! Tree-sitter front-end.
//!
//! Source text is parsed into a concrete syntax tree with Tree-sitter and
//! then lowered into the declaration tree from [`crate::types`]. Lowering
//! keeps every byte of the input: the text between two sibling declarations
//! becomes the `leading` trivia of the second one, and the text before a
//! block's closing brace becomes the block's `trailing` trivia.
//!
//! Only namespaces, types and methods are structured. Which Tree-sitter node
//! kinds count as which is decided by a per-language [`Grammar`] table.

use std::sync::Arc;

use tree_sitter::Node;

use crate::error::MergeError;
use crate::types::{
    Block, Decl, Entry, InputSide, Language, MethodDecl, ModuleTree, NamespaceDecl,
    NamespaceKind, TypeDecl,
};

/// Node kinds the lowering recognises for one language.
struct Grammar {
    block_namespaces: &'static [&'static str],
    file_namespaces: &'static [&'static str],
    types: &'static [&'static str],
    methods: &'static [&'static str],
}

const CSHARP: Grammar = Grammar {
    block_namespaces: &["namespace_declaration"],
    file_namespaces: &["file_scoped_namespace_declaration"],
    types: &[
        "class_declaration",
        "struct_declaration",
        "interface_declaration",
        "record_declaration",
        "record_struct_declaration",
    ],
    methods: &["method_declaration"],
};

const JAVA: Grammar = Grammar {
    block_namespaces: &[],
    file_namespaces: &["package_declaration"],
    types: &[
        "class_declaration",
        "interface_declaration",
        "record_declaration",
    ],
    methods: &["method_declaration"],
};

fn grammar(lang: Language) -> &'static Grammar {
    match lang {
        Language::CSharp => &CSHARP,
        Language::Java => &JAVA,
    }
}

/// Get the tree-sitter Language object for a given language.
fn get_tree_sitter_language(lang: Language) -> tree_sitter::Language {
    let lang_ref = match lang {
        Language::CSharp => tree_sitter_c_sharp::LANGUAGE,
        Language::Java => tree_sitter_java::LANGUAGE,
    };
    lang_ref.into()
}

/// Parse source text into a declaration tree.
///
/// Syntax errors fail the parse with the position of the first error node
/// unless `tolerate_errors` is set, in which case erroneous regions are kept
/// as verbatim text.
pub fn parse_module(
    source: &str,
    lang: Language,
    side: InputSide,
    tolerate_errors: bool,
) -> Result<ModuleTree, MergeError> {
    let (bom, text) = match source.strip_prefix('\u{feff}') {
        Some(rest) => (true, rest),
        None => (false, source),
    };

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&get_tree_sitter_language(lang))
        .map_err(|e| MergeError::Language {
            language: lang,
            reason: e.to_string(),
        })?;

    let tree = parser.parse(text, None).ok_or(MergeError::InputParse {
        side,
        line: 1,
        column: 1,
        detail: "parser produced no tree".into(),
    })?;

    let root = tree.root_node();
    if root.has_error() && !tolerate_errors {
        let bad = first_error(root).unwrap_or(root);
        let pos = bad.start_position();
        let detail = if bad.is_missing() {
            format!("missing `{}`", bad.kind())
        } else {
            "unexpected syntax".to_string()
        };
        return Err(MergeError::InputParse {
            side,
            line: pos.row + 1,
            column: pos.column + 1,
            detail,
        });
    }

    let lowerer = Lowerer {
        source: text,
        grammar: grammar(lang),
    };
    let mut cursor = root.walk();
    let body = lowerer.lower_block(root.children(&mut cursor), 0, text.len(), false);

    Ok(ModuleTree {
        language: lang,
        bom,
        crlf: text.contains("\r\n"),
        body,
    })
}

/// Depth-first search for the first ERROR or MISSING node.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error)
}

struct Lowerer<'s> {
    source: &'s str,
    grammar: &'static Grammar,
}

impl<'s> Lowerer<'s> {
    fn text(&self, start: usize, end: usize) -> &'s str {
        self.source.get(start..end).unwrap_or("")
    }

    fn node_text(&self, node: Node) -> &'s str {
        self.text(node.start_byte(), node.end_byte())
    }

    /// Lower the named, non-comment nodes among `children` into a block whose
    /// trivia spans `start..end`.
    fn lower_block<'t>(
        &self,
        children: impl Iterator<Item = Node<'t>>,
        start: usize,
        end: usize,
        in_type: bool,
    ) -> Block {
        let mut cursor = start;
        let mut entries = Vec::new();

        for child in children {
            if !child.is_named() || child.is_extra() || child.start_byte() < cursor {
                continue;
            }
            let leading = self.text(cursor, child.start_byte());
            entries.push(Entry::new(leading, self.lower_decl(child, in_type)));
            cursor = child.end_byte();
        }

        Block {
            entries,
            trailing: self.text(cursor, end.max(cursor)).to_string(),
        }
    }

    fn lower_decl(&self, node: Node, in_type: bool) -> Decl {
        let kind = node.kind();
        let structured = if in_type {
            if self.grammar.methods.contains(&kind) {
                self.lower_method(node).map(|m| Decl::Method(Arc::new(m)))
            } else {
                None
            }
        } else if self.grammar.block_namespaces.contains(&kind) {
            self.lower_block_namespace(node)
                .map(|ns| Decl::Namespace(Arc::new(ns)))
        } else if self.grammar.file_namespaces.contains(&kind) {
            self.lower_file_namespace(node)
                .map(|ns| Decl::Namespace(Arc::new(ns)))
        } else if self.grammar.types.contains(&kind) {
            self.lower_type(node).map(|t| Decl::Type(Arc::new(t)))
        } else {
            None
        };

        structured.unwrap_or_else(|| Decl::Verbatim(Arc::from(self.node_text(node))))
    }

    /// Byte offsets just after the opening brace and at the closing brace of
    /// a braced body node.
    fn braces(&self, body: Node) -> Option<(usize, usize)> {
        let mut cursor = body.walk();
        let mut open = None;
        let mut close = None;
        for child in body.children(&mut cursor) {
            match child.kind() {
                "{" if open.is_none() => open = Some(child.end_byte()),
                "}" if !child.is_missing() => close = Some(child.start_byte()),
                _ => {}
            }
        }
        match (open, close) {
            (Some(o), Some(c)) if o <= c => Some((o, c)),
            _ => None,
        }
    }

    /// Lower a braced declaration (namespace or type) into header, body and
    /// footer.
    fn lower_braced(&self, node: Node, in_type: bool) -> Option<(String, String, Block, String)> {
        let name = self.node_text(node.child_by_field_name("name")?).to_string();
        let body = node.child_by_field_name("body")?;
        let (open, close) = self.braces(body)?;

        let mut cursor = body.walk();
        let block = self.lower_block(body.children(&mut cursor), open, close, in_type);

        Some((
            name,
            self.text(node.start_byte(), open).to_string(),
            block,
            self.text(close, node.end_byte()).to_string(),
        ))
    }

    fn lower_block_namespace(&self, node: Node) -> Option<NamespaceDecl> {
        let (name, header, body, footer) = self.lower_braced(node, false)?;
        Some(NamespaceDecl {
            name,
            kind: NamespaceKind::Block,
            header,
            body,
            footer,
        })
    }

    fn lower_file_namespace(&self, node: Node) -> Option<NamespaceDecl> {
        let name_node = node.child_by_field_name("name").or_else(|| {
            let mut cursor = node.walk();
            let found = node
                .named_children(&mut cursor)
                .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"));
            found
        })?;

        let mut cursor = node.walk();
        let header_end = node
            .children(&mut cursor)
            .find(|c| c.kind() == ";")
            .map(|c| c.end_byte())
            .unwrap_or_else(|| node.end_byte());

        // Declarations nested under the namespace node (if the grammar
        // attaches them there) are lowered as its body.
        let mut cursor = node.walk();
        let body = self.lower_block(
            node.children(&mut cursor)
                .filter(|c| c.start_byte() >= header_end),
            header_end,
            node.end_byte(),
            false,
        );

        Some(NamespaceDecl {
            name: self.node_text(name_node).to_string(),
            kind: NamespaceKind::FileScoped,
            header: self.text(node.start_byte(), header_end).to_string(),
            body,
            footer: String::new(),
        })
    }

    fn lower_type(&self, node: Node) -> Option<TypeDecl> {
        let (name, header, body, footer) = self.lower_braced(node, true)?;
        Some(TypeDecl {
            name,
            header,
            body,
            footer,
        })
    }

    fn lower_method(&self, node: Node) -> Option<MethodDecl> {
        let name = self.node_text(node.child_by_field_name("name")?).to_string();
        let parameters = self
            .node_text(node.child_by_field_name("parameters")?)
            .to_string();
        let body = node
            .child_by_field_name("body")
            .map(|b| self.node_text(b).to_string())
            .unwrap_or_default();

        Some(MethodDecl {
            name,
            parameters,
            body,
            text: self.node_text(node).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"using System;

namespace App.Core
{
    public class Logger
    {
        private int _count;

        public void LogInfo(string message)
        {
            Console.WriteLine(message);
        }

        public int Count() => _count;
    }
}
"#;

    fn parse(src: &str) -> ModuleTree {
        parse_module(src, Language::CSharp, InputSide::First, false).unwrap()
    }

    #[test]
    fn test_parse_csharp_structure() {
        let tree = parse(SAMPLE);
        assert_eq!(tree.body.entries.len(), 2);
        assert!(matches!(tree.body.entries[0].decl, Decl::Verbatim(_)));

        let Decl::Namespace(ns) = &tree.body.entries[1].decl else {
            panic!("expected namespace");
        };
        assert_eq!(ns.name, "App.Core");
        assert_eq!(ns.kind, NamespaceKind::Block);

        let Decl::Type(ty) = &ns.body.entries[0].decl else {
            panic!("expected type");
        };
        assert_eq!(ty.name, "Logger");
        assert_eq!(ty.body.entries.len(), 3);
        assert!(matches!(ty.body.entries[0].decl, Decl::Verbatim(_)));

        let Decl::Method(m) = &ty.body.entries[1].decl else {
            panic!("expected method");
        };
        assert_eq!(m.signature(), "LogInfo(string message)");
        assert!(m.body.starts_with('{'));
        assert!(m.body.contains("Console.WriteLine"));

        let Decl::Method(expr) = &ty.body.entries[2].decl else {
            panic!("expected method");
        };
        assert_eq!(expr.name, "Count");
        assert!(expr.text.ends_with("_count;"));
    }

    #[test]
    fn test_leading_trivia_keeps_comments() {
        let src = "class A\n{\n    // helper\n    void F() { }\n}\n";
        let tree = parse(src);
        let Decl::Type(ty) = &tree.body.entries[0].decl else {
            panic!("expected type");
        };
        assert_eq!(ty.body.entries[0].leading, "\n    // helper\n    ");
        assert_eq!(ty.body.trailing, "\n");
        assert_eq!(ty.footer, "}");
    }

    #[test]
    fn test_bom_is_recorded() {
        let tree = parse("\u{feff}class A { }\n");
        assert!(tree.bom);
        assert_eq!(tree.body.entries.len(), 1);
    }

    #[test]
    fn test_syntax_error_reports_side_and_position() {
        let err = parse_module(
            "namespace N\n{\n    class A {\n",
            Language::CSharp,
            InputSide::Second,
            false,
        )
        .unwrap_err();
        match err {
            MergeError::InputParse { side, line, .. } => {
                assert_eq!(side, InputSide::Second);
                assert!(line >= 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tolerated_errors_still_lower() {
        let tree = parse_module("class A { void F( }", Language::CSharp, InputSide::First, true);
        assert!(tree.is_ok());
    }

    #[test]
    fn test_parse_java_package() {
        let src = "package app.core;\n\npublic class Logger {\n    void info(String m) { System.out.println(m); }\n}\n";
        let tree = parse_module(src, Language::Java, InputSide::First, false).unwrap();
        let Decl::Namespace(ns) = &tree.body.entries[0].decl else {
            panic!("expected package");
        };
        assert_eq!(ns.name, "app.core");
        assert_eq!(ns.kind, NamespaceKind::FileScoped);
        assert!(matches!(tree.body.entries[1].decl, Decl::Type(_)));
    }
}
