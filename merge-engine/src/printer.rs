//! Declaration tree → source text.
//!
//! Rendering is plain concatenation of the verbatim slices captured by the
//! parser. Annotations are the only text the printer adds: each one becomes
//! a `// ` line comment placed on its own line directly before the
//! declaration, at the declaration's indentation.

use crate::types::{line_ending, Block, Decl, Entry, ModuleTree};

/// Render a module tree back to source text.
pub fn render(tree: &ModuleTree) -> String {
    let mut out = String::new();
    if tree.bom {
        out.push('\u{feff}');
    }
    render_block(&tree.body, tree.line_ending(), &mut out);
    out
}

/// `eol` is the module's line break, used when an annotated entry's own
/// trivia has none.
fn render_block(block: &Block, eol: &str, out: &mut String) {
    for entry in &block.entries {
        render_entry(entry, eol, out);
    }
    out.push_str(&block.trailing);
}

fn render_entry(entry: &Entry, eol: &str, out: &mut String) {
    out.push_str(&entry.leading);
    if !entry.annotations.is_empty() {
        let indent = indentation(&entry.leading);
        let note_eol = if entry.leading.contains('\n') {
            line_ending(&entry.leading)
        } else {
            eol
        };
        for note in &entry.annotations {
            out.push_str("// ");
            out.push_str(note);
            out.push_str(note_eol);
            out.push_str(indent);
        }
    }
    render_decl(&entry.decl, eol, out);
}

fn render_decl(decl: &Decl, eol: &str, out: &mut String) {
    match decl {
        Decl::Namespace(ns) => {
            out.push_str(&ns.header);
            render_block(&ns.body, eol, out);
            out.push_str(&ns.footer);
        }
        Decl::Type(ty) => {
            out.push_str(&ty.header);
            render_block(&ty.body, eol, out);
            out.push_str(&ty.footer);
        }
        Decl::Method(m) => out.push_str(&m.text),
        Decl::Verbatim(text) => out.push_str(text),
    }
}

/// Whitespace on the last line of the leading trivia, i.e. the column the
/// declaration starts at.
fn indentation(leading: &str) -> &str {
    let last_line = leading.rsplit('\n').next().unwrap_or("");
    if last_line.chars().all(|c| c == ' ' || c == '\t') {
        last_line
    } else {
        ""
    }
}
