//! Core types for the merge engine.
//!
//! A parsed source module is modelled as a declaration tree rather than a
//! full syntax tree. Only the levels the merge cares about are structured:
//! - **Namespace**: block (`namespace N { ... }`) or file-scoped
//!   (`namespace N;`, Java `package n;`)
//! - **Type**: class / struct / interface / record with a member body
//! - **Method**: a method declaration directly inside a type body
//!
//! Everything else is kept as verbatim text. Every node owns the exact
//! source slice it was lowered from, so re-rendering an untouched tree
//! reproduces the input byte-for-byte.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Sequential ledger identity, starting at 1.
pub type ConflictId = u32;

/// Root of a parsed module. Immutable once built; the composer produces new
/// trees that share untouched subtrees through `Arc`.
#[derive(Debug, Clone)]
pub struct ModuleTree {
    pub language: Language,
    /// Input started with a UTF-8 byte order mark.
    pub bom: bool,
    /// Input used `\r\n` line breaks.
    pub crlf: bool,
    pub body: Block,
}

impl ModuleTree {
    pub fn line_ending(&self) -> &'static str {
        if self.crlf { "\r\n" } else { "\n" }
    }
}

/// Line break style of a piece of trivia.
pub fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") { "\r\n" } else { "\n" }
}

/// An ordered run of declarations followed by the trivia before the block's
/// closing delimiter (or end of file).
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub entries: Vec<Entry>,
    pub trailing: String,
}

/// One declaration slot inside a block.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Whitespace and comments between the previous sibling and this one.
    pub leading: String,
    /// Provenance comments attached by the composer.
    pub annotations: Vec<String>,
    pub decl: Decl,
}

impl Entry {
    pub fn new(leading: impl Into<String>, decl: Decl) -> Self {
        Self {
            leading: leading.into(),
            annotations: Vec::new(),
            decl,
        }
    }

    /// Copy of this entry carrying the given annotation.
    pub fn annotated(&self, note: String) -> Self {
        let mut entry = self.clone();
        entry.annotations.push(note);
        entry
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Namespace(Arc<NamespaceDecl>),
    Type(Arc<TypeDecl>),
    Method(Arc<MethodDecl>),
    Verbatim(Arc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceKind {
    /// `namespace N { ... }`: the namespace scopes its own body.
    Block,
    /// `namespace N;` or `package n;`: scopes the rest of the file.
    FileScoped,
}

#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    pub name: String,
    pub kind: NamespaceKind,
    /// Source from the start of the declaration through its opening brace
    /// (or terminating semicolon when file-scoped).
    pub header: String,
    pub body: Block,
    pub footer: String,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub header: String,
    pub body: Block,
    pub footer: String,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    /// Parameter list text including its parentheses.
    pub parameters: String,
    /// Body text (block or expression body); empty for abstract members.
    pub body: String,
    /// Full declaration text.
    pub text: String,
}

impl MethodDecl {
    /// Matching key within the owning type: name plus parameter-list text.
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.parameters)
    }

    /// Body text with surrounding whitespace removed, as compared for
    /// identity.
    pub fn normalized_body(&self) -> &str {
        self.body.trim()
    }

    pub fn is_identical(&self, other: &MethodDecl) -> bool {
        self.normalized_body() == other.normalized_body()
    }
}

/// Join a namespace path and a simple name into a qualified name. Types
/// outside any namespace are qualified by their simple name alone.
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Supported source languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    CSharp,
    Java,
}

impl Language {
    /// Infer language from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "cs" => Some(Language::CSharp),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    /// Parse a user-supplied language name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "csharp" | "c#" | "cs" => Some(Language::CSharp),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    /// Whether `namespace N { ... }` blocks exist in this language.
    pub fn has_block_namespaces(&self) -> bool {
        matches!(self, Language::CSharp)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::CSharp => write!(f, "csharp"),
            Language::Java => write!(f, "java"),
        }
    }
}

/// Which of the two merge inputs a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSide {
    First,
    Second,
}

impl fmt::Display for InputSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSide::First => write!(f, "first"),
            InputSide::Second => write!(f, "second"),
        }
    }
}

/// One run of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    /// No resolutions; every ledger entry takes its default strategy.
    Detect,
    /// User resolutions applied by ledger id.
    Resolve,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Detect => write!(f, "detect"),
            Pass::Resolve => write!(f, "resolve"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, params: &str, body: &str) -> MethodDecl {
        MethodDecl {
            name: name.into(),
            parameters: params.into(),
            body: body.into(),
            text: format!("void {}{} {}", name, params, body),
        }
    }

    #[test]
    fn test_signature_includes_parameters() {
        assert_eq!(method("Add", "(int a, int b)", "{}").signature(), "Add(int a, int b)");
    }

    #[test]
    fn test_identical_ignores_outer_whitespace() {
        let a = method("F", "()", "{ return 1; }");
        let b = method("F", "()", "  { return 1; }\n");
        let c = method("F", "()", "{ return  1; }");
        assert!(a.is_identical(&b));
        assert!(!a.is_identical(&c));
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("", "T"), "T");
        assert_eq!(qualify("App.Core", "Logger"), "App.Core.Logger");
    }

    #[test]
    fn test_language_lookup() {
        assert_eq!(Language::from_extension("CS"), Some(Language::CSharp));
        assert_eq!(Language::from_extension("java"), Some(Language::Java));
        assert_eq!(Language::from_extension("rs"), None);
        assert_eq!(Language::from_name("C#"), Some(Language::CSharp));
    }
}
