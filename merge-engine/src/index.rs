//! Declaration index.
//!
//! Flattens one module tree into its types, keyed by qualified name, in
//! source declaration order. The per-type member index (signature → method)
//! is built lazily on first use.

use std::cell::OnceCell;
use std::collections::HashMap;

use crate::types::{qualify, Block, Decl, Entry, MethodDecl, ModuleTree, NamespaceKind, TypeDecl};

/// A type declaration located in the tree.
#[derive(Debug)]
pub struct IndexedType<'t> {
    pub qualified: String,
    /// Enclosing namespace path ("" when global).
    pub namespace: String,
    pub entry: &'t Entry,
    pub decl: &'t TypeDecl,
    members: OnceCell<MemberIndex<'t>>,
}

impl<'t> IndexedType<'t> {
    pub fn members(&self) -> &MemberIndex<'t> {
        self.members.get_or_init(|| MemberIndex::build(self.decl))
    }
}

/// A method declaration within its owning type.
#[derive(Debug, Clone, Copy)]
pub struct IndexedMethod<'t> {
    /// Position of the entry within the type's body.
    pub position: usize,
    pub entry: &'t Entry,
    pub decl: &'t MethodDecl,
}

#[derive(Debug, Default)]
pub struct MemberIndex<'t> {
    methods: Vec<(String, IndexedMethod<'t>)>,
    by_signature: HashMap<String, usize>,
}

impl<'t> MemberIndex<'t> {
    fn build(ty: &'t TypeDecl) -> Self {
        let mut index = MemberIndex::default();
        for (position, entry) in ty.body.entries.iter().enumerate() {
            if let Decl::Method(decl) = &entry.decl {
                let signature = decl.signature();
                index
                    .by_signature
                    .entry(signature.clone())
                    .or_insert(index.methods.len());
                index.methods.push((
                    signature,
                    IndexedMethod {
                        position,
                        entry,
                        decl,
                    },
                ));
            }
        }
        index
    }

    pub fn get(&self, signature: &str) -> Option<IndexedMethod<'t>> {
        self.by_signature
            .get(signature)
            .map(|&i| self.methods[i].1)
    }

    /// Methods with their signatures, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, IndexedMethod<'t>)> + '_ {
        self.methods.iter().map(|(sig, m)| (sig.as_str(), *m))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// All types of one tree, in source order.
#[derive(Debug, Default)]
pub struct DeclarationIndex<'t> {
    types: Vec<IndexedType<'t>>,
    by_name: HashMap<String, usize>,
}

impl<'t> DeclarationIndex<'t> {
    pub fn build(tree: &'t ModuleTree) -> Self {
        let mut index = DeclarationIndex::default();
        index.visit_block(&tree.body, "");
        index
    }

    fn visit_block(&mut self, block: &'t Block, namespace: &str) {
        // A file-scoped namespace applies to every declaration after it.
        let mut scope = namespace.to_string();
        for entry in &block.entries {
            match &entry.decl {
                Decl::Namespace(ns) => {
                    let inner = qualify(&scope, &ns.name);
                    self.visit_block(&ns.body, &inner);
                    if ns.kind == NamespaceKind::FileScoped {
                        scope = inner;
                    }
                }
                Decl::Type(ty) => self.push(&scope, entry, ty),
                Decl::Method(_) | Decl::Verbatim(_) => {}
            }
        }
    }

    fn push(&mut self, namespace: &str, entry: &'t Entry, decl: &'t TypeDecl) {
        let qualified = qualify(namespace, &decl.name);
        // Duplicate qualified names are not expected; the first one wins
        // lookups while every declaration stays in traversal order.
        self.by_name
            .entry(qualified.clone())
            .or_insert(self.types.len());
        self.types.push(IndexedType {
            qualified,
            namespace: namespace.to_string(),
            entry,
            decl,
            members: OnceCell::new(),
        });
    }

    pub fn get(&self, qualified: &str) -> Option<&IndexedType<'t>> {
        self.by_name.get(qualified).map(|&i| &self.types[i])
    }

    pub fn contains(&self, qualified: &str) -> bool {
        self.by_name.contains_key(qualified)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedType<'t>> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;
    use crate::types::{InputSide, Language};

    fn parse(src: &str) -> ModuleTree {
        parse_module(src, Language::CSharp, InputSide::First, false).unwrap()
    }

    #[test]
    fn test_qualified_names_in_source_order() {
        let tree = parse(
            "class Global { }\n\
             namespace A { class X { } namespace B { class Y { } } }\n\
             namespace C { interface Z { } }\n",
        );
        let index = DeclarationIndex::build(&tree);
        let names: Vec<&str> = index.iter().map(|t| t.qualified.as_str()).collect();
        assert_eq!(names, vec!["Global", "A.X", "A.B.Y", "C.Z"]);
        assert_eq!(index.get("A.B.Y").unwrap().namespace, "A.B");
    }

    #[test]
    fn test_file_scoped_namespace_prefixes_later_types() {
        let tree = parse("namespace App.Core;\n\nclass Logger { }\n");
        let index = DeclarationIndex::build(&tree);
        assert!(index.contains("App.Core.Logger"));
    }

    #[test]
    fn test_member_index_by_signature() {
        let tree = parse(
            "class T {\n    int f;\n    void F() { }\n    void F(int a) { }\n}\n",
        );
        let index = DeclarationIndex::build(&tree);
        let members = index.get("T").unwrap().members();
        assert_eq!(members.len(), 2);
        assert_eq!(members.get("F(int a)").unwrap().position, 2);
        assert!(members.get("G()").is_none());
        let sigs: Vec<&str> = members.iter().map(|(s, _)| s).collect();
        assert_eq!(sigs, vec!["F()", "F(int a)"]);
    }

    #[test]
    fn test_java_package_prefix() {
        let tree = parse_module(
            "package app;\nclass A { void f() { } }\n",
            Language::Java,
            InputSide::First,
            false,
        )
        .unwrap();
        let index = DeclarationIndex::build(&tree);
        assert!(index.contains("app.A"));
    }
}
