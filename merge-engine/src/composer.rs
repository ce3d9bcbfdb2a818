//! Tree composition.
//!
//! Builds the merged tree from the first input and a [`ResolvedPlan`]
//! without mutating either. Blocks that contain no edited declaration are
//! shared with the first tree through their `Arc`s; only the path from the
//! root down to each edited type is rebuilt.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::resolver::{FirstFate, ResolvedPlan, TypeEdit};
use crate::types::{
    line_ending, qualify, Block, Decl, Entry, ModuleTree, NamespaceDecl, NamespaceKind, TypeDecl,
};

/// Compose the merged module tree.
pub fn compose(first: &ModuleTree, plan: &ResolvedPlan) -> ModuleTree {
    let mut composer = Composer::new(plan);
    let body = composer
        .compose_block(&first.body, "", false)
        .unwrap_or_else(|| first.body.clone());

    let file_scope = file_scoped_namespace(&first.body);
    let body = composer.place_remaining(
        body,
        file_scope.as_deref(),
        first.language.has_block_namespaces(),
        first.line_ending(),
    );

    ModuleTree {
        language: first.language,
        bom: first.bom,
        crlf: first.crlf,
        body,
    }
}

/// Name of the module-level file-scoped namespace, if any.
fn file_scoped_namespace(block: &Block) -> Option<String> {
    block.entries.iter().find_map(|entry| match &entry.decl {
        Decl::Namespace(ns) if ns.kind == NamespaceKind::FileScoped => Some(ns.name.clone()),
        _ => None,
    })
}

struct Composer<'p> {
    edits: &'p HashMap<String, TypeEdit>,
    /// Types still waiting to be edited; each is applied once.
    pending: HashSet<&'p str>,
    /// Inserted types grouped by target namespace, in first-seen order.
    insertions: Vec<(String, Vec<Entry>)>,
}

impl<'p> Composer<'p> {
    fn new(plan: &'p ResolvedPlan) -> Self {
        let mut insertions: Vec<(String, Vec<Entry>)> = Vec::new();
        for insertion in &plan.insertions {
            match insertions.iter_mut().find(|(ns, _)| *ns == insertion.namespace) {
                Some((_, entries)) => entries.push(insertion.entry.clone()),
                None => insertions.push((insertion.namespace.clone(), vec![insertion.entry.clone()])),
            }
        }

        Self {
            edits: &plan.edits,
            pending: plan.edits.keys().map(String::as_str).collect(),
            insertions,
        }
    }

    fn take_insertions(&mut self, namespace: &str) -> Option<Vec<Entry>> {
        let index = self.insertions.iter().position(|(ns, _)| ns == namespace)?;
        Some(self.insertions.remove(index).1)
    }

    /// Rebuild `block` if anything inside it changes; `None` means the block
    /// can be shared as is.
    fn compose_block(&mut self, block: &Block, namespace: &str, is_namespace_body: bool) -> Option<Block> {
        let mut changed = false;
        let mut entries = Vec::with_capacity(block.entries.len());
        let mut scope = namespace.to_string();

        for entry in &block.entries {
            let rebuilt = match &entry.decl {
                Decl::Namespace(ns) => {
                    let inner = qualify(&scope, &ns.name);
                    let body = self.compose_block(&ns.body, &inner, ns.kind == NamespaceKind::Block);
                    if ns.kind == NamespaceKind::FileScoped {
                        scope = inner;
                    }
                    body.map(|body| {
                        Decl::Namespace(Arc::new(NamespaceDecl {
                            name: ns.name.clone(),
                            kind: ns.kind,
                            header: ns.header.clone(),
                            body,
                            footer: ns.footer.clone(),
                        }))
                    })
                }
                Decl::Type(ty) => {
                    let qualified = qualify(&scope, &ty.name);
                    self.take_edit(&qualified)
                        .map(|edit| Decl::Type(Arc::new(apply_edit(ty, edit))))
                }
                Decl::Method(_) | Decl::Verbatim(_) => None,
            };

            match rebuilt {
                Some(decl) => {
                    changed = true;
                    entries.push(Entry {
                        leading: entry.leading.clone(),
                        annotations: entry.annotations.clone(),
                        decl,
                    });
                }
                None => entries.push(entry.clone()),
            }
        }

        if is_namespace_body {
            if let Some(inserted) = self.take_insertions(namespace) {
                changed = true;
                entries.extend(inserted);
            }
        }

        changed.then(|| Block {
            entries,
            trailing: block.trailing.clone(),
        })
    }

    fn take_edit(&mut self, qualified: &str) -> Option<&'p TypeEdit> {
        if self.pending.remove(qualified) {
            self.edits.get(qualified)
        } else {
            None
        }
    }

    /// Append inserted types that found no matching namespace block.
    fn place_remaining(
        &mut self,
        mut body: Block,
        file_scope: Option<&str>,
        block_namespaces: bool,
        eol: &str,
    ) -> Block {
        for (namespace, entries) in std::mem::take(&mut self.insertions) {
            let in_scope = namespace == file_scope.unwrap_or("");
            if in_scope || namespace.is_empty() || !block_namespaces {
                body.entries.extend(entries);
            } else {
                body.entries.push(Entry::new(
                    format!("{eol}{eol}"),
                    Decl::Namespace(Arc::new(NamespaceDecl {
                        header: format!("namespace {}{}{{", namespace, eol),
                        name: namespace,
                        kind: NamespaceKind::Block,
                        body: Block {
                            entries,
                            trailing: eol.into(),
                        },
                        footer: "}".into(),
                    })),
                ));
            }
        }
        body
    }
}

/// Rebuild a type's member list: surviving first-input members in their
/// original order, then appended second-input members.
///
/// Preprocessor lines in the trivia of a dropped member (`#region`,
/// `#endregion`, ...) move onto whatever follows it so directive pairs stay
/// balanced.
fn apply_edit(ty: &TypeDecl, edit: &TypeEdit) -> TypeDecl {
    let mut entries = Vec::with_capacity(ty.body.entries.len() + edit.appended.len());
    let mut carried = String::new();
    for (position, entry) in ty.body.entries.iter().enumerate() {
        match edit.first.get(&position) {
            Some(FirstFate::Drop) => carried.push_str(&directive_lines(&entry.leading)),
            Some(FirstFate::Annotate(note)) => {
                entries.push(carry_into(entry.annotated(note.clone()), &mut carried))
            }
            None => entries.push(carry_into(entry.clone(), &mut carried)),
        }
    }
    for entry in &edit.appended {
        entries.push(carry_into(entry.clone(), &mut carried));
    }

    TypeDecl {
        name: ty.name.clone(),
        header: ty.header.clone(),
        body: Block {
            entries,
            trailing: carried + &ty.body.trailing,
        },
        footer: ty.footer.clone(),
    }
}

/// Complete preprocessor lines of `leading`, each prefixed with a line
/// break. The first segment ends the previous line and the last one is the
/// declaration's indentation; neither can hold a directive of its own.
fn directive_lines(leading: &str) -> String {
    let eol = line_ending(leading);
    leading
        .split_inclusive('\n')
        .skip(1)
        .filter(|line| line.ends_with('\n') && line.trim_start().starts_with('#'))
        .map(|line| format!("{}{}", eol, line.trim_end()))
        .collect()
}

fn carry_into(mut entry: Entry, carried: &mut String) -> Entry {
    if !carried.is_empty() {
        entry.leading = std::mem::take(carried) + &entry.leading;
    }
    entry
}
