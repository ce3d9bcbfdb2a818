//! Declaration matching across the two inputs.
//!
//! Types are paired by qualified name and methods by signature. The walk is
//! driven by the second input's index in declaration order (namespaces,
//! then types, then members), and every classification is recorded in the
//! ledger as it is made, so ledger ids are a pure function of input order.
//!
//! Declarations present only in the first input are not visited here: they
//! pass through the composer untouched and produce no ledger entry.

use crate::index::{DeclarationIndex, IndexedMethod, IndexedType};
use crate::ledger::{ConflictKind, EntryDetail, Ledger};
use crate::types::{ConflictId, Entry};

/// Classification of one method of the second input's type.
#[derive(Debug, Clone, Copy)]
pub enum MemberMatch<'t> {
    Added {
        id: ConflictId,
        second: IndexedMethod<'t>,
    },
    Duplicate {
        id: ConflictId,
        first: IndexedMethod<'t>,
        second: IndexedMethod<'t>,
    },
    Conflict {
        id: ConflictId,
        first: IndexedMethod<'t>,
        second: IndexedMethod<'t>,
    },
}

impl MemberMatch<'_> {
    pub fn id(&self) -> ConflictId {
        match self {
            MemberMatch::Added { id, .. }
            | MemberMatch::Duplicate { id, .. }
            | MemberMatch::Conflict { id, .. } => *id,
        }
    }
}

/// A type present only in the second input.
#[derive(Debug, Clone)]
pub struct AddedType<'t> {
    pub id: ConflictId,
    pub namespace: String,
    pub entry: &'t Entry,
}

/// A type present in both inputs, with its member classifications.
#[derive(Debug, Clone)]
pub struct SharedType<'t> {
    pub qualified: String,
    pub members: Vec<MemberMatch<'t>>,
}

#[derive(Debug, Clone)]
pub enum TypeMatch<'t> {
    Added(AddedType<'t>),
    Shared(SharedType<'t>),
}

/// Everything the matcher found, in traversal order.
#[derive(Debug, Clone, Default)]
pub struct MatchPlan<'t> {
    pub types: Vec<TypeMatch<'t>>,
}

impl<'t> MatchPlan<'t> {
    pub fn added_types(&self) -> impl Iterator<Item = &AddedType<'t>> {
        self.types.iter().filter_map(|t| match t {
            TypeMatch::Added(added) => Some(added),
            TypeMatch::Shared(_) => None,
        })
    }

    pub fn shared_types(&self) -> impl Iterator<Item = &SharedType<'t>> {
        self.types.iter().filter_map(|t| match t {
            TypeMatch::Shared(shared) => Some(shared),
            TypeMatch::Added(_) => None,
        })
    }
}

/// Pair the declarations of two indexed trees, recording every
/// classification in `ledger`.
pub fn match_trees<'t>(
    first: &DeclarationIndex<'t>,
    second: &DeclarationIndex<'t>,
    ledger: &mut Ledger,
) -> MatchPlan<'t> {
    let mut plan = MatchPlan::default();

    for theirs in second.iter() {
        match first.get(&theirs.qualified) {
            None => {
                let id = ledger.record(
                    ConflictKind::ClassAdded,
                    &theirs.decl.name,
                    &theirs.qualified,
                    EntryDetail::default(),
                );
                plan.types.push(TypeMatch::Added(AddedType {
                    id,
                    namespace: theirs.namespace.clone(),
                    entry: theirs.entry,
                }));
            }
            Some(ours) => {
                let members = match_members(ours, theirs, ledger);
                if !members.is_empty() {
                    plan.types.push(TypeMatch::Shared(SharedType {
                        qualified: ours.qualified.clone(),
                        members,
                    }));
                }
            }
        }
    }

    plan
}

fn match_members<'t>(
    ours: &IndexedType<'t>,
    theirs: &IndexedType<'t>,
    ledger: &mut Ledger,
) -> Vec<MemberMatch<'t>> {
    let first_members = ours.members();
    let mut matches = Vec::with_capacity(theirs.members().len());

    for (signature, second) in theirs.members().iter() {
        let name = second.decl.name.as_str();
        let location = theirs.qualified.as_str();

        let matched = match first_members.get(signature) {
            None => {
                let id = ledger.record(
                    ConflictKind::MethodAdded,
                    name,
                    location,
                    EntryDetail {
                        signature: Some(signature.to_string()),
                        first_body: None,
                        second_body: Some(second.decl.normalized_body().to_string()),
                    },
                );
                MemberMatch::Added { id, second }
            }
            Some(first) => {
                let kind = if first.decl.is_identical(second.decl) {
                    ConflictKind::MethodDuplicate
                } else {
                    ConflictKind::MethodConflict
                };
                let id = ledger.record(
                    kind,
                    name,
                    location,
                    EntryDetail {
                        signature: Some(signature.to_string()),
                        first_body: Some(first.decl.normalized_body().to_string()),
                        second_body: Some(second.decl.normalized_body().to_string()),
                    },
                );
                match kind {
                    ConflictKind::MethodDuplicate => MemberMatch::Duplicate { id, first, second },
                    _ => MemberMatch::Conflict { id, first, second },
                }
            }
        };
        matches.push(matched);
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;
    use crate::types::{InputSide, Language, ModuleTree};

    fn parse(src: &str) -> ModuleTree {
        parse_module(src, Language::CSharp, InputSide::First, false).unwrap()
    }

    const FIRST: &str = r#"
namespace N
{
    class T
    {
        void Same() { return; }
        void Changed() { A(); }
        void OnlyFirst() { }
    }

    class OnlyFirstType { }
}
"#;

    const SECOND: &str = r#"
namespace N
{
    class T
    {
        void Changed() { B(); }
        void Same()
        { return; }
        void OnlySecond(int x) { }
    }

    class U { void G() { } }
}
"#;

    #[test]
    fn test_classification_and_order() {
        let (a, b) = (parse(FIRST), parse(SECOND));
        let (ia, ib) = (DeclarationIndex::build(&a), DeclarationIndex::build(&b));
        let mut ledger = Ledger::new();
        let plan = match_trees(&ia, &ib, &mut ledger);

        let summary: Vec<(u32, ConflictKind, &str, &str)> = ledger
            .entries()
            .iter()
            .map(|e| (e.id, e.kind, e.name.as_str(), e.location.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, ConflictKind::MethodConflict, "Changed", "N.T"),
                (2, ConflictKind::MethodDuplicate, "Same", "N.T"),
                (3, ConflictKind::MethodAdded, "OnlySecond", "N.T"),
                (4, ConflictKind::ClassAdded, "U", "N.U"),
            ]
        );
        // `Same` differs only in the whitespace before its body.
        assert_eq!(plan.types.len(), 2);
    }

    #[test]
    fn test_identical_bodies_are_duplicates() {
        let a = parse("class T { void F() { X(); } }");
        let b = parse("class T { void F()  { X(); }\n}");
        let (ia, ib) = (DeclarationIndex::build(&a), DeclarationIndex::build(&b));
        let mut ledger = Ledger::new();
        let plan = match_trees(&ia, &ib, &mut ledger);

        assert_eq!(ledger.count(ConflictKind::MethodDuplicate), 1);
        let shared: Vec<_> = plan.shared_types().collect();
        assert!(matches!(shared[0].members[0], MemberMatch::Duplicate { id: 1, .. }));
    }

    #[test]
    fn test_first_only_declarations_are_not_logged() {
        let a = parse("class T { void F() { } }\nclass V { }");
        let b = parse("class T { }");
        let (ia, ib) = (DeclarationIndex::build(&a), DeclarationIndex::build(&b));
        let mut ledger = Ledger::new();
        let plan = match_trees(&ia, &ib, &mut ledger);
        assert!(ledger.is_empty());
        assert!(plan.types.is_empty());
    }
}
