//! Resolution of classified declarations.
//!
//! The resolver turns a [`MatchPlan`] into concrete edits: which members of
//! the first input survive (and with what annotation) and which members of
//! the second input are appended. Conflicts and duplicates take either the
//! user's resolution for their ledger id or their default strategy; added
//! methods and types are always included.
//!
//! | kind      | disposition  | first input             | second input                          |
//! |-----------|--------------|-------------------------|---------------------------------------|
//! | conflict  | KeepBoth     | kept, "from first"      | appended, "from second"               |
//! | duplicate | Deduplicate  | dropped                 | appended, "duplicate, kept from second" |
//! | either    | KeepFirst    | kept, unannotated       | dropped                               |
//! | either    | KeepSecond   | dropped                 | appended, "chosen: second input"      |

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::ledger::Ledger;
use crate::matcher::{MatchPlan, MemberMatch, TypeMatch};
use crate::types::{ConflictId, Entry};

/// A user's choice for one conflict or duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    KeepFirst,
    KeepSecond,
    KeepBoth,
}

impl Choice {
    /// Parse a choice, accepting the short aliases `A`, `B` and `Both`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "keepfirst" | "first" | "a" => Some(Choice::KeepFirst),
            "keepsecond" | "second" | "b" => Some(Choice::KeepSecond),
            "keepboth" | "both" => Some(Choice::KeepBoth),
            _ => None,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::KeepFirst => write!(f, "KeepFirst"),
            Choice::KeepSecond => write!(f, "KeepSecond"),
            Choice::KeepBoth => write!(f, "KeepBoth"),
        }
    }
}

/// Wire shape of one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    #[serde(alias = "Id")]
    pub id: ConflictId,
    #[serde(alias = "Choice")]
    pub choice: String,
}

/// Resolutions keyed by ledger id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolutions {
    choices: BTreeMap<ConflictId, Choice>,
}

impl Resolutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON list of `{id, choice}` records.
    ///
    /// A payload of the wrong shape is an error. An unrecognised choice is
    /// not: it falls back to `KeepBoth`. Later records override earlier ones
    /// with the same id.
    pub fn from_json(payload: &str) -> Result<Self, MergeError> {
        let records: Vec<ResolutionRecord> = serde_json::from_str(payload)
            .map_err(|e| MergeError::ResolutionFormat(e.to_string()))?;
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: impl IntoIterator<Item = ResolutionRecord>) -> Self {
        let mut resolutions = Self::new();
        for record in records {
            let choice = Choice::parse(&record.choice).unwrap_or_else(|| {
                tracing::warn!(
                    id = record.id,
                    choice = %record.choice,
                    "unknown resolution choice, falling back to KeepBoth"
                );
                Choice::KeepBoth
            });
            resolutions.insert(record.id, choice);
        }
        resolutions
    }

    pub fn insert(&mut self, id: ConflictId, choice: Choice) {
        self.choices.insert(id, choice);
    }

    pub fn get(&self, id: ConflictId) -> Option<Choice> {
        self.choices.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConflictId, Choice)> + '_ {
        self.choices.iter().map(|(id, choice)| (*id, *choice))
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn to_records(&self) -> Vec<ResolutionRecord> {
        self.iter()
            .map(|(id, choice)| ResolutionRecord {
                id,
                choice: choice.to_string(),
            })
            .collect()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_records()).unwrap_or_else(|_| "[]".into())
    }
}

/// What was actually done with a conflict or duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    KeepFirst,
    KeepSecond,
    KeepBoth,
    Deduplicate,
}

impl From<Choice> for Disposition {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::KeepFirst => Disposition::KeepFirst,
            Choice::KeepSecond => Disposition::KeepSecond,
            Choice::KeepBoth => Disposition::KeepBoth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// Taken from a supplied resolution.
    Explicit,
    /// The entry's default strategy.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: ConflictId,
    pub disposition: Disposition,
    pub source: DecisionSource,
}

/// Provenance annotation texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    AddedFromSecond,
    DuplicateKeptFromSecond,
    ChosenSecond,
    FromFirst,
    FromSecond,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::AddedFromSecond => write!(f, "added from second input"),
            Provenance::DuplicateKeptFromSecond => write!(f, "duplicate, kept from second input"),
            Provenance::ChosenSecond => write!(f, "chosen: second input"),
            Provenance::FromFirst => write!(f, "from first input"),
            Provenance::FromSecond => write!(f, "from second input"),
        }
    }
}

/// What happens to a member of the first input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstFate {
    Drop,
    Annotate(String),
}

/// Edits to one type present in both inputs.
#[derive(Debug, Clone, Default)]
pub struct TypeEdit {
    /// Keyed by entry position in the first input's type body. Members
    /// without a fate pass through unchanged.
    pub first: BTreeMap<usize, FirstFate>,
    /// Second-input members appended after the first input's members, in
    /// second-input order.
    pub appended: Vec<Entry>,
}

/// A type from the second input to insert into the merged tree.
#[derive(Debug, Clone)]
pub struct TypeInsertion {
    pub namespace: String,
    pub entry: Entry,
}

/// Resolver output consumed by the composer.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPlan {
    pub edits: HashMap<String, TypeEdit>,
    pub insertions: Vec<TypeInsertion>,
    pub decisions: Vec<Decision>,
}

pub struct Resolver<'r> {
    annotation_tag: &'r str,
    resolutions: Option<&'r Resolutions>,
}

impl<'r> Resolver<'r> {
    /// Resolver for the detect pass: defaults only.
    pub fn detect(annotation_tag: &'r str) -> Self {
        Self {
            annotation_tag,
            resolutions: None,
        }
    }

    /// Resolver for the resolve pass.
    pub fn with_resolutions(annotation_tag: &'r str, resolutions: &'r Resolutions) -> Self {
        Self {
            annotation_tag,
            resolutions: Some(resolutions),
        }
    }

    fn note(&self, id: ConflictId, provenance: Provenance) -> String {
        format!("{} #{}: {}", self.annotation_tag, id, provenance)
    }

    fn decide(&self, id: ConflictId, default: Disposition) -> Decision {
        match self.resolutions.and_then(|r| r.get(id)) {
            Some(choice) => Decision {
                id,
                disposition: choice.into(),
                source: DecisionSource::Explicit,
            },
            None => Decision {
                id,
                disposition: default,
                source: DecisionSource::Default,
            },
        }
    }

    pub fn resolve(&self, plan: &MatchPlan<'_>, ledger: &Ledger) -> ResolvedPlan {
        let mut resolved = ResolvedPlan::default();

        for matched in &plan.types {
            match matched {
                TypeMatch::Added(added) => resolved.insertions.push(TypeInsertion {
                    namespace: added.namespace.clone(),
                    entry: added
                        .entry
                        .annotated(self.note(added.id, Provenance::AddedFromSecond)),
                }),
                TypeMatch::Shared(shared) => {
                    // Partial declarations of one type accumulate into a
                    // single edit.
                    let edit = resolved.edits.entry(shared.qualified.clone()).or_default();
                    for member in &shared.members {
                        if let Some(decision) = self.resolve_member(member, edit) {
                            resolved.decisions.push(decision);
                        }
                    }
                }
            }
        }

        if let Some(resolutions) = self.resolutions {
            self.report_ignored(resolutions, ledger);
        }
        resolved
    }

    fn resolve_member(&self, member: &MemberMatch<'_>, edit: &mut TypeEdit) -> Option<Decision> {
        let (id, first, second, default) = match *member {
            MemberMatch::Added { id, second } => {
                edit.appended
                    .push(second.entry.annotated(self.note(id, Provenance::AddedFromSecond)));
                return None;
            }
            MemberMatch::Duplicate { id, first, second } => {
                (id, first, second, Disposition::Deduplicate)
            }
            MemberMatch::Conflict { id, first, second } => (id, first, second, Disposition::KeepBoth),
        };

        let decision = self.decide(id, default);
        match decision.disposition {
            Disposition::KeepFirst => {}
            Disposition::KeepSecond => {
                edit.first.insert(first.position, FirstFate::Drop);
                edit.appended
                    .push(second.entry.annotated(self.note(id, Provenance::ChosenSecond)));
            }
            Disposition::KeepBoth => {
                edit.first.insert(
                    first.position,
                    FirstFate::Annotate(self.note(id, Provenance::FromFirst)),
                );
                edit.appended
                    .push(second.entry.annotated(self.note(id, Provenance::FromSecond)));
            }
            Disposition::Deduplicate => {
                edit.first.insert(first.position, FirstFate::Drop);
                edit.appended.push(
                    second
                        .entry
                        .annotated(self.note(id, Provenance::DuplicateKeptFromSecond)),
                );
            }
        }
        Some(decision)
    }

    fn report_ignored(&self, resolutions: &Resolutions, ledger: &Ledger) {
        for (id, choice) in resolutions.iter() {
            match ledger.get(id) {
                None => tracing::debug!(id, %choice, "resolution for unknown ledger id ignored"),
                Some(entry) if !entry.kind.is_choosable() => tracing::debug!(
                    id,
                    kind = %entry.kind,
                    "resolution for non-choosable entry ignored"
                ),
                Some(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DeclarationIndex;
    use crate::matcher::match_trees;
    use crate::parser::parse_module;
    use crate::types::{InputSide, Language, ModuleTree};

    fn parse(src: &str) -> ModuleTree {
        parse_module(src, Language::CSharp, InputSide::First, false).unwrap()
    }

    #[test]
    fn test_choice_aliases() {
        assert_eq!(Choice::parse("KeepFirst"), Some(Choice::KeepFirst));
        assert_eq!(Choice::parse("A"), Some(Choice::KeepFirst));
        assert_eq!(Choice::parse("b"), Some(Choice::KeepSecond));
        assert_eq!(Choice::parse("Both"), Some(Choice::KeepBoth));
        assert_eq!(Choice::parse("neither"), None);
    }

    #[test]
    fn test_resolutions_last_write_wins() {
        let r = Resolutions::from_json(
            r#"[{"id":1,"choice":"KeepFirst"},{"id":2,"choice":"KeepSecond"},{"id":1,"choice":"KeepBoth"}]"#,
        )
        .unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(1), Some(Choice::KeepBoth));
        assert_eq!(r.get(2), Some(Choice::KeepSecond));
    }

    #[test]
    fn test_resolutions_accept_legacy_shape() {
        let r = Resolutions::from_json(r#"[{"Id":3,"Choice":"B"}]"#).unwrap();
        assert_eq!(r.get(3), Some(Choice::KeepSecond));
    }

    #[test]
    fn test_unknown_choice_falls_back_to_keep_both() {
        let r = Resolutions::from_json(r#"[{"id":1,"choice":"merge-somehow"}]"#).unwrap();
        assert_eq!(r.get(1), Some(Choice::KeepBoth));
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        for payload in [r#"{"id":1}"#, r#"[{"id":"x","choice":"A"}]"#, "not json", r#"[{"choice":"A"}]"#] {
            let err = Resolutions::from_json(payload).unwrap_err();
            assert!(matches!(err, MergeError::ResolutionFormat(_)), "{payload}");
        }
    }

    #[test]
    fn test_records_round_trip_through_json() {
        let mut r = Resolutions::new();
        r.insert(2, Choice::KeepSecond);
        r.insert(1, Choice::KeepFirst);
        let again = Resolutions::from_json(&r.to_json_pretty()).unwrap();
        assert_eq!(again, r);
    }

    fn resolve_with(resolutions: Option<&Resolutions>) -> ResolvedPlan {
        let a = parse("class T { void F() { X(); } void D() { Z(); } }");
        let b = parse("class T { void F() { Y(); } void D() { Z(); } void G() { } }");
        let (ia, ib) = (DeclarationIndex::build(&a), DeclarationIndex::build(&b));
        let mut ledger = Ledger::new();
        let plan = match_trees(&ia, &ib, &mut ledger);
        let resolver = match resolutions {
            Some(r) => Resolver::with_resolutions("merge", r),
            None => Resolver::detect("merge"),
        };
        resolver.resolve(&plan, &ledger)
    }

    #[test]
    fn test_detect_defaults() {
        let resolved = resolve_with(None);
        let edit = &resolved.edits["T"];
        assert_eq!(
            edit.first.get(&0),
            Some(&FirstFate::Annotate("merge #1: from first input".into()))
        );
        assert_eq!(edit.first.get(&1), Some(&FirstFate::Drop));
        let notes: Vec<&str> = edit
            .appended
            .iter()
            .map(|e| e.annotations[0].as_str())
            .collect();
        assert_eq!(
            notes,
            vec![
                "merge #1: from second input",
                "merge #2: duplicate, kept from second input",
                "merge #3: added from second input",
            ]
        );
        assert!(resolved
            .decisions
            .iter()
            .all(|d| d.source == DecisionSource::Default));
    }

    #[test]
    fn test_explicit_keep_first_leaves_first_untouched() {
        let mut r = Resolutions::new();
        r.insert(1, Choice::KeepFirst);
        r.insert(2, Choice::KeepFirst);
        r.insert(3, Choice::KeepSecond); // MethodAdded: ignored
        r.insert(99, Choice::KeepSecond); // orphan: ignored
        let resolved = resolve_with(Some(&r));
        let edit = &resolved.edits["T"];
        assert!(edit.first.is_empty());
        assert_eq!(edit.appended.len(), 1);
        assert_eq!(edit.appended[0].annotations, vec!["merge #3: added from second input"]);
        assert_eq!(resolved.decisions.len(), 2);
        assert!(resolved
            .decisions
            .iter()
            .all(|d| d.disposition == Disposition::KeepFirst && d.source == DecisionSource::Explicit));
    }

    #[test]
    fn test_partial_declarations_share_one_edit() {
        let a = parse("namespace N { partial class T { void F() { X(); } } }");
        let b = parse(
            "namespace N { partial class T { void A() { } } partial class T { void F() { Y(); } void B() { } } }",
        );
        let (ia, ib) = (DeclarationIndex::build(&a), DeclarationIndex::build(&b));
        let mut ledger = Ledger::new();
        let plan = match_trees(&ia, &ib, &mut ledger);
        let resolved = Resolver::detect("merge").resolve(&plan, &ledger);

        assert_eq!(resolved.edits.len(), 1);
        let edit = &resolved.edits["N.T"];
        let notes: Vec<&str> = edit
            .appended
            .iter()
            .map(|e| e.annotations[0].as_str())
            .collect();
        assert_eq!(
            notes,
            vec![
                "merge #1: added from second input",
                "merge #2: from second input",
                "merge #3: added from second input",
            ]
        );
        assert_eq!(
            edit.first.get(&0),
            Some(&FirstFate::Annotate("merge #2: from first input".into()))
        );
    }
}
