//! Conflict ledger.
//!
//! Ordered, id-indexed record of every difference the matcher classifies.
//! Ids are assigned from a counter owned by the ledger itself, so each merge
//! invocation numbers from 1 and two invocations over the same inputs
//! produce the same ids.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ConflictId;

/// Classification of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Same signature in both inputs, different bodies.
    MethodConflict,
    /// Same signature in both inputs, identical bodies.
    MethodDuplicate,
    /// Method only present in the second input.
    MethodAdded,
    /// Type only present in the second input.
    ClassAdded,
}

impl ConflictKind {
    /// Whether a user resolution may pick a side for this kind.
    pub fn is_choosable(&self) -> bool {
        matches!(self, ConflictKind::MethodConflict | ConflictKind::MethodDuplicate)
    }

    /// Policy applied when no resolution is supplied.
    pub fn default_strategy(&self) -> Strategy {
        match self {
            ConflictKind::MethodConflict => Strategy::KeepBoth,
            ConflictKind::MethodDuplicate => Strategy::Deduplicate,
            ConflictKind::MethodAdded | ConflictKind::ClassAdded => Strategy::Append,
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::MethodConflict => write!(f, "MethodConflict"),
            ConflictKind::MethodDuplicate => write!(f, "MethodDuplicate"),
            ConflictKind::MethodAdded => write!(f, "MethodAdded"),
            ConflictKind::ClassAdded => write!(f, "ClassAdded"),
        }
    }
}

/// Default-policy tag recorded on each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Emit both variants, each annotated with its source.
    KeepBoth,
    /// Emit a single copy, taken from the second input.
    Deduplicate,
    /// Include the second input's declaration; not user-choosable.
    Append,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::KeepBoth => write!(f, "KeepBoth"),
            Strategy::Deduplicate => write!(f, "Deduplicate"),
            Strategy::Append => write!(f, "Append"),
        }
    }
}

/// One classified difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub id: ConflictId,
    pub kind: ConflictKind,
    /// Method name, or simple type name for `ClassAdded`.
    pub name: String,
    /// Qualified name of the owning (or added) type.
    pub location: String,
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_body: Option<String>,
}

impl ConflictEntry {
    /// Drop the body snapshots, keeping only the classification record.
    pub fn without_bodies(&self) -> Self {
        Self {
            first_body: None,
            second_body: None,
            ..self.clone()
        }
    }

    /// Unified diff from the first body to the second, if both are recorded.
    pub fn body_diff(&self) -> Option<String> {
        let first = self.first_body.as_deref()?;
        let second = self.second_body.as_deref()?;
        let diff = similar::TextDiff::from_lines(first, second);
        Some(
            diff.unified_diff()
                .context_radius(3)
                .header("first", "second")
                .to_string(),
        )
    }
}

/// Details recorded alongside a classification.
#[derive(Debug, Clone, Default)]
pub struct EntryDetail {
    pub signature: Option<String>,
    pub first_body: Option<String>,
    pub second_body: Option<String>,
}

/// Per-invocation conflict ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: Vec<ConflictEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a classification and return its id.
    pub fn record(
        &mut self,
        kind: ConflictKind,
        name: &str,
        location: &str,
        detail: EntryDetail,
    ) -> ConflictId {
        let id = self.entries.len() as ConflictId + 1;
        tracing::debug!(id, %kind, name, location, "ledger entry recorded");
        self.entries.push(ConflictEntry {
            id,
            kind,
            name: name.to_string(),
            location: location.to_string(),
            strategy: kind.default_strategy(),
            signature: detail.signature,
            first_body: detail.first_body,
            second_body: detail.second_body,
        });
        id
    }

    pub fn get(&self, id: ConflictId) -> Option<&ConflictEntry> {
        let index = (id as usize).checked_sub(1)?;
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[ConflictEntry] {
        &self.entries
    }

    /// Entries a user may resolve (conflicts and duplicates).
    pub fn choosable(&self) -> impl Iterator<Item = &ConflictEntry> {
        self.entries.iter().filter(|e| e.kind.is_choosable())
    }

    pub fn count(&self, kind: ConflictKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_from_one() {
        let mut ledger = Ledger::new();
        let a = ledger.record(ConflictKind::ClassAdded, "U", "N.U", EntryDetail::default());
        let b = ledger.record(ConflictKind::MethodConflict, "f", "N.T", EntryDetail::default());
        assert_eq!((a, b), (1, 2));
        assert_eq!(ledger.get(2).unwrap().name, "f");
        assert!(ledger.get(0).is_none());
        assert!(ledger.get(3).is_none());
    }

    #[test]
    fn test_default_strategies() {
        assert_eq!(ConflictKind::MethodConflict.default_strategy(), Strategy::KeepBoth);
        assert_eq!(ConflictKind::MethodDuplicate.default_strategy(), Strategy::Deduplicate);
        assert_eq!(ConflictKind::MethodAdded.default_strategy(), Strategy::Append);
        assert!(!ConflictKind::ClassAdded.is_choosable());
    }

    #[test]
    fn test_entry_serializes_with_log_field_names() {
        let mut ledger = Ledger::new();
        ledger.record(
            ConflictKind::MethodConflict,
            "f",
            "N.T",
            EntryDetail {
                signature: Some("f()".into()),
                first_body: Some("{ X }".into()),
                second_body: Some("{ Y }".into()),
            },
        );
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["kind"], "MethodConflict");
        assert_eq!(json[0]["location"], "N.T");
        assert_eq!(json[0]["strategy"], "KeepBoth");
        assert_eq!(json[0]["firstBody"], "{ X }");

        let bare = serde_json::to_value(ledger.entries()[0].without_bodies()).unwrap();
        assert!(bare.get("firstBody").is_none());
    }

    #[test]
    fn test_body_diff() {
        let entry = ConflictEntry {
            id: 1,
            kind: ConflictKind::MethodConflict,
            name: "f".into(),
            location: "N.T".into(),
            strategy: Strategy::KeepBoth,
            signature: None,
            first_body: Some("{\n    return 1;\n}\n".into()),
            second_body: Some("{\n    return 2;\n}\n".into()),
        };
        let diff = entry.body_diff().unwrap();
        assert!(diff.contains("-    return 1;"));
        assert!(diff.contains("+    return 2;"));
    }
}
