//! # merge-engine
//!
//! Declaration-level two-way merge for C# (and Java) source modules.
//!
//! ## Approach
//!
//! Both inputs are parsed with tree-sitter and lowered into a small
//! declaration tree (namespaces, types, methods, verbatim text) that keeps
//! every original byte. The pipeline then:
//!
//! 1. **Indexes** each tree by qualified type name and method signature.
//! 2. **Matches** the second input against the first, classifying each
//!    difference as a method conflict, duplicate or addition, or a type
//!    addition, and records it in a per-invocation ledger.
//! 3. **Resolves** every conflict and duplicate by user resolution or by
//!    default strategy.
//! 4. **Composes** a new tree from the first input, sharing untouched
//!    subtrees, and renders it with provenance comments.
//!
//! Merging is asymmetric: the first input is the base, the second input
//! contributes. Ledger ids are assigned in the second input's declaration
//! order, so a detect pass and a later resolve pass over the same inputs
//! agree on them.
//!
//! ## Example
//!
//! ```rust
//! use merge_engine::{MergeConfig, Merger, Resolutions};
//!
//! let first = "class T { void F() { A(); } }";
//! let second = "class T { void F() { B(); } }";
//!
//! let merger = Merger::new(MergeConfig::default());
//! let detected = merger.detect(first, second).unwrap();
//! assert_eq!(detected.ledger.len(), 1);
//!
//! let resolutions = Resolutions::from_json(r#"[{"id":1,"choice":"KeepSecond"}]"#).unwrap();
//! let resolved = merger.resolve(first, second, &resolutions).unwrap();
//! assert!(resolved.merged.contains("B();"));
//! assert!(!resolved.merged.contains("A();"));
//! ```

pub mod composer;
pub mod error;
pub mod index;
pub mod ledger;
pub mod matcher;
pub mod parser;
pub mod printer;
pub mod protocol;
pub mod resolver;
pub mod types;

// Re-export primary public API
pub use error::MergeError;
pub use ledger::{ConflictEntry, ConflictKind, Ledger, Strategy};
pub use parser::parse_module;
pub use printer::render;
pub use protocol::{MergeConfig, MergeOutput, Merger};
pub use resolver::{Choice, Decision, DecisionSource, Disposition, ResolutionRecord, Resolutions};
pub use types::{ConflictId, InputSide, Language, ModuleTree, Pass};
