//! Merge protocol: the two documented passes.
//!
//! ```text
//! first text ─┐                     ┌─ merged text
//!             ├─ parse → index ×2 → match → resolve → compose → render
//! second text ┘           (ledger) ─┘                       └─ ledger
//! ```
//!
//! Both passes run the whole pipeline from the original inputs. Because the
//! ledger is derived deterministically from input order, ids reported by the
//! detect pass address the same entries in the resolve pass.

use serde::{Deserialize, Serialize};

use crate::composer::compose;
use crate::error::MergeError;
use crate::index::DeclarationIndex;
use crate::ledger::{ConflictEntry, Ledger};
use crate::matcher::match_trees;
use crate::parser::parse_module;
use crate::printer::render;
use crate::resolver::{Decision, Resolutions, Resolver};
use crate::types::{InputSide, Language, Pass};

/// Configuration for a merge invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    pub language: Language,
    /// Prefix of every provenance comment.
    pub annotation_tag: String,
    /// Keep going when an input contains syntax errors.
    pub allow_syntax_errors: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            language: Language::CSharp,
            annotation_tag: "merge".into(),
            allow_syntax_errors: false,
        }
    }
}

/// Structured result of one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutput {
    pub pass: Pass,
    /// Rendered merged source.
    pub merged: String,
    pub ledger: Ledger,
    /// One decision per conflict or duplicate, in ledger order.
    pub decisions: Vec<Decision>,
}

impl MergeOutput {
    pub fn entries(&self) -> &[ConflictEntry] {
        self.ledger.entries()
    }
}

/// Entry point of the engine. Holds only configuration; every call builds
/// its own trees and ledger, so one `Merger` may serve concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    config: MergeConfig,
}

impl Merger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Detect pass: classify differences and merge under default strategies.
    pub fn detect(&self, first: &str, second: &str) -> Result<MergeOutput, MergeError> {
        self.run(first, second, None)
    }

    /// Resolve pass: re-run the pipeline, applying `resolutions` by ledger id.
    pub fn resolve(
        &self,
        first: &str,
        second: &str,
        resolutions: &Resolutions,
    ) -> Result<MergeOutput, MergeError> {
        self.run(first, second, Some(resolutions))
    }

    /// Resolve pass with a raw JSON resolution payload.
    pub fn resolve_json(
        &self,
        first: &str,
        second: &str,
        payload: &str,
    ) -> Result<MergeOutput, MergeError> {
        let resolutions = Resolutions::from_json(payload)?;
        self.resolve(first, second, &resolutions)
    }

    fn run(
        &self,
        first: &str,
        second: &str,
        resolutions: Option<&Resolutions>,
    ) -> Result<MergeOutput, MergeError> {
        let lang = self.config.language;
        let tolerate = self.config.allow_syntax_errors;
        let first_tree = parse_module(first, lang, InputSide::First, tolerate)?;
        let second_tree = parse_module(second, lang, InputSide::Second, tolerate)?;

        let first_index = DeclarationIndex::build(&first_tree);
        let second_index = DeclarationIndex::build(&second_tree);

        let mut ledger = Ledger::new();
        let plan = match_trees(&first_index, &second_index, &mut ledger);

        let tag = self.config.annotation_tag.as_str();
        let (pass, resolver) = match resolutions {
            Some(r) => (Pass::Resolve, Resolver::with_resolutions(tag, r)),
            None => (Pass::Detect, Resolver::detect(tag)),
        };
        let resolved = resolver.resolve(&plan, &ledger);

        let merged = render(&compose(&first_tree, &resolved));

        tracing::debug!(
            %pass,
            %lang,
            first_types = first_index.len(),
            second_types = second_index.len(),
            entries = ledger.len(),
            "merge pass complete"
        );

        Ok(MergeOutput {
            pass,
            merged,
            ledger,
            decisions: resolved.decisions,
        })
    }
}
