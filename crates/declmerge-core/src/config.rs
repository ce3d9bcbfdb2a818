use anyhow::Context;
use merge_engine::{Language, MergeConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub merge: MergeSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub report: ReportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSettings {
    /// Forced input language. `None` infers it from the first input's
    /// extension.
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default = "default_annotation_tag")]
    pub annotation_tag: String,
    #[serde(default)]
    pub allow_syntax_errors: bool,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            language: None,
            annotation_tag: default_annotation_tag(),
            allow_syntax_errors: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Directory for `declmerge.log`. No file is written when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Keep method body snapshots in persisted reports.
    #[serde(default = "default_true")]
    pub include_bodies: bool,
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            include_bodies: true,
            pretty: true,
        }
    }
}

fn default_annotation_tag() -> String {
    "merge".into()
}
fn default_log_filter() -> String {
    "info".into()
}
fn default_true() -> bool {
    true
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Load from `path` if given and present, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                tracing::debug!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing settings to {}", path.display()))?;
        Ok(())
    }

    /// Language for an input: configured, else by extension, else C#.
    pub fn language_for(&self, input: &Path) -> Language {
        self.merge
            .language
            .or_else(|| {
                input
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(Language::from_extension)
            })
            .unwrap_or(Language::CSharp)
    }

    /// Engine configuration for a merge in `language`.
    pub fn merge_config(&self, language: Language) -> MergeConfig {
        MergeConfig {
            language,
            annotation_tag: self.merge.annotation_tag.clone(),
            allow_syntax_errors: self.merge.allow_syntax_errors,
        }
    }
}
