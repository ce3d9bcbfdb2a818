use anyhow::Context;
use chrono::{DateTime, Utc};
use merge_engine::{ConflictEntry, Decision, MergeOutput, Pass};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Generate a unique run id: `<millis>_<7 hex chars>`.
pub fn generate_run_id() -> String {
    let ts = Utc::now().timestamp_millis();
    let rand: String = uuid::Uuid::new_v4().simple().to_string()[..7].to_string();
    format!("{}_{}", ts, rand)
}

/// Diagnostic envelope for one merge pass. This is the log channel: it is
/// always written separately from the merged source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub pass: Pass,
    /// Display name of the first input.
    pub first: String,
    pub second: String,
    pub entries: Vec<ConflictEntry>,
    pub decisions: Vec<Decision>,
}

impl MergeReport {
    pub fn new(output: &MergeOutput, first: &str, second: &str, include_bodies: bool) -> Self {
        let entries = output
            .entries()
            .iter()
            .map(|e| if include_bodies { e.clone() } else { e.without_bodies() })
            .collect();

        Self {
            run_id: generate_run_id(),
            generated_at: Utc::now(),
            pass: output.pass,
            first: first.to_string(),
            second: second.to_string(),
            entries,
            decisions: output.decisions.clone(),
        }
    }

    pub fn to_json(&self, pretty: bool) -> anyhow::Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Write the report to `path`. Uses tmp+rename so readers never see a
    /// partial file.
    pub async fn save(&self, path: &Path, pretty: bool) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = self.to_json(pretty)?;
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.json".into());
        let tmp = path.with_file_name(format!(".{}.tmp", file_name));
        fs::write(&tmp, &content)
            .await
            .with_context(|| format!("writing report to {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("moving report into {}", path.display()))?;
        Ok(())
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading report from {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merge_engine::{MergeConfig, Merger};

    const FIRST: &str = "class T\n{\n    void F() { A(); }\n}\n";
    const SECOND: &str = "class T\n{\n    void F() { B(); }\n    void G() { }\n}\n";

    fn output() -> MergeOutput {
        Merger::new(MergeConfig::default()).detect(FIRST, SECOND).unwrap()
    }

    #[test]
    fn test_run_id_shape() {
        let id = generate_run_id();
        let (millis, rand) = id.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(rand.len(), 7);
        assert!(rand.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_run_id(), id);
    }

    #[test]
    fn test_report_fields() {
        let report = MergeReport::new(&output(), "a.cs", "b.cs", true);
        let json: serde_json::Value = serde_json::from_str(&report.to_json(false).unwrap()).unwrap();
        assert_eq!(json["pass"], "detect");
        assert_eq!(json["first"], "a.cs");
        assert_eq!(json["entries"][0]["kind"], "MethodConflict");
        assert_eq!(json["entries"][0]["firstBody"], "{ A(); }");
        assert_eq!(json["entries"][1]["kind"], "MethodAdded");
        assert_eq!(json["decisions"][0]["source"], "default");
        assert!(json["runId"].is_string());
        assert!(json["generatedAt"].is_string());
    }

    #[test]
    fn test_report_without_bodies() {
        let report = MergeReport::new(&output(), "a.cs", "b.cs", false);
        assert!(report.entries.iter().all(|e| e.first_body.is_none() && e.second_body.is_none()));
        assert_eq!(report.entries[0].signature.as_deref(), Some("F()"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let report = MergeReport::new(&output(), "a.cs", "b.cs", true);
        report.save(&path, true).await.unwrap();

        let loaded = MergeReport::load(&path).await.unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.entries, report.entries);
        assert_eq!(loaded.decisions, report.decisions);
        assert!(!dir.path().join("reports").join(".run.json.tmp").exists());
    }
}
