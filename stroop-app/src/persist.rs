use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use stroop_core::ResponseRecord;
use stroop_experiment::{summary_row, SessionSummary};

/// Paths written by a successful local save.
#[derive(Debug)]
pub struct SavedFiles {
    pub csv: PathBuf,
    pub json: PathBuf,
}

#[derive(Debug, Serialize)]
struct SessionArtifact<'a> {
    summary: &'a SessionSummary,
    experimental: &'a [ResponseRecord],
    practice: &'a [ResponseRecord],
}

/// Writes the wide one-row CSV and the JSON artifact for a finished session.
pub fn save_session(
    out_dir: &Path,
    summary: &SessionSummary,
    experimental: &[ResponseRecord],
    practice: &[ResponseRecord],
) -> Result<SavedFiles> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let stem = format!("{}_{stamp}", sanitize(&summary.participant_id));
    let csv_path = out_dir.join(format!("{stem}.csv"));
    let json_path = out_dir.join(format!("{stem}.json"));

    let row = summary_row(summary, experimental, practice);
    let mut csv = File::create(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    writeln!(csv, "{}", join_csv(row.iter().map(|(h, _)| h.as_str())))?;
    writeln!(csv, "{}", join_csv(row.iter().map(|(_, v)| v.as_str())))?;

    let artifact = SessionArtifact {
        summary,
        experimental,
        practice,
    };
    let json = serde_json::to_string_pretty(&artifact)?;
    fs::write(&json_path, json)
        .with_context(|| format!("writing {}", json_path.display()))?;

    Ok(SavedFiles {
        csv: csv_path,
        json: json_path,
    })
}

/// Last-resort export path when the local save fails: the row still reaches
/// the operator through stdout.
pub fn dump_row_to_stdout(
    summary: &SessionSummary,
    experimental: &[ResponseRecord],
    practice: &[ResponseRecord],
) {
    let row = summary_row(summary, experimental, practice);
    println!("{}", join_csv(row.iter().map(|(h, _)| h.as_str())));
    println!("{}", join_csv(row.iter().map(|(_, v)| v.as_str())));
}

/// Remote-backup seam. The session row is appended as one self-describing
/// object; a spreadsheet client would implement this same trait.
pub trait BackupSink {
    fn append_row(&mut self, row: &[(String, String)]) -> Result<()>;
}

pub fn backup_session(
    sink: &mut dyn BackupSink,
    summary: &SessionSummary,
    experimental: &[ResponseRecord],
    practice: &[ResponseRecord],
) -> Result<()> {
    let row = summary_row(summary, experimental, practice);
    sink.append_row(&row)
}

/// Appends each session row as one JSON object per line.
pub struct JsonlBackup {
    path: PathBuf,
}

impl JsonlBackup {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl BackupSink for JsonlBackup {
    fn append_row(&mut self, row: &[(String, String)]) -> Result<()> {
        let map: serde_json::Map<String, serde_json::Value> = row
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening backup {}", self.path.display()))?;
        writeln!(file, "{}", serde_json::Value::Object(map))?;
        Ok(())
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn join_csv<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields.map(escape_csv).collect::<Vec<_>>().join(",")
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stroop_core::{Condition, InkColor, Response, RtSource, TaskPhase};
    use stroop_experiment::summarize;

    fn record() -> ResponseRecord {
        ResponseRecord {
            participant_id: "P001".into(),
            word: "chair".into(),
            condition: Condition::Neutral,
            color: InkColor::Red,
            response: Response::Color(InkColor::Red),
            accuracy: 1,
            rt_seconds: 0.6412,
            rt_source: RtSource::ServerMeasured,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            phase: TaskPhase::Experimental,
        }
    }

    fn summary(records: &[ResponseRecord]) -> SessionSummary {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 12, 8, 0).unwrap();
        summarize(records, &[], start, end)
    }

    #[test]
    fn csv_escaping() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn sanitize_strips_path_characters() {
        assert_eq!(sanitize("P001"), "P001");
        assert_eq!(sanitize("../evil id"), "___evil_id");
    }

    #[test]
    fn save_writes_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record()];
        let saved = save_session(dir.path(), &summary(&records), &records, &[]).unwrap();

        let csv = fs::read_to_string(&saved.csv).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        let values = lines.next().unwrap();
        assert!(header.starts_with("participant_id,date,timestamp"));
        assert!(header.contains("t1_word"));
        assert!(values.starts_with("P001,"));
        assert_eq!(
            header.split(',').count(),
            values.split(',').count(),
            "header/value column mismatch"
        );

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&saved.json).unwrap()).unwrap();
        assert_eq!(json["summary"]["participant_id"], "P001");
        assert_eq!(json["experimental"][0]["word"], "chair");
    }

    #[test]
    fn jsonl_backup_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.jsonl");
        let records = vec![record()];
        let mut sink = JsonlBackup::new(path.clone());
        backup_session(&mut sink, &summary(&records), &records, &[]).unwrap();
        backup_session(&mut sink, &summary(&records), &records, &[]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let obj: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(obj["participant_id"], "P001");
        assert_eq!(obj["t1_word"], "chair");
    }
}
