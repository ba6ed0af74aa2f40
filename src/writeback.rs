use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::allocation::types::{SlotOutcome, SlotStart};
use crate::error::Result;

/// Receives what should happen to each new slot's calendar entry.
pub trait WriteBack {
    fn write(&mut self, start: SlotStart, outcome: &SlotOutcome) -> Result<()>;

    /// Called once after the final outcomes.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NoWriteBack;

impl WriteBack for NoWriteBack {
    fn write(&mut self, _start: SlotStart, _outcome: &SlotOutcome) -> Result<()> {
        Ok(())
    }
}

/// Keeps the latest outcome per slot, plus how many writes were made.
#[derive(Debug, Default, Clone)]
pub struct MemoryWriteBack {
    pub outcomes: BTreeMap<SlotStart, SlotOutcome>,
    pub writes: usize,
}

impl WriteBack for MemoryWriteBack {
    fn write(&mut self, start: SlotStart, outcome: &SlotOutcome) -> Result<()> {
        self.outcomes.insert(start, outcome.clone());
        self.writes += 1;
        Ok(())
    }
}

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    start: SlotStart,
    #[serde(flatten)]
    outcome: &'a SlotOutcome,
}

/// Writes outcomes to a JSON file, replacing it atomically on every flush.
#[derive(Debug)]
pub struct JsonFileWriteBack {
    path: PathBuf,
    outcomes: BTreeMap<SlotStart, SlotOutcome>,
}

impl JsonFileWriteBack {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            outcomes: BTreeMap::new(),
        }
    }

    fn save(&self) -> Result<()> {
        let records: Vec<OutcomeRecord> = self
            .outcomes
            .iter()
            .map(|(start, outcome)| OutcomeRecord { start: *start, outcome })
            .collect();
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, &records)?;
            writeln!(file)?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl WriteBack for JsonFileWriteBack {
    fn write(&mut self, start: SlotStart, outcome: &SlotOutcome) -> Result<()> {
        self.outcomes.insert(start, outcome.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.save()?;
        info!(path = %self.path.display(), slots = self.outcomes.len(), "Wrote slot outcomes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn json_file_holds_latest_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outcomes.json");
        let start = Utc.with_ymd_and_hms(2024, 3, 11, 10, 15, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 12, 10, 15, 0).unwrap();

        let mut sink = JsonFileWriteBack::new(&path);
        sink.write(start, &SlotOutcome::Assigned(vec!["a@x".into()])).unwrap();
        sink.write(start, &SlotOutcome::Assigned(vec!["a@x".into(), "b@x".into()])).unwrap();
        sink.write(later, &SlotOutcome::Cleared).unwrap();
        sink.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["outcome"], "assigned");
        assert_eq!(records[0]["assignees"], serde_json::json!(["a@x", "b@x"]));
        assert_eq!(records[1]["outcome"], "cleared");
        assert!(!path.with_extension("tmp").exists());
    }
}
