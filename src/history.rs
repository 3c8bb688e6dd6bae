//! Append-only JSONL log of cull and delete actions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to encode history record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no moved records to restore")]
    NothingToRestore,

    #[error("invalid history index {index}; valid range is 0..{len}")]
    InvalidIndex { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CullAction {
    Moved,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CullRecord {
    pub timestamp: String,
    pub retained: String,
    pub culled: Vec<String>,
    pub action: CullAction,
}

impl CullRecord {
    pub fn now(retained: &Path, culled: &[PathBuf], action: CullAction) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            retained: retained.to_string_lossy().into_owned(),
            culled: culled
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            action,
        }
    }
}

/// One line of the log, parsed or not.
#[derive(Debug)]
pub struct Entry {
    pub index: usize,
    pub line: String,
    pub record: Result<CullRecord, serde_json::Error>,
    /// Position among moved records, the number `Selection::Index` expects.
    pub restore_index: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub enum Selection {
    Latest,
    Index(usize),
    All,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub records: usize,
    pub restored: Vec<(PathBuf, PathBuf)>,
    pub missing: Vec<PathBuf>,
}

pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/picbin/history.jsonl`, or the working directory when the
    /// platform has no data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("picbin")
            .join("history.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    pub fn append(&self, record: &CullRecord) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        writeln!(out, "{}", serde_json::to_string(record)?).map_err(|e| self.io_err(e))?;
        Ok(())
    }

    /// All lines of the log. A missing log reads as empty.
    pub fn entries(&self) -> Result<Vec<Entry>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        let mut entries = Vec::new();
        let mut moved = 0;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_err(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Result<CullRecord, _> = serde_json::from_str(&line);
            let restore_index = match &record {
                Ok(rec) if rec.action == CullAction::Moved => {
                    moved += 1;
                    Some(moved - 1)
                }
                _ => None,
            };
            entries.push(Entry {
                index,
                line,
                record,
                restore_index,
            });
        }
        Ok(entries)
    }

    /// Move files culled into `cull_dir` back to where they came from and drop
    /// the restored records from the log. Indices count moved records only.
    pub fn restore(&self, selection: Selection, cull_dir: &Path) -> Result<RestoreSummary, HistoryError> {
        let entries = self.entries()?;
        let moved: Vec<(usize, CullRecord)> = entries
            .iter()
            .enumerate()
            .filter_map(|(pos, e)| match (&e.record, e.restore_index) {
                (Ok(rec), Some(_)) => Some((pos, rec.clone())),
                _ => None,
            })
            .collect();

        if moved.is_empty() {
            return Err(HistoryError::NothingToRestore);
        }

        let chosen: Vec<usize> = match selection {
            Selection::All => (0..moved.len()).collect(),
            Selection::Latest => vec![moved.len() - 1],
            Selection::Index(index) if index < moved.len() => vec![index],
            Selection::Index(index) => {
                return Err(HistoryError::InvalidIndex {
                    index,
                    len: moved.len(),
                });
            }
        };

        let mut summary = RestoreSummary {
            records: chosen.len(),
            ..RestoreSummary::default()
        };
        let mut dropped = Vec::new();
        for &i in &chosen {
            let (pos, record) = &moved[i];
            dropped.push(*pos);
            for original in &record.culled {
                let dest = PathBuf::from(original);
                let Some(name) = dest.file_name() else {
                    continue;
                };
                let src = cull_dir.join(name);
                if !src.exists() || src == dest {
                    tracing::warn!(src = %src.display(), "nothing to restore");
                    summary.missing.push(src);
                    continue;
                }
                fs::rename(&src, &dest).map_err(|e| HistoryError::Io {
                    path: src.clone(),
                    source: e,
                })?;
                summary.restored.push((src, dest));
            }
        }

        let remaining: String = entries
            .iter()
            .enumerate()
            .filter(|(pos, _)| !dropped.contains(pos))
            .map(|(_, e)| format!("{}\n", e.line))
            .collect();
        fs::write(&self.path, remaining).map_err(|e| self.io_err(e))?;

        Ok(summary)
    }
}
