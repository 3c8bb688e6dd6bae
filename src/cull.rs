//! Acting on deletion plans: moving duplicates aside or deleting them, and
//! recording what was done in the history log.

use crate::advisor::GroupPlan;
use crate::history::{CullAction, CullRecord, HistoryError, HistoryLog};
use crate::scanner;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the directory culled files go to when none is given. Hidden, so
/// later scans of the same folder never see it.
pub const DEFAULT_CULL_DIR: &str = ".duplicates";

#[derive(Debug, Error)]
pub enum CullError {
    #[error("failed to create directory {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error(transparent)]
    History(#[from] HistoryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Moved { from: PathBuf, to: PathBuf },
    WouldMove { from: PathBuf, to: PathBuf },
    /// The destination already exists; the file stays where it is.
    Collision { from: PathBuf, to: PathBuf },
    Deleted(PathBuf),
    Failed { path: PathBuf, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub keep: PathBuf,
    pub steps: Vec<Step>,
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub groups: Vec<GroupOutcome>,
    pub records_written: usize,
}

pub fn default_cull_dir(first_folder: &Path) -> PathBuf {
    scanner::expand_home(first_folder).join(DEFAULT_CULL_DIR)
}

fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Drop discards that are the same file as something another group keeps,
/// and discards already scheduled by an earlier group. Files are compared by
/// canonical path, so two spellings of one file never count as a duplicate.
pub fn actionable(plans: Vec<GroupPlan>) -> Vec<GroupPlan> {
    let keeps: HashSet<PathBuf> = plans.iter().map(|p| identity(&p.keep)).collect();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    plans
        .into_iter()
        .filter_map(|mut plan| {
            plan.discard.retain(|p| {
                let id = identity(p);
                !keeps.contains(&id) && seen.insert(id)
            });
            (!plan.discard.is_empty()).then_some(plan)
        })
        .collect()
}

/// Move every discard into `dup_dir`. Existing files there are never
/// overwritten. One history record is written per group that moved anything.
pub fn move_duplicates(
    plans: &[GroupPlan],
    dup_dir: &Path,
    dry_run: bool,
    history: &HistoryLog,
) -> Result<Outcome, CullError> {
    if !dry_run {
        fs::create_dir_all(dup_dir).map_err(|source| CullError::CreateDir {
            path: dup_dir.to_path_buf(),
            source,
        })?;
    }

    let mut outcome = Outcome::default();
    for plan in plans {
        let mut steps = Vec::new();
        let mut moved = Vec::new();

        for dup in &plan.discard {
            let Some(file_name) = dup.file_name() else {
                continue;
            };
            let (from, to) = (dup.clone(), dup_dir.join(file_name));
            if dry_run {
                steps.push(Step::WouldMove { from, to });
            } else if to.exists() {
                tracing::warn!(dest = %to.display(), "destination exists; leaving file in place");
                steps.push(Step::Collision { from, to });
            } else {
                match fs::rename(&from, &to) {
                    Ok(()) => {
                        moved.push(from.clone());
                        steps.push(Step::Moved { from, to });
                    }
                    Err(err) => steps.push(Step::Failed {
                        path: from,
                        error: err.to_string(),
                    }),
                }
            }
        }

        if !moved.is_empty() {
            history.append(&CullRecord::now(&plan.keep, &moved, CullAction::Moved))?;
            outcome.records_written += 1;
        }
        outcome.groups.push(GroupOutcome {
            keep: plan.keep.clone(),
            steps,
        });
    }
    Ok(outcome)
}

/// Permanently delete every discard. Failures are reported per file.
pub fn delete_duplicates(plans: &[GroupPlan], history: &HistoryLog) -> Result<Outcome, CullError> {
    let mut outcome = Outcome::default();
    for plan in plans {
        let mut steps = Vec::new();
        let mut deleted = Vec::new();

        for dup in &plan.discard {
            match fs::remove_file(dup) {
                Ok(()) => {
                    deleted.push(dup.clone());
                    steps.push(Step::Deleted(dup.clone()));
                }
                Err(err) => steps.push(Step::Failed {
                    path: dup.clone(),
                    error: err.to_string(),
                }),
            }
        }

        if !deleted.is_empty() {
            history.append(&CullRecord::now(&plan.keep, &deleted, CullAction::Deleted))?;
            outcome.records_written += 1;
        }
        outcome.groups.push(GroupOutcome {
            keep: plan.keep.clone(),
            steps,
        });
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor;
    use crate::exact::find_exact_duplicates;
    use tempfile::TempDir;

    fn plan(keep: &Path, discard: &[&Path]) -> GroupPlan {
        GroupPlan {
            keep: keep.to_path_buf(),
            discard: discard.iter().map(|p| p.to_path_buf()).collect(),
        }
    }

    fn photos(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, b"pixels").unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_actionable_never_discards_a_kept_file() {
        let dir = TempDir::new().unwrap();
        let p = photos(&dir, &["a", "b", "c", "d", "e", "f"]);
        let plans = vec![
            plan(&p[0], &[&p[1], &p[2]]),
            plan(&p[2], &[&p[3], &p[1]]),
            plan(&p[4], &[&p[5]]),
        ];

        let result = actionable(plans);

        assert_eq!(
            result,
            vec![plan(&p[0], &[&p[1]]), plan(&p[2], &[&p[3]]), plan(&p[4], &[&p[5]])]
        );
    }

    #[test]
    fn test_two_spellings_of_one_file_are_not_actionable() {
        let dir = TempDir::new().unwrap();
        let only = photos(&dir, &["only.jpg"]).remove(0);
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        let alias = dir.path().join("sub/../only.jpg");

        let groups = find_exact_duplicates(&[only.clone(), alias]);
        assert_eq!(groups.len(), 1);

        let plans = actionable(advisor::plan(&groups));
        assert!(plans.is_empty());
        assert!(only.exists());
    }

    #[test]
    fn test_move_records_only_moved_files() {
        let dir = TempDir::new().unwrap();
        let p = photos(&dir, &["keep.jpg", "a.jpg", "b.jpg"]);
        let cull_dir = dir.path().join(DEFAULT_CULL_DIR);
        fs::create_dir_all(&cull_dir).unwrap();
        fs::write(cull_dir.join("b.jpg"), b"already here").unwrap();
        let history = HistoryLog::open(dir.path().join("history.jsonl"));

        let outcome =
            move_duplicates(&[plan(&p[0], &[&p[1], &p[2]])], &cull_dir, false, &history).unwrap();

        assert_eq!(
            outcome.groups[0].steps,
            vec![
                Step::Moved {
                    from: p[1].clone(),
                    to: cull_dir.join("a.jpg")
                },
                Step::Collision {
                    from: p[2].clone(),
                    to: cull_dir.join("b.jpg")
                },
            ]
        );
        assert!(!p[1].exists());
        assert!(p[2].exists());
        assert_eq!(fs::read(cull_dir.join("b.jpg")).unwrap(), b"already here");

        assert_eq!(outcome.records_written, 1);
        let entries = history.entries().unwrap();
        assert_eq!(entries.len(), 1);
        let record = entries[0].record.as_ref().unwrap();
        assert_eq!(record.action, CullAction::Moved);
        assert_eq!(record.culled, vec![p[1].to_string_lossy().into_owned()]);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let p = photos(&dir, &["keep.jpg", "a.jpg"]);
        let cull_dir = dir.path().join(DEFAULT_CULL_DIR);
        let history = HistoryLog::open(dir.path().join("history.jsonl"));

        let outcome = move_duplicates(&[plan(&p[0], &[&p[1]])], &cull_dir, true, &history).unwrap();

        assert_eq!(
            outcome.groups[0].steps,
            vec![Step::WouldMove {
                from: p[1].clone(),
                to: cull_dir.join("a.jpg")
            }]
        );
        assert_eq!(outcome.records_written, 0);
        assert!(p[1].exists());
        assert!(!cull_dir.exists());
        assert!(!history.path().exists());
    }

    #[test]
    fn test_all_collisions_write_no_history() {
        let dir = TempDir::new().unwrap();
        let p = photos(&dir, &["keep.jpg", "a.jpg"]);
        let cull_dir = dir.path().join("culled");
        fs::create_dir_all(&cull_dir).unwrap();
        fs::write(cull_dir.join("a.jpg"), b"taken").unwrap();
        let history = HistoryLog::open(dir.path().join("history.jsonl"));

        let outcome = move_duplicates(&[plan(&p[0], &[&p[1]])], &cull_dir, false, &history).unwrap();

        assert_eq!(outcome.records_written, 0);
        assert!(history.entries().unwrap().is_empty());
    }

    #[test]
    fn test_delete_reports_failures_per_file() {
        let dir = TempDir::new().unwrap();
        let p = photos(&dir, &["keep.jpg", "a.jpg"]);
        let missing = dir.path().join("missing.jpg");
        let history = HistoryLog::open(dir.path().join("history.jsonl"));

        let outcome = delete_duplicates(&[plan(&p[0], &[&missing, &p[1]])], &history).unwrap();

        let steps = &outcome.groups[0].steps;
        assert!(matches!(&steps[0], Step::Failed { path, .. } if path == &missing));
        assert_eq!(steps[1], Step::Deleted(p[1].clone()));
        assert!(p[0].exists());
        assert!(!p[1].exists());

        let entries = history.entries().unwrap();
        assert_eq!(entries.len(), 1);
        let record = entries[0].record.as_ref().unwrap();
        assert_eq!(record.action, CullAction::Deleted);
        assert_eq!(record.culled, vec![p[1].to_string_lossy().into_owned()]);
    }

    #[test]
    fn test_default_cull_dir_is_hidden_from_scans() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("keep.jpg"), b"pixels").unwrap();
        let cull_dir = default_cull_dir(&root);
        fs::create_dir_all(&cull_dir).unwrap();
        fs::write(cull_dir.join("copy.jpg"), b"pixels").unwrap();

        let images = scanner::scan_folders(&[&root]);

        assert_eq!(images, vec![root.join("keep.jpg")]);
        assert!(find_exact_duplicates(&images).is_empty());
    }
}
