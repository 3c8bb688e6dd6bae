//! Deletion suggestions: keep the newest file of every group.

use crate::group::DuplicateGroup;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What to do with one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPlan {
    pub keep: PathBuf,
    pub discard: Vec<PathBuf>,
}

/// Flat list of paths to delete, newest file of each group withheld.
/// Exact groups are visited before similar ones.
pub fn get_deletion_suggestions(
    duplicate_groups: &[DuplicateGroup],
    similar_groups: &[DuplicateGroup],
) -> Vec<PathBuf> {
    suggest_with(duplicate_groups.iter().chain(similar_groups), modified_time)
}

pub fn suggest_with<'a, I, F>(groups: I, mtime: F) -> Vec<PathBuf>
where
    I: IntoIterator<Item = &'a DuplicateGroup>,
    F: Fn(&Path) -> Option<SystemTime>,
{
    plan_with(groups, mtime)
        .into_iter()
        .flat_map(|plan| plan.discard)
        .collect()
}

pub fn plan<'a, I>(groups: I) -> Vec<GroupPlan>
where
    I: IntoIterator<Item = &'a DuplicateGroup>,
{
    plan_with(groups, modified_time)
}

/// Members are ordered newest first; equal times fall back to path order.
/// A member whose time is unknown counts as oldest.
pub fn plan_with<'a, I, F>(groups: I, mtime: F) -> Vec<GroupPlan>
where
    I: IntoIterator<Item = &'a DuplicateGroup>,
    F: Fn(&Path) -> Option<SystemTime>,
{
    groups
        .into_iter()
        .filter_map(|group| {
            let mut members: Vec<(SystemTime, &PathBuf)> = group
                .paths
                .iter()
                .map(|p| (mtime(p).unwrap_or(SystemTime::UNIX_EPOCH), p))
                .collect();
            members.sort_by(|(ta, pa), (tb, pb)| tb.cmp(ta).then_with(|| pa.cmp(pb)));

            let mut members = members.into_iter().map(|(_, p)| p.clone());
            let keep = members.next()?;
            Some(GroupPlan {
                keep,
                discard: members.collect(),
            })
        })
        .collect()
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => Some(time),
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "modification time unavailable");
            None
        }
    }
}
