//! Exact duplicate detection.
//!
//! Files are bucketed by byte size first, so only same-size files are ever
//! read. Within a bucket a BLAKE3 digest of the first few kilobytes separates
//! files that merely share a size. The prefix digest is an approximation of
//! full equality; `ExactOptions::verify_full` adds a full-content pass.

use crate::group::{DuplicateGroup, DuplicateKind};
use crate::skip::{SkipReason, Skipped};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Bytes read from the start of each file for the content fingerprint.
pub const DEFAULT_PREFIX_LEN: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(blake3::Hash);

impl ContentFingerprint {
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ExactOptions {
    /// Zero falls back to [`DEFAULT_PREFIX_LEN`]; an empty prefix would
    /// make every same-size file look identical.
    pub prefix_len: usize,
    /// Re-check prefix matches against a digest of the whole file.
    pub verify_full: bool,
}

impl ExactOptions {
    pub fn effective_prefix_len(&self) -> usize {
        match self.prefix_len {
            0 => DEFAULT_PREFIX_LEN,
            n => n,
        }
    }
}

impl Default for ExactOptions {
    fn default() -> Self {
        Self {
            prefix_len: DEFAULT_PREFIX_LEN,
            verify_full: false,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ExactReport {
    pub groups: Vec<DuplicateGroup>,
    pub skipped: Vec<Skipped>,
}

/// Group byte-identical files using the default options.
pub fn find_exact_duplicates(paths: &[PathBuf]) -> Vec<DuplicateGroup> {
    scan(paths, &ExactOptions::default()).groups
}

pub fn scan(paths: &[PathBuf], options: &ExactOptions) -> ExactReport {
    tracing::info!(files = paths.len(), "finding exact duplicates");
    let prefix_len = options.effective_prefix_len();
    let mut report = ExactReport::default();

    let mut buckets: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        match fs::metadata(path) {
            Ok(meta) => buckets.entry(meta.len()).or_default().push(path.clone()),
            Err(err) => {
                let reason = SkipReason::from(&err);
                tracing::debug!(path = %path.display(), %reason, "size unavailable; skipping");
                report.skipped.push(Skipped::new(path, reason));
            }
        }
    }

    for (size, bucket) in buckets {
        if bucket.len() < 2 {
            continue;
        }
        tracing::trace!(size, files = bucket.len(), "hashing size bucket");

        let prefix_groups = group_by_digest(bucket, &mut report.skipped, |path| {
            prefix_fingerprint(path, prefix_len)
        });

        for candidates in prefix_groups {
            if !options.verify_full {
                report
                    .groups
                    .extend(DuplicateGroup::new(DuplicateKind::Exact, candidates));
                continue;
            }
            let confirmed = group_by_digest(candidates, &mut report.skipped, full_fingerprint);
            report.groups.extend(
                confirmed
                    .into_iter()
                    .filter_map(|paths| DuplicateGroup::new(DuplicateKind::Exact, paths)),
            );
        }
    }

    tracing::info!(
        groups = report.groups.len(),
        skipped = report.skipped.len(),
        "exact duplicate search finished"
    );
    report
}

/// Split `paths` by digest, keeping first-seen order. Only groups of two or
/// more are returned.
fn group_by_digest<F>(paths: Vec<PathBuf>, skipped: &mut Vec<Skipped>, digest: F) -> Vec<Vec<PathBuf>>
where
    F: Fn(&Path) -> Result<ContentFingerprint, SkipReason>,
{
    let mut index: HashMap<ContentFingerprint, usize> = HashMap::new();
    let mut groups: Vec<Vec<PathBuf>> = Vec::new();

    for path in paths {
        match digest(&path) {
            Ok(fp) => {
                let slot = *index.entry(fp).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[slot].push(path);
            }
            Err(reason) => {
                tracing::debug!(path = %path.display(), %reason, "content unreadable; skipping");
                skipped.push(Skipped::new(path, reason));
            }
        }
    }

    groups.retain(|g| g.len() > 1);
    groups
}

/// Digest of the first `len` bytes of a file.
pub fn prefix_fingerprint(path: &Path, len: usize) -> Result<ContentFingerprint, SkipReason> {
    let file = File::open(path)?;
    let mut chunk = Vec::with_capacity(len);
    file.take(len as u64).read_to_end(&mut chunk)?;
    Ok(ContentFingerprint(blake3::hash(&chunk)))
}

/// Digest of a whole file.
pub fn full_fingerprint(path: &Path) -> Result<ContentFingerprint, SkipReason> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ContentFingerprint(hasher.finalize()))
}
