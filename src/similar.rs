//! Perceptual similarity grouping.
//!
//! Every readable image is reduced to a small grayscale canvas and hashed
//! into a [`PerceptualFingerprint`]. Fingerprints are then clustered by
//! Hamming distance.

use crate::group::{DuplicateGroup, DuplicateKind};
use crate::skip::{SkipReason, Skipped};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageReader};
use image_hasher::{HashAlg, HasherConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_DISTANCE: u32 = 5;

/// Side length of the grayscale canvas images are reduced to before hashing.
pub const DEFAULT_CANVAS: u32 = 64;

/// Fixed-length bit vector compared by Hamming distance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PerceptualFingerprint(Box<[u8]>);

impl PerceptualFingerprint {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    pub fn from_u64(bits: u64) -> Self {
        Self(bits.to_be_bytes().into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn bits(&self) -> usize {
        self.0.len() * 8
    }

    /// Number of differing bits. Bytes present in only one of the two
    /// fingerprints count as fully different.
    pub fn distance(&self, other: &Self) -> u32 {
        let common: u32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let extra = self.0.len().abs_diff(other.0.len()) as u32 * 8;
        common + extra
    }
}

/// The replaceable perceptual hash primitive.
pub trait FingerprintHasher: Sync {
    fn fingerprint(&self, image: &GrayImage) -> PerceptualFingerprint;
}

/// 64-bit DCT mean hash (pHash style).
pub struct DctHasher {
    inner: image_hasher::Hasher,
}

impl DctHasher {
    pub fn new() -> Self {
        let inner = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self { inner }
    }
}

impl Default for DctHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintHasher for DctHasher {
    fn fingerprint(&self, image: &GrayImage) -> PerceptualFingerprint {
        let image = DynamicImage::ImageLuma8(image.clone());
        PerceptualFingerprint::from_bytes(self.inner.hash_image(&image).as_bytes())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clustering {
    /// Each group holds its seed plus every later unassigned path within
    /// range of the seed. Order dependent.
    #[default]
    Seeded,
    /// Connected components of the "within range" relation.
    Transitive,
}

#[derive(Debug, Clone)]
pub struct SimilarOptions {
    pub max_distance: u32,
    pub canvas: u32,
    pub clustering: Clustering,
}

impl Default for SimilarOptions {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
            canvas: DEFAULT_CANVAS,
            clustering: Clustering::default(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SimilarReport {
    pub groups: Vec<DuplicateGroup>,
    pub skipped: Vec<Skipped>,
}

/// Group visually similar images with the default hasher and seeded clustering.
pub fn find_similar_images(paths: &[PathBuf], max_distance: u32) -> Vec<DuplicateGroup> {
    let options = SimilarOptions {
        max_distance,
        ..SimilarOptions::default()
    };
    scan(paths, &options, &DctHasher::new()).groups
}

pub fn scan<H: FingerprintHasher>(
    paths: &[PathBuf],
    options: &SimilarOptions,
    hasher: &H,
) -> SimilarReport {
    tracing::info!(files = paths.len(), "finding similar images");
    let (entries, skipped) = fingerprint_all(paths, options.canvas, hasher);
    let groups = cluster(&entries, options.max_distance, options.clustering);
    tracing::info!(
        groups = groups.len(),
        skipped = skipped.len(),
        "similar image search finished"
    );
    SimilarReport { groups, skipped }
}

/// Fingerprint every path in parallel. Output keeps input order.
pub fn fingerprint_all<H: FingerprintHasher>(
    paths: &[PathBuf],
    canvas: u32,
    hasher: &H,
) -> (Vec<(PathBuf, PerceptualFingerprint)>, Vec<Skipped>) {
    let results: Vec<_> = paths
        .par_iter()
        .map(|path| (path, load_normalized(path, canvas)))
        .map(|(path, image)| (path, image.map(|img| hasher.fingerprint(&img))))
        .collect();

    let mut entries = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for (path, result) in results {
        match result {
            Ok(fp) => entries.push((path.clone(), fp)),
            Err(reason) => {
                tracing::debug!(path = %path.display(), %reason, "not fingerprinted; skipping");
                skipped.push(Skipped::new(path, reason));
            }
        }
    }
    (entries, skipped)
}

/// Decode an image, convert it to 8-bit grayscale and resize it to a square canvas.
pub fn load_normalized(path: &Path, canvas: u32) -> Result<GrayImage, SkipReason> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let gray = image.to_luma8();
    Ok(imageops::resize(&gray, canvas, canvas, FilterType::Triangle))
}

pub fn cluster(
    entries: &[(PathBuf, PerceptualFingerprint)],
    max_distance: u32,
    clustering: Clustering,
) -> Vec<DuplicateGroup> {
    match clustering {
        Clustering::Seeded => cluster_seeded(entries, max_distance),
        Clustering::Transitive => cluster_transitive(entries, max_distance),
    }
}

fn cluster_seeded(
    entries: &[(PathBuf, PerceptualFingerprint)],
    max_distance: u32,
) -> Vec<DuplicateGroup> {
    let mut assigned = vec![false; entries.len()];
    let mut groups = Vec::new();

    for (i, (seed_path, seed)) in entries.iter().enumerate() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut members = vec![seed_path.clone()];

        for (j, (path, fp)) in entries.iter().enumerate().skip(i + 1) {
            if !assigned[j] && seed.distance(fp) <= max_distance {
                assigned[j] = true;
                members.push(path.clone());
            }
        }

        groups.extend(DuplicateGroup::new(DuplicateKind::Similar, members));
    }
    groups
}

fn cluster_transitive(
    entries: &[(PathBuf, PerceptualFingerprint)],
    max_distance: u32,
) -> Vec<DuplicateGroup> {
    let mut parent: Vec<usize> = (0..entries.len()).collect();

    fn find(parent: &mut [usize], i: usize) -> usize {
        if parent[i] != i {
            parent[i] = find(parent, parent[i]);
        }
        parent[i]
    }

    for i in 0..entries.len() {
        for j in i + 1..entries.len() {
            if entries[i].1.distance(&entries[j].1) <= max_distance {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj.max(ri)] = ri.min(rj);
                }
            }
        }
    }

    let mut slots: HashMap<usize, usize> = HashMap::new();
    let mut components: Vec<Vec<PathBuf>> = Vec::new();
    for (i, (path, _)) in entries.iter().enumerate() {
        let root = find(&mut parent, i);
        let slot = *slots.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(path.clone());
    }

    components
        .into_iter()
        .filter_map(|paths| DuplicateGroup::new(DuplicateKind::Similar, paths))
        .collect()
}
