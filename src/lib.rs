//! Photo triage helpers: find exact and visually similar duplicate images
//! and decide which copies to throw away.
//!
//! [`exact`] and [`similar`] each turn a list of paths into groups of two
//! or more equivalent files. [`advisor`] turns those groups into a list of
//! files to delete, keeping the most recently modified file of each group.
//! Unreadable or undecodable paths never fail a pass; they are reported as
//! [`Skipped`] entries instead.

pub mod advisor;
pub mod cull;
pub mod exact;
pub mod group;
pub mod history;
pub mod logging;
pub mod months;
pub mod scanner;
pub mod similar;
pub mod skip;

pub use advisor::{GroupPlan, get_deletion_suggestions};
pub use exact::{ExactOptions, ExactReport, find_exact_duplicates};
pub use group::{DuplicateGroup, DuplicateKind};
pub use similar::{Clustering, SimilarOptions, SimilarReport, find_similar_images};
pub use skip::{SkipReason, Skipped};
