//! segforge-core: shared types, IDs, errors, configuration and segment planning.
//!
//! This crate is the foundational dependency for the other segforge crates,
//! providing the session identifier, the unified error taxonomy, media and
//! artifact types, the pure segmentation planner, and the on-disk naming
//! conventions every session file follows.

pub mod artifact;
pub mod config;
pub mod error;
pub mod ids;
pub mod media;
pub mod naming;
pub mod plan;

// Re-export the most commonly used items at the crate root.
pub use artifact::{Archive, InputRef, SegmentArtifact};
pub use error::{Error, Result, TranscodeCause};
pub use ids::SessionId;
pub use media::{check_duration, MediaDescriptor, MAX_DURATION_SECS};
pub use plan::{plan, SegmentWindow};
