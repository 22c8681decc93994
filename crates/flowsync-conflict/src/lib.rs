//! FlowSync Conflict - Divergence detection and workflow diffs
//!
//! Provides:
//! - Hash-based three-way divergence classification (base, local, remote)
//! - Field-level diff between two workflow snapshots for inspection

pub mod detector;
pub mod diff;
pub mod error;

pub use detector::{ConflictDetector, Divergence};
pub use diff::{diff_workflows, ChangeKind, FieldChange};
pub use error::ConflictError;
