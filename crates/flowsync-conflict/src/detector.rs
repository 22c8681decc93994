//! Divergence detection
//!
//! Every conflict decision in the engine goes through
//! [`ConflictDetector::classify`]: a three-way comparison of the stored base
//! hash against the current local and remote hashes. Timestamps are never
//! consulted.

use flowsync_core::domain::ContentHash;
use tracing::debug;

/// How local and remote relate to the last synced base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    /// Neither side changed
    Unchanged,
    /// Both sides changed to the same content
    Converged,
    /// Only the local copy changed
    LocalOnly,
    /// Only the remote changed
    RemoteOnly,
    /// Both sides changed, to different content
    Both,
}

impl Divergence {
    /// Returns true only for a true conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Divergence::Both)
    }

    /// Returns true if local and remote already hold the same content
    pub fn in_agreement(&self) -> bool {
        matches!(self, Divergence::Unchanged | Divergence::Converged)
    }
}

/// Classifies divergence between base, local and remote
pub struct ConflictDetector;

impl ConflictDetector {
    /// Three-way hash comparison
    ///
    /// `base` is the record's stored hash, `local` the hash of the primary
    /// blob, `remote` the hash of the server's current representation.
    pub fn classify(base: &ContentHash, local: &ContentHash, remote: &ContentHash) -> Divergence {
        let local_changed = local != base;
        let remote_changed = remote != base;

        let divergence = match (local_changed, remote_changed) {
            (false, false) => Divergence::Unchanged,
            (true, false) => Divergence::LocalOnly,
            (false, true) => Divergence::RemoteOnly,
            (true, true) if local == remote => Divergence::Converged,
            (true, true) => Divergence::Both,
        };

        debug!(
            base = base.short(),
            local = local.short(),
            remote = remote.short(),
            ?divergence,
            "Classified divergence"
        );
        divergence
    }
}
