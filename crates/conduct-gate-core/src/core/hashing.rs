// crates/conduct-gate-core/src/core/hashing.rs
// ============================================================================
// Module: Conduct Gate Audit Integrity
// Description: Canonical sealing and verification of append-only audit records.
// Purpose: Make security events and snapshot blobs tamper-evident on re-read.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Audit records are sealed at append time: the record is rendered to RFC
//! 8785 (JCS) canonical JSON and a digest over those bytes is stored beside
//! it. Re-reads recompute the digest from the persisted bytes and fail
//! closed on any mismatch, so no store can silently hand back a mutated
//! security event or snapshot. Canonical JSON keeps the digest stable across
//! key ordering and numeric formatting, which is what makes "byte-equal on
//! re-read" a checkable property rather than a convention.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest as _;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while sealing or verifying audit records.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The record could not be rendered to canonical JSON.
    #[error("failed to canonicalize audit record: {0}")]
    Canonicalize(String),
    /// The persisted bytes no longer match the digest stored beside them.
    #[error("audit digest mismatch: stored {stored}, computed {computed}")]
    DigestMismatch {
        /// Digest persisted beside the record at append time.
        stored: String,
        /// Digest recomputed from the persisted bytes.
        computed: String,
    },
}

// ============================================================================
// SECTION: Digest Algorithm
// ============================================================================

/// Digest algorithms accepted for audit seals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    /// SHA-256.
    #[default]
    Sha256,
}

// ============================================================================
// SECTION: Audit Digest
// ============================================================================

/// Digest stored beside a sealed audit record.
///
/// # Invariants
/// - `hex` is the lowercase hex rendering of the digest over the record's
///   canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDigest {
    /// Algorithm the digest was computed with.
    pub algorithm: DigestAlgorithm,
    /// Lowercase hex digest of the canonical bytes.
    pub hex: String,
}

impl AuditDigest {
    /// Computes the digest over raw canonical bytes.
    #[must_use]
    pub fn over(algorithm: DigestAlgorithm, bytes: &[u8]) -> Self {
        let hex = match algorithm {
            DigestAlgorithm::Sha256 => Sha256::digest(bytes)
                .iter()
                .fold(String::with_capacity(64), |mut rendered, byte| {
                    let _ = write!(rendered, "{byte:02x}");
                    rendered
                }),
        };
        Self {
            algorithm,
            hex,
        }
    }

    /// Rebuilds a digest record from its persisted hex rendering.
    #[must_use]
    pub fn from_hex(algorithm: DigestAlgorithm, hex: impl Into<String>) -> Self {
        Self {
            algorithm,
            hex: hex.into(),
        }
    }

    /// Returns whether the digest matches the given bytes.
    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        Self::over(self.algorithm, bytes).hex == self.hex
    }

    /// Verifies the digest against persisted bytes, failing closed.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::DigestMismatch`] when the bytes have
    /// diverged from the sealed record.
    pub fn verify(&self, bytes: &[u8]) -> Result<(), IntegrityError> {
        let computed = Self::over(self.algorithm, bytes);
        if computed.hex == self.hex {
            Ok(())
        } else {
            Err(IntegrityError::DigestMismatch {
                stored: self.hex.clone(),
                computed: computed.hex,
            })
        }
    }
}

// ============================================================================
// SECTION: Sealing
// ============================================================================

/// A record rendered to canonical bytes with its digest.
///
/// # Invariants
/// - `digest` was computed over exactly `bytes`; stores must persist the
///   pair together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSeal {
    /// Canonical JSON bytes of the record.
    pub bytes: Vec<u8>,
    /// Digest over `bytes`.
    pub digest: AuditDigest,
}

/// Renders a record to RFC 8785 canonical JSON bytes.
///
/// # Errors
///
/// Returns [`IntegrityError::Canonicalize`] when serialization fails, which
/// includes any non-finite float reaching the audit path.
pub fn canonical_bytes<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>, IntegrityError> {
    serde_jcs::to_vec(record).map_err(|err| IntegrityError::Canonicalize(err.to_string()))
}

/// Seals a record for append: canonical bytes plus their digest.
///
/// # Errors
///
/// Returns [`IntegrityError::Canonicalize`] when the record cannot be
/// rendered canonically.
pub fn seal<T: Serialize + ?Sized>(record: &T) -> Result<AuditSeal, IntegrityError> {
    let bytes = canonical_bytes(record)?;
    let digest = AuditDigest::over(DigestAlgorithm::default(), &bytes);
    Ok(AuditSeal {
        bytes,
        digest,
    })
}
