//! Snapshot and raw-batch digests (versioned).
//!
//! Compliance reports are snapshot-scoped: downstream repair/learning
//! consumers need a stable way to refer to the exact IR a report was computed
//! against, and the normalization cache keys entries by raw input + IR
//! version.
//!
//! For the initial version we use a **simple, deterministic,
//! non-cryptographic** digest:
//!
//! - algorithm: **FNV-1a 64-bit**
//! - input: arbitrary bytes (snapshot JSON as-read, or a serialized raw
//!   constraint)
//! - output: `"fnv1a64:<16 lowercase hex digits>"`
//!
//! This digest is **not** a security primitive. It is a stability/identity
//! tool for cache keys and report provenance; it can be upgraded to a
//! cryptographic hash later without touching the call sites.

/// Prefix used in serialized digests.
pub const IR_DIGEST_V1_PREFIX: &str = "fnv1a64:";

/// Compute a v1 digest (FNV-1a 64-bit) over arbitrary bytes.
pub fn fnv1a64_digest_bytes(bytes: &[u8]) -> String {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x00000100000001b3;

    let mut hash = FNV_OFFSET_BASIS;
    for b in bytes {
        hash ^= (*b) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    format!("{IR_DIGEST_V1_PREFIX}{hash:016x}")
}

/// Compute the v1 digest for a snapshot's JSON text.
pub fn snapshot_digest_v1(text: &str) -> String {
    fnv1a64_digest_bytes(text.as_bytes())
}

/// Compute a stable id for a single raw constraint as extracted.
///
/// Properties:
/// - deterministic
/// - hashes the identity fields directly (entity, field, descriptor, source),
///   so incidental formatting of the optional value payload never shifts the
///   id
/// - non-cryptographic (same tradeoff as `snapshot_digest_v1`)
pub fn raw_constraint_digest_v1(
    entity: &str,
    field: &str,
    descriptor: &str,
    source: &str,
) -> String {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x00000100000001b3;

    fn add(hash: &mut u64, s: &str) {
        for b in s.as_bytes() {
            *hash ^= (*b) as u64;
            *hash = hash.wrapping_mul(FNV_PRIME);
        }
    }

    let mut hash = FNV_OFFSET_BASIS;

    add(&mut hash, "entity=");
    add(&mut hash, entity);
    add(&mut hash, "|field=");
    add(&mut hash, field);
    add(&mut hash, "|descriptor=");
    add(&mut hash, descriptor);
    add(&mut hash, "|source=");
    add(&mut hash, source);

    format!("{IR_DIGEST_V1_PREFIX}{hash:016x}")
}
