//! Compliance report binary container.
//!
//! Persists one validation run's report together with the fuzzy-similarity
//! cache, so identical comparisons are never re-issued across runs and
//! downstream repair/learning consumers can read the `missing`/`extra` lists
//! without re-running the pipeline.
//!
//! ## Binary Format
//!
//! ```text
//! +----------------+
//! | Header (24B)   |  magic, version, payload length
//! +----------------+
//! | CBOR payload   |  ComplianceReportV1 + similarity cache entries
//! +----------------+
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::fuzzy::SimilarityCache;
use crate::report::ComplianceReportV1;

/// Magic bytes: "CNRC" (Concord Report Container)
pub const MAGIC: [u8; 4] = [0x43, 0x4E, 0x52, 0x43];

/// Current format version
pub const VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ReportFormatError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a concord report container (bad magic)")]
    BadMagic,

    #[error("unsupported container version {0} (max supported {VERSION})")]
    UnsupportedVersion(u32),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("failed to decode payload: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

// ============================================================================
// Header
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct ContainerHeader {
    magic: [u8; 4],
    version: u32,
    payload_len: u64,
    _reserved: u64,
}

impl ContainerHeader {
    fn new(payload_len: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            payload_len,
            _reserved: 0,
        }
    }

    fn write<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.magic)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u64::<LittleEndian>(self.payload_len)?;
        w.write_u64::<LittleEndian>(self._reserved)?;
        Ok(())
    }

    fn read<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        Ok(Self {
            magic,
            version: r.read_u32::<LittleEndian>()?,
            payload_len: r.read_u64::<LittleEndian>()?,
            _reserved: r.read_u64::<LittleEndian>()?,
        })
    }
}

// ============================================================================
// Container
// ============================================================================

/// The persisted payload: the report plus the similarity cache snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContainer {
    pub report: ComplianceReportV1,
    pub similarity_cache: Vec<((String, String), f64)>,
}

impl ReportContainer {
    pub fn new(report: ComplianceReportV1, cache: &SimilarityCache) -> Self {
        Self {
            report,
            similarity_cache: cache.snapshot(),
        }
    }

    /// Restore the persisted similarity scores into a cache.
    pub fn restore_cache(&self, cache: &SimilarityCache) {
        cache.restore(self.similarity_cache.clone());
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), ReportFormatError> {
        let mut payload = Vec::new();
        ciborium::ser::into_writer(self, &mut payload)?;

        let header = ContainerHeader::new(payload.len() as u64);
        header.write(w)?;
        w.write_all(&payload)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, ReportFormatError> {
        let header = ContainerHeader::read(r)?;
        if header.magic != MAGIC {
            return Err(ReportFormatError::BadMagic);
        }
        if header.version > VERSION {
            return Err(ReportFormatError::UnsupportedVersion(header.version));
        }

        let mut payload = vec![0u8; header.payload_len as usize];
        r.read_exact(&mut payload)?;
        Ok(ciborium::de::from_reader(payload.as_slice())?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ReportFormatError> {
        let mut file = std::fs::File::create(path)?;
        self.write(&mut file)
    }

    pub fn load(path: &Path) -> Result<Self, ReportFormatError> {
        let mut file = std::fs::File::open(path)?;
        Self::read(&mut file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzy::DescriptorPair;
    use crate::matcher::{MatchOutcome, MatchStats};
    use crate::report::{aggregate, ReportMeta};

    fn sample_report() -> ComplianceReportV1 {
        aggregate(
            &MatchOutcome {
                results: Vec::new(),
                extra: Vec::new(),
                stats: MatchStats::default(),
            },
            &ReportMeta {
                ir_digest: "fnv1a64:1234567890abcdef".to_string(),
                parse_errors: 1,
                unresolved: 2,
                generated_at_unix_secs: 1_700_000_000,
            },
        )
    }

    #[test]
    fn round_trip_via_file() {
        let cache = SimilarityCache::new();
        cache.put(
            &DescriptorPair {
                spec: "a".to_string(),
                code: "b".to_string(),
            },
            0.8,
        );
        let container = ReportContainer::new(sample_report(), &cache);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.cnrc");
        container.save(&path).unwrap();

        let loaded = ReportContainer::load(&path).unwrap();
        assert_eq!(loaded.report, container.report);
        assert_eq!(loaded.similarity_cache, container.similarity_cache);

        let restored = SimilarityCache::new();
        loaded.restore_cache(&restored);
        assert_eq!(
            restored.get(&DescriptorPair {
                spec: "a".to_string(),
                code: "b".to_string(),
            }),
            Some(0.8)
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Vec::new();
        ReportContainer::new(sample_report(), &SimilarityCache::new())
            .write(&mut bytes)
            .unwrap();
        bytes[0] = b'X';

        let err = ReportContainer::read(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, ReportFormatError::BadMagic));
    }

    #[test]
    fn rejects_future_versions() {
        let mut bytes = Vec::new();
        ReportContainer::new(sample_report(), &SimilarityCache::new())
            .write(&mut bytes)
            .unwrap();
        // Bump the version field (bytes 4..8, little-endian).
        bytes[4] = 0xFF;

        let err = ReportContainer::read(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, ReportFormatError::UnsupportedVersion(_)));
    }
}
