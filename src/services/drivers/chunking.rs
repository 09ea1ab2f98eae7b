use tracing::warn;

pub const MIB: i64 = 1024 * 1024;

/// Converts a chunk size configured in MiB to bytes.
pub fn mib_to_bytes(mib: u32) -> i64 {
    i64::from(mib) * MIB
}

/// Chunk size a provider session is advertised with. The byte size is always
/// a whole number of provider alignment units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    alignment: i64,
    chunk_size: i64,
}

impl ChunkPolicy {
    /// Builds the policy from a MiB setting, rounding down to the alignment
    /// but never below a single unit.
    pub fn from_mib(chunk_size_mib: u32, alignment: i64) -> Self {
        assert!(alignment > 0, "chunk alignment must be positive");

        let requested = mib_to_bytes(chunk_size_mib);
        let chunk_size = (requested / alignment).max(1) * alignment;
        if chunk_size != requested {
            warn!(
                "Chunk size {} MiB is not a multiple of {} bytes, using {} bytes",
                chunk_size_mib, alignment, chunk_size
            );
        }

        Self {
            alignment,
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> i64 {
        self.chunk_size
    }

    /// Chunk size for a file of `file_size` bytes. Files shorter than one
    /// alignment unit go up in a single request (0).
    pub fn chunk_size_for(&self, file_size: i64) -> i64 {
        if file_size < self.alignment {
            0
        } else {
            self.chunk_size
        }
    }
}
