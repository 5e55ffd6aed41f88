//! Content Deduplicator: blake3 fingerprints over raw file bytes and the
//! run-scoped set of admitted fingerprints.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::SampleError;

const BLOCK_SIZE: usize = 64 * 1024;

/// Digest of a file's bytes, independent of its name or location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentFingerprint([u8; 32]);

impl ContentFingerprint {
    /// Stream `path` in fixed-size blocks. IO failures map to [`SampleError::Load`].
    pub fn of_file(path: &Path) -> Result<Self, SampleError> {
        let file = fs::File::open(path).map_err(|err| SampleError::load(path, err))?;
        Self::of_reader(file).map_err(|err| SampleError::load(path, err))
    }

    pub fn of_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; BLOCK_SIZE];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(read) => read,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Fingerprints admitted during one run.
///
/// Created empty at the start of a run and passed into the assembler; nothing is
/// persisted across runs. Wrap it in a `Mutex` if files are processed in parallel.
#[derive(Debug, Default)]
pub struct DedupSet {
    admitted: HashMap<ContentFingerprint, PathBuf>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `fingerprint` for `path`, or report the file admitted earlier with it.
    pub fn admit(&mut self, fingerprint: ContentFingerprint, path: &Path) -> Result<(), SampleError> {
        if let Some(original) = self.admitted.get(&fingerprint) {
            return Err(SampleError::DuplicateContent {
                path: path.to_path_buf(),
                original: original.clone(),
            });
        }
        self.admitted.insert(fingerprint, path.to_path_buf());
        Ok(())
    }

    pub fn contains(&self, fingerprint: &ContentFingerprint) -> bool {
        self.admitted.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }
}
