//! # Content Fingerprints
//!
//! Defines [`Fingerprint`], the SHA-256 identity of a stored upload, and the
//! streaming path that computes it.
//!
//! ## Streaming Invariant
//!
//! [`fingerprint_reader()`] consumes its source in fixed [`CHUNK_SIZE`]
//! reads and feeds each chunk into a [`Sha256Accumulator`]. The whole byte
//! stream is never resident in memory, so hashing a multi-gigabyte upload
//! costs the same memory as hashing a subtitle file.
//!
//! ## Trust Assumption
//!
//! Two uploads with equal fingerprints are treated as identical content.
//! There is no secondary byte-for-byte comparison.

use std::io::{ErrorKind, Read};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// Read size used when hashing upload streams (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A SHA-256 content fingerprint.
///
/// Serializes as 64 lowercase hex characters, the same form used for the
/// `hash` column and as the stem of the storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wrap a raw 32-byte SHA-256 digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a fingerprint from its hex form.
    ///
    /// Accepts upper or lower case; surrounding whitespace is trimmed.
    pub fn from_hex(hex: &str) -> Result<Self, ValidationError> {
        let hex = hex.trim();
        if hex.len() != 64 {
            return Err(ValidationError::InvalidFingerprint(format!(
                "expected 64 hex chars, got {}",
                hex.len()
            )));
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidFingerprint(
                "contains non-hex characters".into(),
            ));
        }
        let mut bytes = [0u8; 32];
        for (i, slot) in bytes.iter_mut().enumerate() {
            let pair = &hex[i * 2..i * 2 + 2];
            *slot = u8::from_str_radix(pair, 16).map_err(|e| {
                ValidationError::InvalidFingerprint(format!("offset {}: {e}", i * 2))
            })?;
        }
        Ok(Self(bytes))
    }

    /// Access the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the fingerprint as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.to_hex()
    }
}

/// Incremental SHA-256 hasher that tracks how many bytes it has seen.
#[derive(Clone, Default)]
pub struct Sha256Accumulator {
    hasher: Sha256,
    len: u64,
}

impl std::fmt::Debug for Sha256Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha256Accumulator")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl Sha256Accumulator {
    /// Start an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of content.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether no bytes have been fed yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Consume the accumulator and produce the fingerprint.
    pub fn finalize(self) -> Fingerprint {
        let hash = self.hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Fingerprint(bytes)
    }
}

/// Fingerprint an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> Fingerprint {
    let mut acc = Sha256Accumulator::new();
    acc.update(data);
    acc.finalize()
}

/// Fingerprint a byte stream, reading it to completion in [`CHUNK_SIZE`] chunks.
///
/// Returns the fingerprint together with the number of bytes consumed.
/// `Interrupted` reads are retried; every other I/O error aborts hashing.
pub fn fingerprint_reader<R: Read>(reader: R) -> std::io::Result<(Fingerprint, u64)> {
    fingerprint_reader_chunked(reader, CHUNK_SIZE)
}

/// Same as [`fingerprint_reader()`] with an explicit chunk size.
pub fn fingerprint_reader_chunked<R: Read>(
    mut reader: R,
    chunk_size: usize,
) -> std::io::Result<(Fingerprint, u64)> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut acc = Sha256Accumulator::new();
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => acc.update(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    let len = acc.len();
    Ok((acc.finalize(), len))
}
