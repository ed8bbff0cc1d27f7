use std::fmt::{Debug, Formatter};

use sha2::{Digest, Sha256};

/// The maximum number of bytes stored in a fingerprint as is.
pub const INLINE_FINGERPRINT_SIZE: usize = 16;

/// The deduplication key of an interned value.
///
/// Encodings that fit into [INLINE_FINGERPRINT_SIZE] bytes are kept verbatim. Longer encodings
/// are replaced by the first 128 bits of their SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Inline { len: u8, bytes: [u8; INLINE_FINGERPRINT_SIZE] },
    Digest([u8; 16]),
}

impl Fingerprint {
    /// Computes a fingerprint of the given encoding.
    pub fn new(encoded: &[u8]) -> Self {
        if encoded.len() <= INLINE_FINGERPRINT_SIZE {
            let mut bytes = [0u8; INLINE_FINGERPRINT_SIZE];
            bytes[..encoded.len()].copy_from_slice(encoded);
            Fingerprint::Inline {
                len: encoded.len() as u8,
                bytes,
            }
        } else {
            let digest = Sha256::digest(encoded);
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&digest[..16]);
            Fingerprint::Digest(bytes)
        }
    }

    /// Returns `true` if this fingerprint stores the encoding as is.
    pub fn is_inline(&self) -> bool {
        matches!(self, Fingerprint::Inline { .. })
    }
}

impl Debug for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (kind, bytes) = match self {
            Fingerprint::Inline { len, bytes } => ("Inline", &bytes[..*len as usize]),
            Fingerprint::Digest(bytes) => ("Digest", &bytes[..]),
        };
        write!(f, "{}(", kind)?;
        for b in bytes {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}
