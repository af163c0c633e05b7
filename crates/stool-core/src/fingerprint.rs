use sha2::{Digest, Sha256};
use std::fmt;

pub const FINGERPRINT_BYTES: usize = 32;

/// Fixed-width digest of a rendered row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_BYTES]);

impl Fingerprint {
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut output = String::with_capacity(FINGERPRINT_BYTES * 2);
        for byte in self.0 {
            output.push_str(&format!("{byte:02x}"));
        }
        output
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Maps a rendered representation to a fingerprint. Implementations must be
/// deterministic and sensitive to byte order.
pub trait Fingerprinter {
    fn fingerprint(&self, representation: &str) -> Fingerprint;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Fingerprinter;

impl Fingerprinter for Sha256Fingerprinter {
    fn fingerprint(&self, representation: &str) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(representation.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; FINGERPRINT_BYTES];
        bytes.copy_from_slice(&digest);
        Fingerprint(bytes)
    }
}

/// 64-bit FNV-1a, left-aligned and zero padded. Cheaper than SHA-256 but
/// narrow enough that collisions are conceivable on very large dashboards.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fnv1aFingerprinter;

impl Fingerprinter for Fnv1aFingerprinter {
    fn fingerprint(&self, representation: &str) -> Fingerprint {
        let mut hash: u64 = 1469598103934665603;
        for byte in representation.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        let mut bytes = [0u8; FINGERPRINT_BYTES];
        bytes[..8].copy_from_slice(&hash.to_be_bytes());
        Fingerprint(bytes)
    }
}
