//! Hash utilities for request fingerprints.
//!
//! FNV-1a is fast and deterministic across runs, which `std`'s `DefaultHasher`
//! does not promise. Not suitable for adversarial input.

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Compute FNV-1a 64-bit hash of text content.
///
/// # Example
///
/// ```
/// use tsugi::text::fnv1a_hash;
///
/// assert_eq!(fnv1a_hash("hello world"), fnv1a_hash("hello world"));
/// assert_ne!(fnv1a_hash("hello world"), fnv1a_hash("different"));
/// ```
#[inline]
pub fn fnv1a_hash(text: &str) -> u64 {
    let mut hasher = Fnv1a::new();
    hasher.write_bytes(text.as_bytes());
    hasher.finish()
}

/// Incremental FNV-1a hasher for checksums over several fields.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a {
    state: u64,
}

impl Fnv1a {
    pub fn new() -> Self {
        Self { state: FNV_OFFSET }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state ^= *byte as u64;
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    /// Hash a string followed by a separator so that field boundaries matter.
    pub fn write_str(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
        self.write_bytes(&[0xff]);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn finish(&self) -> u64 {
        self.state
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}
