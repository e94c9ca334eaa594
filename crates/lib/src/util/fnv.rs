//! FNV-1a 64-bit hashing.
//!
//! Used to derive collision-free directory names for scratch clones of
//! manifest repositories: the project key is hashed and appended to the
//! import name.

const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash `data` with FNV-1a 64.
pub fn fnv1a64(data: &[u8]) -> u64 {
  data
    .iter()
    .fold(OFFSET_BASIS, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_vectors() {
    // Reference values from the FNV specification.
    assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
    assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
    assert_eq!(fnv1a64(b"foobar"), 0x85944171f73967e8);
  }

  #[test]
  fn distinguishes_keys() {
    assert_ne!(fnv1a64(b"manifest=https://a"), fnv1a64(b"manifest=https://b"));
  }
}
