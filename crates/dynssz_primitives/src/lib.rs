// Modified in 2025 from the original version
// Original source licensed under the Apache License 2.0

//! Primitive types shared by the dynamic SSZ codec.

use ruint::Uint;

/// A 256-bit unsigned integer.
///
/// `ruint::Uint<256, 4>`: 256 bits over four 64-bit limbs. SSZ serializes it
/// as 32 little-endian bytes.
pub type U256 = Uint<256, 4>;

/// A 128-bit unsigned integer, serialized as 16 little-endian bytes.
pub type U128 = Uint<128, 2>;

/// A 32-byte hash / Merkle root.
pub type Hash256 = FixedBytes<32>;

/// A fixed-size byte array.
///
/// A thin wrapper around `[u8; N]` with the construction helpers the codec
/// and its tests need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedBytes<const N: usize>(pub [u8; N]);

impl<const N: usize> FixedBytes<N> {
    /// All-zero bytes.
    pub const fn zero() -> Self {
        Self([0u8; N])
    }

    /// Fill every byte with `byte`.
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; N])
    }

    /// Copy from a slice, zero-padding on the right if the slice is short and
    /// truncating if it is long.
    pub fn right_padding_from(slice: &[u8]) -> Self {
        let mut result = [0u8; N];
        let len = slice.len().min(N);
        result[..len].copy_from_slice(&slice[..len]);
        Self(result)
    }

    /// Copy from a slice of exactly `N` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `slice.len() != N`.
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut result = [0u8; N];
        result.copy_from_slice(slice);
        Self(result)
    }

    /// Parse from a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != N {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Self::from_slice(&bytes))
    }

    /// The bytes as a slice.
    pub const fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// The inner array.
    pub const fn into_inner(self) -> [u8; N] {
        self.0
    }
}

impl<const N: usize> Default for FixedBytes<N> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const N: usize> AsRef<[u8]> for FixedBytes<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> From<[u8; N]> for FixedBytes<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> std::fmt::Display for FixedBytes<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Hash256 {
    /// An all-zero hash.
    pub const ZERO: Self = Self::zero();
}

/// Decode a [`U128`] from its 16-byte little-endian SSZ form.
pub fn u128_from_le_slice(bytes: &[u8]) -> Option<U128> {
    if bytes.len() != 16 {
        return None;
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(bytes);
    Some(U128::from_le_bytes(buf))
}

/// Decode a [`U256`] from its 32-byte little-endian SSZ form.
pub fn u256_from_le_slice(bytes: &[u8]) -> Option<U256> {
    if bytes.len() != 32 {
        return None;
    }
    let mut buf = [0u8; 32];
    buf.copy_from_slice(bytes);
    Some(U256::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_bytes_padding() {
        let h = Hash256::right_padding_from(&[1, 2, 3]);
        assert_eq!(&h.as_slice()[..3], &[1, 2, 3]);
        assert!(h.as_slice()[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn fixed_bytes_hex_roundtrip() {
        let h = Hash256::repeat_byte(0xab);
        let parsed = Hash256::from_hex(&h.to_string()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn fixed_bytes_hex_rejects_bad_length() {
        assert!(Hash256::from_hex("0xabcd").is_err());
    }

    #[test]
    fn u256_le_roundtrip() {
        let ascending: Vec<u8> = (0u8..32).collect();
        let v = u256_from_le_slice(&ascending).unwrap();
        assert_eq!(v.to_le_bytes::<32>().as_slice(), ascending.as_slice());
    }

    #[test]
    fn u128_le_roundtrip() {
        let v = U128::from(0xdead_beef_u64);
        let bytes = v.to_le_bytes::<16>();
        assert_eq!(u128_from_le_slice(&bytes).unwrap(), v);
    }

    #[test]
    fn u128_rejects_wrong_length() {
        assert!(u128_from_le_slice(&[0u8; 8]).is_none());
    }
}
