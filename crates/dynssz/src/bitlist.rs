//! Bitlist framing.
//!
//! A bitlist's wire form carries a single sentinel bit after the data bits;
//! the sentinel always lives in the last byte, so a trailing zero byte is
//! malformed.

use crate::error::SszError;

/// Split bitlist bytes into data bytes and logical bit length.
///
/// Locates the most-significant set bit of the last byte (the sentinel),
/// clears it, and truncates to the bytes the data bits occupy.
pub(crate) fn parse_bitlist(bytes: &[u8]) -> Result<(Vec<u8>, u64), SszError> {
    let last = *bytes.last().ok_or(SszError::BitlistNotTerminated)?;
    if last == 0 {
        return Err(SszError::BitlistNotTerminated);
    }
    let msb = 7 - last.leading_zeros() as u64;
    let bit_len = 8 * (bytes.len() as u64 - 1) + msb;

    let mut data = bytes.to_vec();
    *data.last_mut().expect("bytes are non-empty") = last & !(1 << msb);
    data.truncate(bit_len.div_ceil(8) as usize);
    Ok((data, bit_len))
}

/// The number of data bits in `bytes` without copying, for capacity checks.
pub(crate) fn bitlist_len(bytes: &[u8]) -> Result<u64, SszError> {
    let last = *bytes.last().ok_or(SszError::BitlistNotTerminated)?;
    if last == 0 {
        return Err(SszError::BitlistNotTerminated);
    }
    let msb = 7 - last.leading_zeros() as u64;
    Ok(8 * (bytes.len() as u64 - 1) + msb)
}
