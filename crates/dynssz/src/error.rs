//! Error taxonomy of the codec.
//!
//! Every failure surfaces to the public API as one of these variants; nothing
//! is recovered internally.

use thiserror::Error;

/// Errors produced by descriptor building, encoding, decoding and hashing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SszError {
    /// The host type cannot be represented in SSZ.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Malformed tag syntax or an unresolvable spec expression.
    #[error("tag parse: {0}")]
    TagParse(String),

    /// A decoded primitive is out of range, a bitvector has padding bits set,
    /// or a value does not match the shape its descriptor requires.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Fewer bytes than the declared layout demands.
    #[error("unexpected end of input: needed {needed} more bytes, {available} available")]
    UnexpectedEof {
        /// Bytes the current read requires.
        needed: usize,
        /// Bytes left before the active limit.
        available: usize,
    },

    /// A dynamic offset violates monotonicity or bounds.
    #[error("invalid offset: {0}")]
    Offset(String),

    /// A field or item consumed a different number of bytes than its
    /// descriptor declares.
    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    /// A source value exceeds the declared list or vector capacity.
    #[error("list too big: {len} items exceed the limit of {max}")]
    ListTooBig {
        /// Items (or bits) present.
        len: usize,
        /// The declared capacity.
        max: usize,
    },

    /// The last byte of a bitlist is zero, so the sentinel bit is missing.
    #[error("bitlist not terminated: last byte is zero")]
    BitlistNotTerminated,

    /// A union selector outside the declared variants, or variant data that
    /// is nil.
    #[error("invalid union variant {selector}")]
    InvalidUnionVariant {
        /// The offending selector byte.
        selector: u8,
    },

    /// The top-level unmarshal target is a nil pointer.
    #[error("unmarshal target is nil")]
    NilTarget,

    /// A pointer descriptor met a target that is neither a pointer nor nil.
    #[error("unmarshal target is not a pointer")]
    NotAPointer,

    /// A delegated fast-path or dynamic user method returned an error.
    #[error("user method {method}: {message}")]
    UserMethod {
        /// The vtable slot that failed.
        method: &'static str,
        /// The user-supplied failure message.
        message: String,
    },

    /// The hash accumulator violated an internal invariant.
    #[error("hash state: {0}")]
    HashInternal(#[from] dynssz_hash::HasherError),

    /// An underlying source or sink error in the streaming adapters.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl SszError {
    /// Shorthand for a [`SszError::UserMethod`] from a vtable slot.
    pub(crate) fn user(method: &'static str, err: SszError) -> Self {
        SszError::UserMethod {
            method,
            message: err.to_string(),
        }
    }
}
