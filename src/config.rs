//! Codec configuration.
//!
//! Small `Copy` option structs with `const fn` constructors for the
//! codec's named presets, the way an encoder/decoder configuration pair
//! usually looks when it needs to pick between encoding rule variants.
//! Unlike a codec that has to choose between BER/CER/DER, this crate
//! only ever emits and accepts DER, so the one real knob is whether to
//! tolerate the non-DER indefinite-length form on decode.

/// Options for [`crate::encode`]. Reserved for forward-compatible knobs;
/// DER encoding has no configurable behaviour today.
#[derive(Clone, Copy, Debug, Default)]
pub struct EncodeOptions {
    _reserved: (),
}

impl EncodeOptions {
    #[must_use]
    pub const fn der() -> Self {
        Self { _reserved: () }
    }
}

/// Options for [`crate::decode`] and [`crate::locate`].
#[derive(Clone, Copy, Debug)]
pub struct DecodeOptions {
    pub(crate) allow_indefinite_length: bool,
    /// Limits traversal depth to guard against a schema tree with a
    /// circular `down`/`right` chain, the same role a decoder's
    /// remaining-depth guard plays against runaway recursion.
    pub(crate) max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::der()
    }
}

impl DecodeOptions {
    /// Strict DER: rejects indefinite length, the only mode this codec's
    /// operations require.
    #[must_use]
    pub const fn der() -> Self {
        Self {
            allow_indefinite_length: false,
            max_depth: 128,
        }
    }

    /// Opts into tolerating the indefinite-length form (`0x80`) on decode,
    /// treating it as a zero-length element. Not DER-conformant; provided
    /// for interop with lenient encoders only.
    #[must_use]
    pub const fn allow_indefinite_length(mut self, allow: bool) -> Self {
        self.allow_indefinite_length = allow;
        self
    }

    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}
