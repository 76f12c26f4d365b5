//! Scalar reference implementation of the G.711 μ-law transform.
//!
//! This is the canonical definition of the codec: every other backend must
//! produce byte-identical output. It has no external dependencies and is
//! therefore always available, which makes it the universal fallback for
//! backend selection.

use super::{BackendKind, MulawCodec};

/// Standard G.711 bias added to the magnitude before segment lookup.
pub(crate) const BIAS: i32 = 0x84;

/// Maximum magnitude before biasing; larger inputs are clamped, not rejected.
pub(crate) const CLIP: i32 = 32635;

/// Convert a single 16-bit signed PCM sample to an 8-bit μ-law byte.
///
/// Follows the standard companding steps: sign extraction, clip, bias,
/// segment (exponent) from the most significant set bit, 4-bit mantissa,
/// then bit inversion per the μ-law convention (all-ones is near-zero).
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let sign: u8 = if sample < 0 { 0x80 } else { 0 };
    let magnitude = (sample.unsigned_abs() as i32).min(CLIP) + BIAS;

    // magnitude is in [132, 32767], so the top set bit is in [7, 14] and
    // the segment lands in [0, 7].
    let exponent = (31 - (magnitude as u32).leading_zeros()) - 7;
    let mantissa = (magnitude >> (exponent + 3)) & 0x0F;

    !(sign | ((exponent as u8) << 4) | mantissa as u8)
}

/// Convert a single 8-bit μ-law byte back to a 16-bit signed PCM sample.
///
/// Decoding is lossy: all samples within one quantization step map to the
/// same byte. Zero is the exception — `mulaw_to_linear(linear_to_mulaw(0))`
/// is exactly zero.
pub fn mulaw_to_linear(code: u8) -> i16 {
    let code = !code;
    let sign = code & 0x80;
    let exponent = (code >> 4) & 0x07;
    let mantissa = (code & 0x0F) as i32;

    // Reinsert the implicit leading bit and the bias, shift back out to the
    // segment's magnitude range, then remove the bias.
    let mut sample = (((mantissa << 3) | 0x84) << exponent) - BIAS;
    if sign != 0 {
        sample = -sample;
    }

    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// The scalar backend: one sample at a time, straight from the formulas.
pub struct ReferenceCodec;

impl ReferenceCodec {
    /// The reference transform has no environment dependency.
    pub fn probe() -> bool {
        true
    }
}

impl MulawCodec for ReferenceCodec {
    fn kind(&self) -> BackendKind {
        BackendKind::Reference
    }

    fn encode(&self, samples: &[i16]) -> Vec<u8> {
        samples.iter().map(|&s| linear_to_mulaw(s)).collect()
    }

    fn decode(&self, data: &[u8]) -> Vec<i16> {
        data.iter().map(|&b| mulaw_to_linear(b)).collect()
    }
}
