//! # G.711 μ-law Codec
//!
//! Converts between 16-bit linear PCM samples and 8-bit μ-law bytes.
//! Three interchangeable backends implement the same transform:
//!
//! - **reference**: scalar per-sample math, always available, defines correctness
//! - **vectorized**: precomputed lookup tables applied over whole frames
//! - **accelerated**: AVX2 bulk math where the CPU supports it
//!
//! Backend choice is a performance decision only — every backend produces
//! byte-identical output for every valid input. Selection goes through the
//! [`registry::CodecRegistry`], which probes availability once per process
//! and falls back to the reference backend when a request cannot be honored.

pub mod accelerated;
pub mod reference;
pub mod registry;
pub mod vectorized;

pub use registry::{BackendDescriptor, BackendKind, CodecRegistry, ResolvedBackend};

use crate::error::{AppError, AppResult};

/// The capability every codec backend implements.
///
/// Implementations must be numerically bit-identical to
/// [`reference::ReferenceCodec`] for all inputs; the trait exists so the
/// registry can hand out backends without runtime type inspection.
pub trait MulawCodec: Send + Sync {
    /// Which backend variant this is.
    fn kind(&self) -> BackendKind;

    /// Compress PCM16 samples to μ-law bytes, one byte per sample.
    fn encode(&self, samples: &[i16]) -> Vec<u8>;

    /// Expand μ-law bytes to PCM16 samples, one sample per byte.
    fn decode(&self, data: &[u8]) -> Vec<i16>;
}

/// Encode PCM16 samples to μ-law using the requested backend, or the best
/// available one when `backend` is `None`, unknown, or unavailable.
///
/// An empty slice encodes to an empty byte vector.
pub fn encode(samples: &[i16], backend: Option<&str>) -> Vec<u8> {
    CodecRegistry::global().resolve(backend).encode(samples)
}

/// Decode μ-law bytes to PCM16 samples using the requested backend, or the
/// best available one when `backend` is `None`, unknown, or unavailable.
///
/// Empty input is valid and decodes to zero samples.
pub fn decode(data: &[u8], backend: Option<&str>) -> Vec<i16> {
    CodecRegistry::global().resolve(backend).decode(data)
}

/// Narrow a wide integer (as it arrives from JSON) to a PCM16 sample.
///
/// The slice-based codec API takes `i16` and cannot receive out-of-range
/// values; this is the validation point for callers that accept samples as
/// arbitrary integers and want rejection instead of clamping.
pub fn checked_sample(value: i64) -> AppResult<i16> {
    i16::try_from(value).map_err(|_| AppError::InvalidSample(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty_input() {
        assert!(encode(&[], None).is_empty());
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode(b"", None).is_empty());
    }

    #[test]
    fn test_silence_round_trips_exactly() {
        let encoded = encode(&[0, 0, 0], None);
        assert_eq!(decode(&encoded, None), vec![0, 0, 0]);
    }

    #[test]
    fn test_full_scale_round_trip_within_tolerance() {
        let encoded = encode(&[32767], None);
        let decoded = decode(&encoded, None);
        assert_eq!(decoded.len(), 1);
        assert!((32767 - decoded[0] as i32).abs() <= 655);

        let encoded = encode(&[-32768], None);
        let decoded = decode(&encoded, None);
        assert!((-32768 - decoded[0] as i32).abs() <= 655);
    }

    #[test]
    fn test_explicit_backend_matches_default() {
        let samples: Vec<i16> = (-2048..2048).map(|v| (v * 16) as i16).collect();
        let default = encode(&samples, None);
        for name in ["reference", "vectorized", "accelerated"] {
            assert_eq!(encode(&samples, Some(name)), default, "backend {name}");
        }
    }

    #[test]
    fn test_unknown_backend_still_encodes() {
        let samples = [0i16, 1000, -1000];
        assert_eq!(
            encode(&samples, Some("no-such-codec")),
            encode(&samples, None)
        );
    }

    #[test]
    fn test_checked_sample_range() {
        assert_eq!(checked_sample(0).unwrap(), 0);
        assert_eq!(checked_sample(32767).unwrap(), 32767);
        assert_eq!(checked_sample(-32768).unwrap(), -32768);
        assert!(matches!(
            checked_sample(32768),
            Err(AppError::InvalidSample(32768))
        ));
        assert!(matches!(
            checked_sample(-32769),
            Err(AppError::InvalidSample(-32769))
        ));
    }
}
