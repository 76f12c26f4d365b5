//! AVX2 backend: the μ-law transform as 8-lane bulk math.
//!
//! Availability is a runtime CPU capability, probed once through
//! `is_x86_feature_detected!` — the Rust analogue of asking the platform
//! for a native routine. On non-x86_64 targets, or on CPUs without AVX2,
//! the probe reports `false` and the registry never hands this backend out;
//! absence is a normal state, not an error.
//!
//! Frames are processed 8 samples per iteration with a scalar tail, using
//! the same constants and field layout as the reference transform so the
//! output is byte-identical.

use super::reference::{linear_to_mulaw, mulaw_to_linear};
use super::{BackendKind, MulawCodec};

/// The SIMD backend.
pub struct AcceleratedCodec;

impl AcceleratedCodec {
    /// Runtime capability check, cached by the standard library.
    pub fn probe() -> bool {
        #[cfg(target_arch = "x86_64")]
        {
            std::arch::is_x86_feature_detected!("avx2")
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            false
        }
    }
}

impl MulawCodec for AcceleratedCodec {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerated
    }

    fn encode(&self, samples: &[i16]) -> Vec<u8> {
        #[cfg(target_arch = "x86_64")]
        if Self::probe() {
            // Safety: AVX2 support verified by the probe.
            return unsafe { avx2::encode(samples) };
        }
        samples.iter().map(|&s| linear_to_mulaw(s)).collect()
    }

    fn decode(&self, data: &[u8]) -> Vec<i16> {
        #[cfg(target_arch = "x86_64")]
        if Self::probe() {
            // Safety: AVX2 support verified by the probe.
            return unsafe { avx2::decode(data) };
        }
        data.iter().map(|&b| mulaw_to_linear(b)).collect()
    }
}

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use std::arch::x86_64::*;

    use crate::codec::reference::{linear_to_mulaw, mulaw_to_linear, BIAS, CLIP};

    const LANES: usize = 8;

    /// # Safety
    /// Caller must have verified AVX2 support.
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn encode(samples: &[i16]) -> Vec<u8> {
        let mut out = Vec::with_capacity(samples.len());
        let bulk = samples.len() - samples.len() % LANES;

        let bias = _mm256_set1_epi32(BIAS);
        let clip = _mm256_set1_epi32(CLIP);
        let low_nibble = _mm256_set1_epi32(0x0F);
        let low_byte = _mm256_set1_epi32(0xFF);
        let sign_bit = _mm256_set1_epi32(0x80);
        let three = _mm256_set1_epi32(3);

        let mut i = 0;
        while i < bulk {
            // Widen 8 samples to i32 lanes so every intermediate fits.
            let raw = _mm_loadu_si128(samples.as_ptr().add(i) as *const __m128i);
            let x = _mm256_cvtepi16_epi32(raw);

            let neg = _mm256_srai_epi32::<31>(x);
            let magnitude = _mm256_min_epi32(_mm256_abs_epi32(x), clip);
            let biased = _mm256_add_epi32(magnitude, bias);

            // Segment = how many of the thresholds 0x100..0x4000 the biased
            // magnitude reaches; each satisfied compare contributes one.
            let mut exponent = _mm256_setzero_si256();
            let mut threshold: i32 = 0x100;
            while threshold <= 0x4000 {
                let reached = _mm256_cmpgt_epi32(biased, _mm256_set1_epi32(threshold - 1));
                exponent = _mm256_sub_epi32(exponent, reached);
                threshold <<= 1;
            }

            let shift = _mm256_add_epi32(exponent, three);
            let mantissa = _mm256_and_si256(_mm256_srlv_epi32(biased, shift), low_nibble);
            let sign = _mm256_and_si256(neg, sign_bit);
            let word = _mm256_or_si256(
                sign,
                _mm256_or_si256(_mm256_slli_epi32::<4>(exponent), mantissa),
            );
            let code = _mm256_xor_si256(word, low_byte);

            let mut lanes = [0i32; LANES];
            _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, code);
            out.extend(lanes.iter().map(|&lane| lane as u8));
            i += LANES;
        }

        for &sample in &samples[bulk..] {
            out.push(linear_to_mulaw(sample));
        }
        out
    }

    /// # Safety
    /// Caller must have verified AVX2 support.
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn decode(data: &[u8]) -> Vec<i16> {
        let mut out = Vec::with_capacity(data.len());
        let bulk = data.len() - data.len() % LANES;

        let bias = _mm256_set1_epi32(BIAS);
        let low_byte = _mm256_set1_epi32(0xFF);
        let low_nibble = _mm256_set1_epi32(0x0F);
        let sign_bit = _mm256_set1_epi32(0x80);
        let seg_mask = _mm256_set1_epi32(0x07);
        let implicit = _mm256_set1_epi32(0x84);
        let zero = _mm256_setzero_si256();

        let mut i = 0;
        while i < bulk {
            let raw = _mm_loadl_epi64(data.as_ptr().add(i) as *const __m128i);
            // Widen to i32 lanes, then undo the μ-law bit inversion within
            // the low byte.
            let code = _mm256_xor_si256(_mm256_cvtepu8_epi32(raw), low_byte);

            let sign = _mm256_and_si256(code, sign_bit);
            let exponent = _mm256_and_si256(_mm256_srli_epi32::<4>(code), seg_mask);
            let mantissa = _mm256_and_si256(code, low_nibble);

            let base = _mm256_or_si256(_mm256_slli_epi32::<3>(mantissa), implicit);
            let magnitude = _mm256_sub_epi32(_mm256_sllv_epi32(base, exponent), bias);

            let negated = _mm256_sub_epi32(zero, magnitude);
            let is_negative = _mm256_cmpgt_epi32(sign, zero);
            let sample = _mm256_blendv_epi8(magnitude, negated, is_negative);

            let mut lanes = [0i32; LANES];
            _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, sample);
            out.extend(lanes.iter().map(|&lane| lane as i16));
            i += LANES;
        }

        for &code in &data[bulk..] {
            out.push(mulaw_to_linear(code));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::reference::ReferenceCodec;
    use super::*;

    #[test]
    fn test_probe_never_panics() {
        let _ = AcceleratedCodec::probe();
    }

    #[test]
    fn test_encode_identical_to_reference_over_full_domain() {
        // Exercises the SIMD path where available and the scalar path
        // everywhere else; output must be the same either way.
        let samples: Vec<i16> = (i16::MIN..=i16::MAX).collect();
        assert_eq!(
            AcceleratedCodec.encode(&samples),
            ReferenceCodec.encode(&samples)
        );
    }

    #[test]
    fn test_decode_identical_to_reference_over_full_domain() {
        let data: Vec<u8> = (0u8..=255).collect();
        assert_eq!(
            AcceleratedCodec.decode(&data),
            ReferenceCodec.decode(&data)
        );
    }

    #[test]
    fn test_tail_lengths() {
        // Frame lengths that are not a multiple of the lane width take the
        // scalar tail; verify every cut point around one vector.
        for len in 0..=17usize {
            let samples: Vec<i16> = (0..len).map(|n| (n as i16) * 711 - 4096).collect();
            assert_eq!(
                AcceleratedCodec.encode(&samples),
                ReferenceCodec.encode(&samples),
                "encode len {len}"
            );
            let data: Vec<u8> = (0..len).map(|n| (n * 29) as u8).collect();
            assert_eq!(
                AcceleratedCodec.decode(&data),
                ReferenceCodec.decode(&data),
                "decode len {len}"
            );
        }
    }
}
