//! Lookup-table backend: the μ-law transform precomputed over its entire
//! input domain, applied to whole frames at once.
//!
//! The encode direction only has 65536 possible inputs and the decode
//! direction 256, so both fit comfortably in static tables built lazily on
//! first use from the reference transform. After the one-time build, a
//! frame is processed with one table load per sample and no branches.
//!
//! The availability probe builds the tables and spot-checks them against
//! the reference backend; a mismatch reports the backend as unavailable
//! rather than serving wrong bytes.

use once_cell::sync::Lazy;

use super::reference::{linear_to_mulaw, mulaw_to_linear};
use super::{BackendKind, MulawCodec};

/// μ-law byte for every 16-bit sample bit pattern, indexed by `sample as u16`.
static ENCODE_TABLE: Lazy<Box<[u8; 65536]>> = Lazy::new(|| {
    let mut table = Box::new([0u8; 65536]);
    for (bits, entry) in table.iter_mut().enumerate() {
        *entry = linear_to_mulaw(bits as u16 as i16);
    }
    table
});

/// PCM16 sample for every μ-law byte.
static DECODE_TABLE: Lazy<[i16; 256]> = Lazy::new(|| {
    let mut table = [0i16; 256];
    for (code, entry) in table.iter_mut().enumerate() {
        *entry = mulaw_to_linear(code as u8);
    }
    table
});

static TABLES_VERIFIED: Lazy<bool> = Lazy::new(|| {
    // Cross-check a spread of the encode domain and the full decode domain
    // against the scalar formulas.
    let encode_ok = (i16::MIN..=i16::MAX)
        .step_by(251)
        .chain([i16::MIN, -1, 0, 1, i16::MAX])
        .all(|s| ENCODE_TABLE[s as u16 as usize] == linear_to_mulaw(s));
    let decode_ok = (0u8..=255).all(|c| DECODE_TABLE[c as usize] == mulaw_to_linear(c));
    encode_ok && decode_ok
});

/// The table-driven backend.
pub struct VectorizedCodec;

impl VectorizedCodec {
    /// Build the tables (idempotent) and report whether they agree with the
    /// reference transform. Never panics; an inconsistent build is just an
    /// unavailable backend.
    pub fn probe() -> bool {
        *TABLES_VERIFIED
    }
}

impl MulawCodec for VectorizedCodec {
    fn kind(&self) -> BackendKind {
        BackendKind::Vectorized
    }

    fn encode(&self, samples: &[i16]) -> Vec<u8> {
        let table = &**ENCODE_TABLE;
        samples.iter().map(|&s| table[s as u16 as usize]).collect()
    }

    fn decode(&self, data: &[u8]) -> Vec<i16> {
        let table = &*DECODE_TABLE;
        data.iter().map(|&b| table[b as usize]).collect()
    }
}
