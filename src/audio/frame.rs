//! PCM16 frame validation and byte/sample conversion.
//!
//! A raw PCM frame is an ordered little-endian byte buffer, two bytes per
//! sample, so it must have even length; an odd-length frame is a malformed
//! input, never silently truncated. Zero-length frames are valid (zero
//! samples).

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{AppError, AppResult};

/// Bytes per 16-bit PCM sample on the wire.
pub const PCM16_BYTES_PER_SAMPLE: usize = 2;

/// Per-connection framing limits, taken from configuration at session
/// start.
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    /// Largest accepted frame in bytes.
    pub max_frame_bytes: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: 1_048_576,
        }
    }
}

/// Why a frame was rejected. The transport maps each case to its own
/// WebSocket close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameViolation {
    /// Frame exceeds the configured size limit.
    TooLarge { size: usize, max: usize },

    /// Odd byte count on a PCM-direction frame.
    OddLength { size: usize },
}

impl std::fmt::Display for FrameViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameViolation::TooLarge { size, max } => {
                write!(f, "frame too large: {} bytes (max: {})", size, max)
            }
            FrameViolation::OddLength { size } => {
                write!(f, "invalid PCM16 frame: {} bytes (must be even)", size)
            }
        }
    }
}

impl From<FrameViolation> for AppError {
    fn from(violation: FrameViolation) -> Self {
        match violation {
            FrameViolation::TooLarge { .. } => AppError::ProtocolViolation(violation.to_string()),
            FrameViolation::OddLength { .. } => AppError::MalformedInput(violation.to_string()),
        }
    }
}

/// Check the size limit that applies to every inbound frame.
pub fn check_size(data: &[u8], limits: &FrameLimits) -> Result<(), FrameViolation> {
    if data.len() > limits.max_frame_bytes {
        return Err(FrameViolation::TooLarge {
            size: data.len(),
            max: limits.max_frame_bytes,
        });
    }
    Ok(())
}

/// Check PCM16 framing: the byte count must be a whole number of samples.
pub fn check_pcm_alignment(data: &[u8]) -> Result<(), FrameViolation> {
    if data.len() % PCM16_BYTES_PER_SAMPLE != 0 {
        return Err(FrameViolation::OddLength { size: data.len() });
    }
    Ok(())
}

/// Parse a little-endian PCM16 byte frame into samples.
///
/// Odd-length input is a `MalformedInput` error; empty input yields zero
/// samples.
pub fn pcm_bytes_to_samples(data: &[u8]) -> AppResult<Vec<i16>> {
    check_pcm_alignment(data).map_err(AppError::from)?;
    let mut samples = vec![0i16; data.len() / PCM16_BYTES_PER_SAMPLE];
    LittleEndian::read_i16_into(data, &mut samples);
    Ok(samples)
}

/// Serialize samples into a little-endian PCM16 byte frame.
pub fn samples_to_pcm_bytes(samples: &[i16]) -> Vec<u8> {
    let mut data = vec![0u8; samples.len() * PCM16_BYTES_PER_SAMPLE];
    LittleEndian::write_i16_into(samples, &mut data);
    data
}
