//! # Streaming Session
//!
//! Per-connection state for the audio streaming pipeline. A session binds
//! one WebSocket connection to one resolved codec backend and carries the
//! frame-processing state machine:
//!
//! 1. **Connecting**: transport handshake in progress; the backend and
//!    operating mode are resolved exactly once from the connection's
//!    establishment metadata
//! 2. **Active**: one inbound binary frame produces exactly one outbound
//!    frame, in receipt order, with no buffering across frames
//! 3. **Closed**: terminal; no further frames are processed
//!
//! Sessions never share mutable state with each other; the only common
//! ground is the read-only codec registry. Backend re-resolution mid-stream
//! does not exist — switching codecs means a new connection.

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::frame::{self, FrameLimits, FrameViolation};
use crate::codec::{CodecRegistry, ResolvedBackend};
use crate::error::AppError;

/// What the session does with each inbound frame.
///
/// The baseline contract is pass-through echo; the codec is available as a
/// per-connection capability selected at establishment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Echo every frame back verbatim (default).
    Echo,
    /// Treat inbound frames as PCM16 and respond with μ-law bytes.
    Encode,
    /// Treat inbound frames as μ-law and respond with PCM16 bytes.
    Decode,
}

impl SessionMode {
    /// Parse the optional `mode` query parameter. Unknown values fall back
    /// to echo, mirroring the codec selector's silent-fallback policy.
    pub fn from_request(requested: Option<&str>) -> Self {
        match requested.map(str::trim) {
            None | Some("") => SessionMode::Echo,
            Some(name) => match name.to_ascii_lowercase().as_str() {
                "echo" => SessionMode::Echo,
                "encode" => SessionMode::Encode,
                "decode" => SessionMode::Decode,
                other => {
                    warn!(requested = other, "unknown session mode, using echo");
                    SessionMode::Echo
                }
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Echo => "echo",
            SessionMode::Encode => "encode",
            SessionMode::Decode => "decode",
        }
    }

    /// Whether inbound frames are raw PCM and must be sample-aligned.
    fn inbound_is_pcm(&self) -> bool {
        matches!(self, SessionMode::Echo | SessionMode::Encode)
    }
}

/// Lifecycle states of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Closed => "closed",
        }
    }
}

/// Why a frame could not be processed.
#[derive(Debug)]
pub enum SessionError {
    /// The session is not in the Active state.
    NotActive(SessionState),
    /// The frame failed validation.
    Frame(FrameViolation),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotActive(state) => {
                write!(f, "session is {} and cannot process frames", state.as_str())
            }
            SessionError::Frame(violation) => violation.fmt(f),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotActive(state) => {
                AppError::ProtocolViolation(format!("frame received in {} state", state.as_str()))
            }
            SessionError::Frame(violation) => violation.into(),
        }
    }
}

/// One connection's streaming state.
///
/// Owned exclusively by its transport actor; discarded when the connection
/// ends. Frame processing within a session is strictly sequential, which is
/// what preserves response ordering.
pub struct StreamSession {
    id: String,
    state: SessionState,
    mode: SessionMode,
    backend: ResolvedBackend,
    limits: FrameLimits,
    frames_processed: u64,
    bytes_received: u64,
}

impl StreamSession {
    /// Create a session in the Connecting state, resolving the backend
    /// exactly once from the optional request parameter. Resolution cannot
    /// fail; unknown or unavailable backends fall back silently.
    pub fn connect(
        requested_backend: Option<&str>,
        requested_mode: Option<&str>,
        limits: FrameLimits,
    ) -> Self {
        let backend = CodecRegistry::global().resolve(requested_backend);
        let mode = SessionMode::from_request(requested_mode);
        let id = Uuid::new_v4().to_string();
        debug!(
            session_id = %id,
            backend = backend.kind().as_str(),
            mode = mode.as_str(),
            "session created"
        );
        Self {
            id,
            state: SessionState::Connecting,
            mode,
            backend,
            limits,
            frames_processed: 0,
            bytes_received: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn backend(&self) -> &ResolvedBackend {
        &self.backend
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Transport handshake finished; start accepting frames. Only valid
    /// from the Connecting state.
    pub fn activate(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connecting => {
                self.state = SessionState::Active;
                info!(
                    session_id = %self.id,
                    backend = self.backend.kind().as_str(),
                    mode = self.mode.as_str(),
                    "session active"
                );
                Ok(())
            }
            other => Err(SessionError::NotActive(other)),
        }
    }

    /// Process one inbound binary frame and produce its single response
    /// frame. Validation failures leave the session state untouched; the
    /// transport decides whether to close.
    pub fn process_frame(&mut self, data: &[u8]) -> Result<Bytes, SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::NotActive(self.state));
        }

        frame::check_size(data, &self.limits).map_err(SessionError::Frame)?;
        if self.mode.inbound_is_pcm() {
            frame::check_pcm_alignment(data).map_err(SessionError::Frame)?;
        }

        self.frames_processed += 1;
        self.bytes_received += data.len() as u64;
        // Observability side channel, not part of the data contract.
        info!(session_id = %self.id, bytes = data.len(), "received frame");

        let response = match self.mode {
            SessionMode::Echo => Bytes::copy_from_slice(data),
            SessionMode::Encode => {
                // Alignment was checked above.
                let samples = frame::pcm_bytes_to_samples(data)
                    .map_err(|_| SessionError::Frame(FrameViolation::OddLength { size: data.len() }))?;
                Bytes::from(self.backend.encode(&samples))
            }
            SessionMode::Decode => {
                let samples = self.backend.decode(data);
                Bytes::from(frame::samples_to_pcm_bytes(&samples))
            }
        };

        Ok(response)
    }

    /// Enter the terminal state. Idempotent; frames are rejected afterwards.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!(
                session_id = %self.id,
                frames = self.frames_processed,
                bytes = self.bytes_received,
                "session closed"
            );
            self.state = SessionState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::reference::{linear_to_mulaw, mulaw_to_linear};

    fn active_session(backend: Option<&str>, mode: Option<&str>) -> StreamSession {
        let mut session = StreamSession::connect(backend, mode, FrameLimits::default());
        session.activate().unwrap();
        session
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut session = StreamSession::connect(None, None, FrameLimits::default());
        assert_eq!(session.state(), SessionState::Connecting);

        // Frames are rejected before activation.
        assert!(matches!(
            session.process_frame(b"\x01\x02"),
            Err(SessionError::NotActive(SessionState::Connecting))
        ));

        session.activate().unwrap();
        assert_eq!(session.state(), SessionState::Active);
        // Re-activation is a state machine violation.
        assert!(session.activate().is_err());

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            session.process_frame(b"\x01\x02"),
            Err(SessionError::NotActive(SessionState::Closed))
        ));
        // Close is idempotent.
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_echo_returns_identical_bytes() {
        let mut session = active_session(None, None);
        let response = session.process_frame(b"\x01\x02\x03\x04").unwrap();
        assert_eq!(response.as_ref(), b"\x01\x02\x03\x04");
        assert_eq!(session.frames_processed(), 1);
        assert_eq!(session.bytes_received(), 4);
    }

    #[test]
    fn test_echo_zero_length_frame() {
        let mut session = active_session(None, None);
        let response = session.process_frame(b"").unwrap();
        assert!(response.is_empty());
        assert_eq!(session.frames_processed(), 1);
    }

    #[test]
    fn test_echo_preserves_frame_order() {
        let mut session = active_session(None, None);
        let frames: Vec<Vec<u8>> = (0u8..10).map(|n| vec![n, n.wrapping_add(1)]).collect();
        let responses: Vec<Bytes> = frames
            .iter()
            .map(|f| session.process_frame(f).unwrap())
            .collect();
        for (frame, response) in frames.iter().zip(&responses) {
            assert_eq!(response.as_ref(), frame.as_slice());
        }
        assert_eq!(session.frames_processed(), frames.len() as u64);
    }

    #[test]
    fn test_odd_frame_rejected_without_state_damage() {
        let mut session = active_session(None, None);
        assert!(matches!(
            session.process_frame(b"\x01\x02\x03"),
            Err(SessionError::Frame(FrameViolation::OddLength { size: 3 }))
        ));
        // The session is still usable for valid frames.
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.frames_processed(), 0);
        assert!(session.process_frame(b"\x01\x02").is_ok());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut session = StreamSession::connect(None, None, FrameLimits { max_frame_bytes: 8 });
        session.activate().unwrap();
        assert!(matches!(
            session.process_frame(&[0u8; 10]),
            Err(SessionError::Frame(FrameViolation::TooLarge { size: 10, max: 8 }))
        ));
        assert!(session.process_frame(&[0u8; 8]).is_ok());
    }

    #[test]
    fn test_encode_mode_produces_mulaw() {
        let mut session = active_session(Some("reference"), Some("encode"));
        // One PCM16 sample of value 0 (little-endian).
        let response = session.process_frame(b"\x00\x00").unwrap();
        assert_eq!(response.as_ref(), &[linear_to_mulaw(0)]);
    }

    #[test]
    fn test_decode_mode_accepts_odd_lengths() {
        // μ-law inbound is one byte per sample; odd is fine.
        let mut session = active_session(Some("reference"), Some("decode"));
        let response = session.process_frame(&[0xFF, 0x80, 0x00]).unwrap();
        assert_eq!(response.len(), 6);
        let expected = crate::audio::frame::samples_to_pcm_bytes(&[
            mulaw_to_linear(0xFF),
            mulaw_to_linear(0x80),
            mulaw_to_linear(0x00),
        ]);
        assert_eq!(response.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_unknown_mode_falls_back_to_echo() {
        let session = StreamSession::connect(None, Some("transcribe"), FrameLimits::default());
        assert_eq!(session.mode(), SessionMode::Echo);
    }

    #[test]
    fn test_backend_bound_for_session_lifetime() {
        let session = active_session(Some("reference"), None);
        let kind = session.backend().kind();
        assert_eq!(kind.as_str(), "reference");
    }

    #[test]
    fn test_independent_sessions_preserve_per_session_order() {
        // Interleave frames across two sessions; each must respond in its
        // own arrival order regardless of the other's activity.
        let mut a = active_session(None, None);
        let mut b = active_session(None, None);
        let mut a_out = Vec::new();
        let mut b_out = Vec::new();
        for n in 0u8..8 {
            a_out.push(a.process_frame(&[n, 0xA0]).unwrap());
            b_out.push(b.process_frame(&[n, 0xB0]).unwrap());
        }
        for (n, (ra, rb)) in a_out.iter().zip(&b_out).enumerate() {
            assert_eq!(ra.as_ref(), &[n as u8, 0xA0]);
            assert_eq!(rb.as_ref(), &[n as u8, 0xB0]);
        }
    }
}
