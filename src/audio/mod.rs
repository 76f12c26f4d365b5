//! # Audio Streaming Module
//!
//! Frame model and per-connection session state for the real-time audio
//! pipeline.
//!
//! ## Key Components:
//! - **Frame**: PCM16 framing rules (even length, size limit) and
//!   byte/sample conversion
//! - **Session**: the Connecting → Active → Closed state machine that binds
//!   one connection to one resolved codec backend
//!
//! ## Frame Format:
//! - **Raw PCM**: 16-bit signed little-endian samples, 2 bytes per sample
//! - **μ-law**: 1 byte per sample
//!
//! The WebSocket transport itself lives in `src/websocket.rs`.

pub mod frame;
pub mod session;
