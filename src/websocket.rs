//! # WebSocket Audio Streaming Handler
//!
//! Real-time audio frame streaming at `/ws/audio`. Clients send binary
//! frames and receive exactly one response frame per inbound frame, in
//! order; the default response is a verbatim echo.
//!
//! ## Protocol:
//! - **Connection**: optional query parameters select the session —
//!   `codec` (backend name, silently falls back when unknown/unavailable)
//!   and `mode` (`echo` default, `encode`, `decode`)
//! - **Frames**: binary only; a text frame is a protocol violation and the
//!   connection is closed without processing it
//! - **Close codes**: 1009 for oversized frames, 1003 for malformed
//!   (odd-length PCM) frames and non-binary data
//!
//! Each connection is one independent actor; sessions share nothing
//! mutable, so any number of them can stream concurrently.

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::audio::frame::{FrameLimits, FrameViolation};
use crate::audio::session::{SessionError, StreamSession};
use crate::state::AppState;

/// The WebSocket close code a frame violation maps to.
fn violation_close_code(violation: &FrameViolation) -> ws::CloseCode {
    match violation {
        FrameViolation::TooLarge { .. } => ws::CloseCode::Size,
        FrameViolation::OddLength { .. } => ws::CloseCode::Unsupported,
    }
}

/// Actor driving one streaming connection.
pub struct AudioStreamSocket {
    /// Per-connection session state; owns the resolved backend.
    session: StreamSession,

    /// Shared metrics handle.
    state: web::Data<AppState>,

    /// How often to ping the client.
    heartbeat_interval: Duration,

    /// Silence threshold after which the connection is dropped.
    idle_timeout: Duration,

    /// Last time the client gave any sign of life.
    last_heartbeat: Instant,
}

impl AudioStreamSocket {
    fn new(session: StreamSession, state: web::Data<AppState>, config: &crate::config::WebSocketConfig) -> Self {
        Self {
            session,
            state,
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            last_heartbeat: Instant::now(),
        }
    }

    fn close_with(
        &mut self,
        ctx: &mut ws::WebsocketContext<Self>,
        code: ws::CloseCode,
        description: String,
    ) {
        ctx.close(Some(ws::CloseReason {
            code,
            description: Some(description),
        }));
        ctx.stop();
    }

    /// One inbound frame, one outbound frame. A rejected frame closes this
    /// connection and only this connection.
    fn handle_frame(&mut self, data: &[u8], ctx: &mut ws::WebsocketContext<Self>) {
        match self.session.process_frame(data) {
            Ok(response) => {
                self.state.record_frame(data.len());
                ctx.binary(response);
            }
            Err(SessionError::Frame(violation)) => {
                warn!(
                    session_id = %self.session.id(),
                    %violation,
                    "rejecting frame"
                );
                self.close_with(ctx, violation_close_code(&violation), violation.to_string());
            }
            Err(err @ SessionError::NotActive(_)) => {
                error!(session_id = %self.session.id(), %err, "frame outside active state");
                self.close_with(ctx, ws::CloseCode::Error, err.to_string());
            }
        }
    }
}

impl Actor for AudioStreamSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if let Err(err) = self.session.activate() {
            error!(session_id = %self.session.id(), %err, "failed to activate session");
            ctx.stop();
            return;
        }
        self.state.increment_active_sessions();

        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.idle_timeout {
                warn!(
                    session_id = %act.session.id(),
                    "client idle past timeout, closing connection"
                );
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::Away,
                    description: Some("idle timeout".to_string()),
                }));
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Stop is the single cleanup point: it runs on client disconnect,
        // protocol errors, and our own close paths alike.
        self.session.close();
        self.state.decrement_active_sessions();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for AudioStreamSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Binary(data)) => {
                self.handle_frame(&data, ctx);
            }
            Ok(ws::Message::Text(_)) => {
                // Binary-frame contract: text is not interpreted, the
                // connection is closed without processing.
                warn!(
                    session_id = %self.session.id(),
                    "text frame on binary-only endpoint"
                );
                self.close_with(
                    ctx,
                    ws::CloseCode::Unsupported,
                    "binary frames only".to_string(),
                );
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(session_id = %self.session.id(), ?reason, "client closed connection");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(
                    session_id = %self.session.id(),
                    "fragmented frames are not supported"
                );
                self.close_with(
                    ctx,
                    ws::CloseCode::Unsupported,
                    "fragmented frames are not supported".to_string(),
                );
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(session_id = %self.session.id(), %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// HTTP → WebSocket upgrade for `/ws/audio`.
///
/// The backend and mode are resolved here, once, from the connection's
/// establishment metadata; the session keeps them for its whole lifetime.
pub async fn audio_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let query =
        web::Query::<HashMap<String, String>>::from_query(req.query_string())
            .unwrap_or_else(|_| web::Query(HashMap::new()));

    let config = app_state.get_config();
    let requested_backend = query
        .get("codec")
        .map(String::as_str)
        .or_else(|| config.default_backend());
    let requested_mode = query.get("mode").map(String::as_str);
    let limits = FrameLimits {
        max_frame_bytes: config.websocket.max_frame_bytes,
    };

    let session = StreamSession::connect(requested_backend, requested_mode, limits);
    info!(
        session_id = %session.id(),
        peer = ?req.connection_info().peer_addr(),
        backend = session.backend().kind().as_str(),
        mode = session.mode().as_str(),
        "new WebSocket connection"
    );

    let socket = AudioStreamSocket::new(session, app_state.clone(), &config.websocket);

    // The transport cap sits above the application limit so an oversized
    // frame still reaches the session and gets a proper 1009 close instead
    // of an abrupt protocol error.
    ws::WsResponseBuilder::new(socket, &req, stream)
        .frame_size(config.websocket.max_frame_bytes.saturating_mul(2))
        .start()
}
