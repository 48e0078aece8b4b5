//! Streaming telemetry socket with auto-reconnect.
//!
//! Connects to the Tessie streaming endpoint and forwards every raw frame,
//! in arrival order, through an unbounded [`tokio::sync::mpsc`] channel.
//! Frames are not interpreted here; `tessly-core` owns the envelope
//! decoding. Reconnection uses exponential backoff with jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use tessly_api::streaming::{ReconnectConfig, StreamHandle};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let url = Url::parse("wss://streaming.tessie.com/5YJ3E1EA7KF000000?access_token=...")?;
//!
//! let mut handle = StreamHandle::connect(url, ReconnectConfig::default(), cancel.clone());
//! while let Some(frame) = handle.next_frame().await {
//!     println!("{} bytes", frame.as_bytes().len());
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::redact;
use crate::error::Error;

// ── Frame ────────────────────────────────────────────────────────────

/// One raw message from the streaming socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

// ── StreamHandle ─────────────────────────────────────────────────────

/// Handle to a running telemetry stream.
///
/// Owns the receiving end of the frame channel. Call
/// [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct StreamHandle {
    frame_rx: mpsc::UnboundedReceiver<Frame>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Spawn the reconnection loop for `url`.
    ///
    /// Returns immediately; the first connection attempt happens
    /// asynchronously.
    pub fn connect(url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            stream_loop(url, frame_tx, reconnect, task_cancel).await;
        });

        Self { frame_rx, cancel }
    }

    /// Next frame in arrival order, or `None` once the loop has exited.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.frame_rx.recv().await
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn stream_loop(
    url: Url,
    frame_tx: mpsc::UnboundedSender<Frame>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&url, &frame_tx, &cancel) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    Ok(()) => {
                        if frame_tx.is_closed() {
                            tracing::debug!("Frame receiver dropped, stopping stream");
                            break;
                        }
                        tracing::info!("Telemetry stream disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "Telemetry stream error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "Stream reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "Waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    tracing::debug!("Telemetry stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single connection, forward frames until it drops.
async fn connect_and_read(
    url: &Url,
    frame_tx: &mpsc::UnboundedSender<Frame>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %redact(url), "Connecting to telemetry stream");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("Telemetry stream connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            message = read.next() => {
                let frame = match message {
                    Some(Ok(tungstenite::Message::Text(text))) => Frame::Text(text.as_str().to_owned()),
                    Some(Ok(tungstenite::Message::Binary(data))) => Frame::Binary(data.to_vec()),
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("Telemetry stream ping");
                        continue;
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return match frame {
                            Some(cf) if cf.code != tungstenite::protocol::frame::coding::CloseCode::Normal => {
                                Err(Error::WebSocketClosed {
                                    code: cf.code.into(),
                                    reason: cf.reason.as_str().to_owned(),
                                })
                            }
                            _ => {
                                tracing::info!("Telemetry stream close frame received");
                                Ok(())
                            }
                        };
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("Telemetry stream ended");
                        return Ok(());
                    }
                };

                if frame_tx.send(frame).is_err() {
                    return Ok(());
                }
            }
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let d = calculate_backoff(u32::MAX, &ReconnectConfig::default());
        assert!(d <= Duration::from_secs(75));
    }

    #[test]
    fn frame_bytes() {
        assert_eq!(Frame::Text("{}".into()).as_bytes(), b"{}");
        assert_eq!(Frame::Binary(vec![1, 2]).as_bytes(), &[1, 2]);
    }

    #[tokio::test]
    async fn shutdown_ends_the_stream() {
        let cancel = CancellationToken::new();
        let url = Url::parse("ws://127.0.0.1:9/unreachable").unwrap();
        let mut handle = StreamHandle::connect(url, ReconnectConfig::default(), cancel);
        handle.shutdown();
        assert_eq!(handle.next_frame().await, None);
    }
}
