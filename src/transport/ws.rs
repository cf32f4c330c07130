//! WebSocket implementation of [`LiveTransport`] using `tokio-tungstenite`.
//!
//! `open` dials the endpoint, sends the JSON setup message, then splits the
//! socket into two tasks:
//!
//! * **reader** — parses each server message into zero or more
//!   [`TransportEvent`]s and forwards them to the session.
//! * **writer** — drains the outbound frame channel, wrapping each
//!   [`MediaBlob`] as a realtime-input message.  When the session drops its
//!   sender the writer sends a close frame and exits.
//!
//! A malformed server message is logged and skipped; only socket-level
//! failures terminate the event stream.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
use super::{Connection, LiveTransport, MediaBlob, SetupConfig, TransportError, TransportEvent};

/// Queue depth for inbound events before the reader applies backpressure.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Queue depth for outbound frames.  At the default frame size this is
/// several seconds of audio; the capture pipeline drops oldest beyond it.
const OUTBOUND_CHANNEL_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// WsTransport
// ---------------------------------------------------------------------------

/// WebSocket client for the live speech service.
pub struct WsTransport {
    endpoint: String,
}

impl WsTransport {
    /// Create a transport that dials `endpoint` (a `wss://…` URL without the
    /// credential query parameter).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Build from application config.
    pub fn from_config(settings: &crate::config::TransportSettings) -> Self {
        Self::new(settings.endpoint.clone())
    }
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn open(
        &self,
        credential: &str,
        setup: SetupConfig,
    ) -> Result<Connection, TransportError> {
        let url = format!("{}?key={}", self.endpoint, credential);

        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        log::info!("transport: connected to {}", self.endpoint);

        let (mut sink, mut source) = stream.split();

        let setup_json = serde_json::to_string(&SetupMessage::new(&setup))?;
        sink.send(Message::Text(setup_json))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<MediaBlob>(OUTBOUND_CHANNEL_CAPACITY);

        // Reader: socket → events.
        tokio::spawn(async move {
            loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        for event in events_from_text(&text) {
                            if event_tx.send(event).await.is_err() {
                                return; // session went away
                            }
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        // The service occasionally delivers JSON as binary.
                        match String::from_utf8(bytes) {
                            Ok(text) => {
                                for event in events_from_text(&text) {
                                    if event_tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Err(_) => log::warn!("transport: dropping non-UTF-8 binary message"),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        let _ = event_tx.send(TransportEvent::Closed { reason }).await;
                        return;
                    }
                    Some(Ok(_)) => {} // ping/pong handled by tungstenite
                    Some(Err(e)) => {
                        let _ = event_tx
                            .send(TransportEvent::Error {
                                detail: e.to_string(),
                            })
                            .await;
                        return;
                    }
                    None => {
                        let _ = event_tx.send(TransportEvent::Closed { reason: None }).await;
                        return;
                    }
                }
            }
        });

        // Writer: frames → socket.
        tokio::spawn(async move {
            while let Some(blob) = outbound_rx.recv().await {
                let message = match serde_json::to_string(&RealtimeInputMessage::new(blob)) {
                    Ok(json) => json,
                    Err(e) => {
                        // Per-frame failure: skip it, keep streaming.
                        log::warn!("transport: failed to encode frame: {e}");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(message)).await {
                    log::warn!("transport: send failed, stopping writer: {e}");
                    return;
                }
            }
            // Session hung up — close politely.
            let _ = sink.send(Message::Close(None)).await;
            log::debug!("transport: writer finished");
        });

        Ok(Connection {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Message dispatch
// ---------------------------------------------------------------------------

/// Translate one server JSON message into transport events.
///
/// A single message may carry several signals at once (audio + turn
/// complete, for example); the returned events preserve a fixed priority
/// order: open ack, interruption, audio, turn completion.  Unparseable text
/// yields no events.
fn events_from_text(text: &str) -> Vec<TransportEvent> {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            log::warn!("transport: skipping unparseable server message: {e}");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    if message.setup_complete.is_some() {
        events.push(TransportEvent::Opened);
    }
    if message.is_interrupted() {
        events.push(TransportEvent::Interrupted);
    }
    if let Some(audio) = message.audio() {
        events.push(TransportEvent::Audio {
            data: audio.data.clone(),
        });
    }
    if message.is_turn_complete() {
        events.push(TransportEvent::TurnComplete);
    }
    events
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_complete_maps_to_opened() {
        let events = events_from_text(r#"{ "setupComplete": {} }"#);
        assert_eq!(events, vec![TransportEvent::Opened]);
    }

    #[test]
    fn inline_audio_maps_to_audio_event() {
        let events = events_from_text(
            r#"{ "serverContent": { "modelTurn": { "parts": [
                { "inlineData": { "data": "QUJD", "mimeType": "audio/pcm;rate=24000" } }
            ] } } }"#,
        );
        assert_eq!(
            events,
            vec![TransportEvent::Audio {
                data: "QUJD".into()
            }]
        );
    }

    #[test]
    fn interruption_precedes_audio_in_the_same_message() {
        let events = events_from_text(
            r#"{ "serverContent": {
                "interrupted": true,
                "modelTurn": { "parts": [
                    { "inlineData": { "data": "QUJD", "mimeType": "audio/pcm;rate=24000" } }
                ] }
            } }"#,
        );
        assert_eq!(events[0], TransportEvent::Interrupted);
        assert!(matches!(events[1], TransportEvent::Audio { .. }));
    }

    #[test]
    fn turn_complete_maps_to_event() {
        let events = events_from_text(r#"{ "serverContent": { "turnComplete": true } }"#);
        assert_eq!(events, vec![TransportEvent::TurnComplete]);
    }

    #[test]
    fn unparseable_text_yields_no_events() {
        assert!(events_from_text("not json at all").is_empty());
    }

    #[test]
    fn empty_server_message_yields_no_events() {
        assert!(events_from_text("{}").is_empty());
    }
}
