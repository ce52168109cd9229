//! The persistent duplex link to the edge daemon.
//!
//! [`LinkManager`] owns the reconnect loop: connect, hand the socket to a
//! [`Link`], and when the link dies wait out the backoff and try again,
//! forever, until asked to stop. A `Link` runs a reader and a writer
//! concurrently and exits when either side fails.
//!
//! The reader never touches game state. It translates frames into
//! [`LinkEvent`]s and pushes them over a channel that the tick thread drains
//! at the top of every heartbeat.

use crate::error::CoreError;
use crate::protocol::{ClientMessage, ProtocolCapabilities};
use async_std::channel::{Receiver, Sender};
use async_std::task;
use async_tungstenite::async_std::{connect_async, ConnectStream};
use async_tungstenite::tungstenite::Message;
use async_tungstenite::WebSocketStream;
use futures_util::future::{self, Either};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use slog::{debug, error, info, warn, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// What the link reader learned from the edge, in arrival order.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A client connected (or was already connected when the link came up).
    ClientAttached {
        id: i64,
        capabilities: ProtocolCapabilities,
    },
    ClientCapabilities {
        id: i64,
        capabilities: ProtocolCapabilities,
    },
    ClientData {
        id: i64,
        messages: Vec<ClientMessage>,
    },
    ClientGone { id: i64 },
}

pub struct LinkManager {
    url: String,
    events: Sender<LinkEvent>,
    outbound: Receiver<Value>,
    stop: Arc<AtomicBool>,
    logger: Logger,
}

impl LinkManager {
    pub fn new(
        url: String,
        events: Sender<LinkEvent>,
        outbound: Receiver<Value>,
        stop: Arc<AtomicBool>,
        logger: Logger,
    ) -> Self {
        LinkManager {
            url,
            events,
            outbound,
            stop,
            logger,
        }
    }

    /// Connect-run-reconnect until the stop flag is raised.
    pub async fn run(self) {
        while !self.stop.load(Ordering::SeqCst) {
            info!(self.logger, "connecting to edge"; "url" => %self.url);
            match connect_async(self.url.as_str()).await {
                Ok((socket, _response)) => {
                    info!(self.logger, "link established");
                    let link = Link {
                        events: self.events.clone(),
                        outbound: self.outbound.clone(),
                        logger: self.logger.clone(),
                    };
                    if let Err(err) = link.run(socket).await {
                        error!(self.logger, "link failed: {}", err);
                    } else {
                        info!(self.logger, "link closed");
                    }
                }
                Err(err) => {
                    error!(self.logger, "could not reach edge: {}", err);
                }
            }
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            task::sleep(RECONNECT_BACKOFF).await;
        }
        info!(self.logger, "link manager stopped");
    }
}

struct Link {
    events: Sender<LinkEvent>,
    outbound: Receiver<Value>,
    logger: Logger,
}

impl Link {
    async fn run(&self, socket: WebSocketStream<ConnectStream>) -> Result<(), CoreError> {
        let (mut sink, mut stream) = socket.split();

        let result = {
            let reader = self.run_reader(&mut stream);
            let writer = self.run_writer(&mut sink);
            futures_util::pin_mut!(reader, writer);
            match future::select(reader, writer).await {
                Either::Left((result, _)) => result,
                Either::Right((result, _)) => result,
            }
        };

        // close politely if the socket is still alive
        let _ = sink.send(Message::Close(None)).await;
        result
    }

    async fn run_reader(
        &self,
        stream: &mut SplitStream<WebSocketStream<ConnectStream>>,
    ) -> Result<(), CoreError> {
        while let Some(frame) = stream.next().await {
            let message = frame?;
            let body = match message {
                Message::Text(body) => body,
                Message::Close(_) => return Ok(()),
                // pings are answered by the transport layer
                _ => continue,
            };
            let parsed: Value = match serde_json::from_str(&body) {
                Ok(parsed) => parsed,
                Err(err) => {
                    // malformed frames are dropped, the link lives on
                    warn!(self.logger, "malformed frame from edge: {}", err);
                    continue;
                }
            };
            if self.route(parsed).await.is_err() {
                // the tick side hung up; nothing left to read for
                return Ok(());
            }
        }
        Ok(())
    }

    async fn route(&self, frame: Value) -> Result<(), ()> {
        let kind = frame.get("kind").and_then(|k| k.as_str()).unwrap_or("");
        match kind {
            "client_list" => {
                // sent right after connect: the roster of already-connected clients
                info!(self.logger, "received client roster");
                if let Some(entries) = frame.get("data").and_then(|d| d.as_array()) {
                    for entry in entries {
                        self.attach_client(entry).await?;
                    }
                }
            }
            "client_ready" => {
                if let Some(entry) = frame.get("protocol") {
                    self.attach_client(entry).await?;
                }
            }
            "client_capabilities" | "client_data" | "client_disconnected" => {
                let id = match frame.get("id").and_then(|v| v.as_i64()) {
                    Some(id) => id,
                    None => {
                        warn!(self.logger, "frame without client id"; "kind" => kind);
                        return Ok(());
                    }
                };
                match kind {
                    "client_capabilities" => {
                        let capabilities = parse_capabilities(frame.get("capabilities"));
                        self.events
                            .send(LinkEvent::ClientCapabilities { id, capabilities })
                            .await
                            .map_err(drop)?;
                    }
                    "client_data" => {
                        let messages: Vec<ClientMessage> = match frame.get("data") {
                            Some(data) => match serde_json::from_value(data.clone()) {
                                Ok(messages) => messages,
                                Err(err) => {
                                    warn!(self.logger, "bad client_data payload: {}", err);
                                    return Ok(());
                                }
                            },
                            None => Vec::new(),
                        };
                        self.events
                            .send(LinkEvent::ClientData { id, messages })
                            .await
                            .map_err(drop)?;
                    }
                    _ => {
                        info!(self.logger, "client disconnected at edge"; "client" => id);
                        self.events
                            .send(LinkEvent::ClientGone { id })
                            .await
                            .map_err(drop)?;
                    }
                }
            }
            other => {
                // unknown kinds are ignored by contract
                debug!(self.logger, "ignoring frame"; "kind" => other);
            }
        }
        Ok(())
    }

    async fn attach_client(&self, entry: &Value) -> Result<(), ()> {
        let id = match entry.get("id").and_then(|v| v.as_i64()) {
            Some(id) => id,
            None => {
                warn!(self.logger, "client description without id");
                return Ok(());
            }
        };
        let capabilities = parse_capabilities(entry.get("capabilities"));
        self.events
            .send(LinkEvent::ClientAttached { id, capabilities })
            .await
            .map_err(drop)
    }

    async fn run_writer(
        &self,
        sink: &mut SplitSink<WebSocketStream<ConnectStream>, Message>,
    ) -> Result<(), CoreError> {
        loop {
            let frame = match self.outbound.recv().await {
                Ok(frame) => frame,
                // the game dropped its sender: clean shutdown
                Err(_) => return Ok(()),
            };
            sink.send(Message::Text(frame.to_string())).await?;
        }
    }
}

fn parse_capabilities(value: Option<&Value>) -> ProtocolCapabilities {
    value
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::test_logger;
    use serde_json::json;

    fn test_link() -> (Link, Receiver<LinkEvent>) {
        let (events_tx, events_rx) = async_std::channel::unbounded();
        let (_out_tx, out_rx) = async_std::channel::unbounded::<Value>();
        let link = Link {
            events: events_tx,
            outbound: out_rx,
            logger: test_logger(),
        };
        (link, events_rx)
    }

    #[async_std::test]
    async fn client_list_attaches_every_entry() {
        let (link, events) = test_link();
        link.route(json!({
            "kind": "client_list",
            "data": [
                {"id": 1, "capabilities": {"width": 100}},
                {"id": 2, "capabilities": {}},
            ]
        }))
        .await
        .unwrap();

        match events.try_recv().unwrap() {
            LinkEvent::ClientAttached { id, capabilities } => {
                assert_eq!(id, 1);
                assert_eq!(capabilities.width, 100);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            events.try_recv().unwrap(),
            LinkEvent::ClientAttached { id: 2, .. }
        ));
    }

    #[async_std::test]
    async fn client_data_frames_carry_messages_in_order() {
        let (link, events) = test_link();
        link.route(json!({
            "kind": "client_data",
            "id": 42,
            "data": [
                {"cmd": "text", "args": ["north"], "kwargs": {}},
                {"cmd": "text", "args": ["south"]},
            ]
        }))
        .await
        .unwrap();

        match events.try_recv().unwrap() {
            LinkEvent::ClientData { id, messages } => {
                assert_eq!(id, 42);
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].args[0], "north");
                assert_eq!(messages[1].args[0], "south");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[async_std::test]
    async fn unknown_kinds_and_junk_are_ignored() {
        let (link, events) = test_link();
        link.route(json!({"kind": "mssp_query", "id": 9}))
            .await
            .unwrap();
        link.route(json!({"no_kind_at_all": true})).await.unwrap();
        link.route(json!({"kind": "client_data", "id": 1, "data": "garbage"}))
            .await
            .unwrap();
        assert!(events.try_recv().is_err());
    }

    #[async_std::test]
    async fn disconnects_mark_clients_gone() {
        let (link, events) = test_link();
        link.route(json!({"kind": "client_disconnected", "id": 7}))
            .await
            .unwrap();
        assert!(matches!(
            events.try_recv().unwrap(),
            LinkEvent::ClientGone { id: 7 }
        ));
    }
}
