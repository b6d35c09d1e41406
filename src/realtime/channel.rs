//! Reconnecting WebSocket channel
//!
//! One tokio task owns a channel's connection for its whole lifetime: it
//! connects when the supervisor allows, reads frames, heartbeats, and
//! schedules its own reconnects. At most one connection attempt is in
//! flight at any time because the task is the only connector.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::error::{ClientError, Result};
use crate::models::InboundEvent;

use super::backoff::Backoff;
use super::supervisor::ConnectionSupervisor;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Heartbeat cadence while a socket is open.
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(20);
/// Keepalive frame the backend expects.
const PING_FRAME: &str = r#"{"type":"ping"}"#;

/// Lifecycle and payload notifications from one channel, in arrival order.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The socket finished connecting.
    Opened,
    /// A decoded server event.
    Event(InboundEvent),
    /// The socket closed (error, server close, or connectivity revoked).
    /// Always paired with an earlier `Opened`.
    Closed,
}

/// Handle to a running channel.
///
/// `dispose` is idempotent; dropping the handle disposes too, so a handle
/// kept in a struct cleans up with its owner.
pub struct ChannelHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl ChannelHandle {
    /// Stop the channel: closes the socket and cancels any pending
    /// reconnect timer.
    pub fn dispose(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

pub struct SocketChannel;

impl SocketChannel {
    /// Open a channel to `url`, delivering [`ChannelEvent`]s to `events`.
    ///
    /// The spawned task connects only while the supervisor allows
    /// connectivity and keeps reconnecting with backoff until the handle is
    /// disposed. It also stops on its own when the consumer drops the event
    /// receiver or the supervisor goes away.
    pub fn open(
        url: String,
        supervisor: &ConnectionSupervisor,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<ChannelHandle> {
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            return Err(ClientError::Config(format!(
                "channel URL must be ws:// or wss://: {}",
                url
            )));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run_channel(url, supervisor.watch(), shutdown_rx, events));
        Ok(ChannelHandle { shutdown_tx })
    }
}

/// Why an open socket stopped.
enum Disconnect {
    /// Error or server-initiated close: reconnect after the current delay.
    Lost,
    /// Connectivity revoked: close now, reconnect when the gate reopens.
    Revoked,
    /// Disposed (or consumer/supervisor gone): stop for good.
    Shutdown,
}

async fn run_channel(
    url: String,
    mut allowed: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let mut backoff = Backoff::new();

    loop {
        if *shutdown.borrow() {
            break;
        }

        // Gate: wait here while the supervisor forbids connectivity.
        if !*allowed.borrow() {
            backoff.reset();
            tokio::select! {
                res = allowed.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => {}
            }
            continue;
        }

        let stream = tokio::select! {
            res = connect_async(&url) => match res {
                Ok((stream, response)) => {
                    tracing::debug!("Channel connected to {} (status={})", url, response.status());
                    Some(stream)
                }
                Err(e) => {
                    tracing::warn!("Channel connect to {} failed: {}", url, e);
                    None
                }
            },
            _ = shutdown.changed() => continue,
        };

        if let Some(stream) = stream {
            backoff.reset();
            if events.send(ChannelEvent::Opened).is_err() {
                break;
            }
            let reason = drive_socket(stream, &events, &mut allowed, &mut shutdown).await;
            if events.send(ChannelEvent::Closed).is_err() {
                break;
            }
            match reason {
                Disconnect::Shutdown => break,
                Disconnect::Revoked => continue,
                Disconnect::Lost => {}
            }
        }

        // Schedule the reconnect. Connectivity is re-validated at the top
        // of the loop when the timer fires; a gate transition cancels the
        // pending timer outright.
        let delay = backoff.next_delay();
        tracing::debug!("Channel to {} retrying in {:?}", url, delay);
        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = shutdown.changed() => {}
            res = allowed.changed() => {
                if res.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Channel task for {} stopped", url);
}

/// Pump one open socket until it stops. The heartbeat interval lives only
/// inside this function, so pings can never be sent on a non-open socket.
async fn drive_socket(
    stream: WsStream,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    allowed: &mut watch::Receiver<bool>,
    shutdown: &mut watch::Receiver<bool>,
) -> Disconnect {
    let (mut sink, mut source) = stream.split();

    let mut heartbeat = time::interval(HEARTBEAT_PERIOD);
    heartbeat.tick().await; // skip first immediate tick

    loop {
        tokio::select! {
            frame = source.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        tracing::debug!("WS recv: {}", text);
                        match serde_json::from_str::<InboundEvent>(&text) {
                            Ok(event) => {
                                if events.send(ChannelEvent::Event(event)).is_err() {
                                    return Disconnect::Shutdown;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Dropping malformed event: {}", e);
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if let Err(e) = sink.send(WsMessage::Pong(data)).await {
                            tracing::warn!("Failed to send pong: {}", e);
                            return Disconnect::Lost;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        tracing::info!("WebSocket closed by server: {:?}", frame);
                        return Disconnect::Lost;
                    }
                    Some(Ok(other)) => {
                        tracing::debug!("WS frame (ignored): {:?}", other);
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket receive error: {}", e);
                        return Disconnect::Lost;
                    }
                    None => return Disconnect::Lost,
                }
            }
            _ = heartbeat.tick() => {
                tracing::debug!("WS send: {}", PING_FRAME);
                if let Err(e) = sink.send(WsMessage::Text(PING_FRAME.to_string())).await {
                    tracing::warn!("Heartbeat send failed: {}", e);
                    return Disconnect::Lost;
                }
            }
            res = allowed.changed() => {
                if res.is_err() {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Disconnect::Shutdown;
                }
                if !*allowed.borrow() {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Disconnect::Revoked;
                }
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Disconnect::Shutdown;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_non_ws_url() {
        let supervisor = ConnectionSupervisor::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let res = SocketChannel::open("https://crm.example.com/inbox/ws".into(), &supervisor, tx);
        assert!(matches!(res, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_ping_frame_shape() {
        let v: serde_json::Value = serde_json::from_str(PING_FRAME).unwrap();
        assert_eq!(v["type"], "ping");
    }

    #[tokio::test]
    async fn test_gated_channel_never_opens() {
        // Route flag stays false, so the task must park without connecting.
        let supervisor = ConnectionSupervisor::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle =
            SocketChannel::open("ws://127.0.0.1:9/inbox/ws".into(), &supervisor, tx).unwrap();

        handle.dispose();
        // The task drops its sender on exit without ever sending Opened.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_stops_task() {
        let supervisor = ConnectionSupervisor::new();
        supervisor.set_route(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle =
            SocketChannel::open("ws://127.0.0.1:9/inbox/ws".into(), &supervisor, tx).unwrap();

        handle.dispose();
        handle.dispose();

        // Drain whatever raced in before shutdown; the channel must end.
        while rx.recv().await.is_some() {}
    }
}
