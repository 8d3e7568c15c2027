//! WebSocket front end for the [`Hub`].
//!
//! This module runs a Tokio-based WebSocket server. Each accepted connection
//! gets an unbounded channel feeding a write task and a read task that hands
//! inbound frames to the hub. Two background loops drive the simulation tick
//! and the heartbeat. The hub sits behind one mutex shared by all tasks; no
//! task holds the lock across an await.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use antgrid_core::ParticipantId;
use antgrid_simulation::TickSummary;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use hdrhistogram::Histogram;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::hub::Hub;
use crate::sender::{Frame, TransportError};

/// The hub as shared between connection tasks and the background loops.
pub type SharedHub = Arc<Mutex<Hub>>;

/// Ticks between two tick-duration summaries in the log.
const STATS_INTERVAL_TICKS: u64 = 240;

/// Upper bound on how long shutdown waits for connections to close.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

pub const SHUTDOWN_MESSAGE: &str = "Server is shutting down";

/// Locks the hub, turning a poisoned mutex into a `TransportError`.
pub fn lock_hub(hub: &SharedHub) -> Result<MutexGuard<'_, Hub>, TransportError> {
    hub.lock()
        .map_err(|e| TransportError::RuntimeError(format!("Hub mutex poisoned: {}", e)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Accepted `Origin` header values; empty admits every origin.
    pub allowed_origins: Vec<String>,
    pub heartbeat_interval: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

/// A bound, not yet running, WebSocket server.
pub struct WebSocketServer {
    listener: TcpListener,
    hub: SharedHub,
    options: ServerOptions,
}

impl WebSocketServer {
    /// Binds the listener. Port 0 picks a free port; see [`Self::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns `TransportError::IoError` if the address cannot be bound.
    pub async fn bind(address: &str, hub: Hub, options: ServerOptions) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address).await?;
        info!("WebSocket server listening on: {}", listener.local_addr()?);
        Ok(Self {
            listener,
            hub: Arc::new(Mutex::new(hub)),
            options,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> SharedHub {
        Arc::clone(&self.hub)
    }

    /// Accepts connections and runs the tick and heartbeat loops until
    /// `shutdown` resolves, then sends INFO and closes every connection.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()>,
    {
        let Self { listener, hub, options } = self;
        let allowed_origins: Arc<[String]> = options.allowed_origins.into();

        let tick_task = tokio::spawn(run_tick_loop(Arc::clone(&hub)));
        let heartbeat_task = tokio::spawn(run_heartbeat_loop(Arc::clone(&hub), options.heartbeat_interval));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("New WebSocket connection from: {}", addr);
                        let hub = Arc::clone(&hub);
                        let allowed_origins = Arc::clone(&allowed_origins);
                        tokio::spawn(async move {
                            match handle_connection(stream, hub, allowed_origins).await {
                                Ok(()) => debug!("WebSocket connection to {} closed", addr),
                                Err(e) => warn!("Error handling WebSocket connection from {}: {}", addr, e),
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
            }
        }

        info!("Shutting down WebSocket server");
        tick_task.abort();
        heartbeat_task.abort();
        lock_hub(&hub)?.shutdown(SHUTDOWN_MESSAGE);

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while open_connections(&hub) > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            warn!("Some connections did not close within {:?}", SHUTDOWN_GRACE);
        }
        Ok(())
    }
}

fn open_connections(hub: &SharedHub) -> usize {
    lock_hub(hub).map_or(0, |hub| hub.connection_count())
}

fn origin_allowed(allowed_origins: &[String], request: &Request) -> bool {
    if allowed_origins.is_empty() {
        return true;
    }
    let origin = request
        .headers()
        .get("origin")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    allowed_origins.iter().any(|allowed| allowed == origin)
}

/// Handles one accepted TCP connection from handshake to cleanup.
///
/// The handshake is refused with 403 when the origin is not allowed. After
/// the hub registers the participant, a send task forwards queued frames to
/// the socket and a receive task feeds inbound frames to the hub. When either
/// finishes the other is stopped and the participant leaves.
async fn handle_connection(
    stream: TcpStream,
    hub: SharedHub,
    allowed_origins: Arc<[String]>,
) -> Result<(), TransportError> {
    let check_origin = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if origin_allowed(&allowed_origins, request) {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("Forbidden origin".to_string()));
            *rejection.status_mut() = StatusCode::FORBIDDEN;
            Err(rejection)
        }
    };
    let ws_stream = accept_hdr_async(stream, check_origin)
        .await
        .map_err(|e| TransportError::WebSocketError(format!("WebSocket handshake failed: {}", e)))?;

    let (client_tx, client_rx) = mpsc::unbounded_channel::<Frame>();
    let joined = lock_hub(&hub)?.connect(Box::new(client_tx));
    let (ws_sink, mut ws_stream) = ws_stream.split();

    let participant = match joined {
        Ok(participant) => participant,
        Err(_) => {
            // ERROR and Close are already queued
            forward_frames(client_rx, ws_sink).await;
            return Ok(());
        }
    };

    let mut send_task = tokio::spawn(forward_frames(client_rx, ws_sink));

    let receive_hub = Arc::clone(&hub);
    let mut receive_task = tokio::spawn(async move {
        while let Some(message) = ws_stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    debug!(participant = %participant, "Error receiving from WebSocket stream: {}", e);
                    break;
                }
            };
            match handle_inbound(&receive_hub, participant, message) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!(participant = %participant, "Dropping connection: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            debug!(participant = %participant, "Send task finished.");
            receive_task.abort();
        }
        _ = &mut receive_task => {
            debug!(participant = %participant, "Receive task finished.");
            send_task.abort();
        }
    }

    lock_hub(&hub)?.disconnect(participant);
    Ok(())
}

/// Applies one inbound frame. Returns false once the client asked to close.
fn handle_inbound(hub: &SharedHub, participant: ParticipantId, message: Message) -> Result<bool, TransportError> {
    let mut hub = lock_hub(hub)?;
    hub.mark_alive(participant);
    match message {
        Message::Text(text) => hub.handle_text(participant, &text, std::time::Instant::now()),
        Message::Binary(data) => hub.handle_binary(participant, &data, std::time::Instant::now()),
        Message::Close(_) => return Ok(false),
        _ => {}
    }
    Ok(true)
}

/// Drains queued frames into the socket until the queue closes, a write
/// fails, or a `Frame::Close` has been written.
async fn forward_frames(
    mut client_rx: mpsc::UnboundedReceiver<Frame>,
    mut ws_sink: SplitSink<WebSocketStream<TcpStream>, Message>,
) {
    while let Some(frame) = client_rx.recv().await {
        let (message, closing) = match frame {
            Frame::Text(text) => (Message::Text(text.to_string()), false),
            Frame::Ping => (Message::Ping(Vec::new()), false),
            Frame::Close => (Message::Close(None), true),
        };
        if let Err(e) = ws_sink.send(message).await {
            debug!("Error sending to WebSocket sink, client likely disconnected: {}", e);
            break;
        }
        if closing {
            break;
        }
    }
    let _ = ws_sink.close().await;
}

fn tick_once(hub: &SharedHub) -> Result<TickSummary, TransportError> {
    Ok(lock_hub(hub)?.tick())
}

/// Runs one tick per period. A config update that changes the period moves
/// the pending deadline to the last tick plus the new period.
async fn run_tick_loop(hub: SharedHub) {
    let mut interval_rx = match lock_hub(&hub) {
        Ok(hub) => hub.watch_tick_interval(),
        Err(e) => {
            error!("Tick loop not started: {}", e);
            return;
        }
    };
    let mut period = *interval_rx.borrow_and_update();
    let mut histogram = Histogram::<u64>::new(3).ok();
    let mut ticks: u64 = 0;
    let mut last_tick = Instant::now();
    let mut next = last_tick + period;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next) => {}
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    debug!("Tick interval channel closed");
                    return;
                }
                period = *interval_rx.borrow_and_update();
                next = last_tick + period;
                debug!(period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX), "Tick period changed");
                continue;
            }
        }

        let started = std::time::Instant::now();
        let summary = match tick_once(&hub) {
            Ok(summary) => summary,
            Err(e) => {
                error!("Stopping tick loop: {}", e);
                return;
            }
        };
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        ticks += 1;
        if let Some(histogram) = histogram.as_mut() {
            histogram.saturating_record(elapsed_us);
            if ticks % STATS_INTERVAL_TICKS == 0 {
                info!(
                    ticks,
                    moved = summary.moved,
                    blocked = summary.blocked,
                    p50_us = histogram.value_at_quantile(0.5),
                    p99_us = histogram.value_at_quantile(0.99),
                    max_us = histogram.max(),
                    "Tick timing"
                );
                histogram.reset();
            }
        }

        last_tick = next;
        next += period;
        let now = Instant::now();
        if next < now {
            last_tick = now;
            next = now + period;
        }
    }
}

async fn run_heartbeat_loop(hub: SharedHub, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    loop {
        interval.tick().await;
        match lock_hub(&hub) {
            Ok(mut hub) => {
                let dead = hub.heartbeat();
                if !dead.is_empty() {
                    info!(count = dead.len(), "Removed unresponsive connections");
                }
            }
            Err(e) => {
                error!("Stopping heartbeat loop: {}", e);
                return;
            }
        }
    }
}
