//! The single UDP socket all LIFX traffic goes through.
//!
//! One receive loop decodes inbound frames onto an event pipe; sends are
//! serialized behind a token-bucket rate limiter (20 frames/s per device,
//! 200/s socket-wide, the vendor guideline). On socket failure the socket
//! is rebound with bounded exponential backoff, and a periodic health check
//! re-arms the attempt counter if the transport stayed down.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lightboard_common::devices::{Device, MacAddress};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use super::msg::Message;
use super::wire::{BuildOptions, RawFrame, WireError};
use super::{LifxEvent, LIFX_PORT};
use crate::effects::{LightSink, SinkError};
use crate::pipes::stateless;
use crate::spawn;

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
const RECONNECT_CAP: Duration = Duration::from_secs(30);
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

const DEVICE_RATE: f64 = 20.0;
const SOCKET_RATE: f64 = 200.0;
const RATE_LIMIT_DEADLINE: Duration = Duration::from_millis(500);

/// Configuration for the transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// The local address to bind, normally `0.0.0.0:56700`.
    pub bind_address: String,

    /// Where discovery broadcasts go.
    pub broadcast_address: String,

    /// The port devices listen on.
    pub device_port: u16,

    /// Nonzero process-unique client identifier echoed in replies.
    pub source: u32,

    /// Ask devices to confirm Set messages with a State reply. The vendor
    /// guideline suggests suppressing this during rapid scripts.
    pub set_res_required: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{LIFX_PORT}"),
            broadcast_address: format!("255.255.255.255:{LIFX_PORT}"),
            device_port: LIFX_PORT,
            source: std::process::id() | 0x8000_0000,
            set_res_required: true,
        }
    }
}

/// An error sending or receiving LIFX traffic.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A UDP socket error occurred.
    #[error("udp error: {0}")]
    Udp(#[from] tokio::io::Error),

    /// The per-device or socket-wide send budget was exhausted.
    #[error("send to {0} rate limited")]
    RateLimited(MacAddress),

    /// The socket could not be rebound; sends fail until the health check
    /// brings it back.
    #[error("transport is down")]
    TransportDown,

    /// A frame could not be encoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

/// The single socket speaking the LIFX binary protocol.
pub struct Transport {
    config: TransportConfig,
    socket: RwLock<Option<Arc<UdpSocket>>>,
    limiter: RateLimiter,
    sequence: AtomicU8,
}

impl Transport {
    /// Bind the socket and start the receive loop and health check.
    ///
    /// Returns the transport and the pipe of decoded inbound events.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn connect(
        config: TransportConfig,
    ) -> Result<(Arc<Self>, stateless::Receiver<LifxEvent>), TransportError> {
        let socket = Self::bind(&config).await?;
        info!("lifx transport bound to {}", config.bind_address);

        let transport = Arc::new(Self {
            config,
            socket: RwLock::new(Some(Arc::new(socket))),
            limiter: RateLimiter::new(),
            sequence: AtomicU8::new(0),
        });

        let (tx, rx) = stateless::create_pipe("lifx-events");
        spawn(run_receiver(transport.clone(), tx));
        spawn(run_health_check(transport.clone()));

        Ok((transport, rx))
    }

    async fn bind(config: &TransportConfig) -> Result<UdpSocket, tokio::io::Error> {
        let socket = UdpSocket::bind(&config.bind_address).await?;
        socket.set_broadcast(true)?;
        Ok(socket)
    }

    /// The next sequence number. Serialized here so concurrent senders
    /// never reuse a value out of order.
    fn next_sequence(&self) -> u8 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// The port unicast sends go to.
    #[must_use]
    pub const fn device_port(&self) -> u16 {
        self.config.device_port
    }

    async fn current_socket(&self) -> Result<Arc<UdpSocket>, TransportError> {
        self.socket
            .read()
            .await
            .clone()
            .ok_or(TransportError::TransportDown)
    }

    /// Broadcast a tagged frame to all devices on the LAN.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is down or the send fails.
    pub async fn broadcast(&self, message: Message) -> Result<(), TransportError> {
        let socket = self.current_socket().await?;
        let options = BuildOptions {
            target: None,
            ack_required: false,
            res_required: false,
            sequence: self.next_sequence(),
            source: self.config.source,
        };
        let raw = RawFrame::build(&options, message)?;
        socket
            .send_to(&raw.pack()?, &self.config.broadcast_address)
            .await?;
        Ok(())
    }

    /// Send a frame to one device.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::RateLimited`] when the send budget for the
    /// device or socket is exhausted (non-fatal: the next step or poll
    /// corrects divergence), or an error if the transport is down.
    pub async fn send_to(
        &self,
        message: Message,
        mac: MacAddress,
        addr: SocketAddr,
    ) -> Result<(), TransportError> {
        self.limiter.acquire(mac).await?;
        let socket = self.current_socket().await?;

        let res_required = match &message {
            Message::GetPower | Message::GetLabel | Message::GetColor => true,
            _ => self.config.set_res_required,
        };

        let options = BuildOptions {
            target: Some(mac.to_target()),
            ack_required: false,
            res_required,
            sequence: self.next_sequence(),
            source: self.config.source,
        };
        let raw = RawFrame::build(&options, message)?;
        socket.send_to(&raw.pack()?, addr).await?;
        Ok(())
    }

    /// Drop the socket and try to rebind with bounded exponential backoff.
    async fn reconnect(&self) {
        *self.socket.write().await = None;

        let mut delay = RECONNECT_INITIAL;
        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            sleep(delay).await;
            match Self::bind(&self.config).await {
                Ok(socket) => {
                    info!("lifx transport rebound after {attempt} attempts");
                    *self.socket.write().await = Some(Arc::new(socket));
                    return;
                }
                Err(err) => {
                    error!("rebind attempt {attempt} failed: {err}");
                    delay = (delay * 2).min(RECONNECT_CAP);
                }
            }
        }

        error!("transport down after {MAX_RECONNECT_ATTEMPTS} rebind attempts");
    }
}

async fn run_receiver(transport: Arc<Transport>, tx: stateless::Sender<LifxEvent>) {
    let mut buf = [0u8; 1024];

    loop {
        let Some(socket) = transport.socket.read().await.clone() else {
            // Down; the health check re-arms the reconnect.
            sleep(RECONNECT_INITIAL).await;
            continue;
        };

        match socket.recv_from(&mut buf).await {
            Ok((len, addr)) => match RawFrame::unpack(&buf[..len]) {
                Ok(raw) => match Message::from_raw(&raw) {
                    Ok(message) => {
                        tx.try_send(LifxEvent {
                            mac: MacAddress::from_target(raw.frame_addr.target),
                            addr,
                            message,
                        });
                    }
                    Err(WireError::UnknownType(typ)) => {
                        debug!("ignoring unknown message type {typ} from {addr}");
                    }
                    Err(err) => {
                        error!("failed to parse message from {addr}: {err:?}");
                    }
                },
                Err(err) => {
                    error!("failed to unpack frame from {addr}: {err:?}");
                }
            },
            Err(err) => {
                error!("udp receive failed: {err}");
                transport.reconnect().await;
            }
        }
    }
}

async fn run_health_check(transport: Arc<Transport>) {
    let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if transport.socket.read().await.is_none() {
            info!("health check: transport down, re-arming reconnect");
            transport.reconnect().await;
        }
    }
}

#[async_trait]
impl LightSink for Transport {
    async fn set_color(
        &self,
        device: &Device,
        color: lightboard_common::lights::HSBK,
        duration_ms: u32,
    ) -> Result<(), SinkError> {
        let addr = device_addr(device, self.config.device_port)?;
        self.send_to(
            Message::SetColor {
                reserved: 0,
                color,
                duration: duration_ms,
            },
            device.mac,
            addr,
        )
        .await
        .map_err(SinkError::from)
    }

    async fn set_power(
        &self,
        device: &Device,
        on: bool,
        duration_ms: u32,
    ) -> Result<(), SinkError> {
        let addr = device_addr(device, self.config.device_port)?;
        self.send_to(
            Message::SetLightPower {
                level: if on { 65535 } else { 0 },
                duration: duration_ms,
            },
            device.mac,
            addr,
        )
        .await
        .map_err(SinkError::from)
    }
}

fn device_addr(device: &Device, port: u16) -> Result<SocketAddr, SinkError> {
    device
        .ip
        .map(|ip| SocketAddr::new(ip, port))
        .ok_or_else(|| SinkError::Failed(format!("device {} has no known address", device.mac)))
}

struct TokenBucket {
    tokens: f64,
    rate: f64,
    burst: f64,
    updated: Instant,
}

impl TokenBucket {
    fn new(rate: f64) -> Self {
        Self {
            tokens: rate,
            rate,
            burst: rate,
            updated: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.updated).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        self.updated = now;
    }

    fn wait_for_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

struct LimiterState {
    global: TokenBucket,
    devices: HashMap<MacAddress, TokenBucket>,
}

struct RateLimiter {
    inner: Mutex<LimiterState>,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            inner: Mutex::new(LimiterState {
                global: TokenBucket::new(SOCKET_RATE),
                devices: HashMap::new(),
            }),
        }
    }

    /// Take one token for the device and one for the socket, waiting up to
    /// the deadline for them to refill.
    async fn acquire(&self, mac: MacAddress) -> Result<(), TransportError> {
        let deadline = Instant::now() + RATE_LIMIT_DEADLINE;

        loop {
            let wait = {
                let mut guard = self.inner.lock().await;
                let state = &mut *guard;
                let now = Instant::now();
                state.global.refill(now);
                let device = state
                    .devices
                    .entry(mac)
                    .or_insert_with(|| TokenBucket::new(DEVICE_RATE));
                device.refill(now);

                if state.global.tokens >= 1.0 && device.tokens >= 1.0 {
                    device.tokens -= 1.0;
                    state.global.tokens -= 1.0;
                    return Ok(());
                }

                state.global.wait_for_token().max(device.wait_for_token())
            };

            if Instant::now() + wait > deadline {
                return Err(TransportError::RateLimited(mac));
            }
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn mac(n: u8) -> MacAddress {
        MacAddress::new([0xd0, 0x73, 0xd5, 0, 0, n])
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_burst_then_limits() {
        let limiter = RateLimiter::new();
        for _ in 0..20 {
            limiter.acquire(mac(1)).await.unwrap();
        }
        // Budget exhausted; the wait exceeds the 500 ms cap at 20/s.
        let err = limiter.acquire(mac(1)).await.unwrap_err();
        assert!(matches!(err, TransportError::RateLimited(m) if m == mac(1)));

        // Another device has its own budget.
        limiter.acquire(mac(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_sequence_is_monotone_modulo_256() {
        let (transport, _events) = Transport::connect(TransportConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..TransportConfig::default()
        })
        .await
        .unwrap();

        let first = transport.next_sequence();
        for i in 1..=300u32 {
            let expected = u8::try_from((u32::from(first) + i) % 256).unwrap();
            assert_eq!(transport.next_sequence(), expected);
        }
    }

    #[tokio::test]
    async fn test_broadcast_sends_tagged_get_service() {
        // A second socket stands in for the LAN broadcast domain.
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = receiver.local_addr().unwrap();

        let (transport, _events) = Transport::connect(TransportConfig {
            bind_address: "127.0.0.1:0".to_string(),
            broadcast_address: receiver_addr.to_string(),
            ..TransportConfig::default()
        })
        .await
        .unwrap();

        transport.broadcast(Message::GetService).await.unwrap();

        let mut buf = [0u8; 1024];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 36);

        let raw = RawFrame::unpack(&buf[..len]).unwrap();
        assert!(raw.frame.tagged);
        assert_eq!(raw.frame_addr.target, 0);
        assert_eq!(raw.protocol_header.typ, 2);
    }
}
