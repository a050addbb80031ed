//! Individual device control.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::debug;
use serde_json::{Value, json};
use tokio::net::UdpSocket;

use crate::cipher;
use crate::errors::Error;
use crate::types::{LightState, UpdateIntent};

type Result<T> = std::result::Result<T, Error>;

/// The UDP port Kasa devices listen on.
pub const DEVICE_PORT: u16 = 9999;

/// A single Kasa smart bulb or relay switch on the local network.
///
/// A device is identified by its socket address and nothing else; it is
/// created on discovery or on explicit connect and never destroyed. An
/// unreachable device simply fails its requests and is retried by callers.
///
/// Every request opens its own ephemeral socket, so concurrent calls to
/// the same or different devices are fully independent and replies cannot
/// be delivered to the wrong call.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use std::str::FromStr;
/// use kasa_lights_rs::Device;
///
/// let bulb = Device::new(Ipv4Addr::from_str("192.168.1.209").unwrap());
/// assert_eq!(bulb.addr().port(), 9999);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    addr: SocketAddr,
}

impl Device {
    const TIMEOUT_MS: u64 = 100;

    /// Create a device at the well-known protocol port.
    pub fn new(ip: Ipv4Addr) -> Self {
        Device {
            addr: SocketAddr::new(IpAddr::V4(ip), DEVICE_PORT),
        }
    }

    /// Create a device at an explicit socket address (non-default port).
    pub fn with_addr(addr: SocketAddr) -> Self {
        Device { addr }
    }

    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send one obfuscated request datagram and await one reply.
    ///
    /// Fails with [`Error::Timeout`] if no reply arrives within 100 ms and
    /// with [`Error::MalformedReply`] if the reply cannot be parsed after
    /// deobfuscation. The socket is scoped to the call and released on
    /// every exit path.
    pub async fn request(&self, msg: &Value) -> Result<Value> {
        let encoded = serde_json::to_string(msg).map_err(Error::JsonDump)?;
        let wire = cipher::encode(encoded.as_bytes(), cipher::DEFAULT_KEY);

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| Error::socket("bind", e))?;

        socket
            .connect(self.addr)
            .await
            .map_err(|e| Error::socket("connect", e))?;

        socket
            .send(&wire)
            .await
            .map_err(|e| Error::socket("send", e))?;

        let mut buffer = [0u8; 4096];
        let bytes = tokio::time::timeout(
            Duration::from_millis(Self::TIMEOUT_MS),
            socket.recv(&mut buffer),
        )
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| Error::socket("receive", e))?;

        let decoded = cipher::decode(&buffer[..bytes], cipher::DEFAULT_KEY);
        serde_json::from_slice(&decoded).map_err(Error::MalformedReply)
    }

    /// Query the device's full system info.
    pub async fn get_status(&self) -> Result<Value> {
        let reply = self.request(&json!({ "system": { "get_sysinfo": {} } })).await?;
        reply
            .pointer("/system/get_sysinfo")
            .cloned()
            .ok_or(Error::MissingSection("system.get_sysinfo"))
    }

    /// Query the lighting state of a bulb.
    ///
    /// A reachable device without a `light_state` section yields the
    /// all-absent "unknown" state; only transport failures surface as
    /// errors, which pollers treat as a benign missed cycle.
    pub async fn get_lighting_state(&self) -> Result<LightState> {
        let info = self.get_status().await?;
        Ok(LightState::from_sysinfo(&info))
    }

    /// Set a relay switch's state. Single-shot, not retried.
    pub async fn set_relay_power(&self, on: bool) -> Result<Value> {
        let state = i32::from(on);
        self.request(&json!({ "system": { "set_relay_state": { "state": state } } }))
            .await
    }

    /// Apply a state update to a bulb, retrying failed deliveries.
    ///
    /// The intent is resolved to its wire payload once and the same
    /// payload is re-sent on every attempt, immediately after each
    /// failure, up to the intent's retry budget. Returns
    /// [`Error::Exhausted`] only after all attempts fail.
    pub async fn update_light_state(&self, intent: &UpdateIntent) -> Result<Value> {
        if !intent.has_changes() {
            return Err(Error::EmptyIntent);
        }

        let params = serde_json::to_value(intent.payload()).map_err(Error::JsonDump)?;
        let msg = json!({
            "smartlife.iot.smartbulb.lightingservice": {
                "transition_light_state": params
            }
        });

        let attempts = intent.retry().max(1);
        for attempt in 1..=attempts {
            match self.request(&msg).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    debug!(
                        "update attempt {attempt}/{attempts} to {} failed: {e}",
                        self.addr
                    );
                }
            }
        }
        Err(Error::Exhausted { attempts })
    }
}
