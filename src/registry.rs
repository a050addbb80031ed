//! Discovery and the shared set of known bulbs.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use serde_json::{Value, json};
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::cipher;
use crate::device::{DEVICE_PORT, Device};
use crate::errors::Error;
use crate::types::UpdateIntent;

type Result<T> = std::result::Result<T, Error>;

/// Local port the broadcast scan socket binds to.
pub const SCAN_PORT: u16 = 9998;

/// Alias marker that identifies bulb-class devices by naming convention.
pub const DEFAULT_BULB_ALIAS: &str = "Bulb ";

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// The live, process-wide set of known bulbs.
///
/// The set is append-only: devices are added on discovery or explicit
/// connect, de-duplicated by address, and never removed — an unreachable
/// bulb keeps failing its requests and is retried by callers. Clones share
/// the same underlying set, so a registry handle can be passed to each
/// component at construction.
#[derive(Debug, Clone)]
pub struct Registry {
    bulbs: Arc<RwLock<Vec<Device>>>,
    bulb_alias: String,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_BULB_ALIAS)
    }
}

impl Registry {
    /// Create an empty registry. `bulb_alias` is the alias substring that
    /// marks a device as a bulb during discovery and connect.
    pub fn new(bulb_alias: impl Into<String>) -> Self {
        Registry {
            bulbs: Arc::new(RwLock::new(Vec::new())),
            bulb_alias: bulb_alias.into(),
        }
    }

    /// Snapshot of the known bulbs.
    pub async fn bulbs(&self) -> Vec<Device> {
        self.bulbs.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.bulbs.read().await.len()
    }

    /// The primary bulb, if any is known yet.
    pub async fn first(&self) -> Option<Device> {
        self.bulbs.read().await.first().copied()
    }

    pub async fn contains(&self, ip: IpAddr) -> bool {
        self.bulbs.read().await.iter().any(|b| b.ip() == ip)
    }

    /// Add a device, de-duplicating by address. Returns whether it was new.
    pub async fn insert(&self, device: Device) -> bool {
        let mut bulbs = self.bulbs.write().await;
        if bulbs.iter().any(|b| b.addr() == device.addr()) {
            return false;
        }
        bulbs.push(device);
        true
    }

    /// Connect to a bulb at a fixed address, retrying without bound.
    ///
    /// Queries the device's status; a device that is unreachable or does
    /// not report a bulb-class alias is retried after 5 seconds, forever.
    /// The loop only terminates once the device is registered (or another
    /// path registered the address first).
    pub async fn connect(&self, device: Device) -> Device {
        loop {
            if self.contains(device.ip()).await {
                return device;
            }
            info!("connecting to bulb {}", device.ip());
            match self.probe_bulb(device).await {
                Ok(info) => {
                    let alias = info
                        .get("alias")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    if self.insert(device).await {
                        info!("connected to bulb {} ({})", alias, device.ip());
                    }
                    return device;
                }
                Err(e) => {
                    warn!(
                        "unable to connect to bulb {}: {e}; retrying in {}s",
                        device.ip(),
                        RECONNECT_DELAY.as_secs()
                    );
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// Connect to every configured bulb address concurrently.
    pub async fn connect_all(&self, ips: &[Ipv4Addr]) {
        join_all(ips.iter().map(|ip| self.connect(Device::new(*ip)))).await;
    }

    /// Drain a discovery channel, adopting every candidate that reports a
    /// bulb-class alias and is not already registered.
    ///
    /// Runs until the channel closes; callers normally spawn it alongside
    /// a [`scan`].
    pub async fn adopt_discovered(&self, mut candidates: UnboundedReceiver<Device>) {
        while let Some(device) = candidates.recv().await {
            match self.probe_bulb(device).await {
                Ok(info) => {
                    let alias = info
                        .get("alias")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    if self.insert(device).await {
                        info!("discovered bulb {} ({})", alias, device.ip());
                    }
                }
                Err(e) => debug!("ignoring scan candidate {}: {e}", device.ip()),
            }
        }
    }

    /// Apply one update intent to every known bulb concurrently, awaiting
    /// all deliveries. The first failure is reported after all bulbs have
    /// been attempted.
    pub async fn update_all(&self, intent: &UpdateIntent) -> Result<()> {
        let bulbs = self.bulbs().await;
        let results = join_all(bulbs.iter().map(|bulb| bulb.update_light_state(intent))).await;
        results.into_iter().find(|r| r.is_err()).transpose()?;
        Ok(())
    }

    async fn probe_bulb(&self, device: Device) -> Result<Value> {
        let info = device.get_status().await?;
        if self.is_bulb(&info) {
            Ok(info)
        } else {
            Err(Error::WrongDeviceClass { ip: device.ip() })
        }
    }

    fn is_bulb(&self, info: &Value) -> bool {
        info.get("alias")
            .and_then(Value::as_str)
            .is_some_and(|alias| alias.contains(&self.bulb_alias))
    }
}

/// Scan the local network for devices via UDP broadcast.
///
/// Sends one obfuscated status query to the broadcast address and
/// forwards one [`Device`] per reply datagram into the returned channel.
/// The scan is open-ended — devices may reply at any time — and ends when
/// the receiver is dropped. Replies are not filtered or de-duplicated;
/// consumers do both, normally via [`Registry::adopt_discovered`].
///
/// ```ignore
/// let registry = Registry::default();
/// let candidates = scan(Ipv4Addr::BROADCAST).await?;
/// tokio::spawn(async move { registry.adopt_discovered(candidates).await });
/// ```
pub async fn scan(broadcast_addr: Ipv4Addr) -> Result<UnboundedReceiver<Device>> {
    scan_from(
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), SCAN_PORT),
        SocketAddr::new(IpAddr::V4(broadcast_addr), DEVICE_PORT),
    )
    .await
}

pub(crate) async fn scan_from(
    bind: SocketAddr,
    target: SocketAddr,
) -> Result<UnboundedReceiver<Device>> {
    let socket = UdpSocket::bind(bind)
        .await
        .map_err(|e| Error::socket("bind", e))?;
    socket
        .set_broadcast(true)
        .map_err(|e| Error::socket("set_broadcast", e))?;

    let query = json!({ "system": { "get_sysinfo": {} } });
    let encoded = serde_json::to_string(&query).map_err(Error::JsonDump)?;
    let wire = cipher::encode(encoded.as_bytes(), cipher::DEFAULT_KEY);
    socket
        .send_to(&wire, target)
        .await
        .map_err(|e| Error::socket("send_to", e))?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut buffer = [0u8; 4096];
        loop {
            match socket.recv_from(&mut buffer).await {
                Ok((_, addr)) => {
                    // Devices reply from their protocol port, so the reply
                    // source address is the device address.
                    if tx.send(Device::with_addr(addr)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("scan socket error: {e}");
                    break;
                }
            }
        }
    });

    Ok(rx)
}
