//! Physical switch to bulb synchronization.
//!
//! Relay switches are wired so a physical flip briefly reports "open"; the
//! engine treats that reading as an edge-triggered command, restores the
//! relay immediately (or the switch would audibly keep clicking) and
//! toggles the associated bulbs through a debounce gate.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::device::Device;
use crate::errors::Error;
use crate::throttle::ToggleGate;
use crate::types::UpdateIntent;

type Result<T> = std::result::Result<T, Error>;

const POLL_PERIOD: Duration = Duration::from_millis(10);
const TOGGLE_WINDOW: Duration = Duration::from_millis(100);
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);
const TOGGLE_TRANSITION: Duration = Duration::from_millis(1000);
const TOGGLE_RETRY: u32 = 10;

/// Static binding of physical switches to the bulbs they control.
///
/// Switch sets must be disjoint across setups; bulb sets may overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchSetup {
    pub switch_ips: Vec<Ipv4Addr>,
    pub bulb_ips: Vec<Ipv4Addr>,
}

/// Polls a setup's relay switches and toggles its bulbs on each press.
///
/// Each switch device gets its own poll task (10 ms period). A relay
/// reporting state `0` is the edge event: the relay is re-closed
/// fire-and-forget and the setup-wide [`ToggleGate`] decides whether this
/// sample triggers a toggle or is collapsed into an earlier one.
pub struct SwitchMonitor {
    switches: Vec<Device>,
    bulbs: Arc<Vec<Device>>,
    gate: ToggleGate,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SwitchMonitor {
    /// Resolve a setup's devices, retrying without bound.
    ///
    /// A transient failure must not permanently abandon a switch setup,
    /// so the whole connect operation is retried with a 1 s backoff until
    /// every switch and bulb answers a status query.
    pub async fn connect(setup: &SwitchSetup) -> Self {
        let switches = setup.switch_ips.iter().copied().map(Device::new).collect();
        let bulbs = setup.bulb_ips.iter().copied().map(Device::new).collect();
        Self::connect_devices(switches, bulbs).await
    }

    /// [`SwitchMonitor::connect`] over already-built devices.
    pub async fn connect_devices(switches: Vec<Device>, bulbs: Vec<Device>) -> Self {
        loop {
            match probe_all(&switches, &bulbs).await {
                Ok(()) => break,
                Err(e) => {
                    warn!(
                        "switch setup not reachable yet: {e}; retrying in {}s",
                        CONNECT_RETRY_DELAY.as_secs()
                    );
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }
        info!(
            "switch setup connected ({} switches, {} bulbs)",
            switches.len(),
            bulbs.len()
        );
        Self::with_devices(switches, bulbs)
    }

    /// Assemble a monitor from devices known to be reachable, skipping
    /// the connect probe.
    pub fn with_devices(switches: Vec<Device>, bulbs: Vec<Device>) -> Self {
        SwitchMonitor {
            switches,
            bulbs: Arc::new(bulbs),
            gate: ToggleGate::new(TOGGLE_WINDOW),
            running: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start one poll task per switch device. Idempotent while running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut tasks = self.tasks.lock().unwrap();
        for switch in &self.switches {
            let switch = *switch;
            let bulbs = Arc::clone(&self.bulbs);
            let gate = self.gate.clone();
            let running = Arc::clone(&self.running);

            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(POLL_PERIOD);
                while running.load(Ordering::SeqCst) {
                    ticker.tick().await;
                    poll_switch(switch, &bulbs, &gate).await;
                }
            }));
        }
    }

    /// Stop the poll tasks and wait for them to wind down.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handles: Vec<_> = self.tasks.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// One poll tick: query the relay, restore it on an open reading and
/// request a toggle through the gate.
async fn poll_switch(switch: Device, bulbs: &Arc<Vec<Device>>, gate: &ToggleGate) {
    // A missed poll is benign; the next cycle self-corrects.
    let Ok(info) = switch.get_status().await else {
        return;
    };

    if info.get("relay_state").and_then(Value::as_i64) != Some(0) {
        return;
    }

    // The switch is a momentary trigger, never an actual power cut:
    // re-close the relay on every open reading, fire-and-forget.
    tokio::spawn(async move {
        if let Err(e) = switch.set_relay_power(true).await {
            debug!("relay restore for {} failed: {e}", switch.ip());
        }
    });

    if gate.try_enter() {
        let bulbs = Arc::clone(bulbs);
        tokio::spawn(async move {
            toggle_bulbs(&bulbs).await;
        });
    }
}

/// Toggle every bulb of the setup against the first bulb's reported power.
///
/// An unreadable reference bulb is treated as off, so the toggle degrades
/// to "turn on". Updates fan out as concurrent fire-and-forget tasks.
async fn toggle_bulbs(bulbs: &[Device]) {
    let current = match bulbs.first() {
        Some(reference) => reference
            .get_lighting_state()
            .await
            .map(|state| state.power)
            .unwrap_or(false),
        None => false,
    };

    let mut intent = UpdateIntent::new();
    intent.power(!current);
    intent.transition(TOGGLE_TRANSITION);
    intent.retries(TOGGLE_RETRY);

    for bulb in bulbs {
        let bulb = *bulb;
        let intent = intent.clone();
        tokio::spawn(async move {
            if let Err(e) = bulb.update_light_state(&intent).await {
                warn!("toggle update for {} failed: {e}", bulb.ip());
            }
        });
    }
}

async fn probe_all(switches: &[Device], bulbs: &[Device]) -> Result<()> {
    let devices = switches.iter().chain(bulbs.iter());
    let results = join_all(devices.map(|device| device.get_status())).await;
    results.into_iter().find(|r| r.is_err()).transpose()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testutil::{FakeDevice, FakeProfile};

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    #[tokio::test]
    async fn test_connect_resolves_all_devices() {
        let switch = FakeDevice::spawn(FakeProfile::relay("Hall Switch", vec![1])).await;
        let bulb = FakeDevice::spawn(FakeProfile::bulb("Bulb Hall", true)).await;

        let monitor =
            SwitchMonitor::connect_devices(vec![switch.device()], vec![bulb.device()]).await;
        assert_eq!(monitor.switches.len(), 1);
        assert_eq!(monitor.bulbs.len(), 1);
    }

    #[tokio::test]
    async fn test_single_open_reading_restores_and_toggles_once() {
        // The relay reports open exactly once, then closed forever.
        let switch = FakeDevice::spawn(FakeProfile::relay("Hall Switch", vec![0, 1])).await;
        let bulb = FakeDevice::spawn(FakeProfile::bulb("Bulb Hall", true)).await;

        let monitor = SwitchMonitor::with_devices(vec![switch.device()], vec![bulb.device()]);
        monitor.start();
        settle().await;
        monitor.stop().await;

        assert_eq!(*switch.relay_commands.lock().unwrap(), vec![1]);
        let transitions = bulb.transitions.lock().unwrap();
        assert_eq!(transitions.len(), 1);
        // Reference bulb reported on, so the setup is commanded off.
        assert_eq!(transitions[0]["on_off"], json!(0));
        assert_eq!(transitions[0]["transition_period"], json!(1000));
    }

    #[tokio::test]
    async fn test_consecutive_open_readings_collapse_to_one_toggle() {
        // Three open samples in ~30 ms: each restores the relay, but the
        // 100 ms gate admits only the first toggle.
        let switch = FakeDevice::spawn(FakeProfile::relay("Hall Switch", vec![0, 0, 0, 1])).await;
        let bulb = FakeDevice::spawn(FakeProfile::bulb("Bulb Hall", false)).await;

        let monitor = SwitchMonitor::with_devices(vec![switch.device()], vec![bulb.device()]);
        monitor.start();
        settle().await;
        monitor.stop().await;

        assert_eq!(*switch.relay_commands.lock().unwrap(), vec![1, 1, 1]);
        assert_eq!(bulb.transitions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_fans_out_to_every_bulb() {
        let switch = FakeDevice::spawn(FakeProfile::relay("Hall Switch", vec![0, 1])).await;
        let first = FakeDevice::spawn(FakeProfile::bulb("Bulb One", false)).await;
        let second = FakeDevice::spawn(FakeProfile::bulb("Bulb Two", true)).await;

        let monitor = SwitchMonitor::with_devices(
            vec![switch.device()],
            vec![first.device(), second.device()],
        );
        monitor.start();
        settle().await;
        monitor.stop().await;

        // Reference bulb (the first) reported off, so every bulb is
        // commanded on regardless of its own state.
        for fake in [&first, &second] {
            let transitions = fake.transitions.lock().unwrap();
            assert_eq!(transitions.len(), 1);
            assert_eq!(transitions[0]["on_off"], json!(1));
        }
    }

    #[tokio::test]
    async fn test_unreadable_reference_bulb_degrades_to_on() {
        let mute = FakeDevice::spawn(FakeProfile::mute()).await;
        let responsive = FakeDevice::spawn(FakeProfile::bulb("Bulb Two", true)).await;

        toggle_bulbs(&[mute.device(), responsive.device()]).await;
        // The fan-out is fire-and-forget; give the responsive bulb's
        // update task a moment to land.
        settle().await;

        let transitions = responsive.transitions.lock().unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0]["on_off"], json!(1));
    }

    #[tokio::test]
    async fn test_closed_relay_is_the_rest_state() {
        let switch = FakeDevice::spawn(FakeProfile::relay("Hall Switch", vec![1])).await;
        let bulb = FakeDevice::spawn(FakeProfile::bulb("Bulb Hall", true)).await;

        let monitor = SwitchMonitor::with_devices(vec![switch.device()], vec![bulb.device()]);
        monitor.start();
        settle().await;
        monitor.stop().await;

        assert!(switch.relay_commands.lock().unwrap().is_empty());
        assert!(bulb.transitions.lock().unwrap().is_empty());
    }
}
