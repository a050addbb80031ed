//! Aggregate status reconciliation and publishing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::registry::Registry;
use crate::types::LightState;

/// Nominal period of the reconciliation loop.
pub const UPDATE_PERIOD: Duration = Duration::from_millis(100);

/// The operating mode derived from bulb state and the effect overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Color,
    White,
    Effect,
}

/// A lighting effect reported as currently running by the effect engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningEffect {
    pub id: String,
    /// Effect frame interval in milliseconds.
    pub interval: u64,
}

/// External collaborator reporting the at-most-one currently running
/// effect. Implemented for plain closures.
pub trait EffectOverlay: Send + Sync {
    fn running_effect(&self) -> Option<RunningEffect>;
}

impl<F> EffectOverlay for F
where
    F: Fn() -> Option<RunningEffect> + Send + Sync,
{
    fn running_effect(&self) -> Option<RunningEffect> {
        self()
    }
}

/// The single published view of system state.
///
/// Composed wholesale on every reconciliation cycle and replaced, never
/// partially mutated; readers always observe a complete snapshot.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStatus {
    #[serde(flatten)]
    pub lighting: LightState,
    /// Identifier of the running effect; never surfaced while the bulb
    /// is off.
    pub effect: Option<String>,
    /// Effective update interval in milliseconds: the running effect's
    /// own interval, or the reconciliation period.
    pub update_speed: u64,
    pub mode: Mode,
    pub bulb_count: usize,
}

/// Receives each freshly composed [`AggregateStatus`].
pub trait StatusSink: Send + Sync {
    fn publish(&self, status: &AggregateStatus);
}

/// A [`StatusSink`] adapter that drops consecutive identical payloads.
///
/// The reconciliation loop publishes every cycle; front ends are expected
/// to deduplicate before transmitting downstream, and this adapter is that
/// boundary: it serializes the status and forwards it only when the
/// payload differs from the previous one.
pub struct DedupSink<F: Fn(String) + Send + Sync> {
    transmit: F,
    last: StdMutex<Option<String>>,
}

impl<F: Fn(String) + Send + Sync> DedupSink<F> {
    pub fn new(transmit: F) -> Self {
        DedupSink {
            transmit,
            last: StdMutex::new(None),
        }
    }
}

impl<F: Fn(String) + Send + Sync> StatusSink for DedupSink<F> {
    fn publish(&self, status: &AggregateStatus) {
        let encoded = match serde_json::to_string(status) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("failed to serialize status: {e}");
                return;
            }
        };

        let mut last = self.last.lock().unwrap();
        if last.as_deref() == Some(encoded.as_str()) {
            return;
        }
        (self.transmit)(encoded.clone());
        *last = Some(encoded);
    }
}

/// Derives and publishes the authoritative operating state.
///
/// Owns the current [`AggregateStatus`] as its single writer. Runs a
/// fixed-period reconciliation loop; [`StatusMonitor::refresh`] is also
/// callable on demand, for instance by a front end right after it applied
/// an update.
pub struct StatusMonitor {
    registry: Registry,
    effects: Arc<dyn EffectOverlay>,
    sink: Arc<dyn StatusSink>,
    current: Arc<RwLock<Option<AggregateStatus>>>,
    running: Arc<AtomicBool>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl StatusMonitor {
    pub fn new(
        registry: Registry,
        effects: Arc<dyn EffectOverlay>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        StatusMonitor {
            registry,
            effects,
            sink,
            current: Arc::new(RwLock::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            task: StdMutex::new(None),
        }
    }

    /// The last published snapshot; `None` means "not ready yet".
    pub async fn status(&self) -> Option<AggregateStatus> {
        self.current.read().await.clone()
    }

    /// Run one reconciliation cycle immediately.
    ///
    /// Returns whether a new status was composed and published. A missing
    /// or unreachable primary bulb skips the cycle, leaving the previous
    /// snapshot in place — stale-but-valid beats erased.
    pub async fn refresh(&self) -> bool {
        run_cycle(
            &self.registry,
            self.effects.as_ref(),
            self.sink.as_ref(),
            &self.current,
        )
        .await
    }

    /// Start the periodic reconciliation loop. Idempotent while running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let registry = self.registry.clone();
        let effects = Arc::clone(&self.effects);
        let sink = Arc::clone(&self.sink);
        let current = Arc::clone(&self.current);
        let running = Arc::clone(&self.running);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(UPDATE_PERIOD);
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                run_cycle(&registry, effects.as_ref(), sink.as_ref(), &current).await;
            }
        });
        *self.task.lock().unwrap() = Some(handle);
    }

    /// Stop the reconciliation loop and wait for it to wind down.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_cycle(
    registry: &Registry,
    effects: &dyn EffectOverlay,
    sink: &dyn StatusSink,
    current: &RwLock<Option<AggregateStatus>>,
) -> bool {
    let Some(primary) = registry.first().await else {
        return false;
    };

    let lighting = match primary.get_lighting_state().await {
        Ok(lighting) => lighting,
        Err(e) => {
            debug!("status poll of {} missed: {e}", primary.ip());
            return false;
        }
    };

    let effect = effects.running_effect();

    let mode = if effect.is_some() {
        Mode::Effect
    } else if lighting.is_color_mode() {
        Mode::Color
    } else {
        Mode::White
    };

    let status = AggregateStatus {
        effect: effect
            .as_ref()
            .filter(|_| lighting.power)
            .map(|e| e.id.clone()),
        update_speed: effect
            .as_ref()
            .map(|e| e.interval)
            .unwrap_or(UPDATE_PERIOD.as_millis() as u64),
        mode,
        bulb_count: registry.count().await,
        lighting,
    };

    *current.write().await = Some(status.clone());
    sink.publish(&status);
    true
}
