//! Loopback fake devices that speak the obfuscated protocol, so the
//! transport and the polling engines can be exercised end to end.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::cipher;
use crate::device::Device;

/// Scripted behavior for a [`FakeDevice`].
pub(crate) struct FakeProfile {
    alias: &'static str,
    /// Successive `relay_state` values reported per sysinfo query; the
    /// last entry repeats. Empty for devices without a relay.
    relay_states: Vec<i64>,
    light_state: Option<Value>,
    /// Swallow every request without replying.
    mute: bool,
    /// Reply with bytes that do not decode to JSON.
    garbage: bool,
    /// Stop replying after this many replies.
    reply_limit: Option<usize>,
}

impl FakeProfile {
    pub fn bulb(alias: &'static str, power: bool) -> Self {
        Self::color_bulb(alias, power, 0)
    }

    pub fn color_bulb(alias: &'static str, power: bool, color_temp: u16) -> Self {
        FakeProfile {
            alias,
            relay_states: Vec::new(),
            light_state: Some(json!({
                "on_off": i32::from(power),
                "hue": 120,
                "saturation": 60,
                "brightness": 80,
                "color_temp": color_temp,
            })),
            mute: false,
            garbage: false,
            reply_limit: None,
        }
    }

    pub fn relay(alias: &'static str, relay_states: Vec<i64>) -> Self {
        FakeProfile {
            alias,
            relay_states,
            light_state: None,
            mute: false,
            garbage: false,
            reply_limit: None,
        }
    }

    pub fn mute() -> Self {
        FakeProfile {
            mute: true,
            ..Self::relay("Mute", vec![1])
        }
    }

    pub fn garbage() -> Self {
        FakeProfile {
            garbage: true,
            ..Self::relay("Garbage", vec![1])
        }
    }

    pub fn replies(mut self, limit: usize) -> Self {
        self.reply_limit = Some(limit);
        self
    }
}

/// A scripted device bound to an ephemeral loopback port.
pub(crate) struct FakeDevice {
    pub addr: SocketAddr,
    /// Every datagram received, including ones never replied to.
    requests: Arc<AtomicUsize>,
    /// States from `set_relay_state` commands, in arrival order.
    pub relay_commands: Arc<Mutex<Vec<i64>>>,
    /// Params of `transition_light_state` commands, in arrival order.
    pub transitions: Arc<Mutex<Vec<Value>>>,
    handle: JoinHandle<()>,
}

impl FakeDevice {
    pub async fn spawn(profile: FakeProfile) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let requests = Arc::new(AtomicUsize::new(0));
        let relay_commands = Arc::new(Mutex::new(Vec::new()));
        let transitions = Arc::new(Mutex::new(Vec::new()));

        let requests_task = Arc::clone(&requests);
        let relay_commands_task = Arc::clone(&relay_commands);
        let transitions_task = Arc::clone(&transitions);

        let handle = tokio::spawn(async move {
            let mut buffer = [0u8; 4096];
            let mut sysinfo_queries = 0usize;
            let mut replies = 0usize;

            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buffer).await else {
                    break;
                };
                requests_task.fetch_add(1, Ordering::SeqCst);

                if profile.mute {
                    continue;
                }
                if profile.reply_limit.is_some_and(|limit| replies >= limit) {
                    continue;
                }
                if profile.garbage {
                    let _ = socket.send_to(b"\xff\xfe not json", peer).await;
                    replies += 1;
                    continue;
                }

                let decoded = cipher::decode(&buffer[..len], cipher::DEFAULT_KEY);
                let Ok(msg) = serde_json::from_slice::<Value>(&decoded) else {
                    continue;
                };

                let reply = if msg.pointer("/system/get_sysinfo").is_some() {
                    let mut info = json!({ "alias": profile.alias });
                    if !profile.relay_states.is_empty() {
                        let index = sysinfo_queries.min(profile.relay_states.len() - 1);
                        info["relay_state"] = json!(profile.relay_states[index]);
                    }
                    if let Some(light_state) = &profile.light_state {
                        info["light_state"] = light_state.clone();
                    }
                    sysinfo_queries += 1;
                    json!({ "system": { "get_sysinfo": info } })
                } else if let Some(state) = msg.pointer("/system/set_relay_state/state") {
                    relay_commands_task
                        .lock()
                        .unwrap()
                        .push(state.as_i64().unwrap_or(-1));
                    json!({ "system": { "set_relay_state": { "err_code": 0 } } })
                } else if let Some(params) =
                    msg.pointer("/smartlife.iot.smartbulb.lightingservice/transition_light_state")
                {
                    transitions_task.lock().unwrap().push(params.clone());
                    json!({
                        "smartlife.iot.smartbulb.lightingservice": {
                            "transition_light_state": { "err_code": 0 }
                        }
                    })
                } else {
                    json!({ "err_code": -1, "err_msg": "unknown command" })
                };

                let wire = cipher::encode(reply.to_string().as_bytes(), cipher::DEFAULT_KEY);
                let _ = socket.send_to(&wire, peer).await;
                replies += 1;
            }
        });

        FakeDevice {
            addr,
            requests,
            relay_commands,
            transitions,
            handle,
        }
    }

    pub fn device(&self) -> Device {
        Device::with_addr(self.addr)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
