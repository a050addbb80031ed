//! # kasa_lights_rs
//!
//! An async Rust library for controlling TP-Link Kasa smart bulbs and
//! relay switches over UDP.
//!
//! This crate speaks the Kasa local-network device protocol (obfuscated
//! JSON over UDP port 9999) and provides the pieces a home lighting
//! controller is built from: a per-request transport with timeout and
//! retry handling, broadcast discovery, a shared bulb registry, a
//! physical-switch synchronization engine, and a status reconciliation
//! loop that merges bulb state with an external effect overlay.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::net::Ipv4Addr;
//! use std::str::FromStr;
//! use kasa_lights_rs::{Device, UpdateIntent};
//!
//! async fn dim_the_bedroom() -> Result<(), kasa_lights_rs::Error> {
//!     let bulb = Device::new(Ipv4Addr::from_str("192.168.1.209").unwrap());
//!
//!     let mut intent = UpdateIntent::new();
//!     intent.power(true);
//!     intent.brightness(30);
//!     bulb.update_light_state(&intent).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Device Control**: Query and update bulbs and relay switches with
//!   [`Device`]
//! - **State Updates**: Clamped, validated desired-state deltas with
//!   [`UpdateIntent`]
//! - **Discovery**: Find devices on your network with [`scan`] and adopt
//!   them into a [`Registry`]
//! - **Switch Sync**: Turn momentary relay presses into debounced bulb
//!   toggles with [`SwitchMonitor`]
//! - **Aggregate Status**: Derive and publish a single operating state
//!   with [`StatusMonitor`]
//!
//! ## Communication
//!
//! All communication with Kasa devices occurs over UDP on port 9999,
//! obfuscated with the vendor's autokey XOR scheme (see [`cipher`]). The
//! devices must be on the same local network; the protocol has no
//! authentication, so the network is assumed trusted.
//!
//! ## Physical switches
//!
//! Relay switches are used as momentary triggers rather than actual power
//! cuts: a flip briefly reports the relay as open, and [`SwitchMonitor`]
//! restores it immediately while toggling the associated bulbs. See the
//! [`switch`](SwitchMonitor) documentation for the polling and debounce
//! discipline.

pub mod cipher;
mod config;
mod device;
mod errors;
mod registry;
mod status;
mod switch;
mod throttle;
mod types;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export public API
pub use config::Config;
pub use device::{DEVICE_PORT, Device};
pub use errors::Error;
pub use registry::{DEFAULT_BULB_ALIAS, Registry, SCAN_PORT, scan};
pub use status::{
    AggregateStatus, DedupSink, EffectOverlay, Mode, RunningEffect, StatusMonitor, StatusSink,
    UPDATE_PERIOD,
};
pub use switch::{SwitchMonitor, SwitchSetup};
pub use throttle::ToggleGate;
pub use types::{ColorTempPreset, LightState, UpdateIntent};
