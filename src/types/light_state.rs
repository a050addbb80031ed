//! Reported bulb state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of a bulb's reported lighting condition.
///
/// A fresh value is produced on every successful status query and replaced
/// wholesale, never mutated in place. Absent fields mean the device did not
/// report them; the all-absent [`Default`] value (with `power == false`)
/// represents "unknown", which callers must not confuse with "off".
///
/// A reported color temperature of `0` means the bulb is in color
/// (hue/saturation) mode; any positive value means white mode.
///
/// # Examples
///
/// ```
/// use kasa_lights_rs::LightState;
///
/// let unknown = LightState::default();
/// assert!(!unknown.power);
/// assert!(unknown.color_temp.is_none());
/// assert!(!unknown.is_color_mode());
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightState {
    pub power: bool,
    pub brightness: Option<u8>,
    pub hue: Option<u16>,
    pub saturation: Option<u8>,
    pub color_temp: Option<u16>,
}

impl LightState {
    /// Extract the lighting state from a `get_sysinfo` reply subtree.
    ///
    /// A sysinfo without a `light_state` section (a relay switch, for
    /// instance) yields the all-absent "unknown" state.
    pub fn from_sysinfo(info: &Value) -> Self {
        info.get("light_state")
            .and_then(|raw| serde_json::from_value::<RawLightState>(raw.clone()).ok())
            .map(LightState::from)
            .unwrap_or_default()
    }

    /// Whether the bulb reports being in color (hue/saturation) mode.
    pub fn is_color_mode(&self) -> bool {
        self.color_temp == Some(0)
    }
}

/// Lighting state as reported on the wire inside `get_sysinfo`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawLightState {
    pub on_off: Option<u8>,
    pub hue: Option<u16>,
    pub saturation: Option<u8>,
    pub brightness: Option<u8>,
    pub color_temp: Option<u16>,
}

impl From<RawLightState> for LightState {
    fn from(raw: RawLightState) -> Self {
        LightState {
            power: raw.on_off.unwrap_or(0) != 0,
            brightness: raw.brightness,
            hue: raw.hue,
            saturation: raw.saturation,
            color_temp: raw.color_temp,
        }
    }
}
