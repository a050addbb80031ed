//! Desired-state updates for bulbs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ColorTempPreset;

/// A desired-state delta to apply to one or more bulbs.
///
/// Values are clamped to the device's accepted ranges as they are set, so
/// a fully built intent always resolves to a payload the bulb will accept.
/// Setting hue or saturation forces the transmitted color temperature to
/// `0`, since color and white mode are mutually exclusive.
///
/// # Examples
///
/// ```
/// use kasa_lights_rs::UpdateIntent;
///
/// let mut intent = UpdateIntent::new();
/// intent.power(true);
/// intent.brightness(150); // clamped to 100
/// assert!(intent.has_changes());
/// ```
///
/// Intents also deserialize from the front-end command format, where the
/// color temperature may be symbolic:
///
/// ```
/// use kasa_lights_rs::UpdateIntent;
///
/// let intent: UpdateIntent =
///     serde_json::from_str(r#"{ "colorTemp": "warm", "brightness": 80 }"#).unwrap();
/// assert!(intent.has_changes());
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawIntent")]
pub struct UpdateIntent {
    power: Option<bool>,
    brightness: Option<u8>,
    hue: Option<u16>,
    saturation: Option<u8>,
    color_temp: Option<u16>,
    transition: Duration,
    retry: u32,
}

impl Default for UpdateIntent {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateIntent {
    pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(1000);
    pub const DEFAULT_RETRY: u32 = 4;

    /// Create an empty intent with the default transition and retry budget.
    pub fn new() -> Self {
        UpdateIntent {
            power: None,
            brightness: None,
            hue: None,
            saturation: None,
            color_temp: None,
            transition: Self::DEFAULT_TRANSITION,
            retry: Self::DEFAULT_RETRY,
        }
    }

    /// Set the desired power state.
    pub fn power(&mut self, on: bool) {
        self.power = Some(on);
    }

    /// Set the brightness, clamped to 0-100.
    pub fn brightness(&mut self, value: i32) {
        self.brightness = Some(value.clamp(0, 100) as u8);
    }

    /// Set the hue, clamped to 0-360. Forces color mode.
    pub fn hue(&mut self, value: i32) {
        self.hue = Some(value.clamp(0, 360) as u16);
    }

    /// Set the saturation, clamped to 0-100. Forces color mode.
    pub fn saturation(&mut self, value: i32) {
        self.saturation = Some(value.clamp(0, 100) as u8);
    }

    /// Set a numeric color temperature, clamped to 2500-9000 K.
    pub fn color_temp(&mut self, kelvin: i32) {
        self.color_temp = Some(kelvin.clamp(2500, 9000) as u16);
    }

    /// Set the color temperature from a symbolic preset.
    pub fn color_temp_preset(&mut self, preset: ColorTempPreset) {
        self.color_temp = Some(preset.kelvin());
    }

    /// Set the transition duration (default 1000 ms).
    pub fn transition(&mut self, duration: Duration) {
        self.transition = duration;
    }

    /// Set the delivery retry budget (default 4 attempts).
    pub fn retries(&mut self, retry: u32) {
        self.retry = retry;
    }

    /// Whether any attribute has been set.
    pub fn has_changes(&self) -> bool {
        self.power.is_some()
            || self.brightness.is_some()
            || self.hue.is_some()
            || self.saturation.is_some()
            || self.color_temp.is_some()
    }

    pub(crate) fn retry(&self) -> u32 {
        self.retry
    }

    /// Resolve the intent into the wire payload.
    pub(crate) fn payload(&self) -> TransitionPayload {
        let color_temp = if self.hue.is_some() || self.saturation.is_some() {
            Some(0)
        } else {
            self.color_temp
        };
        TransitionPayload {
            ignore_default: 1,
            transition_period: self.transition.as_millis() as u64,
            on_off: self.power.map(u8::from),
            brightness: self.brightness,
            color_temp,
            hue: self.hue,
            saturation: self.saturation,
        }
    }
}

impl From<&ColorTempPreset> for UpdateIntent {
    fn from(preset: &ColorTempPreset) -> Self {
        let mut intent = UpdateIntent::new();
        intent.color_temp_preset(*preset);
        intent
    }
}

/// Parameters of a `transition_light_state` command as sent on the wire.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TransitionPayload {
    pub ignore_default: u8,
    pub transition_period: u64,
    pub on_off: Option<u8>,
    pub brightness: Option<u8>,
    pub color_temp: Option<u16>,
    pub hue: Option<u16>,
    pub saturation: Option<u8>,
}

/// Front-end command format for an update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIntent {
    power: Option<bool>,
    brightness: Option<i32>,
    hue: Option<i32>,
    saturation: Option<i32>,
    color_temp: Option<ColorTempSpec>,
    transition_speed: Option<u64>,
    retry: Option<u32>,
}

/// A color temperature given either symbolically or in Kelvin.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColorTempSpec {
    Preset(ColorTempPreset),
    Kelvin(i32),
}

impl From<RawIntent> for UpdateIntent {
    fn from(raw: RawIntent) -> Self {
        let mut intent = UpdateIntent::new();
        if let Some(on) = raw.power {
            intent.power(on);
        }
        if let Some(value) = raw.brightness {
            intent.brightness(value);
        }
        if let Some(value) = raw.hue {
            intent.hue(value);
        }
        if let Some(value) = raw.saturation {
            intent.saturation(value);
        }
        match raw.color_temp {
            Some(ColorTempSpec::Preset(preset)) => intent.color_temp_preset(preset),
            Some(ColorTempSpec::Kelvin(kelvin)) => intent.color_temp(kelvin),
            None => {}
        }
        if let Some(ms) = raw.transition_speed {
            intent.transition(Duration::from_millis(ms));
        }
        if let Some(retry) = raw.retry {
            intent.retries(retry);
        }
        intent
    }
}
