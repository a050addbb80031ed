//! Symbolic color temperature presets.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Named color temperature presets accepted by update commands.
///
/// Front ends may send `"warm"`, `"neutral"` or `"cold"` in place of a
/// numeric Kelvin value; each preset maps to a fixed temperature.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use kasa_lights_rs::ColorTempPreset;
///
/// assert_eq!(ColorTempPreset::from_str("warm").unwrap().kelvin(), 2700);
/// assert_eq!(ColorTempPreset::Neutral.kelvin(), 6500);
/// assert_eq!(ColorTempPreset::Cold.kelvin(), 9000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ColorTempPreset {
    Warm,
    Neutral,
    Cold,
}

impl ColorTempPreset {
    /// The Kelvin temperature this preset stands for.
    pub fn kelvin(&self) -> u16 {
        match self {
            ColorTempPreset::Warm => 2700,
            ColorTempPreset::Neutral => 6500,
            ColorTempPreset::Cold => 9000,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_preset_mapping() {
        assert_eq!(ColorTempPreset::from_str("warm").unwrap().kelvin(), 2700);
        assert_eq!(ColorTempPreset::from_str("neutral").unwrap().kelvin(), 6500);
        assert_eq!(ColorTempPreset::from_str("cold").unwrap().kelvin(), 9000);
        assert!(ColorTempPreset::from_str("tepid").is_err());
    }

    #[test]
    fn test_presets_within_device_range() {
        for preset in ColorTempPreset::iter() {
            assert!((2500..=9000).contains(&preset.kelvin()));
        }
    }
}
