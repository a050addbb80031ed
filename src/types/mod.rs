//! Value types for device state and update commands.

mod color_temp;
mod intent;
mod light_state;

pub use color_temp::ColorTempPreset;
pub use intent::UpdateIntent;
pub use light_state::LightState;
