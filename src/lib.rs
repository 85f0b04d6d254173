//! Location picker: GPS fix refinement and Nominatim place lookup.

pub mod config;
pub mod location;
pub mod logging;
pub mod picker;

pub use config::PickerConfig;
pub use picker::{LocationPicker, PickerSettings};
