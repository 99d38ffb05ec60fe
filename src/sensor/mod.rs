//! Decoding of sensor reports and settings.

pub mod frame;
pub mod object;
pub mod settings;

pub use frame::{Frame, OBJECT_SLOTS};
pub use object::{CENTROID_ABSENT, DetectedObject, OBJECT_SLOT_BYTES, ReportFormat};
pub use settings::{PRODUCT_ID, SETTINGS_REGISTERS, SensorSettings, SettingsCollector};
