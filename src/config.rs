//! Connection and dispersion settings.
//!
//! Every field has a default, so a config file only needs the values it changes:
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//!
//! [dispersion]
//! source = "from_dev"
//! pixel_width_um = 20.0
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Where the constants for the pixel to wavelength mapping come from.
#[derive(Debug, Display, EnumString, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum CalibrationSource {
    /// Calibration rows entered by hand, see [`DispersionConfig::grating_calibrations`].
    #[default]
    #[serde(rename = "from_grating_calibrations")]
    #[strum(serialize = "from_grating_calibrations")]
    FromGratingCalibrations,
    /// Geometry stored in the instrument, e.g. by a vendor calibration tool.
    #[serde(rename = "from_dev")]
    #[strum(serialize = "from_dev")]
    FromDevice,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Timeout of a single byte read.
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 9600,
            timeout_ms: 5000,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct DispersionConfig {
    pub source: CalibrationSource,
    /// One row per turret slot, indexed by grating id - 1:
    /// `[f, delta, gamma, n0, offset_adjust, d_grating, x_pixel, curvature]`, lengths in nm and
    /// angles in radians. The trailing curvature may be left out.
    pub grating_calibrations: Vec<Vec<f64>>,
    pub binning: u32,
    /// Diffraction order.
    pub m_order: i32,
    /// Detector pixel pitch, used with [`CalibrationSource::FromDevice`].
    pub pixel_width_um: f64,
}

impl Default for DispersionConfig {
    fn default() -> Self {
        Self {
            source: CalibrationSource::default(),
            grating_calibrations: vec![vec![300e6, 0.0, 0.0, 256.0, 0.0, 1e6 / 150.0, 16e3, 0.0]; 3],
            binning: 1,
            m_order: 1,
            pixel_width_um: 16.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub dispersion: DispersionConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
