//! Pixel to wavelength mapping from the grating equation.
//!
//! Two sources of constants feed the same model:
//! * per-grating calibration rows entered by the user ([`GratingCalibration`], lengths in nm,
//!   angles in radians), evaluated one pixel at a time by [`pixel_wavelength`];
//! * the geometry stored in the instrument EEPROM ([`DeviceGeometry`], millimetres and degrees),
//!   evaluated for a whole detector row by [`device_dispersion`].
//!
//! Inputs outside the grating's physical range give `NaN` rather than an error. Callers that need
//! meaningful output should check `is_finite()`.

use thiserror::Error;

use crate::parse::{CalibrationParams, ParseError};

/// Wrong number of elements in a calibration row.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[error("grating calibration rows need 7 or 8 values, got {0}")]
pub struct RowLengthError(pub usize);

/// User supplied calibration of one grating.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct GratingCalibration {
    /// Focal length.
    pub f: f64,
    /// Detector tilt angle.
    pub delta: f64,
    /// Full included angle between incident and diffracted beams.
    pub gamma: f64,
    /// Pixel under the center wavelength.
    pub n0: f64,
    /// Wavelength dependent shift of `n0`, in pixels per nm.
    pub offset_adjust: f64,
    /// Groove spacing.
    pub d_grating: f64,
    /// Pixel pitch.
    pub x_pixel: f64,
    /// Quadratic correction, in nm per pixel².
    pub curvature: f64,
}

impl TryFrom<&[f64]> for GratingCalibration {
    type Error = RowLengthError;

    /// Accepts `[f, delta, gamma, n0, offset_adjust, d_grating, x_pixel, curvature]`. Older
    /// seven element rows without `curvature` are read with a curvature of zero.
    fn try_from(row: &[f64]) -> Result<Self, Self::Error> {
        let (head, curvature) = match row.len() {
            7 => (row, 0.0),
            8 => (&row[..7], row[7]),
            len => return Err(RowLengthError(len)),
        };
        let &[f, delta, gamma, n0, offset_adjust, d_grating, x_pixel] = head else {
            return Err(RowLengthError(row.len()));
        };

        Ok(Self {
            f,
            delta,
            gamma,
            n0,
            offset_adjust,
            d_grating,
            x_pixel,
            curvature,
        })
    }
}

/// Wavelength seen by pixel `px` with the grating turned to `center_wl`.
///
/// All lengths share the unit of the calibration row; the result is in that unit too.
pub fn pixel_wavelength(px: f64, cal: &GratingCalibration, m_order: f64, center_wl: f64) -> f64 {
    let n = px - (cal.n0 + cal.offset_adjust * center_wl);
    let half_gamma = 0.5 * cal.gamma;

    let psi = (m_order * center_wl / (2.0 * cal.d_grating * half_gamma.cos())).asin();
    let eta = (n * cal.x_pixel * cal.delta.cos() / (cal.f + n * cal.x_pixel * cal.delta.sin())).atan();

    (cal.d_grating / m_order) * ((psi - half_gamma).sin() + (psi + half_gamma + eta).sin())
        + cal.curvature * n * n
}

/// Spectrograph geometry as stored by the instrument.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct DeviceGeometry {
    pub focal_length_mm: f64,
    pub half_angle_deg: f64,
    pub detector_angle_deg: f64,
}

impl TryFrom<&CalibrationParams> for DeviceGeometry {
    type Error = ParseError;

    fn try_from(params: &CalibrationParams) -> Result<Self, Self::Error> {
        Ok(Self {
            focal_length_mm: params.focal_length()?,
            half_angle_deg: params.half_angle()?,
            detector_angle_deg: params.detector_angle()?,
        })
    }
}

/// Pixel offsets from the detector center: `-(cols / 2) ..= cols / 2`, dropping the last one
/// when `cols` is even so there are exactly `cols` of them.
pub fn centered_indices(cols: usize) -> impl Iterator<Item = f64> {
    let half = (cols / 2) as f64;
    (0..cols).map(move |i| i as f64 - half)
}

/// Wavelengths in nm across a detector row of `cols` pixels of `pixel_width_um`.
pub fn device_dispersion(
    geometry: &DeviceGeometry,
    grooves_per_mm: f64,
    center_wl_nm: f64,
    m_order: f64,
    cols: usize,
    pixel_width_um: f64,
) -> Vec<f64> {
    // Everything in metres and radians.
    let d = (1.0 / grooves_per_mm) * 1e-3;
    let f = geometry.focal_length_mm * 1e-3;
    let w = pixel_width_um * 1e-6;
    let cwl = center_wl_nm * 1e-9;
    let da = geometry.detector_angle_deg.to_radians();
    let ha = geometry.half_angle_deg.to_radians();

    let grat_angle = (m_order * cwl / (2.0 * d * ha.cos())).asin();

    centered_indices(cols)
        .map(|n| {
            let offset_angle = ((n * w * da.cos()) / (f + n * w * da.sin())).atan();
            (d / m_order) * ((grat_angle - ha).sin() + (grat_angle + ha + offset_angle).sin()) * 1e9
        })
        .collect()
}

/// Strategy selected from configuration and the current instrument state.
#[derive(Debug, PartialEq, Clone)]
pub enum Dispersion {
    /// User calibration of the selected grating.
    Calibrated {
        calibration: GratingCalibration,
        m_order: f64,
        center_wl_nm: f64,
        /// On-chip binning; pixel `p` covers raw pixels `binning * p ..`.
        binning: u32,
    },
    /// EEPROM geometry plus the groove density of the selected grating.
    Device {
        geometry: DeviceGeometry,
        grooves_per_mm: f64,
        m_order: f64,
        center_wl_nm: f64,
        pixel_width_um: f64,
    },
    /// A mirror has no dispersion; pixel indices pass through unchanged.
    Mirror,
}

impl Dispersion {
    /// Map pixel indices to wavelengths.
    ///
    /// [`Dispersion::Device`] only uses the number of pixels, since its indices are always
    /// centered on the detector.
    pub fn compute_wavelengths(&self, pixels: &[f64]) -> Vec<f64> {
        match self {
            Dispersion::Calibrated {
                calibration,
                m_order,
                center_wl_nm,
                binning,
            } => {
                let binning = f64::from(*binning);
                pixels
                    .iter()
                    .map(|px| binning * px + 0.5 * (binning - 1.0))
                    .map(|px| pixel_wavelength(px, calibration, *m_order, *center_wl_nm))
                    .collect()
            }
            Dispersion::Device {
                geometry,
                grooves_per_mm,
                m_order,
                center_wl_nm,
                pixel_width_um,
            } => device_dispersion(
                geometry,
                *grooves_per_mm,
                *center_wl_nm,
                *m_order,
                pixels.len(),
                *pixel_width_um,
            ),
            Dispersion::Mirror => pixels.to_vec(),
        }
    }
}
