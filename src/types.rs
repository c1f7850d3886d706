//! This module contains the values the monochromator reports, and the session cache built from them.

use core::ops::RangeInclusive;

use strum_macros::{Display, EnumIter, EnumString};

use crate::parse::CalibrationParams;

/// Grating slots addressable with `<n> GRATING`.
pub const GRATING_RANGE: RangeInclusive<u8> = 1..=9;
/// Turrets addressable with `<n> TURRET`.
pub const TURRET_RANGE: RangeInclusive<u8> = 1..=3;
/// Motorised slit travel, in microns.
pub const SLIT_RANGE_UM: RangeInclusive<u16> = 5..=3000;

/// Position of the exit mirror.
///
/// Parsing is case-insensitive since the device answers in lower case but expects upper case.
#[derive(Debug, Display, EnumString, EnumIter, PartialEq, Eq, Clone, Copy, Default)]
#[strum(ascii_case_insensitive)]
pub enum ExitMirror {
    /// Front exit port, usually the CCD.
    #[default]
    #[strum(serialize = "FRONT")]
    Front,
    /// Side exit port, usually a single channel detector.
    #[strum(serialize = "SIDE")]
    Side,
}

/// Which of the two side slits a command addresses.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SlitPort {
    Entrance,
    Exit,
}

impl SlitPort {
    /// The command prefix for this slit.
    pub const fn prefix(self) -> &'static str {
        match self {
            SlitPort::Entrance => "SIDE-ENT-SLIT",
            SlitPort::Exit => "SIDE-EXIT-SLIT",
        }
    }
}

/// A slit width reading.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Slit {
    /// The slit has no motor fitted (`"no motor"` / `"no slit"`).
    NoMotor,
    /// Width in microns.
    Microns(u16),
}

impl Slit {
    /// Value reported for a slit without a motor when flattened to an integer.
    pub const NO_MOTOR: i32 = -1;
}

impl From<Slit> for i32 {
    fn from(value: Slit) -> Self {
        match value {
            Slit::NoMotor => Slit::NO_MOTOR,
            Slit::Microns(um) => um as i32,
        }
    }
}

/// Blaze wavelength of a grating as printed by the device, e.g. `500NM` or `1.0UM`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Blaze {
    /// Mirror slots have no blaze.
    None,
    Label(String),
}

/// One populated turret slot from the `?GRATINGS` listing.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Grating {
    /// Slot number, 1-based.
    pub id: u8,
    /// Groove density in g/mm. `0` for a mirror.
    pub grooves: u32,
    pub blaze: Blaze,
    /// Human readable description, e.g. `300 g/mm BLZ= 500NM`.
    pub label: String,
}

impl Grating {
    pub fn is_mirror(&self) -> bool {
        self.grooves == 0
    }
}

/// The installed gratings, in the order the device listed them.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct GratingTable {
    gratings: Vec<Grating>,
}

impl GratingTable {
    pub fn new(gratings: Vec<Grating>) -> Self {
        Self { gratings }
    }

    /// `(id, label)` pairs, suitable for a choice list.
    pub fn entries(&self) -> impl Iterator<Item = (u8, &str)> {
        self.gratings.iter().map(|g| (g.id, g.label.as_str()))
    }

    /// Look up a slot by its id. Ids need not be contiguous.
    pub fn get(&self, id: u8) -> Option<&Grating> {
        self.gratings.iter().find(|g| g.id == id)
    }

    pub fn label(&self, id: u8) -> Option<&str> {
        self.get(id).map(|g| g.label.as_str())
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Grating> {
        self.gratings.iter()
    }

    pub fn len(&self) -> usize {
        self.gratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gratings.is_empty()
    }
}

/// A single value read back from the device, ready to be stored in [`InstrumentState`].
#[derive(Debug, PartialEq, Clone)]
pub enum Reading {
    Wavelength(f64),
    Turret(u8),
    Grating(u8),
    ExitMirror(ExitMirror),
    EntranceSlit(Slit),
    ExitSlit(Slit),
    Calibration(CalibrationParams),
}

/// Last values read from the device.
///
/// Each field is only authoritative right after the read that filled it. Writes never touch
/// this cache; re-read after a write to observe the new value.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct InstrumentState {
    pub wavelength_nm: Option<f64>,
    pub turret: Option<u8>,
    pub grating: Option<u8>,
    pub exit_mirror: Option<ExitMirror>,
    pub entrance_slit: Option<Slit>,
    pub exit_slit: Option<Slit>,
    pub calibration: Option<CalibrationParams>,
}

impl InstrumentState {
    /// Store a reading, replacing whatever was cached for that field.
    pub fn apply(&mut self, reading: Reading) {
        match reading {
            Reading::Wavelength(nm) => self.wavelength_nm = Some(nm),
            Reading::Turret(turret) => self.turret = Some(turret),
            Reading::Grating(grating) => self.grating = Some(grating),
            Reading::ExitMirror(mirror) => self.exit_mirror = Some(mirror),
            Reading::EntranceSlit(slit) => self.entrance_slit = Some(slit),
            Reading::ExitSlit(slit) => self.exit_slit = Some(slit),
            Reading::Calibration(params) => self.calibration = Some(params),
        }
    }
}
