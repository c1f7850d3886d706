//! This module is used to define the ASCII commands understood by the monochromator.
//!
//! Each command is rendered byte-exact by its [`Display`](core::fmt::Display) impl; the
//! protocol engine appends the carriage return.

use core::fmt;

use fugit::MillisDurationU32;

use crate::types::{ExitMirror, SlitPort};

/// Settle time for ordinary queries and settings.
pub const DEFAULT_SETTLE: MillisDurationU32 = MillisDurationU32::millis(10);
/// Settle time for commands the controller takes a while to answer.
pub const SLOW_SETTLE: MillisDurationU32 = MillisDurationU32::secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonoCommand {
    /// __R__ - `MONO-?DONE`, whether the last move has completed.
    DoneStatus,
    /// __R__ - `?NM`, current center wavelength.
    ReadWavelength,
    /// __W__ - `<nm> NM`, move at the programmed scan rate and wait for completion.
    SetWavelength(f64),
    /// __W__ - `<nm> GOTO`, move at maximum speed.
    GotoWavelength(f64),
    /// __W__ - `<nm> >NM`, start a move and return immediately. Poll [`MonoCommand::DoneStatus`].
    SetWavelengthNonBlocking(f64),
    /// __R__ - `?GRATINGS`, listing of every turret slot.
    ListGratings,
    /// __R__ - `?TURRET`.
    ReadTurret,
    /// __W__ - `<n> TURRET`.
    SetTurret(u8),
    /// __R__ - `?GRATING`, the selected slot.
    ReadGrating,
    /// __W__ - `<n> GRATING`.
    SetGrating(u8),
    /// __R__ - `EXIT-MIRROR ?MIRROR`.
    ReadExitMirror,
    /// __W__ - `EXIT-MIRROR FRONT|SIDE`.
    SetExitMirror(ExitMirror),
    /// __R__ - `SIDE-ENT-SLIT ?MICRONS` / `SIDE-EXIT-SLIT ?MICRONS`.
    ReadSlit(SlitPort),
    /// __W__ - `SIDE-ENT-SLIT <um> MICRONS` / `SIDE-EXIT-SLIT <um> MICRONS`.
    SetSlit(SlitPort, u16),
    /// __W__ - `SIDE-ENT-SLIT SHOME`, drive the entrance slit to its home position.
    HomeEntranceSlit,
    /// __R__ - `MONO-EESTATUS`, dump of the EEPROM calibration.
    EepromStatus,
    /// __R__ - `MODEL`.
    Model,
    /// __R__ - `SERIAL`.
    Serial,
}

impl MonoCommand {
    /// How long to wait after writing before reading the answer.
    pub fn settle_time(&self) -> MillisDurationU32 {
        match self {
            MonoCommand::ListGratings
            | MonoCommand::EepromStatus
            | MonoCommand::SetWavelength(_)
            | MonoCommand::GotoWavelength(_) => SLOW_SETTLE,
            _ => DEFAULT_SETTLE,
        }
    }
}

impl fmt::Display for MonoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MonoCommand as MC;
        match self {
            MC::DoneStatus => f.write_str("MONO-?DONE"),
            MC::ReadWavelength => f.write_str("?NM"),
            MC::SetWavelength(nm) => write!(f, "{nm:.3} NM"),
            MC::GotoWavelength(nm) => write!(f, "{nm:.3} GOTO"),
            MC::SetWavelengthNonBlocking(nm) => write!(f, "{nm:.3} >NM"),
            MC::ListGratings => f.write_str("?GRATINGS"),
            MC::ReadTurret => f.write_str("?TURRET"),
            MC::SetTurret(turret) => write!(f, "{turret} TURRET"),
            MC::ReadGrating => f.write_str("?GRATING"),
            MC::SetGrating(grating) => write!(f, "{grating} GRATING"),
            MC::ReadExitMirror => f.write_str("EXIT-MIRROR ?MIRROR"),
            MC::SetExitMirror(mirror) => write!(f, "EXIT-MIRROR {mirror}"),
            MC::ReadSlit(port) => write!(f, "{} ?MICRONS", port.prefix()),
            MC::SetSlit(port, um) => write!(f, "{} {um} MICRONS", port.prefix()),
            MC::HomeEntranceSlit => f.write_str("SIDE-ENT-SLIT SHOME"),
            MC::EepromStatus => f.write_str("MONO-EESTATUS"),
            MC::Model => f.write_str("MODEL"),
            MC::Serial => f.write_str("SERIAL"),
        }
    }
}
