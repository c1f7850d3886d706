//! This crate provides an interface for communicating with and controlling Princeton Instruments
//! (Acton) SpectraPro and IsoPlane monochromators and spectrographs.
//!
//! Instruments which this should work with:
//! * SP-2150i, SP-2300i, SP-2500i, SP-2750i
//! * IsoPlane SCT-320
//!
//! It speaks the controller's ASCII command set over USB-serial or RS232. Commands end in a
//! carriage return and every reply ends in ` ok\r\n`.
//!
//! The serial port used for comms should be configured like so:
//! * Default baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//! * Flow control: None
//!
//! [`transport::SerialTransport::open`] does this from a [`config::SerialConfig`]. Any other
//! [`embedded_io`] interface can be handed to [`session::MonoSession::connect`] instead.
//!
//! Besides motion control, [`dispersion`] maps detector pixels to wavelengths, either from
//! per-grating calibration rows or from the geometry stored in the instrument.

pub mod command;
pub mod config;
pub mod dispersion;
pub mod error;
pub mod parse;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_serial;
