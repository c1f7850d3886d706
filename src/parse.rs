//! Parsers turning response payloads into typed values.
//!
//! Every parser takes the payload as returned by [`Protocol::execute`](crate::protocol::Protocol::execute),
//! i.e. with the `" ok\r\n"` terminator already removed and surrounding whitespace trimmed.

use core::str::FromStr;

use thiserror::Error;

use crate::types::{Blaze, ExitMirror, Grating, GratingTable, Slit};

/// Marks the currently selected grating in the `?GRATINGS` listing.
pub const SELECTED_MARKER: char = '\x1a';

/// Slit replies meaning no motor is fitted.
const NO_MOTOR_REPLIES: [&str; 2] = ["no motor", "no slit"];

/// Scalar keys of the `MONO-EESTATUS` dump.
pub const SCALAR_KEYS: [&str; 4] = ["grating", "focal length", "half angle", "detector angle"];
/// Array keys of the `MONO-EESTATUS` dump.
pub const ARRAY_KEYS: [&str; 2] = ["offset", "adjust"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("`{key}`: cannot parse `{text}` as a number")]
    Scalar { key: &'static str, text: String },
    #[error("`{key}`: cannot parse array element `{token}`")]
    Array { key: &'static str, token: String },
    #[error("`{0}` missing from response")]
    Missing(&'static str),
    #[error("`{key}`: unexpected payload `{payload}`")]
    Unexpected { key: &'static str, payload: String },
    #[error("grating {0} is not in the grating table")]
    UnknownGrating(u8),
}

/// Split on single spaces, dropping the empties left by runs of spaces.
fn tokens(line: &str) -> impl DoubleEndedIterator<Item = &str> {
    line.split(' ').filter(|t| !t.is_empty())
}

/// Collapse runs of spaces into one.
fn collapse_spaces(line: &str) -> String {
    tokens(line).collect::<Vec<_>>().join(" ")
}

fn parse_token<T: FromStr>(key: &'static str, text: &str) -> Result<T, ParseError> {
    text.parse().map_err(|_| ParseError::Scalar {
        key,
        text: text.into(),
    })
}

fn first_token<'a>(key: &'static str, payload: &'a str) -> Result<&'a str, ParseError> {
    payload
        .split_whitespace()
        .next()
        .ok_or(ParseError::Missing(key))
}

/// Parse the `?GRATINGS` listing.
///
/// ```text
/// \x1a1  300 g/mm BLZ=  500NM
/// 2  300 g/mm BLZ=  1.0UM
/// 3  Mirror
/// 4  Not Installed
/// ```
///
/// Five-token rows are gratings (`id grooves g/mm BLZ= blaze`), two-token rows ending in
/// `Mirror` are mirror slots. Anything else, such as `Not Installed` or the trailing `ok`, is
/// skipped. The selection marker is dropped; use `?GRATING` to learn the active slot.
pub fn parse_grating_table(payload: &str) -> Result<GratingTable, ParseError> {
    let mut gratings = Vec::new();

    for line in payload.lines() {
        let line = line.trim().trim_matches(SELECTED_MARKER).trim();
        let fields: Vec<&str> = tokens(line).collect();

        match fields.as_slice() {
            [id, grooves, _, _, blaze] => gratings.push(Grating {
                id: parse_token("grating id", id)?,
                grooves: parse_token("grooves", grooves)?,
                blaze: Blaze::Label((*blaze).into()),
                label: fields[1..].join(" "),
            }),
            [id, "Mirror"] => gratings.push(Grating {
                id: parse_token("grating id", id)?,
                grooves: 0,
                blaze: Blaze::None,
                label: "Mirror".into(),
            }),
            _ => {}
        }
    }

    Ok(GratingTable::new(gratings))
}

/// Geometry stored in the instrument's EEPROM, as dumped by `MONO-EESTATUS`.
///
/// Keys missing from the dump stay `None`; the accessors report them as
/// [`ParseError::Missing`] rather than defaulting to zero.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct CalibrationParams {
    pub grating: Option<f64>,
    /// Millimetres.
    pub focal_length: Option<f64>,
    /// Degrees.
    pub half_angle: Option<f64>,
    /// Degrees.
    pub detector_angle: Option<f64>,
    pub offset: Option<Vec<i32>>,
    pub adjust: Option<Vec<i32>>,
}

impl CalibrationParams {
    pub fn grating(&self) -> Result<f64, ParseError> {
        self.grating.ok_or(ParseError::Missing("grating"))
    }

    pub fn focal_length(&self) -> Result<f64, ParseError> {
        self.focal_length.ok_or(ParseError::Missing("focal length"))
    }

    pub fn half_angle(&self) -> Result<f64, ParseError> {
        self.half_angle.ok_or(ParseError::Missing("half angle"))
    }

    pub fn detector_angle(&self) -> Result<f64, ParseError> {
        self.detector_angle
            .ok_or(ParseError::Missing("detector angle"))
    }

    pub fn offset(&self) -> Result<&[i32], ParseError> {
        self.offset.as_deref().ok_or(ParseError::Missing("offset"))
    }

    pub fn adjust(&self) -> Result<&[i32], ParseError> {
        self.adjust.as_deref().ok_or(ParseError::Missing("adjust"))
    }
}

/// Find the first line starting with `key` and return its last token as a float.
fn scalar(key: &'static str, lines: &[String]) -> Result<Option<f64>, ParseError> {
    let Some(line) = lines.iter().find(|l| l.starts_with(key)) else {
        return Ok(None);
    };
    let last = tokens(line).next_back().unwrap_or_default();
    parse_token(key, last).map(Some)
}

/// Find the first line starting with `key` and return every token after the key as an integer.
fn array(key: &'static str, lines: &[String]) -> Result<Option<Vec<i32>>, ParseError> {
    let Some(line) = lines.iter().find(|l| l.starts_with(key)) else {
        return Ok(None);
    };
    tokens(line)
        .skip(1)
        .map(|token| {
            token.parse().map_err(|_| ParseError::Array {
                key,
                token: token.into(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Parse the `MONO-EESTATUS` dump.
pub fn parse_calibration_params(payload: &str) -> Result<CalibrationParams, ParseError> {
    let lines: Vec<String> = payload
        .lines()
        .map(|l| collapse_spaces(l.trim_end()))
        .filter(|l| !l.is_empty())
        .collect();

    let [grating, focal_length, half_angle, detector_angle] = SCALAR_KEYS;
    let [offset, adjust] = ARRAY_KEYS;

    Ok(CalibrationParams {
        grating: scalar(grating, &lines)?,
        focal_length: scalar(focal_length, &lines)?,
        half_angle: scalar(half_angle, &lines)?,
        detector_angle: scalar(detector_angle, &lines)?,
        offset: array(offset, &lines)?,
        adjust: array(adjust, &lines)?,
    })
}

/// `?NM` answers e.g. `500.000 nm`.
pub fn parse_wavelength(payload: &str) -> Result<f64, ParseError> {
    parse_token("wavelength", first_token("wavelength", payload)?)
}

/// Turret and grating queries answer a bare integer.
pub fn parse_index(key: &'static str, payload: &str) -> Result<u8, ParseError> {
    parse_token(key, first_token(key, payload)?)
}

/// Slit queries answer e.g. `480 um`, or `no motor`.
pub fn parse_slit(payload: &str) -> Result<Slit, ParseError> {
    let payload = payload.trim();
    if NO_MOTOR_REPLIES.contains(&payload) {
        return Ok(Slit::NoMotor);
    }
    parse_token("slit", first_token("slit", payload)?).map(Slit::Microns)
}

/// `MONO-?DONE` answers `1` when the last move has finished, `0` otherwise.
pub fn parse_done(payload: &str) -> Result<bool, ParseError> {
    let value: i32 = parse_token("done", payload.trim())?;
    Ok(value != 0)
}

pub fn parse_exit_mirror(payload: &str) -> Result<ExitMirror, ParseError> {
    let payload = payload.trim();
    ExitMirror::from_str(payload).map_err(|_| ParseError::Unexpected {
        key: "exit mirror",
        payload: payload.into(),
    })
}
