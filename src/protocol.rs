//! The command/response engine.
//!
//! A command is written as Latin-1 followed by a single carriage return. After a settle delay the
//! reply is read one byte at a time until the buffer ends in `" ok\r\n"`. Every single-byte read
//! is bounded by the transport's own timeout; more than [`MAX_MISSED_READS`] empty reads in a row
//! abandon the command with [`Error::Timeout`], so a call never blocks longer than
//! `settle + (MAX_MISSED_READS + 1) * transport timeout` past the last byte received.
//!
//! The engine is not re-entrant. Hosts with several threads must serialise calls themselves.

use embedded_io::{Error as _, ErrorKind};
use fugit::MillisDurationU32;

use crate::{
    command::MonoCommand,
    error::{Error, Result},
};

/// Marks the end of every reply.
pub const SENTINEL: &[u8; 5] = b" ok\r\n";
/// Consecutive empty reads tolerated before a command is abandoned.
pub const MAX_MISSED_READS: u8 = 3;
/// What every command answers while no transport is attached.
pub const DUMMY_REPLY: &str = "0";

/// How a read cycle ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum ReadOutcome {
    /// The sentinel was seen. `missed` counts every empty read along the way.
    Terminated { missed: u32 },
    /// Too many empty reads in a row.
    Exhausted { consecutive: u8 },
}

/// Drives one monochromator over any interface implementing [embedded_io::Read] & [embedded_io::Write].
///
/// `L` is the capacity of the receive buffer. The `?GRATINGS` and `MONO-EESTATUS` dumps are the
/// longest replies and fit comfortably in the default.
pub struct Protocol<S: embedded_io::Read + embedded_io::Write, const L: usize = 2048> {
    /// `None` runs the engine in dummy mode.
    interface: Option<S>,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> Protocol<S, L> {
    /// Create a new engine owning the given interface.
    ///
    /// The interface should already have discarded any stale bytes, see
    /// [`SerialTransport::open`](crate::transport::SerialTransport::open).
    pub fn new(interface: S) -> Self {
        Self {
            interface: Some(interface),
        }
    }

    /// An engine that never touches hardware and answers [`DUMMY_REPLY`] to everything.
    pub fn dummy() -> Self {
        Self { interface: None }
    }

    pub fn is_dummy(&self) -> bool {
        self.interface.is_none()
    }

    pub fn interface(&self) -> Option<&S> {
        self.interface.as_ref()
    }

    pub fn interface_mut(&mut self) -> Option<&mut S> {
        self.interface.as_mut()
    }

    /// Give back the interface. Dropping it closes the port.
    pub fn into_inner(self) -> Option<S> {
        self.interface
    }

    /// Send a typed command with its own settle time.
    pub fn send(&mut self, command: &MonoCommand) -> Result<String, S::Error> {
        self.execute(&command.to_string(), command.settle_time())
    }

    /// Send `command`, wait `settle`, then collect the reply up to the sentinel.
    ///
    /// Returns the payload with the sentinel removed and surrounding whitespace trimmed.
    pub fn execute(&mut self, command: &str, settle: MillisDurationU32) -> Result<String, S::Error> {
        log::debug!("write_command cmd: {command}");
        let frame = encode_command(command)?;

        let Some(interface) = self.interface.as_mut() else {
            return Ok(DUMMY_REPLY.into());
        };

        interface.write_all(&frame).map_err(Error::SerialError)?;
        interface.flush().map_err(Error::SerialError)?;

        std::thread::sleep(std::time::Duration::from_millis(settle.to_millis().into()));

        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        match read_until_sentinel(interface, &mut buff)? {
            ReadOutcome::Terminated { missed } => {
                if missed > 0 {
                    log::debug!("`{command}` answered after {missed} empty reads");
                }
            }
            ReadOutcome::Exhausted { consecutive } => {
                log::warn!("`{command}`: no reply terminator after {consecutive} empty reads");
                return Err(Error::Timeout {
                    misses: consecutive,
                });
            }
        }

        let payload = decode_latin1(&buff[..buff.len() - SENTINEL.len()]);
        log::debug!("response {payload:?}");
        Ok(payload.trim().to_string())
    }
}

/// Encode as Latin-1 and append the carriage return.
fn encode_command<I: embedded_io::Error>(command: &str) -> Result<Vec<u8>, I> {
    let mut frame = Vec::with_capacity(command.len() + 1);
    for c in command.chars() {
        match u8::try_from(c) {
            Ok(b'\r') | Err(_) => {
                return Err(Error::invalid_range("command", command.escape_debug()));
            }
            Ok(byte) => frame.push(byte),
        }
    }
    frame.push(b'\r');
    Ok(frame)
}

/// Each byte maps to the code point of the same value, so control bytes such as 0x1A survive.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

fn read_until_sentinel<S: embedded_io::Read, const L: usize>(
    interface: &mut S,
    buff: &mut heapless::Vec<u8, L>,
) -> Result<ReadOutcome, S::Error> {
    let mut consecutive = 0u8;
    let mut missed = 0u32;
    // Last bytes received, kept separately so the sentinel is still found once `buff` is full.
    let mut window = [0u8; SENTINEL.len()];
    let mut overflowed = false;

    while &window != SENTINEL {
        let mut byte = [0u8; 1];
        match interface.read(&mut byte) {
            Ok(0) => {}
            Ok(_) => {
                consecutive = 0;
                window.rotate_left(1);
                window[SENTINEL.len() - 1] = byte[0];
                if !overflowed && buff.push(byte[0]).is_err() {
                    log::warn!("reply longer than {} bytes, discarding the rest", L);
                    overflowed = true;
                }
                continue;
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut) => {}
            Err(e) => return Err(Error::SerialError(e)),
        }

        consecutive += 1;
        missed += 1;
        log::debug!("no character returned, missed {consecutive} so far");
        if consecutive > MAX_MISSED_READS {
            break;
        }
    }

    if overflowed {
        return Err(Error::BufferError);
    }
    if &window != SENTINEL {
        return Ok(ReadOutcome::Exhausted { consecutive });
    }
    Ok(ReadOutcome::Terminated { missed })
}

/// Transport placeholder for sessions that never attach hardware.
#[derive(Debug, Default)]
pub struct Offline;

#[derive(thiserror::Error, Debug)]
#[error("no transport attached")]
pub struct OfflineError;

impl embedded_io::Error for OfflineError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NotConnected
    }
}

impl embedded_io::ErrorType for Offline {
    type Error = OfflineError;
}

impl embedded_io::Read for Offline {
    fn read(&mut self, _buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        Err(OfflineError)
    }
}

impl embedded_io::Write for Offline {
    fn write(&mut self, _buf: &[u8]) -> core::result::Result<usize, Self::Error> {
        Err(OfflineError)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Err(OfflineError)
    }
}
