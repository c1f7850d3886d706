//! Serial port transport backed by the [`serialport`] crate.
//!
//! The monochromator talks 9600 baud, 8 data bits, no parity, one stop bit and no flow control.
//! Every read is bounded by the configured timeout, which the protocol engine counts as a missed
//! byte.

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::config::SerialConfig;

/// An open serial port, exclusively owned by one session. Dropping it closes the port.
pub struct SerialTransport(Box<dyn SerialPort>);

/// [`std::io::Error`] carrying an [`embedded_io::ErrorKind`].
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct IoError(#[from] std::io::Error);

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind as EK;
        use std::io::ErrorKind as IK;
        match self.0.kind() {
            IK::NotFound => EK::NotFound,
            IK::PermissionDenied => EK::PermissionDenied,
            IK::ConnectionRefused => EK::ConnectionRefused,
            IK::ConnectionReset => EK::ConnectionReset,
            IK::ConnectionAborted => EK::ConnectionAborted,
            IK::NotConnected => EK::NotConnected,
            IK::AddrInUse => EK::AddrInUse,
            IK::AddrNotAvailable => EK::AddrNotAvailable,
            IK::BrokenPipe => EK::BrokenPipe,
            IK::AlreadyExists => EK::AlreadyExists,
            IK::InvalidInput => EK::InvalidInput,
            IK::InvalidData => EK::InvalidData,
            IK::TimedOut => EK::TimedOut,
            IK::Interrupted => EK::Interrupted,
            IK::Unsupported => EK::Unsupported,
            IK::OutOfMemory => EK::OutOfMemory,
            _ => EK::Other,
        }
    }
}

impl SerialTransport {
    /// Open and configure the port, then discard anything a previous session left buffered.
    pub fn open(config: &SerialConfig) -> serialport::Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout())
            .open()?;
        port.clear(ClearBuffer::All)?;
        log::info!("opened {} at {} baud", config.port, config.baud_rate);
        Ok(Self(port))
    }

    pub fn name(&self) -> Option<String> {
        self.0.name()
    }
}

impl embedded_io::ErrorType for SerialTransport {
    type Error = IoError;
}

impl embedded_io::Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}
