//! We use this mocking module in unit tests to emulate a serial port.
//!
//! Reads follow a script of bytes and timeouts. Once the script runs dry every read times out,
//! like a real port whose device has gone quiet. Optionally a [`SimulatedMono`] answers each
//! carriage-return terminated command written to the port.

const CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy)]
enum ReadEvent {
    Byte(u8),
    Timeout,
}

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, CAPACITY>,
    /// Scripted bytes and timeouts to hand out on read
    read_script: heapless::Deque<ReadEvent, CAPACITY>,
    /// Number of reads that returned a timeout
    timeouts_served: usize,
    /// Answers commands as they are written, when set
    device: Option<SimulatedMono>,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MockSerialError {
    /// Simulated timeout error
    #[error("timed out")]
    Timeout,
    /// Simulated buffer overflow
    #[error("buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        for &byte in buf {
            self.write_buffer
                .push(byte)
                .map_err(|_| MockSerialError::BufferOverflow)?;
            if byte == b'\r' {
                self.answer_last_command()?;
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        let mut count = 0;
        while count < buf.len() {
            match self.read_script.front() {
                Some(ReadEvent::Byte(byte)) => {
                    buf[count] = *byte;
                    count += 1;
                    self.read_script.pop_front();
                }
                // A timeout only surfaces when nothing has been read yet.
                Some(ReadEvent::Timeout) if count > 0 => break,
                Some(ReadEvent::Timeout) => {
                    self.read_script.pop_front();
                    self.timeouts_served += 1;
                    return Err(MockSerialError::Timeout);
                }
                None if count > 0 => break,
                None => {
                    self.timeouts_served += 1;
                    return Err(MockSerialError::Timeout);
                }
            }
        }

        Ok(count)
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_script: heapless::Deque::new(),
            timeouts_served: 0,
            device: None,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// A port with a [`SimulatedMono`] on the other end.
    pub fn simulated(device: SimulatedMono) -> Self {
        Self {
            device: Some(device),
            ..Self::new()
        }
    }

    /// Replace the read script with `data`.
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_script.clear();
        self.append_read_data(data)
    }

    /// Append `data` to the read script.
    pub fn append_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        for &byte in data {
            self.read_script
                .push_back(ReadEvent::Byte(byte))
                .map_err(|_| MockSerialError::BufferOverflow)?;
        }
        Ok(())
    }

    /// Append `count` read timeouts to the read script.
    pub fn append_timeouts(&mut self, count: usize) {
        for _ in 0..count {
            // Tests never queue anywhere near the capacity.
            let _ = self.read_script.push_back(ReadEvent::Timeout);
        }
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Commands written so far, without their carriage returns.
    pub fn written_commands(&self) -> Vec<String> {
        self.write_buffer
            .split(|&b| b == b'\r')
            .filter(|c| !c.is_empty())
            .map(|c| c.iter().copied().map(char::from).collect())
            .collect()
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// How many reads have returned a timeout.
    pub fn timeouts_served(&self) -> usize {
        self.timeouts_served
    }

    pub fn device(&self) -> Option<&SimulatedMono> {
        self.device.as_ref()
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    fn answer_last_command(&mut self) -> Result<(), MockSerialError> {
        if self.device.is_none() {
            return Ok(());
        }
        let command = self.written_commands().pop().unwrap_or_default();
        let reply = match self.device.as_mut() {
            Some(device) => device.respond(&command),
            None => return Ok(()),
        };
        self.append_read_data(reply.as_bytes())?;
        self.append_read_data(b" ok\r\n")
    }
}

/// Turret slots of the simulated instrument. Slots 4-9 are empty.
const SLOTS: [&str; 3] = ["1  300 g/mm BLZ=  500NM ", "2  1200 g/mm BLZ=  750NM ", "3  Mirror"];

const EESTATUS: &str = "SP-2-300i\r\n\
                        grating       1\r\n\
                        focal length  300.0\r\n\
                        half angle    15.0\r\n\
                        detector angle  0.5\r\n\
                        offset   0  0  0  0  0  0  0  0  0\r\n\
                        adjust   1000  1000  1000  0  0  0  0  0  0\r\n";

/// Just enough of a monochromator controller to answer every command the driver sends.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedMono {
    pub wavelength_nm: f64,
    pub turret: u8,
    pub grating: u8,
    pub exit_mirror: String,
    /// `None` means no motor is fitted.
    pub entrance_slit: Option<u16>,
    pub exit_slit: Option<u16>,
}

impl Default for SimulatedMono {
    fn default() -> Self {
        Self {
            wavelength_nm: 500.0,
            turret: 1,
            grating: 1,
            exit_mirror: "FRONT".into(),
            entrance_slit: Some(100),
            exit_slit: None,
        }
    }
}

impl SimulatedMono {
    fn respond(&mut self, command: &str) -> String {
        match command {
            "MONO-?DONE" => "1".into(),
            "?NM" => format!("{:.3} nm", self.wavelength_nm),
            "?GRATINGS" => self.listing(),
            "?TURRET" => self.turret.to_string(),
            "?GRATING" => self.grating.to_string(),
            "EXIT-MIRROR ?MIRROR" => self.exit_mirror.to_lowercase(),
            "SIDE-ENT-SLIT ?MICRONS" => slit_reply(self.entrance_slit),
            "SIDE-EXIT-SLIT ?MICRONS" => slit_reply(self.exit_slit),
            "SIDE-ENT-SLIT SHOME" => {
                self.entrance_slit = self.entrance_slit.map(|_| 10);
                String::new()
            }
            "MONO-EESTATUS" => EESTATUS.into(),
            "MODEL" => "SP-2-300i".into(),
            "SERIAL" => "23001234".into(),
            other => self.apply_setting(other),
        }
    }

    fn apply_setting(&mut self, command: &str) -> String {
        let words: Vec<&str> = command.split(' ').collect();
        let applied = match words.as_slice() {
            [nm, "NM" | "GOTO" | ">NM"] => nm.parse().map(|nm| self.wavelength_nm = nm).is_ok(),
            [n, "TURRET"] => n.parse().map(|n| self.turret = n).is_ok(),
            [n, "GRATING"] => n.parse().map(|n| self.grating = n).is_ok(),
            ["EXIT-MIRROR", position] => {
                self.exit_mirror = position.to_string();
                true
            }
            ["SIDE-ENT-SLIT", um, "MICRONS"] if self.entrance_slit.is_some() => {
                um.parse().map(|um| self.entrance_slit = Some(um)).is_ok()
            }
            ["SIDE-EXIT-SLIT", um, "MICRONS"] if self.exit_slit.is_some() => {
                um.parse().map(|um| self.exit_slit = Some(um)).is_ok()
            }
            _ => false,
        };
        if applied { String::new() } else { "?".into() }
    }

    fn listing(&self) -> String {
        let mut listing = String::new();
        for (index, slot) in SLOTS.iter().enumerate() {
            if index + 1 == self.grating as usize {
                listing.push('\x1a');
            }
            listing.push_str(slot);
            listing.push_str("\r\n");
        }
        for id in SLOTS.len() + 1..=9 {
            listing.push_str(&format!("{id}  Not Installed     \r\n"));
        }
        listing
    }
}

fn slit_reply(slit: Option<u16>) -> String {
    match slit {
        Some(um) => format!("{um} um"),
        None => "no motor".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn test_new_mock_serial() {
        let mock = MockSerial::new();
        assert_eq!(mock.written_data().len(), 0);
        assert_eq!(mock.timeouts_served(), 0);
        assert!(mock.device().is_none());
    }

    #[test]
    fn test_write_multiple_times() {
        let mut mock = MockSerial::new();
        mock.write(b"Hello, ").unwrap();
        mock.write(b"World!").unwrap();
        assert_eq!(mock.written_data(), b"Hello, World!");
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; CAPACITY + 1];

        let result = mock.write(&large_data);
        assert_eq!(result, Err(MockSerialError::BufferOverflow));
    }

    #[test]
    fn test_read_partial_data() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Long response data").unwrap();

        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer), Ok(5));
        assert_eq!(&buffer, b"Long ");
    }

    #[test]
    fn test_read_times_out_when_exhausted() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Hi").unwrap();

        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer), Ok(2));

        let result = mock.read(&mut buffer);
        assert_eq!(result, Err(MockSerialError::Timeout));
        assert_eq!(mock.timeouts_served(), 1);
    }

    #[test]
    fn test_scripted_timeouts_interleave() {
        let mut mock = MockSerial::new();
        mock.append_read_data(b"a").unwrap();
        mock.append_timeouts(1);
        mock.append_read_data(b"b").unwrap();

        let mut buffer = [0u8; 4];
        assert_eq!(mock.read(&mut buffer), Ok(1));
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::Timeout));
        assert_eq!(mock.read(&mut buffer), Ok(1));
        assert_eq!(buffer[0], b'b');
    }

    #[test]
    fn test_error_flags() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(mock.write(b"test").is_err());
        assert!(mock.flush().is_err());
        assert!(mock.written_data().is_empty());

        mock.set_read_data(b"data").unwrap();
        mock.set_read_error(true);
        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::SimulatedError));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(MockSerialError::Timeout.kind(), embedded_io::ErrorKind::TimedOut);
        assert_eq!(
            MockSerialError::BufferOverflow.kind(),
            embedded_io::ErrorKind::OutOfMemory
        );
        assert_eq!(MockSerialError::SimulatedError.kind(), embedded_io::ErrorKind::Other);
    }

    #[test]
    fn test_simulated_device_answers() {
        let mut mock = MockSerial::simulated(SimulatedMono::default());
        mock.write(b"2 TURRET\r?TURRET\r").unwrap();

        let mut buffer = [0u8; 32];
        let count = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b" ok\r\n2 ok\r\n");
        assert_eq!(mock.written_commands(), vec!["2 TURRET", "?TURRET"]);
    }

    #[test]
    fn test_simulated_listing_marks_selected_grating() {
        let device = SimulatedMono {
            grating: 2,
            ..Default::default()
        };
        let listing = device.listing();
        assert!(listing.contains("\x1a2  1200"));
        assert!(!listing.contains("\x1a1"));
        assert!(listing.contains("9  Not Installed"));
    }
}
