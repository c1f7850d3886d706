use crate::{
    command::MonoCommand,
    config::{CalibrationSource, DispersionConfig},
    dispersion::{DeviceGeometry, Dispersion, GratingCalibration},
    error::{Error, Result},
    parse::{self, CalibrationParams, ParseError},
    protocol::{Offline, Protocol},
    types::{
        ExitMirror, GRATING_RANGE, GratingTable, InstrumentState, Reading, SLIT_RANGE_UM, Slit,
        SlitPort, TURRET_RANGE,
    },
};

/// You can create a MonoSession using any interface which implements [embedded_io::Read] & [embedded_io::Write].
///
/// For its methods, "read" sends a query and returns the parsed answer without storing it, and
/// "write" sends a setting after checking its range. Use [`Self::apply`] or [`Self::refresh`] to
/// update the cached [`InstrumentState`].
pub struct MonoSession<S: embedded_io::Read + embedded_io::Write, const L: usize = 2048> {
    protocol: Protocol<S, L>,
    /// Queried once on connect, replaced by [`Self::read_grating_table`].
    gratings: GratingTable,
    state: InstrumentState,
}

impl MonoSession<Offline> {
    /// A session with no hardware attached. Every query answers `0`.
    ///
    /// The grating table is empty and the exit mirror reads as [`ExitMirror::Front`].
    pub fn dummy() -> Self {
        Self {
            protocol: Protocol::dummy(),
            gratings: GratingTable::default(),
            state: InstrumentState::default(),
        }
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> MonoSession<S, L> {
    /// Take ownership of an already opened interface and read the grating table.
    pub fn connect(interface: S) -> Result<Self, S::Error> {
        let mut session = Self {
            protocol: Protocol::new(interface),
            gratings: GratingTable::default(),
            state: InstrumentState::default(),
        };
        session.read_grating_table()?;
        log::info!("connected, {} gratings installed", session.gratings.len());
        Ok(session)
    }

    /// Release the interface. Dropping it closes the port.
    pub fn close(self) -> Option<S> {
        self.protocol.into_inner()
    }

    /// Whether this session runs without hardware, see [`MonoSession::dummy`].
    pub fn is_dummy(&self) -> bool {
        self.protocol.is_dummy()
    }

    /// Gratings as of the last [`Self::read_grating_table`].
    pub fn gratings(&self) -> &GratingTable {
        &self.gratings
    }

    /// Values cached by [`Self::apply`].
    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    /// Store a value returned by one of the read methods.
    pub fn apply(&mut self, reading: Reading) {
        self.state.apply(reading);
    }

    /// Direct access to the protocol engine, for commands without a typed wrapper.
    pub fn protocol(&mut self) -> &mut Protocol<S, L> {
        &mut self.protocol
    }

    fn query(&mut self, command: MonoCommand) -> Result<String, S::Error> {
        self.protocol.send(&command)
    }

    fn set(&mut self, command: MonoCommand) -> Result<(), S::Error> {
        let reply = self.protocol.send(&command)?;
        log::debug!("{command} -> {reply:?}");
        Ok(())
    }

    /// Whether the last wavelength move has finished.
    pub fn read_done_status(&mut self) -> Result<bool, S::Error> {
        let resp = self.query(MonoCommand::DoneStatus)?;
        Ok(parse::parse_done(&resp)?)
    }

    /// Return the center wavelength in nm.
    pub fn read_wavelength(&mut self) -> Result<f64, S::Error> {
        let resp = self.query(MonoCommand::ReadWavelength)?;
        Ok(parse::parse_wavelength(&resp)?)
    }

    /// Move to `nm` at the programmed scan rate, returning when the move has finished.
    pub fn write_wavelength(&mut self, nm: f64) -> Result<(), S::Error> {
        self.set(MonoCommand::SetWavelength(check_wavelength(nm)?))
    }

    /// Move to `nm` at full speed.
    pub fn write_wavelength_fast(&mut self, nm: f64) -> Result<(), S::Error> {
        self.set(MonoCommand::GotoWavelength(check_wavelength(nm)?))
    }

    /// Start a move to `nm` and return straight away. Poll [`Self::read_done_status`].
    pub fn write_wavelength_nonblocking(&mut self, nm: f64) -> Result<(), S::Error> {
        self.set(MonoCommand::SetWavelengthNonBlocking(check_wavelength(nm)?))
    }

    /// Re-query the turret listing and replace the cached grating table.
    pub fn read_grating_table(&mut self) -> Result<&GratingTable, S::Error> {
        let resp = self.query(MonoCommand::ListGratings)?;
        self.gratings = parse::parse_grating_table(&resp)?;
        Ok(&self.gratings)
    }

    /// Return the selected turret, 1 to 3.
    pub fn read_turret(&mut self) -> Result<u8, S::Error> {
        let resp = self.query(MonoCommand::ReadTurret)?;
        Ok(parse::parse_index("turret", &resp)?)
    }

    /// Select turret 1 to 3. The turret rotates before the device answers.
    pub fn write_turret(&mut self, turret: u8) -> Result<(), S::Error> {
        if !TURRET_RANGE.contains(&turret) {
            return Err(Error::invalid_range("turret", turret));
        }
        self.set(MonoCommand::SetTurret(turret))
    }

    /// Return the id of the selected grating.
    pub fn read_grating(&mut self) -> Result<u8, S::Error> {
        let resp = self.query(MonoCommand::ReadGrating)?;
        Ok(parse::parse_index("grating", &resp)?)
    }

    /// Return the id and label of the selected grating.
    pub fn read_grating_name(&mut self) -> Result<(u8, String), S::Error> {
        let id = self.read_grating()?;
        let label = self
            .gratings
            .label(id)
            .ok_or(ParseError::UnknownGrating(id))?;
        Ok((id, label.to_string()))
    }

    /// Select grating slot 1 to 9.
    pub fn write_grating(&mut self, grating: u8) -> Result<(), S::Error> {
        if !GRATING_RANGE.contains(&grating) {
            return Err(Error::invalid_range("grating", grating));
        }
        self.set(MonoCommand::SetGrating(grating))
    }

    /// Return the exit mirror position. A dummy session always reports [`ExitMirror::Front`].
    pub fn read_exit_mirror(&mut self) -> Result<ExitMirror, S::Error> {
        let resp = self.query(MonoCommand::ReadExitMirror)?;
        if self.is_dummy() {
            return Ok(ExitMirror::default());
        }
        Ok(parse::parse_exit_mirror(&resp)?)
    }

    /// Swing the exit mirror to the given port.
    pub fn write_exit_mirror(&mut self, position: ExitMirror) -> Result<(), S::Error> {
        self.set(MonoCommand::SetExitMirror(position))
    }

    /// Like [`Self::write_exit_mirror`], taking `front` or `side` in any case.
    pub fn write_exit_mirror_named(&mut self, position: &str) -> Result<(), S::Error> {
        let position = position
            .parse::<ExitMirror>()
            .map_err(|_| Error::invalid_range("exit mirror", position))?;
        self.write_exit_mirror(position)
    }

    fn read_slit(&mut self, port: SlitPort) -> Result<Slit, S::Error> {
        let resp = self.query(MonoCommand::ReadSlit(port))?;
        Ok(parse::parse_slit(&resp)?)
    }

    fn write_slit(&mut self, port: SlitPort, um: u16) -> Result<(), S::Error> {
        if !SLIT_RANGE_UM.contains(&um) {
            let parameter = match port {
                SlitPort::Entrance => "entrance slit",
                SlitPort::Exit => "exit slit",
            };
            return Err(Error::invalid_range(parameter, um));
        }
        self.set(MonoCommand::SetSlit(port, um))
    }

    /// Entrance slit width, or [`Slit::NoMotor`].
    pub fn read_entrance_slit(&mut self) -> Result<Slit, S::Error> {
        self.read_slit(SlitPort::Entrance)
    }

    /// Set the entrance slit width in microns, 5 to 3000.
    pub fn write_entrance_slit(&mut self, um: u16) -> Result<(), S::Error> {
        self.write_slit(SlitPort::Entrance, um)
    }

    /// Drive the entrance slit to its home position.
    pub fn home_entrance_slit(&mut self) -> Result<(), S::Error> {
        self.set(MonoCommand::HomeEntranceSlit)
    }

    /// Exit slit width, or [`Slit::NoMotor`].
    pub fn read_exit_slit(&mut self) -> Result<Slit, S::Error> {
        self.read_slit(SlitPort::Exit)
    }

    /// Set the exit slit width in microns, 5 to 3000.
    pub fn write_exit_slit(&mut self, um: u16) -> Result<(), S::Error> {
        self.write_slit(SlitPort::Exit, um)
    }

    /// Read the geometry stored in the instrument EEPROM.
    ///
    /// Device dispersion uses the snapshot cached by [`Self::refresh`], or stored with
    /// [`Reading::Calibration`].
    pub fn read_calibration_params(&mut self) -> Result<CalibrationParams, S::Error> {
        let resp = self.query(MonoCommand::EepromStatus)?;
        let params = parse::parse_calibration_params(&resp)?;
        log::debug!("calibration params: {params:?}");
        Ok(params)
    }

    /// Return the model string, e.g. `SP-2-300i`.
    pub fn read_model(&mut self) -> Result<String, S::Error> {
        self.query(MonoCommand::Model)
    }

    /// Return the instrument serial number as reported.
    pub fn read_serial(&mut self) -> Result<String, S::Error> {
        self.query(MonoCommand::Serial)
    }

    /// Read every session value, including the calibration snapshot, and cache the results.
    pub fn refresh(&mut self) -> Result<&InstrumentState, S::Error> {
        let readings = [
            Reading::Wavelength(self.read_wavelength()?),
            Reading::Turret(self.read_turret()?),
            Reading::Grating(self.read_grating()?),
            Reading::ExitMirror(self.read_exit_mirror()?),
            Reading::EntranceSlit(self.read_entrance_slit()?),
            Reading::ExitSlit(self.read_exit_slit()?),
            Reading::Calibration(self.read_calibration_params()?),
        ];
        for reading in readings {
            self.apply(reading);
        }
        Ok(&self.state)
    }

    /// Pick the dispersion model for the cached grating and wavelength.
    pub fn dispersion(&self, config: &DispersionConfig) -> Result<Dispersion, S::Error> {
        let grating = self.state.grating.ok_or(Error::NotRead("grating"))?;
        let center_wl_nm = self.state.wavelength_nm.ok_or(Error::NotRead("wavelength"))?;
        let m_order = f64::from(config.m_order);

        match config.source {
            CalibrationSource::FromGratingCalibrations => {
                let row = usize::from(grating)
                    .checked_sub(1)
                    .and_then(|index| config.grating_calibrations.get(index))
                    .ok_or_else(|| Error::invalid_range("grating calibration", grating))?;
                let calibration = GratingCalibration::try_from(row.as_slice())
                    .map_err(|e| Error::invalid_range("grating calibration", e))?;
                Ok(Dispersion::Calibrated {
                    calibration,
                    m_order,
                    center_wl_nm,
                    binning: config.binning,
                })
            }
            CalibrationSource::FromDevice => {
                let installed = self
                    .gratings
                    .get(grating)
                    .ok_or(ParseError::UnknownGrating(grating))?;
                if installed.is_mirror() {
                    return Ok(Dispersion::Mirror);
                }
                let params = self
                    .state
                    .calibration
                    .as_ref()
                    .ok_or(Error::NotRead("calibration"))?;
                Ok(Dispersion::Device {
                    geometry: DeviceGeometry::try_from(params)?,
                    grooves_per_mm: f64::from(installed.grooves),
                    m_order,
                    center_wl_nm,
                    pixel_width_um: config.pixel_width_um,
                })
            }
        }
    }

    /// Map detector pixel indices to wavelengths in nm.
    pub fn wavelengths(&self, pixels: &[f64], config: &DispersionConfig) -> Result<Vec<f64>, S::Error> {
        Ok(self.dispersion(config)?.compute_wavelengths(pixels))
    }
}

fn check_wavelength<I: embedded_io::Error>(nm: f64) -> Result<f64, I> {
    if nm.is_finite() {
        Ok(nm)
    } else {
        Err(Error::invalid_range("wavelength", nm))
    }
}
