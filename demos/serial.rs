use std::env;

use inquire::Select;
use pi_spectrometer::config::Config;
use pi_spectrometer::session::MonoSession;
use pi_spectrometer::transport::SerialTransport;

// Detector width used for the wavelength axis printout.
const DETECTOR_COLUMNS: usize = 1340;
const TARGET_WAVELENGTH_NM: f64 = 546.074; // Hg green line
const ENTRANCE_SLIT_UM: u16 = 50;

fn main() {
    env_logger::init();

    // Optional TOML config as the second argument
    let mut config = match env::args().nth(2) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).expect("Failed to read config file");
            Config::from_toml_str(&text).expect("Failed to parse config file")
        }
        None => Config::default(),
    };

    // Get serial port from command line arg or interactive selection
    config.serial.port = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", config.serial.port);

    let port = SerialTransport::open(&config.serial).expect("Failed to open serial port");
    let mut mono: MonoSession<SerialTransport> =
        MonoSession::connect(port).expect("Failed to read grating table");

    println!("Model: {}", mono.read_model().unwrap());
    println!("Serial: {}", mono.read_serial().unwrap());

    println!("\n--- Installed gratings ---");
    for (id, label) in mono.gratings().entries() {
        println!("{id}: {label}");
    }

    println!("\n--- Current state ---");
    let state = mono.refresh().unwrap();
    println!("{:#?}", state);

    // Move and wait for the motor to settle
    mono.write_wavelength_nonblocking(TARGET_WAVELENGTH_NM).unwrap();
    while !mono.read_done_status().unwrap() {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }
    println!("\nMoved to {:.3} nm", mono.read_wavelength().unwrap());

    match mono.write_entrance_slit(ENTRANCE_SLIT_UM) {
        Ok(()) => println!("Entrance slit: {:?}", mono.read_entrance_slit().unwrap()),
        Err(e) => println!("Could not set entrance slit: {e}"),
    }

    println!("\n--- Wavelength axis ({}) ---", config.dispersion.source);
    mono.refresh().unwrap();
    let pixels: Vec<f64> = (0..DETECTOR_COLUMNS).map(|p| p as f64).collect();
    match mono.wavelengths(&pixels, &config.dispersion) {
        Ok(wavelengths) => {
            let last = wavelengths.len() - 1;
            println!("pixel 0: {:.3} nm", wavelengths[0]);
            println!("pixel {}: {:.3} nm", last / 2, wavelengths[last / 2]);
            println!("pixel {last}: {:.3} nm", wavelengths[last]);
        }
        Err(e) => println!("No wavelength axis: {e}"),
    }
}
