//! usb2serial desktop adapter.
//!
//! Reads a mouse through evdev and emulates a serial mouse on a tty, so a
//! vintage PC connected with a null-modem cable sees a Microsoft, Logitech
//! or wheel mouse.
//!
//! ```text
//! usb2serial -m /dev/input/by-id/usb-Logitech_USB_Mouse-event-mouse -s /dev/ttyUSB0
//! ```

use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use evdev::{Device, InputEventKind, Key, RelativeAxisType};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use usb2serial::config::{
    LOOP_YIELD_US, SENSITIVITY_TENTHS_MAX, SENSITIVITY_TENTHS_MIN, SERIAL_BAUD, SERIAL_DATA_BITS,
    SERIAL_STOP_BITS, SETTINGS_FILE_NAME,
};
use usb2serial::console::{Console, ConsoleWatch};
use usb2serial::sensitivity;
use usb2serial::settings;
use usb2serial::storage::FileSettingsStore;
use usb2serial::link::{self, HandshakeLatch};
use usb2serial::{Adapter, ControlLine, MouseEvent, Protocol, SerialLink};

#[derive(Parser, Debug)]
#[command(name = "usb2serial", version, about = "Emulate a legacy serial mouse from an evdev mouse")]
struct Cli {
    /// Mouse event device (e.g. /dev/input/event3)
    #[arg(short = 'm', long = "mouse", value_name = "PATH")]
    mouse: PathBuf,

    /// Serial port connected to the host (e.g. /dev/ttyUSB0)
    #[arg(short = 's', long = "serial", value_name = "PATH")]
    serial: PathBuf,

    /// Disable the wheel; the wheel protocol then behaves as two-button
    #[arg(short = 'w', long = "no-wheel")]
    no_wheel: bool,

    /// Do not grab the mouse exclusively
    #[arg(short = 'e', long = "no-exclusive")]
    no_exclusive: bool,

    /// Identify immediately instead of waiting for the host handshake
    #[arg(short = 'i', long)]
    immediate: bool,

    /// Verbose logging
    #[arg(short = 'd', long)]
    debug: bool,

    /// Protocol override
    #[arg(short = 'p', long, value_enum)]
    protocol: Option<ProtocolArg>,

    /// Sensitivity override in tenths (10 = 1.0)
    #[arg(long, value_name = "TENTHS",
          value_parser = clap::value_parser!(u32).range(SENSITIVITY_TENTHS_MIN as i64..=SENSITIVITY_TENTHS_MAX as i64))]
    sensitivity: Option<u32>,

    /// Settings file (default: ~/.usb2serial.conf)
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProtocolArg {
    /// Microsoft two-button
    Ms,
    /// Logitech three-button
    Logitech,
    /// Microsoft wheel
    Wheel,
}

impl From<ProtocolArg> for Protocol {
    fn from(p: ProtocolArg) -> Self {
        match p {
            ProtocolArg::Ms => Protocol::MsTwoButton,
            ProtocolArg::Logitech => Protocol::Logitech,
            ProtocolArg::Wheel => Protocol::MsWheel,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.debug {
        "usb2serial=debug"
    } else {
        "usb2serial=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let mut store = FileSettingsStore::new(cli.config.clone().unwrap_or_else(default_settings_path));
    info!("Settings file: {:?}", store.path());
    let mut options = settings::load_or_default(&mut store);

    if cli.no_wheel {
        options.wheel = false;
    }
    if let Some(p) = cli.protocol {
        options.protocol = p.into();
    }
    if let Some(tenths) = cli.sensitivity {
        options.sensitivity = sensitivity::from_tenths(tenths);
    }

    let mut mouse = open_mouse(&cli)?;
    let mut link = TtyLink::open(&cli)?;

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    link.set_control_line(ControlLine::Rts, true);
    link.set_control_line(ControlLine::Dtr, true);

    let mut adapter = Adapter::new(options);
    if cli.immediate {
        adapter.identify_now(&mut link);
    }
    info!(
        "Emulating {} on {:?}, waiting for host driver",
        adapter.options().effective_protocol(),
        cli.serial
    );

    let result = run(&running, &mut adapter, &mut mouse, &mut link, &mut store);

    link.set_control_line(ControlLine::Rts, false);
    link.set_control_line(ControlLine::Dtr, false);
    if !cli.no_exclusive {
        if let Err(e) = mouse.ungrab() {
            warn!("Failed to release mouse grab: {}", e);
        }
    }
    info!("Stopped");
    result
}

fn run(
    running: &AtomicBool,
    adapter: &mut Adapter,
    mouse: &mut Device,
    link: &mut TtyLink,
    store: &mut FileSettingsStore,
) -> Result<()> {
    let start = Instant::now();
    let mut watch = ConsoleWatch::new();
    let mut console = Console::new();
    let mut frame = MouseEvent::default();
    let mut gate_open = false;

    while running.load(Ordering::SeqCst) {
        let now_us = start.elapsed().as_micros() as u64;

        if watch.poll(now_us, link) {
            let mut options = *adapter.options();
            console.run(link, &mut options, store, || {
                std::thread::sleep(Duration::from_micros(LOOP_YIELD_US))
            });
            adapter.set_options(options);
        }

        adapter.poll_handshake(link);
        if adapter.transmit_enabled() != gate_open {
            gate_open = adapter.transmit_enabled();
            if gate_open {
                info!("Mouse initialized, reporting to host");
            }
        }

        match mouse.fetch_events() {
            Ok(events) => {
                for ev in events {
                    match ev.kind() {
                        InputEventKind::Key(key) => {
                            let pressed = ev.value() != 0;
                            match key {
                                Key::BTN_LEFT => frame.left = pressed,
                                Key::BTN_RIGHT => frame.right = pressed,
                                Key::BTN_MIDDLE => frame.middle = pressed,
                                _ => {}
                            }
                        }
                        InputEventKind::RelAxis(axis) => match axis {
                            RelativeAxisType::REL_X => frame.dx += ev.value(),
                            RelativeAxisType::REL_Y => frame.dy += ev.value(),
                            RelativeAxisType::REL_WHEEL => frame.wheel += ev.value(),
                            _ => {}
                        },
                        InputEventKind::Synchronization(_) => {
                            // Input before negotiation is dropped; only button levels carry over.
                            if gate_open {
                                adapter.on_event(frame);
                            }
                            frame = MouseEvent { dx: 0, dy: 0, wheel: 0, ..frame };
                        }
                        _ => {}
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e).context("Mouse device read failed"),
        }

        if let Some(packet) = adapter.service(now_us, link) {
            debug!("Sent {:02X?}", packet.as_bytes());
        }

        std::thread::sleep(Duration::from_micros(LOOP_YIELD_US));
    }
    Ok(())
}

fn default_settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SETTINGS_FILE_NAME)
}

/// Open the mouse, check it looks like a three-button mouse and make its
/// reads non-blocking.
fn open_mouse(cli: &Cli) -> Result<Device> {
    let mut dev = Device::open(&cli.mouse)
        .with_context(|| format!("Failed to open mouse device: {:?}", cli.mouse))?;

    let has_axes = dev.supported_relative_axes().is_some_and(|axes| {
        axes.contains(RelativeAxisType::REL_X) && axes.contains(RelativeAxisType::REL_Y)
    });
    let has_buttons = dev.supported_keys().is_some_and(|keys| {
        keys.contains(Key::BTN_LEFT) && keys.contains(Key::BTN_RIGHT) && keys.contains(Key::BTN_MIDDLE)
    });
    if !(has_axes && has_buttons) {
        bail!("{:?} does not look like a mouse", cli.mouse);
    }

    set_nonblocking(&dev).context("Failed to set mouse device non-blocking")?;

    if !cli.no_exclusive {
        dev.grab()
            .with_context(|| format!("Failed to grab mouse device: {:?}", cli.mouse))?;
    }
    info!("Using mouse {:?} ({})", cli.mouse, dev.name().unwrap_or("unnamed"));
    Ok(dev)
}

fn set_nonblocking(dev: &Device) -> Result<()> {
    let raw_fd = dev.as_raw_fd();

    // Preserve existing flags; just OR in O_NONBLOCK.
    let current = unsafe { libc::fcntl(raw_fd, libc::F_GETFL) };
    if current < 0 {
        return Err(io::Error::last_os_error()).context("fcntl(F_GETFL) failed");
    }

    let rc = unsafe { libc::fcntl(raw_fd, libc::F_SETFL, current | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error()).context("fcntl(F_SETFL, O_NONBLOCK) failed");
    }
    Ok(())
}

/// Serial mouse link on a tty.
///
/// The host pulls RTS and DTR low while its driver initializes. Through a
/// null-modem cable those arrive here as CTS and DSR.
struct TtyLink {
    port: Box<dyn SerialPort>,
    handshake: HandshakeLatch,
}

impl TtyLink {
    fn open(cli: &Cli) -> Result<Self> {
        let path = cli.serial.to_string_lossy();
        let data_bits = DataBits::try_from(SERIAL_DATA_BITS)
            .map_err(|_| anyhow!("Unsupported data bits: {}", SERIAL_DATA_BITS))?;
        let stop_bits = StopBits::try_from(SERIAL_STOP_BITS)
            .map_err(|_| anyhow!("Unsupported stop bits: {}", SERIAL_STOP_BITS))?;
        let port = serialport::new(path.as_ref(), SERIAL_BAUD)
            .data_bits(data_bits)
            .parity(Parity::None)
            .stop_bits(stop_bits)
            .flow_control(FlowControl::None)
            .timeout(Duration::ZERO)
            .open()
            .with_context(|| format!("Failed to open serial port: {path}"))?;
        info!(
            "Opened {} at {} baud {}N{}",
            path, SERIAL_BAUD, SERIAL_DATA_BITS, SERIAL_STOP_BITS
        );
        Ok(Self {
            port,
            handshake: HandshakeLatch::new(),
        })
    }
}

impl SerialLink for TtyLink {
    fn write(&mut self, bytes: &[u8]) -> usize {
        link::write_counted(&mut self.port, bytes)
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> usize {
        match self.port.bytes_to_read() {
            Ok(0) | Err(_) => return 0,
            Ok(_) => {}
        }
        match self.port.read(buf) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => 0,
            Err(e) => {
                warn!("Serial read failed: {}", e);
                0
            }
        }
    }

    fn handshake_asserted(&mut self) -> bool {
        let cts = self.port.read_clear_to_send();
        let dsr = self.port.read_data_set_ready();
        match (cts, dsr) {
            (Ok(cts), Ok(dsr)) => self.handshake.update(Some(!(cts || dsr))),
            (Err(e), _) | (_, Err(e)) => {
                let level = self.handshake.update(None);
                if self.handshake.should_log() {
                    error!(
                        "Cannot read modem lines ({} failures), holding last level: {}",
                        self.handshake.failures(),
                        e
                    );
                }
                level
            }
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.port.flush() {
            warn!("Serial flush failed: {}", e);
        }
    }

    fn set_control_line(&mut self, line: ControlLine, level: bool) {
        let result = match line {
            ControlLine::Rts => self.port.write_request_to_send(level),
            ControlLine::Dtr => self.port.write_data_terminal_ready(level),
        };
        if let Err(e) = result {
            warn!("Cannot set {:?}: {}", line, e);
        }
    }
}
