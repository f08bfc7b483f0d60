//! usb2serial firmware for the RP2040.
//!
//! Core 0 runs the mouse pipeline: boot reports from the USB host driver,
//! handshake polling, aggregation, encoding and the configuration console.
//! Core 1 only drains the byte queue into the UART, so slow 1200-baud
//! writes never hold up USB servicing.
//!
//! Wiring (through a MAX3232, which inverts the RS-232 levels):
//!   GP0 → T1IN (TxD to host), GP1 ← R1OUT (RxD from host),
//!   GP2 ← R2OUT (host RTS, read as our CTS).

#![no_std]
#![no_main]

use defmt::{info, unwrap, warn};
use embassy_executor::Executor;
use embassy_rp::flash::{Blocking as FlashBlocking, Flash};
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{self, Blocking, UartRx, UartTx};
use embassy_time::{block_for, Duration, Instant, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use usb2serial::config::{
    FLASH_SIZE, LOOP_YIELD_US, SERIAL_BAUD, SERIAL_DATA_BITS, SERIAL_STOP_BITS, TX_QUEUE_LEN,
};
use usb2serial::console::{Console, ConsoleWatch};
use usb2serial::queue::{ByteQueue, LinkPort, QueueLink};
use usb2serial::storage::FlashSettingsStore;
use usb2serial::{hid, settings, Adapter};

/// Bytes on their way to the UART.
static TX_QUEUE: ByteQueue<TX_QUEUE_LEN> = ByteQueue::new();

static mut CORE1_STACK: Stack<4096> = Stack::new();
static EXECUTOR0: StaticCell<Executor> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

type SettingsFlash = Flash<'static, embassy_rp::peripherals::FLASH, FlashBlocking, FLASH_SIZE>;

/// UART receive side and the host handshake input.
struct UartPort {
    rx: UartRx<'static, UART0, Blocking>,
    cts: Input<'static>,
}

impl LinkPort for UartPort {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match embedded_hal_nb::serial::Read::read(&mut self.rx) {
                Ok(b) => {
                    buf[n] = b;
                    n += 1;
                }
                Err(_) => break,
            }
        }
        n
    }

    fn handshake_asserted(&mut self) -> bool {
        // The MAX3232 inverts: host RTS low arrives as a high input
        self.cts.is_high()
    }

    fn idle(&mut self) {
        cortex_m::asm::nop();
    }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    info!("usb2serial v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = uart::Config::default();
    config.baudrate = SERIAL_BAUD;
    config.data_bits = match SERIAL_DATA_BITS {
        5 => uart::DataBits::DataBits5,
        6 => uart::DataBits::DataBits6,
        7 => uart::DataBits::DataBits7,
        _ => uart::DataBits::DataBits8,
    };
    config.stop_bits = match SERIAL_STOP_BITS {
        2 => uart::StopBits::STOP2,
        _ => uart::StopBits::STOP1,
    };
    config.parity = uart::Parity::ParityNone;
    let uart = uart::Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, config);
    let (tx, rx) = uart.split();

    let cts = Input::new(p.PIN_2, Pull::None);

    let flash: SettingsFlash = Flash::new_blocking(p.FLASH);
    let store = match FlashSettingsStore::new(flash) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("Settings storage unavailable: {:?}", e);
            None
        }
    };

    spawn_core1(
        p.CORE1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        move || {
            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(|spawner| unwrap!(spawner.spawn(uart_writer(tx))));
        },
    );

    let executor0 = EXECUTOR0.init(Executor::new());
    executor0.run(|spawner| {
        unwrap!(spawner.spawn(pipeline(UartPort { rx, cts }, store)));
    });
}

/// Core 1: move queued bytes onto the wire.
#[embassy_executor::task]
async fn uart_writer(mut tx: UartTx<'static, UART0, Blocking>) {
    loop {
        let byte = TX_QUEUE.pop().await;
        if let Err(e) = tx.blocking_write(&[byte]) {
            warn!("UART write failed: {:?}", e);
        }
    }
}

/// Core 0: the mouse pipeline and console.
#[embassy_executor::task]
async fn pipeline(port: UartPort, mut store: Option<FlashSettingsStore<SettingsFlash>>) {
    let options = match store.as_mut() {
        Some(store) => settings::load_or_default(store),
        None => Default::default(),
    };
    let mut adapter = Adapter::new(options);
    let mut link = QueueLink::new(&TX_QUEUE, port);
    let mut watch = ConsoleWatch::new();
    let mut console = Console::new();

    info!("Waiting for host driver");
    loop {
        let now_us = Instant::now().as_micros();

        if watch.poll(now_us, &mut link) {
            let mut options = *adapter.options();
            match store.as_mut() {
                Some(store) => console.run(&mut link, &mut options, store, || {
                    block_for(Duration::from_micros(LOOP_YIELD_US))
                }),
                None => warn!("Console unavailable without settings storage"),
            }
            adapter.set_options(options);
        }

        adapter.poll_handshake(&mut link);

        // filled by the USB host driver through hid::submit_report
        while let Some(report) = hid::next_report() {
            if adapter.transmit_enabled() {
                adapter.on_event(report.to_event());
            }
        }

        adapter.service(now_us, &mut link);

        Timer::after_micros(LOOP_YIELD_US).await;
    }
}
