//! Serial configuration console.
//!
//! A terminal on the host side of the link can press Enter while the
//! adapter is idle to get a numeric menu:
//!
//! ```text
//! [usb2serial]
//! 1) Help/Usage
//! 2) Show current settings
//! 3) Set sensitivity (2-30)
//! ...
//! usb2serial> 3 14
//! ```
//!
//! The console takes over the link until `0` is entered at the main menu.
//! The mouse pipeline is paused meanwhile.

use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::config::{
    CONSOLE_LINE_LEN, CONSOLE_POLL_INTERVAL_US, SENSITIVITY_TENTHS_MAX, SENSITIVITY_TENTHS_MIN,
};
use crate::link::{SerialLink, SettingsStore};
use crate::protocol::Protocol;
use crate::sensitivity;
use crate::settings;
use crate::state::MouseOptions;

const CTRL_L: u8 = 0x0C;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

const MAIN_HELP: &str = "\
1) Help/Usage
2) Show current settings
3) Set sensitivity (2-30)
4) Set mouse protocol (0-2)
   0: MS two-button  1: Logitech three-button  2: MS wheel
5) Swap left/right buttons (toggle, or 0/1)
6) Read or write settings (storage)
7) Enable wheel (toggle, or 0/1)
0) Exit settings/Resume adapter
   eg. to set sensitivity to 1.1, enter: 3 11
";

const STORAGE_HELP: &str = "\
1) Help/Usage
2) Load settings from storage
3) Write current settings to storage
0) Return to main menu
";

const FAREWELL: &str = "Bye! Resuming mouse.\n";

/// Menu the console is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Menu {
    Main,
    Storage,
}

impl Menu {
    fn prompt(self) -> &'static str {
        match self {
            Menu::Main => "usb2serial",
            Menu::Storage => "storage",
        }
    }

    fn help(self) -> &'static str {
        match self {
            Menu::Main => MAIN_HELP,
            Menu::Storage => STORAGE_HELP,
        }
    }
}

/// Whether the console keeps the link after a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleStatus {
    Continue,
    Exit,
}

/// Watches the idle receive path for a console request.
///
/// Only one byte is read per poll interval, so mouse traffic is never
/// slowed down by a chatty host.
#[derive(Debug, Clone, Default)]
pub struct ConsoleWatch {
    next_poll_us: u64,
}

impl ConsoleWatch {
    pub const fn new() -> Self {
        Self { next_poll_us: 0 }
    }

    /// Returns `true` when a CR or LF was received.
    pub fn poll<L: SerialLink + ?Sized>(&mut self, now_us: u64, link: &mut L) -> bool {
        if now_us < self.next_poll_us {
            return false;
        }
        self.next_poll_us = now_us.saturating_add(CONSOLE_POLL_INTERVAL_US);

        let mut byte = [0u8; 1];
        link.read_nonblocking(&mut byte) == 1 && matches!(byte[0], b'\r' | b'\n')
    }
}

/// Line editor and menu state.
pub struct Console {
    menu: Menu,
    line: Vec<u8, CONSOLE_LINE_LEN>,
    last: u8,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub const fn new() -> Self {
        Self {
            menu: Menu::Main,
            line: Vec::new(),
            last: 0,
        }
    }

    pub fn menu(&self) -> Menu {
        self.menu
    }

    /// Print the banner, main menu help and prompt.
    pub fn open<L: SerialLink + ?Sized>(&mut self, link: &mut L) {
        self.menu = Menu::Main;
        self.line.clear();
        self.last = 0;

        info!("Console opened");
        link.write_terminal(b"\n");
        link.write_terminal(b"usb2serial v");
        link.write_terminal(env!("CARGO_PKG_VERSION").as_bytes());
        link.write_terminal(b"\n");
        self.help(link);
        self.prompt(link);
    }

    /// Handle one received byte.
    pub fn feed<L, S>(
        &mut self,
        byte: u8,
        link: &mut L,
        options: &mut MouseOptions,
        store: &mut S,
    ) -> ConsoleStatus
    where
        L: SerialLink + ?Sized,
        S: SettingsStore + ?Sized,
    {
        let last = core::mem::replace(&mut self.last, byte);
        match byte {
            b'\n' if last == b'\r' => ConsoleStatus::Continue,
            b'\r' | b'\n' => {
                link.write_terminal(b"\n");
                let status = self.execute(link, options, store);
                self.line.clear();
                if status == ConsoleStatus::Exit {
                    link.write_terminal(FAREWELL.as_bytes());
                    info!("Console closed");
                } else {
                    self.prompt(link);
                }
                status
            }
            BACKSPACE | DELETE => {
                if self.line.pop().is_some() {
                    link.write_terminal(b"\x08 \x08");
                }
                ConsoleStatus::Continue
            }
            CTRL_L => {
                link.write_terminal(&[CTRL_L, b'\r']);
                self.prompt(link);
                link.write_terminal(&self.line);
                ConsoleStatus::Continue
            }
            0x20..=0x7E => {
                // keep one slot so the line can always be submitted
                if self.line.len() < CONSOLE_LINE_LEN - 1 && self.line.push(byte).is_ok() {
                    link.write_terminal(&[byte]);
                }
                ConsoleStatus::Continue
            }
            _ => ConsoleStatus::Continue,
        }
    }

    /// Blocking console session. `idle` is called whenever no input is
    /// waiting. Returns once the user exits the main menu.
    pub fn run<L, S, F>(&mut self, link: &mut L, options: &mut MouseOptions, store: &mut S, mut idle: F)
    where
        L: SerialLink + ?Sized,
        S: SettingsStore + ?Sized,
        F: FnMut(),
    {
        self.open(link);
        let mut buf = [0u8; 32];
        loop {
            let n = link.read_nonblocking(&mut buf);
            if n == 0 {
                idle();
                continue;
            }
            for &byte in &buf[..n.min(buf.len())] {
                if self.feed(byte, link, options, store) == ConsoleStatus::Exit {
                    return;
                }
            }
        }
    }

    fn prompt<L: SerialLink + ?Sized>(&self, link: &mut L) {
        link.write_terminal(self.menu.prompt().as_bytes());
        link.write_terminal(b"> ");
    }

    fn help<L: SerialLink + ?Sized>(&self, link: &mut L) {
        link.write_terminal(b"[");
        link.write_terminal(self.menu.prompt().as_bytes());
        link.write_terminal(b"]\n");
        link.write_terminal(self.menu.help().as_bytes());
    }

    fn enter<L: SerialLink + ?Sized>(&mut self, menu: Menu, link: &mut L) {
        self.menu = menu;
        self.help(link);
    }

    fn execute<L, S>(&mut self, link: &mut L, options: &mut MouseOptions, store: &mut S) -> ConsoleStatus
    where
        L: SerialLink + ?Sized,
        S: SettingsStore + ?Sized,
    {
        let Ok(line) = core::str::from_utf8(&self.line) else {
            return ConsoleStatus::Continue;
        };
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            return ConsoleStatus::Continue;
        };
        let arg = match words.next().map(str::parse::<u32>) {
            Some(Ok(v)) => Some(v),
            Some(Err(_)) => {
                invalid(link);
                return ConsoleStatus::Continue;
            }
            None => None,
        };
        let Ok(cmd) = cmd.parse::<u32>() else {
            invalid(link);
            return ConsoleStatus::Continue;
        };
        debug!("Console command {} in {:?}", cmd, self.menu);

        match self.menu {
            Menu::Main => self.main_menu(cmd, arg, link, options),
            Menu::Storage => self.storage_menu(cmd, link, options, store),
        }
    }

    fn main_menu<L: SerialLink + ?Sized>(
        &mut self,
        cmd: u32,
        arg: Option<u32>,
        link: &mut L,
        options: &mut MouseOptions,
    ) -> ConsoleStatus {
        let mut out: String<128> = String::new();
        match cmd {
            1 => self.help(link),
            2 => show_settings(link, options),
            3 => {
                if let Some(tenths) = arg {
                    let tenths = tenths.clamp(SENSITIVITY_TENTHS_MIN, SENSITIVITY_TENTHS_MAX);
                    options.sensitivity = sensitivity::from_tenths(tenths);
                }
                let _ = writeln!(out, "Mouse sensitivity set to {}.", options.sensitivity_tenths());
                link.write_terminal(out.as_bytes());
            }
            4 => match arg.map(|id| u8::try_from(id).ok().and_then(Protocol::from_id)) {
                Some(Some(p)) if !p.is_implemented() => {
                    let _ = writeln!(out, "{} is not supported.", p);
                    link.write_terminal(out.as_bytes());
                }
                Some(None) => invalid(link),
                selected => {
                    if let Some(Some(p)) = selected {
                        options.protocol = p;
                    }
                    let _ = writeln!(
                        out,
                        "Mouse protocol set to {}. You may want to re-initialize the OS mouse driver.",
                        options.protocol
                    );
                    link.write_terminal(out.as_bytes());
                }
            },
            5 => {
                options.swap_buttons = match arg {
                    Some(v) => v != 0,
                    None => !options.swap_buttons,
                };
                let _ = writeln!(
                    out,
                    "Mouse buttons are now {}.",
                    if options.swap_buttons { "swapped" } else { "unswapped" }
                );
                link.write_terminal(out.as_bytes());
            }
            6 => self.enter(Menu::Storage, link),
            7 => {
                options.wheel = match arg {
                    Some(v) => v != 0,
                    None => !options.wheel,
                };
                let _ = writeln!(
                    out,
                    "Mouse wheel is now {}.",
                    if options.wheel { "enabled" } else { "disabled" }
                );
                link.write_terminal(out.as_bytes());
            }
            0 => return ConsoleStatus::Exit,
            _ => invalid(link),
        }
        ConsoleStatus::Continue
    }

    fn storage_menu<L, S>(
        &mut self,
        cmd: u32,
        link: &mut L,
        options: &mut MouseOptions,
        store: &mut S,
    ) -> ConsoleStatus
    where
        L: SerialLink + ?Sized,
        S: SettingsStore + ?Sized,
    {
        match cmd {
            1 => self.help(link),
            2 => match settings::load(store) {
                Ok(mut loaded) => {
                    if !loaded.protocol.is_implemented() {
                        loaded.protocol = Protocol::default();
                    }
                    *options = loaded;
                    link.write_terminal(b"Settings loaded.\n");
                }
                Err(e) => {
                    warn!("Console load failed: {:?}", e);
                    link.write_terminal(b"Error loading or corrupt data.\n");
                }
            },
            3 => {
                link.write_terminal(b"Writing settings.. ");
                match settings::save(store, options) {
                    Ok(()) => link.write_terminal(b"Done\n"),
                    Err(_) => link.write_terminal(b"Failed\n"),
                };
            }
            0 => self.enter(Menu::Main, link),
            _ => invalid(link),
        }
        ConsoleStatus::Continue
    }
}

fn invalid<L: SerialLink + ?Sized>(link: &mut L) {
    link.write_terminal(b"Command not valid.\n");
}

fn show_settings<L: SerialLink + ?Sized>(link: &mut L, options: &MouseOptions) {
    let mut out: String<256> = String::new();
    let _ = write!(
        out,
        "[Settings]\n  Mouse protocol: {}\n  Mouse sensitivity: {}\n  Mouse buttons: {}\n  Mouse wheel: {}\n",
        options.protocol,
        options.sensitivity_tenths(),
        if options.swap_buttons { "Swapped" } else { "Not swapped" },
        if options.wheel { "Enabled" } else { "Disabled" },
    );
    link.write_terminal(out.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SETTINGS_BLOCK_SIZE;
    use crate::error::StorageError;
    use crate::link::ControlLine;
    use std::collections::VecDeque;
    use std::string::String as StdString;
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct Term {
        input: VecDeque<u8>,
        out: StdVec<u8>,
    }

    impl Term {
        fn typed(s: &str) -> Self {
            Self {
                input: s.bytes().collect(),
                out: StdVec::new(),
            }
        }

        fn text(&self) -> StdString {
            StdString::from_utf8_lossy(&self.out).into_owned()
        }
    }

    impl SerialLink for Term {
        fn write(&mut self, bytes: &[u8]) -> usize {
            self.out.extend_from_slice(bytes);
            bytes.len()
        }
        fn read_nonblocking(&mut self, buf: &mut [u8]) -> usize {
            let mut n = 0;
            while n < buf.len() {
                match self.input.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            n
        }
        fn handshake_asserted(&mut self) -> bool {
            false
        }
        fn set_control_line(&mut self, _line: ControlLine, _level: bool) {}
    }

    #[derive(Default)]
    struct Store {
        block: Option<[u8; SETTINGS_BLOCK_SIZE]>,
    }

    impl SettingsStore for Store {
        fn read_block(&mut self) -> Option<[u8; SETTINGS_BLOCK_SIZE]> {
            self.block
        }
        fn write_block(&mut self, block: &[u8]) -> Result<(), StorageError> {
            let mut b = [0u8; SETTINGS_BLOCK_SIZE];
            b.copy_from_slice(block);
            self.block = Some(b);
            Ok(())
        }
    }

    fn session(input: &str, options: &mut MouseOptions, store: &mut Store) -> Term {
        let mut term = Term::typed(input);
        let mut console = Console::new();
        console.run(&mut term, options, store, || panic!("console waited for input"));
        term
    }

    #[test]
    fn watch_polls_once_per_interval() {
        let mut watch = ConsoleWatch::new();
        let mut term = Term::typed("x\r");
        assert!(!watch.poll(0, &mut term));
        assert!(!watch.poll(10, &mut term));
        assert!(watch.poll(CONSOLE_POLL_INTERVAL_US, &mut term));
    }

    #[test]
    fn set_sensitivity_and_exit() {
        let mut o = MouseOptions::default();
        let mut store = Store::default();
        let term = session("3 14\r0\r", &mut o, &mut store);
        assert_eq!(o.sensitivity_tenths(), 14);
        assert!(term.text().contains("sensitivity set to 14"));
        assert!(term.text().ends_with(FAREWELL.replace('\n', "\r\n").as_str()));
    }

    #[test]
    fn sensitivity_clamped() {
        let mut o = MouseOptions::default();
        session("3 99\n0\n", &mut o, &mut Store::default());
        assert_eq!(o.sensitivity_tenths(), 30);
    }

    #[test]
    fn crlf_counts_once() {
        let mut o = MouseOptions::default();
        // "5" toggles swap; a second submission would toggle it back
        session("5\r\n0\r\n", &mut o, &mut Store::default());
        assert!(o.swap_buttons);
    }

    #[test]
    fn protocol_selection() {
        let mut o = MouseOptions::default();
        let term = session("4 3\r4 1\r0\r", &mut o, &mut Store::default());
        assert_eq!(o.protocol, Protocol::Logitech);
        assert!(term.text().contains("not supported"));
    }

    #[test]
    fn wheel_toggle_and_set() {
        let mut o = MouseOptions::default();
        session("7\r0\r", &mut o, &mut Store::default());
        assert!(!o.wheel);
        session("7 1\r0\r", &mut o, &mut Store::default());
        assert!(o.wheel);
    }

    #[test]
    fn backspace_edits_line() {
        let mut o = MouseOptions::default();
        session("3 23\x085\r0\r", &mut o, &mut Store::default());
        assert_eq!(o.sensitivity_tenths(), 25);
    }

    #[test]
    fn ctrl_l_redraws_line() {
        let mut o = MouseOptions::default();
        let term = session("3 1\x0c2\r0\r", &mut o, &mut Store::default());
        assert_eq!(o.sensitivity_tenths(), 12);
        assert!(term.text().contains("\x0c\rusb2serial> 3 1"));
    }

    #[test]
    fn garbage_is_rejected() {
        let mut o = MouseOptions::default();
        let term = session("abc\r9\r0\r", &mut o, &mut Store::default());
        assert_eq!(term.text().matches("Command not valid.").count(), 2);
        assert_eq!(o, MouseOptions::default());
    }

    #[test]
    fn storage_save_and_load() {
        let mut store = Store::default();
        let mut o = MouseOptions::default();
        o.swap_buttons = true;
        session("6\r3\r0\r0\r", &mut o, &mut store);
        assert!(store.block.is_some());

        let mut fresh = MouseOptions::default();
        let term = session("6\r2\r0\r0\r", &mut fresh, &mut store);
        assert!(fresh.swap_buttons);
        assert!(term.text().contains("Settings loaded."));
    }

    #[test]
    fn storage_load_failure_keeps_options() {
        let mut store = Store::default();
        let mut o = MouseOptions::default();
        o.sensitivity = 2.0;
        let term = session("6\r2\r0\r0\r", &mut o, &mut store);
        assert_eq!(o.sensitivity, 2.0);
        assert!(term.text().contains("Error loading or corrupt data."));
    }

    #[test]
    fn exit_only_from_main_menu() {
        let mut console = Console::new();
        let mut term = Term::default();
        let mut o = MouseOptions::default();
        let mut store = Store::default();
        console.open(&mut term);
        for b in b"6\r0\r" {
            assert_eq!(console.feed(*b, &mut term, &mut o, &mut store), ConsoleStatus::Continue);
        }
        assert_eq!(console.menu(), Menu::Main);
    }
}
