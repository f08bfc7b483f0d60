//! The mouse pipeline: aggregation, negotiation, gesture and scheduling
//! bound together around one owned state.
//!
//! Both front ends drive it the same way, once per loop iteration:
//!
//! ```text
//! adapter.poll_handshake(&mut link);
//! for event in input { adapter.on_event(event); }
//! adapter.service(now_us, &mut link);
//! ```

use crate::encoder::Packet;
use crate::hid::MouseEvent;
use crate::link::SerialLink;
use crate::negotiation::{self, HandshakeState};
use crate::scheduler::Scheduler;
use crate::sensitivity;
use crate::state::{Button, MouseOptions, MouseState};

/// Owns the live state of one emulated serial mouse.
#[derive(Debug, Clone)]
pub struct Adapter {
    state: MouseState,
    options: MouseOptions,
    scheduler: Scheduler,
}

impl Adapter {
    pub fn new(options: MouseOptions) -> Self {
        Self {
            state: MouseState::new(),
            options,
            scheduler: Scheduler::new(),
        }
    }

    pub fn state(&self) -> &MouseState {
        &self.state
    }

    pub fn options(&self) -> &MouseOptions {
        &self.options
    }

    /// Replace the options wholesale and drop pending input.
    ///
    /// A held middle button is forgotten when the new protocol cannot
    /// report it, so it does not reappear as held after switching back.
    pub fn set_options(&mut self, options: MouseOptions) {
        self.options = options;
        self.state.reset();
        if options.effective_protocol().descriptor().buttons < 3 {
            self.state.middle = false;
        }
    }

    pub fn handshake(&self) -> HandshakeState {
        self.state.handshake
    }

    /// Whether the host has finished negotiating.
    pub fn transmit_enabled(&self) -> bool {
        self.state.handshake.transmit_enabled()
    }

    /// Sample the handshake line and advance negotiation. Sends the ident
    /// when the host releases the line.
    pub fn poll_handshake<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Option<HandshakeState> {
        let protocol = self.options.effective_protocol();
        negotiation::step(&mut self.state.handshake, protocol, link)
    }

    /// Identify immediately without waiting for the handshake.
    pub fn identify_now<L: SerialLink + ?Sized>(&mut self, link: &mut L) {
        let protocol = self.options.effective_protocol();
        negotiation::identify_now(&mut self.state.handshake, protocol, link);
    }

    /// Feed one input event into the aggregator.
    ///
    /// Button levels are compared with the stored ones so only real edges
    /// force a report.
    pub fn on_event(&mut self, event: MouseEvent) {
        let protocol = self.options.effective_protocol();

        for button in [Button::Left, Button::Right, Button::Middle] {
            let level = event.button(button);
            if level != self.state.button(button) {
                self.state.record_button(button, level, protocol);
            }
        }
        if event.dx != 0 || event.dy != 0 {
            self.state.record_motion(event.dx, event.dy, protocol);
        }
        if event.wheel != 0 {
            self.state.record_wheel(event.wheel, protocol);
        }
    }

    /// Run the gesture and the scheduler. Does nothing until negotiation
    /// opens the gate. Returns the packet written, if any.
    pub fn service<L: SerialLink + ?Sized>(&mut self, now_us: u64, link: &mut L) -> Option<Packet> {
        if !self.transmit_enabled() {
            return None;
        }
        sensitivity::apply_gesture(&mut self.state, &mut self.options);
        self.scheduler
            .poll(now_us, &mut self.state, &self.options, link)
    }
}

impl Default for Adapter {
    fn default() -> Self {
        Self::new(MouseOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ControlLine;
    use crate::protocol::Protocol;
    use std::vec::Vec;

    struct Link {
        asserted: bool,
        out: Vec<u8>,
    }

    impl SerialLink for Link {
        fn write(&mut self, bytes: &[u8]) -> usize {
            self.out.extend_from_slice(bytes);
            bytes.len()
        }
        fn read_nonblocking(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
        fn handshake_asserted(&mut self) -> bool {
            self.asserted
        }
        fn set_control_line(&mut self, _line: ControlLine, _level: bool) {}
    }

    fn negotiated(options: MouseOptions) -> (Adapter, Link) {
        let mut a = Adapter::new(options);
        let mut l = Link {
            asserted: true,
            out: Vec::new(),
        };
        a.poll_handshake(&mut l);
        l.asserted = false;
        a.poll_handshake(&mut l);
        l.out.clear();
        (a, l)
    }

    #[test]
    fn middle_level_cleared_on_two_button_switch() {
        let (mut a, mut l) = negotiated(MouseOptions::default());
        let middle = MouseEvent::default().with_button(Button::Middle, true);
        a.on_event(middle);
        a.service(0, &mut l).unwrap();

        let two_button = MouseOptions {
            protocol: Protocol::MsTwoButton,
            ..MouseOptions::default()
        };
        a.set_options(two_button);
        assert!(!a.state().middle);

        // middle still physically held, released later while on MS
        a.on_event(middle);
        a.on_event(MouseEvent::default());
        a.set_options(MouseOptions::default());

        a.on_event(MouseEvent::motion(1, 0));
        let p = a.service(100_000, &mut l).unwrap();
        assert_eq!(p.as_bytes(), &[0x40, 0x01, 0x00]);
    }

    #[test]
    fn middle_level_kept_between_three_button_protocols() {
        let (mut a, mut l) = negotiated(MouseOptions::default());
        a.on_event(MouseEvent::default().with_button(Button::Middle, true));
        a.service(0, &mut l).unwrap();

        a.set_options(MouseOptions {
            protocol: Protocol::Logitech,
            ..MouseOptions::default()
        });
        assert!(a.state().middle);
    }

    #[test]
    fn gate_blocks_until_negotiated() {
        let mut a = Adapter::default();
        let mut l = Link {
            asserted: false,
            out: Vec::new(),
        };
        a.on_event(MouseEvent::motion(5, 5));
        assert!(a.service(0, &mut l).is_none());
        assert!(l.out.is_empty());
    }

    #[test]
    fn repeated_levels_do_not_force() {
        let (mut a, mut l) = negotiated(MouseOptions::default());
        let down = MouseEvent::default().with_button(Button::Left, true);
        a.on_event(down);
        assert!(a.service(0, &mut l).is_some());

        a.on_event(down.with_button(Button::Left, true));
        assert!(!a.state().force_update);
    }

    #[test]
    fn wheel_off_uses_two_button_ident() {
        let mut o = MouseOptions::default();
        o.wheel = false;
        let mut a = Adapter::new(o);
        let mut l = Link {
            asserted: true,
            out: Vec::new(),
        };
        a.poll_handshake(&mut l);
        l.asserted = false;
        a.poll_handshake(&mut l);
        assert_eq!(l.out, b"M");
    }

    #[test]
    fn gesture_runs_before_encoding() {
        let (mut a, mut l) = negotiated(MouseOptions::default());
        let chord = MouseEvent::default()
            .with_button(Button::Left, true)
            .with_button(Button::Right, true);
        a.on_event(chord);
        a.service(0, &mut l);

        a.on_event(MouseEvent { wheel: 1, ..chord });
        let p = a.service(100_000, &mut l).unwrap();
        assert_eq!(a.options().sensitivity_tenths(), 12);
        assert_eq!(p.as_bytes()[3] & 0x0F, 0);
    }

    #[test]
    fn set_options_drops_pending() {
        let (mut a, _l) = negotiated(MouseOptions::default());
        a.on_event(MouseEvent::motion(3, 3));
        let mut o = *a.options();
        o.protocol = Protocol::Logitech;
        a.set_options(o);
        assert_eq!(a.state().pending_len, None);
    }
}
