//! Legacy serial mouse protocols.
//!
//! Each protocol is described by a static [`ProtocolDescriptor`]:
//!
//! ```text
//! Protocol       Ident   Buttons  Wheel  Report
//! MsTwoButton    "M"     2        no     3 bytes
//! Logitech       "M3"    3        no     3-4 bytes (4th only while MMB held)
//! MsWheel        "MZ"    3        yes    4 bytes
//! MouseSystems   -       -        -      reserved, not implemented
//! ```

use core::fmt;

/// Static description of one wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolDescriptor {
    /// Human-readable name shown on the console.
    pub name: &'static str,
    /// Bytes sent to the host driver after the handshake toggles.
    pub ident: &'static [u8],
    /// Number of buttons the protocol can report.
    pub buttons: u8,
    /// Whether a wheel nibble is reported.
    pub wheel: bool,
    /// Full report length in bytes.
    pub report_len: usize,
    /// `false` for variants that are known but have no wire layout.
    pub implemented: bool,
}

impl ProtocolDescriptor {
    /// Number of bytes of the identification sequence.
    pub const fn ident_len(&self) -> usize {
        self.ident.len()
    }
}

const MS_TWO_BUTTON: ProtocolDescriptor = ProtocolDescriptor {
    name: "Microsoft two-button",
    ident: b"M",
    buttons: 2,
    wheel: false,
    report_len: 3,
    implemented: true,
};

const LOGITECH: ProtocolDescriptor = ProtocolDescriptor {
    name: "Logitech three-button",
    ident: b"M3",
    buttons: 3,
    wheel: false,
    report_len: 4,
    implemented: true,
};

const MS_WHEEL: ProtocolDescriptor = ProtocolDescriptor {
    name: "Microsoft wheel",
    ident: b"MZ",
    buttons: 3,
    wheel: true,
    report_len: 4,
    implemented: true,
};

const MOUSE_SYSTEMS: ProtocolDescriptor = ProtocolDescriptor {
    name: "Mouse Systems (reserved)",
    ident: b"",
    buttons: 3,
    wheel: false,
    report_len: 3,
    implemented: false,
};

/// Wire protocol selected for the host.
///
/// The discriminant is the protocol id used by the settings record and
/// the console (`0..=3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Protocol {
    MsTwoButton = 0,
    Logitech = 1,
    #[default]
    MsWheel = 2,
    MouseSystems = 3,
}

impl Protocol {
    /// All variants in id order.
    pub const ALL: [Protocol; 4] = [
        Protocol::MsTwoButton,
        Protocol::Logitech,
        Protocol::MsWheel,
        Protocol::MouseSystems,
    ];

    /// Static fields for this protocol.
    pub const fn descriptor(self) -> &'static ProtocolDescriptor {
        match self {
            Protocol::MsTwoButton => &MS_TWO_BUTTON,
            Protocol::Logitech => &LOGITECH,
            Protocol::MsWheel => &MS_WHEEL,
            Protocol::MouseSystems => &MOUSE_SYSTEMS,
        }
    }

    /// Protocol id (0..=3).
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Look up a protocol by id. Only the low two bits are meaningful.
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Protocol::MsTwoButton),
            1 => Some(Protocol::Logitech),
            2 => Some(Protocol::MsWheel),
            3 => Some(Protocol::MouseSystems),
            _ => None,
        }
    }

    /// Whether reports can be produced for this protocol.
    pub const fn is_implemented(self) -> bool {
        self.descriptor().implemented
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for p in Protocol::ALL {
            assert_eq!(Protocol::from_id(p.id()), Some(p));
        }
        assert_eq!(Protocol::from_id(4), None);
    }

    #[test]
    fn ident_bytes() {
        assert_eq!(Protocol::MsTwoButton.descriptor().ident, &[0x4D]);
        assert_eq!(Protocol::Logitech.descriptor().ident, &[0x4D, 0x33]);
        assert_eq!(Protocol::MsWheel.descriptor().ident, &[0x4D, 0x5A]);
        assert_eq!(Protocol::MsWheel.descriptor().ident_len(), 2);
    }

    #[test]
    fn report_lengths() {
        assert_eq!(Protocol::MsTwoButton.descriptor().report_len, 3);
        assert_eq!(Protocol::Logitech.descriptor().report_len, 4);
        assert_eq!(Protocol::MsWheel.descriptor().report_len, 4);
    }

    #[test]
    fn mouse_systems_is_reserved() {
        let d = Protocol::MouseSystems.descriptor();
        assert!(!d.implemented);
        assert!(d.ident.is_empty());
        assert!(!Protocol::MouseSystems.is_implemented());
    }

    #[test]
    fn default_is_wheel() {
        assert_eq!(Protocol::default(), Protocol::MsWheel);
    }
}
