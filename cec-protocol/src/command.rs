//! Outbound command grammar

use std::fmt;

use crate::address::{LogicalAddress, PhysicalAddress};
use crate::remote::RemoteButton;

/// A command line for cec-client. `Display` renders the wire form.
///
/// Commands that name the bridge as initiator take it as an `Option`: the
/// local address may not be learned yet, in which case it renders as an
/// empty string and cec-client fills in its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CecCommand {
    /// `self`: ask which logical address cec-client controls
    SelfAddress,
    Scan,
    Quit,
    PowerOn(LogicalAddress),
    Standby(LogicalAddress),
    /// Broadcast `<Active Source>` (opcode 82) for `address`
    ActiveSource {
        bridge: Option<LogicalAddress>,
        address: PhysicalAddress,
    },
    /// Broadcast `<Inactive Source>` (opcode 9D) for `address`
    InactiveSource {
        bridge: Option<LogicalAddress>,
        address: PhysicalAddress,
    },
    /// Raw frame to one device; `payload` is `op:operand:...`
    Transmit {
        bridge: Option<LogicalAddress>,
        device: LogicalAddress,
        payload: String,
    },
    /// `<User Control Pressed>` (opcode 44)
    ButtonPress {
        bridge: Option<LogicalAddress>,
        device: LogicalAddress,
        button: RemoteButton,
    },
    /// `<User Control Released>` (opcode 45)
    ButtonRelease {
        bridge: Option<LogicalAddress>,
        device: LogicalAddress,
    },
    /// Passed through untouched
    Raw(String),
}

struct Initiator(Option<LogicalAddress>);

impl fmt::Display for Initiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(address) => write!(f, "{address}"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for CecCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CecCommand::SelfAddress => f.write_str("self"),
            CecCommand::Scan => f.write_str("scan"),
            CecCommand::Quit => f.write_str("q"),
            CecCommand::PowerOn(device) => write!(f, "on {device}"),
            CecCommand::Standby(device) => write!(f, "standby {device}"),
            CecCommand::ActiveSource { bridge, address } => {
                write!(f, "tx {}F:82:{}", Initiator(*bridge), address.as_frame())
            }
            CecCommand::InactiveSource { bridge, address } => {
                write!(f, "tx {}F:9D:{}", Initiator(*bridge), address.as_frame())
            }
            CecCommand::Transmit {
                bridge,
                device,
                payload,
            } => write!(f, "tx {}{device}:{payload}", Initiator(*bridge)),
            CecCommand::ButtonPress {
                bridge,
                device,
                button,
            } => write!(
                f,
                "txn {}{device}:44:{:02X}",
                Initiator(*bridge),
                button.code()
            ),
            CecCommand::ButtonRelease { bridge, device } => {
                write!(f, "txn {}{device}:45", Initiator(*bridge))
            }
            CecCommand::Raw(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn la(c: char) -> LogicalAddress {
        LogicalAddress::from_char(c).unwrap()
    }

    fn pa(s: &str) -> PhysicalAddress {
        s.parse().unwrap()
    }

    #[rstest]
    #[case(CecCommand::SelfAddress, "self")]
    #[case(CecCommand::Scan, "scan")]
    #[case(CecCommand::Quit, "q")]
    #[case(CecCommand::PowerOn(la('0')), "on 0")]
    #[case(CecCommand::Standby(la('b')), "standby B")]
    #[case(
        CecCommand::ActiveSource { bridge: Some(la('1')), address: pa("1.0.0.0") },
        "tx 1F:82:10:00"
    )]
    #[case(
        CecCommand::InactiveSource { bridge: Some(la('1')), address: pa("2.1.0.0") },
        "tx 1F:9D:21:00"
    )]
    #[case(
        CecCommand::Transmit { bridge: Some(la('1')), device: la('0'), payload: "36".into() },
        "tx 10:36"
    )]
    #[case(
        CecCommand::ButtonPress { bridge: Some(la('1')), device: la('4'), button: RemoteButton::VolumeUp },
        "txn 14:44:41"
    )]
    #[case(
        CecCommand::ButtonRelease { bridge: Some(la('1')), device: la('4') },
        "txn 14:45"
    )]
    #[case(CecCommand::Raw("as".into()), "as")]
    fn test_wire_form(#[case] command: CecCommand, #[case] expected: &str) {
        assert_eq!(command.to_string(), expected);
    }

    #[test]
    fn test_unknown_bridge_renders_empty() {
        let command = CecCommand::ActiveSource {
            bridge: None,
            address: pa("1.0.0.0"),
        };
        assert_eq!(command.to_string(), "tx F:82:10:00");
    }
}
