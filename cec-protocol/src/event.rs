//! Typed events parsed from status lines

use serde::Serialize;

use crate::address::LogicalAddress;

/// Something the line stream told us.
///
/// Events are transient: they are handed to consumers as they are parsed and
/// never stored by the bridge itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PowerOn { device: Option<LogicalAddress> },
    PowerOff { device: Option<LogicalAddress> },
    ActiveSourceOn { device: Option<LogicalAddress> },
    ActiveSourceOff { device: Option<LogicalAddress> },
    /// Catch-all status text not covered by a specific rule
    Raw {
        device: Option<LogicalAddress>,
        text: String,
    },
    /// The peer reported that the CEC connection came up or went away
    ConnectionStatus { online: bool, reason: String },
}

impl Event {
    /// Target device, when the event has one.
    pub fn device(&self) -> Option<LogicalAddress> {
        match self {
            Event::PowerOn { device }
            | Event::PowerOff { device }
            | Event::ActiveSourceOn { device }
            | Event::ActiveSourceOff { device }
            | Event::Raw { device, .. } => *device,
            Event::ConnectionStatus { .. } => None,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::PowerOn { .. } => "power_on",
            Event::PowerOff { .. } => "power_off",
            Event::ActiveSourceOn { .. } => "active_source_on",
            Event::ActiveSourceOff { .. } => "active_source_off",
            Event::Raw { .. } => "raw",
            Event::ConnectionStatus { .. } => "connection_status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_accessor() {
        let tv = LogicalAddress::from_char('0');
        assert_eq!(Event::PowerOn { device: tv }.device(), tv);
        assert_eq!(
            Event::ConnectionStatus {
                online: true,
                reason: "connection opened".into()
            }
            .device(),
            None
        );
    }

    #[test]
    fn test_serialized_shape() {
        let event = Event::Raw {
            device: LogicalAddress::from_char('5'),
            text: "volume up".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "raw");
        assert_eq!(json["device"], "5");
        assert_eq!(json["text"], "volume up");
    }
}
