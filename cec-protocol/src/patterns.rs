//! Configurable line patterns
//!
//! Operators may override any pattern through [`PatternConfig`]; the result is
//! compiled once into an immutable [`PatternSet`]. Every pattern is matched
//! against the whole line, as if wrapped in `^(?:...)$`.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::address::LogicalAddress;
use crate::error::{ProtocolError, Result};
use crate::event::Event;

pub const DEFAULT_DEVICE_STATEMENT: &str = r".*? \(([0-9a-fA-F])\).*";
pub const DEFAULT_POWER_ON: &str = r".*: power status changed from '(.*)' to 'on'";
pub const DEFAULT_POWER_OFF: &str = r".*: power status changed from '(.*)' to 'standby'";
pub const DEFAULT_ACTIVE_SOURCE_ON: &str = r".*making .* \((.)\) the active source";
pub const DEFAULT_ACTIVE_SOURCE_OFF: &str = r".*marking .* \((.)\) as inactive source";
pub const DEFAULT_EVENT: &str = r".*: (.*)";
pub const DEFAULT_SELF_ADDRESS: &str = r"Addresses controlled by libCEC:\s*([0-9a-fA-F])";
pub const DEFAULT_DEVICE_RECORD: &str = r"device #([0-9A-F]).+$";

/// Markers cec-client puts around echoed frames (`<<` sent, `>>` received).
pub const ECHO_MARKERS: [&str; 2] = ["<<", ">>"];

/// Whether `line` is an echoed frame rather than a status line.
pub fn is_echo(line: &str) -> bool {
    ECHO_MARKERS.iter().any(|marker| line.contains(marker))
}

/// Pattern overrides as found in the bridge configuration.
///
/// Unset fields fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_statement_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_on_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_off_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_source_on_regex: Option<String>,
    /// Older configurations spell this key `ActiveSourceOffRegex`
    #[serde(alias = "ActiveSourceOffRegex", skip_serializing_if = "Option::is_none")]
    pub active_source_off_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_address_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_record_regex: Option<String>,
}

impl PatternConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_statement(mut self, pattern: impl Into<String>) -> Self {
        self.device_statement_regex = Some(pattern.into());
        self
    }

    pub fn with_power_on(mut self, pattern: impl Into<String>) -> Self {
        self.power_on_regex = Some(pattern.into());
        self
    }

    pub fn with_power_off(mut self, pattern: impl Into<String>) -> Self {
        self.power_off_regex = Some(pattern.into());
        self
    }

    pub fn with_active_source_on(mut self, pattern: impl Into<String>) -> Self {
        self.active_source_on_regex = Some(pattern.into());
        self
    }

    pub fn with_active_source_off(mut self, pattern: impl Into<String>) -> Self {
        self.active_source_off_regex = Some(pattern.into());
        self
    }

    pub fn with_event(mut self, pattern: impl Into<String>) -> Self {
        self.event_regex = Some(pattern.into());
        self
    }

    pub fn with_self_address(mut self, pattern: impl Into<String>) -> Self {
        self.self_address_regex = Some(pattern.into());
        self
    }

    pub fn with_device_record(mut self, pattern: impl Into<String>) -> Self {
        self.device_record_regex = Some(pattern.into());
        self
    }

    /// Compile the effective patterns.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InvalidPattern`] naming the first key that fails.
    pub fn compile(&self) -> Result<PatternSet> {
        fn pick<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
            value.as_deref().unwrap_or(default)
        }

        let rules = vec![
            PatternRule::compile(
                RuleKind::PowerOn,
                pick(&self.power_on_regex, DEFAULT_POWER_ON),
            )?,
            PatternRule::compile(
                RuleKind::PowerOff,
                pick(&self.power_off_regex, DEFAULT_POWER_OFF),
            )?,
            PatternRule::compile(
                RuleKind::ActiveSourceOn,
                pick(&self.active_source_on_regex, DEFAULT_ACTIVE_SOURCE_ON),
            )?,
            PatternRule::compile(
                RuleKind::ActiveSourceOff,
                pick(&self.active_source_off_regex, DEFAULT_ACTIVE_SOURCE_OFF),
            )?,
        ];

        Ok(PatternSet {
            device_statement: full_match(
                "deviceStatementRegex",
                pick(&self.device_statement_regex, DEFAULT_DEVICE_STATEMENT),
            )?,
            rules,
            generic: PatternRule::compile(RuleKind::Generic, pick(&self.event_regex, DEFAULT_EVENT))?,
            self_address: full_match(
                "selfAddressRegex",
                pick(&self.self_address_regex, DEFAULT_SELF_ADDRESS),
            )?,
            device_record: full_match(
                "deviceRecordRegex",
                pick(&self.device_record_regex, DEFAULT_DEVICE_RECORD),
            )?,
        })
    }
}

fn full_match(name: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|source| ProtocolError::InvalidPattern { name, source })
}

/// What a rule produces when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    PowerOn,
    PowerOff,
    ActiveSourceOn,
    ActiveSourceOff,
    /// The catch-all evaluated after every specific rule
    Generic,
}

impl RuleKind {
    /// Configuration key the rule's pattern is read from.
    pub fn config_key(self) -> &'static str {
        match self {
            RuleKind::PowerOn => "powerOnRegex",
            RuleKind::PowerOff => "powerOffRegex",
            RuleKind::ActiveSourceOn => "activeSourceOnRegex",
            RuleKind::ActiveSourceOff => "activeSourceOffRegex",
            RuleKind::Generic => "eventRegex",
        }
    }
}

/// One compiled rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    kind: RuleKind,
    source: String,
    regex: Regex,
    has_device_group: bool,
}

impl PatternRule {
    pub fn compile(kind: RuleKind, source: &str) -> Result<Self> {
        let regex = full_match(kind.config_key(), source)?;
        let has_device_group = regex.capture_names().flatten().any(|name| name == "device");
        Ok(Self {
            kind,
            source: source.to_string(),
            regex,
            has_device_group,
        })
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// The pattern as configured, before anchoring.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

/// Outcome of running a line through the rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch {
    Event(Event),
    /// Echoed frame; the generic rule refuses these
    Echo,
    Unmatched,
}

/// The immutable, compiled pattern table.
#[derive(Debug, Clone)]
pub struct PatternSet {
    device_statement: Regex,
    rules: Vec<PatternRule>,
    generic: PatternRule,
    self_address: Regex,
    device_record: Regex,
}

impl PatternSet {
    /// Compile the built-in defaults.
    pub fn defaults() -> Result<Self> {
        PatternConfig::default().compile()
    }

    /// Specific rules in priority order.
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn generic(&self) -> &PatternRule {
        &self.generic
    }

    /// Run `line` through the specific rules, then the generic one.
    pub fn match_line(&self, line: &str) -> LineMatch {
        for rule in &self.rules {
            if let Some(captures) = rule.regex.captures(line) {
                let device = self.target(rule, &captures, line);
                let event = match rule.kind {
                    RuleKind::PowerOn => Event::PowerOn { device },
                    RuleKind::PowerOff => Event::PowerOff { device },
                    RuleKind::ActiveSourceOn => Event::ActiveSourceOn { device },
                    RuleKind::ActiveSourceOff => Event::ActiveSourceOff { device },
                    RuleKind::Generic => continue,
                };
                return LineMatch::Event(event);
            }
        }

        if is_echo(line) {
            return LineMatch::Echo;
        }

        match self.generic.regex.captures(line) {
            Some(captures) => {
                let text = captures
                    .name("event")
                    .or_else(|| captures.iter().skip(1).flatten().last())
                    .map_or(line, |m| m.as_str())
                    .to_string();
                LineMatch::Event(Event::Raw {
                    device: self.target(&self.generic, &captures, line),
                    text,
                })
            }
            None => LineMatch::Unmatched,
        }
    }

    /// Device a line talks about, per the device-statement pattern.
    pub fn device_statement(&self, line: &str) -> Option<LogicalAddress> {
        first_hex_group(&self.device_statement, line)
    }

    /// Local address from an `Addresses controlled by libCEC:` line.
    pub fn self_address(&self, line: &str) -> Option<LogicalAddress> {
        first_hex_group(&self.self_address, line)
    }

    /// Logical index if `line` starts a discovery record.
    pub fn device_record(&self, line: &str) -> Option<LogicalAddress> {
        first_hex_group(&self.device_record, line)
    }

    /// A named `device` group wins. Otherwise a specific rule's first group
    /// counts when it holds a single hex digit, as in `\((.)\) the active
    /// source`; anything else falls back to the device statement.
    fn target(&self, rule: &PatternRule, captures: &Captures<'_>, line: &str) -> Option<LogicalAddress> {
        if rule.has_device_group {
            return captures.name("device").and_then(|m| single_hex(m.as_str()));
        }
        if rule.kind != RuleKind::Generic {
            if let Some(device) = captures.get(1).and_then(|m| single_hex(m.as_str())) {
                return Some(device);
            }
        }
        self.device_statement(line)
    }
}

fn first_hex_group(regex: &Regex, line: &str) -> Option<LogicalAddress> {
    regex
        .captures(line)
        .and_then(|captures| captures.get(1))
        .and_then(|m| single_hex(m.as_str()))
}

fn single_hex(text: &str) -> Option<LogicalAddress> {
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn defaults() -> PatternSet {
        PatternSet::defaults().unwrap()
    }

    fn addr(c: char) -> Option<LogicalAddress> {
        LogicalAddress::from_char(c)
    }

    #[rstest]
    #[case(
        "TV (0): power status changed from 'standby' to 'on'",
        Event::PowerOn { device: addr('0') }
    )]
    #[case(
        "Playback 1 (4): power status changed from 'on' to 'standby'",
        Event::PowerOff { device: addr('4') }
    )]
    #[case(
        "NOTICE:  >> making Playback 1 (4) the active source",
        Event::ActiveSourceOn { device: addr('4') }
    )]
    #[case(
        "DEBUG:   marking TV (0) as inactive source",
        Event::ActiveSourceOff { device: addr('0') }
    )]
    fn test_specific_rules(#[case] line: &str, #[case] expected: Event) {
        assert_eq!(defaults().match_line(line), LineMatch::Event(expected));
    }

    #[test]
    fn test_generic_event_text() {
        let matched = defaults().match_line("TRAFFIC: [  1234]  Recorder 1 (1): vendor = Sony");
        assert_eq!(
            matched,
            LineMatch::Event(Event::Raw {
                device: addr('1'),
                text: "vendor = Sony".to_string()
            })
        );
    }

    #[rstest]
    #[case("TRAFFIC: [ 389] << 10:8f")]
    #[case("TRAFFIC: [ 412] >> 01:90:00")]
    fn test_generic_refuses_echo(#[case] line: &str) {
        assert_eq!(defaults().match_line(line), LineMatch::Echo);
    }

    #[test]
    fn test_unmatched_line() {
        assert_eq!(defaults().match_line("no colon here"), LineMatch::Unmatched);
    }

    #[test]
    fn test_patterns_are_full_matches() {
        // A power-on pattern that only matches a prefix must not fire.
        let set = PatternConfig::new()
            .with_power_on("power on")
            .compile()
            .unwrap();
        assert!(!set.rules()[0].is_match("power on now"));
        assert!(set.rules()[0].is_match("power on"));
    }

    #[test]
    fn test_named_device_group_wins() {
        let set = PatternConfig::new()
            .with_power_on(r"dev (?P<device>[0-9a-f]) woke \(([0-9a-f])\)")
            .compile()
            .unwrap();
        assert_eq!(
            set.match_line("dev 5 woke (3)"),
            LineMatch::Event(Event::PowerOn { device: addr('5') })
        );
    }

    #[test]
    fn test_rule_capture_targets_without_device_statement() {
        let set = PatternConfig::new()
            .with_device_statement(r"DEBUG.* \((.)\).*")
            .compile()
            .unwrap();
        assert_eq!(
            set.match_line("NOTICE: [2371]\tmaking Playback 1 (4) the active source"),
            LineMatch::Event(Event::ActiveSourceOn { device: addr('4') })
        );
        assert_eq!(
            set.match_line("NOTICE: marking TV (0) as inactive source"),
            LineMatch::Event(Event::ActiveSourceOff { device: addr('0') })
        );
        // The power rules capture the previous state, which is no address.
        assert_eq!(
            set.match_line("TV (0): power status changed from 'standby' to 'on'"),
            LineMatch::Event(Event::PowerOn { device: None })
        );
    }

    #[test]
    fn test_named_event_group() {
        let set = PatternConfig::new()
            .with_event(r"(?P<event>[a-z]+) at (\d+)")
            .compile()
            .unwrap();
        assert_eq!(
            set.match_line("beep at 12"),
            LineMatch::Event(Event::Raw {
                device: None,
                text: "beep".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_override_names_key() {
        let err = PatternConfig::new()
            .with_active_source_off("(unclosed")
            .compile()
            .unwrap_err();
        match err {
            ProtocolError::InvalidPattern { name, .. } => assert_eq!(name, "activeSourceOffRegex"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lookahead_is_rejected() {
        let err = PatternConfig::new()
            .with_event(r"^(?!.*(<<|>>)).*: (.*)$")
            .compile()
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPattern { name: "eventRegex", .. }));
    }

    #[test]
    fn test_self_address_and_device_record() {
        let set = defaults();
        assert_eq!(set.self_address("Addresses controlled by libCEC: 1"), addr('1'));
        assert_eq!(set.self_address("Addresses controlled by libCEC: "), None);
        assert_eq!(set.device_record("device #4: Playback 1"), addr('4'));
        assert_eq!(set.device_record("address:       1.0.0.0"), None);
    }

    #[test]
    fn test_config_from_json_accepts_legacy_key() {
        let config: PatternConfig = serde_json::from_str(
            r#"{"powerOnRegex": "on (.)", "ActiveSourceOffRegex": "off (.)"}"#,
        )
        .unwrap();
        assert_eq!(config.power_on_regex.as_deref(), Some("on (.)"));
        assert_eq!(config.active_source_off_regex.as_deref(), Some("off (.)"));
        assert_eq!(config.event_regex, None);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["activeSourceOffRegex"], "off (.)");
        assert!(json.get("eventRegex").is_none());
    }
}
