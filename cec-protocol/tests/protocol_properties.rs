//! Property-based tests for line classification and discovery segmentation

use cec_protocol::discovery::segment;
use cec_protocol::{
    CecClassifier, Classification, Event, LineClassifier, LineMatch, LogicalAddress, PatternSet,
};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn patterns() -> PatternSet {
    PatternSet::defaults().unwrap()
}

fn hex_digit() -> impl Strategy<Value = char> {
    prop::sample::select("0123456789abcdefABCDEF".chars().collect::<Vec<_>>())
}

/// Device names as cec-client prints them: no parentheses
fn device_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,11}"
}

#[derive(Debug, Clone)]
struct DumpedDevice {
    index: char,
    vendor: String,
    osd: String,
    powered_on: bool,
    active: bool,
}

fn dumped_device() -> impl Strategy<Value = DumpedDevice> {
    (
        prop::sample::select("0123456789ABCDEF".chars().collect::<Vec<_>>()),
        "[A-Za-z]{0,10}",
        "[A-Za-z0-9]{0,10}",
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(index, vendor, osd, powered_on, active)| DumpedDevice {
            index,
            vendor,
            osd,
            powered_on,
            active,
        })
}

fn render_dump(devices: &[DumpedDevice]) -> Vec<String> {
    let mut lines = vec!["CEC bus information".to_string()];
    for device in devices {
        lines.push(format!("device #{}: {}", device.index, device.osd));
        lines.push("address:       1.0.0.0".to_string());
        lines.push(format!(
            "active source: {}",
            if device.active { "yes" } else { "no" }
        ));
        lines.push(format!("vendor:        {}", device.vendor));
        lines.push(format!("osd string:    {}", device.osd));
        lines.push(format!(
            "power status:  {}",
            if device.powered_on { "on" } else { "standby" }
        ));
        lines.push("language:      eng".to_string());
        lines.push(String::new());
    }
    lines.push("currently active source: unknown (-1)".to_string());
    lines
}

// ============================================================================
// Power transitions carry polarity and target
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_power_transition_polarity_and_target(
        name in device_name(),
        digit in hex_digit(),
        from in "[a-z]{1,10}",
        on in any::<bool>(),
    ) {
        let to = if on { "on" } else { "standby" };
        let line = format!("{name} ({digit}): power status changed from '{from}' to '{to}'");
        let device = LogicalAddress::from_char(digit);

        let expected = if on {
            Event::PowerOn { device }
        } else {
            Event::PowerOff { device }
        };
        prop_assert_eq!(patterns().match_line(&line), LineMatch::Event(expected));
    }

    // ========================================================================
    // The generic rule never fires on echoed frames
    // ========================================================================

    #[test]
    fn prop_generic_rule_refuses_echo_markers(
        prefix in "[ -~]{0,20}",
        marker in prop::sample::select(vec!["<<", ">>"]),
        suffix in "[ -~]{0,20}",
    ) {
        let line = format!("{prefix}: {marker} {suffix}");
        let matched = patterns().match_line(&line);
        prop_assert!(!matches!(matched, LineMatch::Event(Event::Raw { .. })), "{:?}", matched);
    }

    // ========================================================================
    // Segmentation is idempotent and faithful
    // ========================================================================

    #[test]
    fn prop_segmentation_is_idempotent(devices in prop::collection::vec(dumped_device(), 0..6)) {
        let capture = render_dump(&devices);
        let classifier = CecClassifier::with_defaults().unwrap();

        let first = classifier.segment(&capture, true);
        let second = classifier.segment(&capture, true);
        prop_assert_eq!(&first, &second);

        prop_assert_eq!(first.len(), devices.len());
        prop_assert!(first.is_complete());
        for (parsed, source) in first.devices.iter().zip(&devices) {
            prop_assert_eq!(parsed.index.as_char(), source.index);
            prop_assert_eq!(&parsed.vendor, &source.vendor);
            prop_assert_eq!(&parsed.osd_name, &source.osd);
            prop_assert_eq!(parsed.powered_on, source.powered_on);
            prop_assert_eq!(parsed.active_source, source.active);
            prop_assert_eq!(
                &parsed.unique_id,
                &cec_protocol::unique_id(&source.vendor, &source.osd)
            );
        }
    }

    #[test]
    fn prop_truncated_dump_never_drops_started_records(
        devices in prop::collection::vec(dumped_device(), 1..5),
        cut in 1usize..40,
    ) {
        let mut capture = render_dump(&devices);
        capture.truncate(cut.min(capture.len()));

        let scan = segment(&patterns(), &capture, false);
        let started = capture.iter().filter(|l| l.starts_with("device #")).count();
        prop_assert_eq!(scan.len(), started);
        prop_assert!(!scan.is_complete());
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_power_on_scenario_through_classifier() {
    let classifier = CecClassifier::with_defaults().unwrap();
    let classification =
        classifier.classify("TV (0): power status changed from 'standby' to 'on'", true);
    assert_eq!(
        classification,
        Classification::Event(Event::PowerOn {
            device: LogicalAddress::from_char('0')
        })
    );
}

#[test]
fn test_echo_line_is_dropped_by_classifier() {
    let classifier = CecClassifier::with_defaults().unwrap();
    assert_eq!(
        classifier.classify("TRAFFIC: [     1701]\t<< 10:47:43:45:43", true),
        Classification::Echo
    );
}
