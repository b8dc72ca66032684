//! Discovery dump segmentation
//!
//! A `scan` makes cec-client print one block per device:
//!
//! ```text
//! device #0: TV
//! address:       0.0.0.0
//! active source: no
//! vendor:        Sony
//! osd string:    TV
//! power status:  on
//! language:      eng
//! ```
//!
//! followed by a `currently active source` line. `language` is the last field
//! of every block and completes a record.

use serde::Serialize;

use crate::address::{LogicalAddress, PhysicalAddress};
use crate::patterns::PatternSet;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable identifier derived from vendor and name.
///
/// FNV-1a over the vendor bytes followed by the name bytes, rendered as 16
/// lowercase hex digits. Identical inventories therefore produce identical
/// ids across scans and across process restarts.
pub fn unique_id(vendor: &str, name: &str) -> String {
    let hash = vendor
        .bytes()
        .chain(name.bytes())
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        });
    format!("{hash:016x}")
}

/// One device from a discovery dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub index: LogicalAddress,
    /// Physical address in dotted form, as printed
    pub address: String,
    pub vendor: String,
    pub osd_name: String,
    pub active_source: bool,
    pub powered_on: bool,
    pub language: Option<String>,
    pub unique_id: String,
    /// False when the record was cut short before its `language` line
    pub complete: bool,
}

impl DeviceInfo {
    pub fn physical_address(&self) -> Option<PhysicalAddress> {
        self.address.parse().ok()
    }

    /// Identifier suitable for a discovered thing: `vendor_name` with every
    /// non-word character removed and `unknown` standing in for empty parts.
    pub fn thing_id(&self) -> String {
        fn part(value: &str) -> String {
            if value.is_empty() {
                "unknown".to_string()
            } else {
                value
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect()
            }
        }
        format!("{}_{}", part(&self.vendor), part(&self.osd_name))
    }
}

/// Result of one discovery capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryScan {
    pub devices: Vec<DeviceInfo>,
    /// The terminal marker was seen
    pub terminated: bool,
    /// The capture stopped on the wall-clock limit
    pub timed_out: bool,
}

impl DiscoveryScan {
    /// True only when the dump ended normally and every record is whole.
    pub fn is_complete(&self) -> bool {
        self.terminated && !self.timed_out && self.devices.iter().all(|d| d.complete)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn find(&self, index: LogicalAddress) -> Option<&DeviceInfo> {
        self.devices.iter().find(|d| d.index == index)
    }
}

struct RecordBuilder {
    index: LogicalAddress,
    address: String,
    vendor: String,
    osd_name: String,
    active_source: bool,
    powered_on: bool,
    language: Option<String>,
}

impl RecordBuilder {
    fn new(index: LogicalAddress) -> Self {
        Self {
            index,
            address: String::new(),
            vendor: String::new(),
            osd_name: String::new(),
            active_source: false,
            powered_on: false,
            language: None,
        }
    }

    fn apply(&mut self, key: &str, value: &str) -> bool {
        match key.to_ascii_lowercase().as_str() {
            "address" => self.address = value.to_string(),
            "active source" => self.active_source = value.eq_ignore_ascii_case("yes"),
            "vendor" => self.vendor = value.to_string(),
            "osd string" => self.osd_name = value.to_string(),
            "power status" => self.powered_on = value.eq_ignore_ascii_case("on"),
            "language" => {
                self.language = Some(value.to_string());
                return true;
            }
            _ => {}
        }
        false
    }

    fn finish(self, complete: bool) -> DeviceInfo {
        DeviceInfo {
            index: self.index,
            unique_id: unique_id(&self.vendor, &self.osd_name),
            address: self.address,
            vendor: self.vendor,
            osd_name: self.osd_name,
            active_source: self.active_source,
            powered_on: self.powered_on,
            language: self.language,
            complete,
        }
    }
}

/// Carve a captured dump into device records.
///
/// Records cut short by the next record or by the end of the capture are kept
/// with `complete == false`. Lines outside any record are skipped.
pub fn segment(patterns: &PatternSet, lines: &[String], terminated: bool) -> DiscoveryScan {
    let mut devices = Vec::new();
    let mut current: Option<RecordBuilder> = None;

    for line in lines {
        if let Some(index) = patterns.device_record(line) {
            if let Some(interrupted) = current.take() {
                tracing::debug!("device record interrupted by {}", line);
                devices.push(interrupted.finish(false));
            }
            current = Some(RecordBuilder::new(index));
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        if record.apply(key, value.trim()) {
            if let Some(done) = current.take() {
                devices.push(done.finish(true));
            }
        }
    }

    if let Some(partial) = current.take() {
        tracing::debug!("device record cut short at end of capture");
        devices.push(partial.finish(false));
    }

    DiscoveryScan {
        devices,
        terminated,
        timed_out: false,
    }
}
