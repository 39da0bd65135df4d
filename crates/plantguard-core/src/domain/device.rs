//! Serial port descriptors and target-board detection.
//!
//! When the bridge starts it enumerates every serial interface the OS knows
//! about and has to guess which one is the PlantGuard board.  The guess is a
//! plain allow-list lookup:
//!
//! 1. the USB manufacturer string contains a known vendor name
//!    (case-insensitive), **or**
//! 2. the USB vendor/product identifier pair matches a known board.
//!
//! The first candidate (in enumeration order) that satisfies either rule wins.
//! There is no scoring: two boards plugged in at once are resolved by
//! whichever the OS lists first.
//!
//! # Why a table instead of hardcoded `if`s?
//!
//! Different revisions of the bridge carried slightly different rule sets.
//! Keeping the rules in one [`KnownDevices`] value that can be loaded from the
//! bridge's TOML file means a new board is a config change, not a code change.

use serde::{Deserialize, Serialize};

/// One serial interface as reported by the OS enumeration.
///
/// Produced fresh on every enumeration; nothing is cached between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialDescriptor {
    /// OS path or name of the port (`/dev/ttyACM0`, `COM5`, ...).
    pub path: String,
    /// USB manufacturer string, when the port is a USB device that reports one.
    pub manufacturer: Option<String>,
    /// USB vendor ID as a lowercase 4-digit hex string (e.g. `"2341"`).
    pub vendor_id: Option<String>,
    /// USB product ID as a lowercase 4-digit hex string (e.g. `"0043"`).
    pub product_id: Option<String>,
}

impl SerialDescriptor {
    /// Creates a descriptor with only a path (no USB metadata).
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            manufacturer: None,
            vendor_id: None,
            product_id: None,
        }
    }

    /// Sets the manufacturer string.
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Sets the USB identifiers from their numeric form.
    ///
    /// The IDs are stored as lowercase 4-digit hex so they compare equal to the
    /// strings used in the allow-list (`0x2341` becomes `"2341"`).
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vendor_id = Some(format!("{vid:04x}"));
        self.product_id = Some(format!("{pid:04x}"));
        self
    }
}

/// A USB identifier rule.  A `None` side is a wildcard.
///
/// `UsbId { vendor_id: Some("2341"), product_id: None }` matches every board
/// made by vendor `2341`.  A rule with both sides `None` matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

impl UsbId {
    /// Matches any product from `vendor_id`.
    pub fn vendor(vendor_id: impl Into<String>) -> Self {
        Self {
            vendor_id: Some(vendor_id.into()),
            product_id: None,
        }
    }

    /// Matches `product_id` from any vendor.
    pub fn product(product_id: impl Into<String>) -> Self {
        Self {
            vendor_id: None,
            product_id: Some(product_id.into()),
        }
    }

    /// Matches exactly one vendor/product pair.
    pub fn pair(vendor_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            vendor_id: Some(vendor_id.into()),
            product_id: Some(product_id.into()),
        }
    }

    /// Returns `true` if `descriptor` satisfies every non-wildcard side.
    pub fn matches(&self, descriptor: &SerialDescriptor) -> bool {
        if self.vendor_id.is_none() && self.product_id.is_none() {
            return false;
        }
        id_matches(self.vendor_id.as_deref(), descriptor.vendor_id.as_deref())
            && id_matches(self.product_id.as_deref(), descriptor.product_id.as_deref())
    }
}

fn id_matches(rule: Option<&str>, actual: Option<&str>) -> bool {
    match (rule, actual) {
        (None, _) => true,
        (Some(want), Some(got)) => want.eq_ignore_ascii_case(got),
        (Some(_), None) => false,
    }
}

/// The allow-list of boards the bridge recognises.
///
/// # Default table
///
/// | Rule                         | Board                     |
/// |------------------------------|---------------------------|
/// | manufacturer contains `arduino` | any Arduino-branded board |
/// | vendor `2341`                | Arduino LLC               |
/// | product `0043`               | Arduino Uno               |
/// | product `6001`               | FTDI-based Nano clones    |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownDevices {
    /// Substrings searched for (case-insensitively) in the manufacturer string.
    pub manufacturer_substrings: Vec<String>,
    /// USB identifier rules.
    pub ids: Vec<UsbId>,
}

impl Default for KnownDevices {
    fn default() -> Self {
        Self {
            manufacturer_substrings: vec!["arduino".to_string()],
            ids: vec![
                UsbId::vendor("2341"),
                UsbId::product("0043"),
                UsbId::product("6001"),
            ],
        }
    }
}

impl KnownDevices {
    /// Returns `true` if `descriptor` satisfies at least one rule.
    pub fn matches(&self, descriptor: &SerialDescriptor) -> bool {
        let by_manufacturer = descriptor.manufacturer.as_deref().is_some_and(|m| {
            let m = m.to_lowercase();
            self.manufacturer_substrings
                .iter()
                .filter(|s| !s.is_empty())
                .any(|s| m.contains(&s.to_lowercase()))
        });

        by_manufacturer || self.ids.iter().any(|id| id.matches(descriptor))
    }
}

/// Returns the first candidate, in enumeration order, that `known` recognises.
///
/// Returns `None` when `candidates` is empty or nothing matches; the caller
/// then falls back as described in [`select_port`].
///
/// # Example
///
/// ```rust
/// use plantguard_core::{locate, KnownDevices, SerialDescriptor};
///
/// let ports = vec![
///     SerialDescriptor::new("/dev/ttyS0"),
///     SerialDescriptor::new("/dev/ttyACM0").with_usb_ids(0x2341, 0x0043),
/// ];
/// let found = locate(&ports, &KnownDevices::default()).unwrap();
/// assert_eq!(found.path, "/dev/ttyACM0");
/// ```
pub fn locate<'a>(
    candidates: &'a [SerialDescriptor],
    known: &KnownDevices,
) -> Option<&'a SerialDescriptor> {
    locate_with(candidates, known, |_, _| {})
}

/// Like [`locate`], but calls `observer(candidate, matched)` for every
/// candidate that gets evaluated.
///
/// Evaluation stops at the first match, so candidates after it are not
/// reported.  The bridge uses the observer to log each verdict.
pub fn locate_with<'a, F>(
    candidates: &'a [SerialDescriptor],
    known: &KnownDevices,
    mut observer: F,
) -> Option<&'a SerialDescriptor>
where
    F: FnMut(&SerialDescriptor, bool),
{
    candidates.iter().find(|candidate| {
        let matched = known.matches(candidate);
        observer(candidate, matched);
        matched
    })
}

/// Where the chosen serial path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSource {
    /// Supplied by the operator (`--serial-port` / `SERIAL_PORT`).
    Override,
    /// Found by [`locate`].
    Detected,
    /// Nothing else available; the platform's usual path.
    PlatformDefault,
}

/// The serial path the bridge will try to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSelection {
    pub path: String,
    pub source: PortSource,
}

/// The path used when neither an override nor a detected board is available.
pub fn platform_default_path() -> &'static str {
    if cfg!(target_os = "windows") {
        "COM5"
    } else {
        "/dev/ttyACM0"
    }
}

/// Applies the selection precedence: override > detected > platform default.
///
/// A blank override (empty or whitespace) counts as absent.
pub fn select_port(
    override_path: Option<&str>,
    located: Option<&SerialDescriptor>,
    platform_default: &str,
) -> PortSelection {
    if let Some(path) = override_path.map(str::trim).filter(|p| !p.is_empty()) {
        return PortSelection {
            path: path.to_string(),
            source: PortSource::Override,
        };
    }
    if let Some(found) = located {
        return PortSelection {
            path: found.path.clone(),
            source: PortSource::Detected,
        };
    }
    PortSelection {
        path: platform_default.to_string(),
        source: PortSource::PlatformDefault,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(path: &str) -> SerialDescriptor {
        SerialDescriptor::new(path)
    }

    #[test]
    fn test_with_usb_ids_formats_lowercase_four_digit_hex() {
        let d = plain("/dev/ttyUSB0").with_usb_ids(0x0403, 0x6001);
        assert_eq!(d.vendor_id.as_deref(), Some("0403"));
        assert_eq!(d.product_id.as_deref(), Some("6001"));
    }

    #[test]
    fn test_manufacturer_match_is_case_insensitive() {
        // Arrange
        let d = plain("COM3").with_manufacturer("Arduino LLC (www.arduino.cc)");

        // Act / Assert
        assert!(KnownDevices::default().matches(&d));
    }

    #[test]
    fn test_vendor_wildcard_rule_matches_any_product() {
        let d = plain("/dev/ttyACM1").with_usb_ids(0x2341, 0x8036);
        assert!(KnownDevices::default().matches(&d));
    }

    #[test]
    fn test_product_rule_matches_without_vendor() {
        let mut d = plain("/dev/ttyUSB0");
        d.product_id = Some("6001".to_string());
        assert!(KnownDevices::default().matches(&d));
    }

    #[test]
    fn test_id_comparison_ignores_hex_case() {
        let known = KnownDevices {
            manufacturer_substrings: vec![],
            ids: vec![UsbId::pair("1A86", "7523")],
        };
        let d = plain("/dev/ttyUSB0").with_usb_ids(0x1a86, 0x7523);
        assert!(known.matches(&d));
    }

    #[test]
    fn test_pair_rule_requires_both_sides() {
        let known = KnownDevices {
            manufacturer_substrings: vec![],
            ids: vec![UsbId::pair("1a86", "7523")],
        };
        let d = plain("/dev/ttyUSB0").with_usb_ids(0x1a86, 0x0001);
        assert!(!known.matches(&d));
    }

    #[test]
    fn test_all_wildcard_rule_matches_nothing() {
        let known = KnownDevices {
            manufacturer_substrings: vec![],
            ids: vec![UsbId {
                vendor_id: None,
                product_id: None,
            }],
        };
        assert!(!known.matches(&plain("/dev/ttyS0")));
    }

    #[test]
    fn test_empty_substring_does_not_match_everything() {
        let known = KnownDevices {
            manufacturer_substrings: vec![String::new()],
            ids: vec![],
        };
        let d = plain("/dev/ttyS0").with_manufacturer("Generic");
        assert!(!known.matches(&d));
    }

    #[test]
    fn test_locate_returns_none_for_empty_candidates() {
        assert!(locate(&[], &KnownDevices::default()).is_none());
    }

    #[test]
    fn test_locate_returns_first_match_in_enumeration_order() {
        // Arrange: two matching boards, the second one listed later
        let ports = vec![
            plain("/dev/ttyS0"),
            plain("/dev/ttyACM0").with_manufacturer("Arduino (www.arduino.cc)"),
            plain("/dev/ttyACM1").with_usb_ids(0x2341, 0x0043),
        ];

        // Act
        let found = locate(&ports, &KnownDevices::default());

        // Assert
        assert_eq!(found.map(|d| d.path.as_str()), Some("/dev/ttyACM0"));
    }

    #[test]
    fn test_locate_with_reports_each_evaluated_candidate() {
        let ports = vec![
            plain("/dev/ttyS0"),
            plain("/dev/ttyACM0").with_usb_ids(0x2341, 0x0043),
            plain("/dev/ttyACM1").with_usb_ids(0x2341, 0x0043),
        ];
        let mut seen = Vec::new();

        let found = locate_with(&ports, &KnownDevices::default(), |d, m| {
            seen.push((d.path.clone(), m));
        });

        assert_eq!(found.map(|d| d.path.as_str()), Some("/dev/ttyACM0"));
        // Evaluation stops at the first match.
        assert_eq!(
            seen,
            vec![
                ("/dev/ttyS0".to_string(), false),
                ("/dev/ttyACM0".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_select_port_prefers_override() {
        let found = plain("/dev/ttyACM0");
        let sel = select_port(Some("/dev/ttyUSB9"), Some(&found), "/dev/ttyACM0");
        assert_eq!(sel.path, "/dev/ttyUSB9");
        assert_eq!(sel.source, PortSource::Override);
    }

    #[test]
    fn test_select_port_ignores_blank_override() {
        let found = plain("/dev/ttyACM3");
        let sel = select_port(Some("  "), Some(&found), "/dev/ttyACM0");
        assert_eq!(sel.path, "/dev/ttyACM3");
        assert_eq!(sel.source, PortSource::Detected);
    }

    #[test]
    fn test_select_port_falls_back_to_platform_default() {
        let sel = select_port(None, None, "COM5");
        assert_eq!(sel.path, "COM5");
        assert_eq!(sel.source, PortSource::PlatformDefault);
    }

    #[test]
    fn test_known_devices_deserializes_from_toml_with_wildcards() {
        // Arrange
        let text = r#"
manufacturer_substrings = ["arduino", "wch"]

[[ids]]
vendor_id = "1a86"

[[ids]]
vendor_id = "2341"
product_id = "0043"
"#;

        // Act
        let known: KnownDevices = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(known.manufacturer_substrings, vec!["arduino", "wch"]);
        assert_eq!(known.ids[0], UsbId::vendor("1a86"));
        assert_eq!(known.ids[1], UsbId::pair("2341", "0043"));
    }

    #[test]
    fn test_known_devices_missing_fields_use_defaults() {
        let known: KnownDevices = toml::from_str("").unwrap();
        assert_eq!(known, KnownDevices::default());
    }
}
