//! Integration tests for serial device selection.
//!
//! These exercise the locator, the allow-list table and the selection
//! precedence together through the public API, the way the bridge drives them
//! on every connection attempt.

use plantguard_core::{
    locate, locate_with, select_port, Delimiter, KnownDevices, LineFramer, PortSource, Scalar,
    SensorReading, SerialDescriptor, UsbId,
};

fn bluetooth() -> SerialDescriptor {
    SerialDescriptor::new("/dev/ttyS0")
}

fn uno() -> SerialDescriptor {
    SerialDescriptor::new("/dev/ttyACM0")
        .with_manufacturer("Arduino (www.arduino.cc)")
        .with_usb_ids(0x2341, 0x0043)
}

fn ftdi_nano() -> SerialDescriptor {
    SerialDescriptor::new("/dev/ttyUSB0")
        .with_manufacturer("FTDI")
        .with_usb_ids(0x0403, 0x6001)
}

#[test]
fn test_first_match_in_enumeration_order_wins() {
    // Arrange: two matching boards, FTDI enumerated first
    let ports = vec![bluetooth(), ftdi_nano(), uno()];

    // Act
    let found = locate(&ports, &KnownDevices::default());

    // Assert
    assert_eq!(found.map(|d| d.path.as_str()), Some("/dev/ttyUSB0"));
}

#[test]
fn test_result_is_always_one_of_the_candidates() {
    let ports = vec![uno(), ftdi_nano(), bluetooth()];
    let found = locate(&ports, &KnownDevices::default()).unwrap();
    assert!(ports.iter().any(|p| std::ptr::eq(p, found)));
}

#[test]
fn test_no_candidates_returns_none() {
    assert!(locate(&[], &KnownDevices::default()).is_none());
}

#[test]
fn test_no_match_falls_back_to_platform_default() {
    // Arrange
    let ports = vec![bluetooth()];
    let located = locate(&ports, &KnownDevices::default());

    // Act
    let selection = select_port(None, located, "/dev/ttyACM0");

    // Assert
    assert_eq!(selection.path, "/dev/ttyACM0");
    assert_eq!(selection.source, PortSource::PlatformDefault);
}

#[test]
fn test_override_beats_a_detected_board() {
    let ports = vec![uno()];
    let located = locate(&ports, &KnownDevices::default());
    let selection = select_port(Some("/dev/ttyUSB7"), located, "COM5");
    assert_eq!(selection.source, PortSource::Override);
    assert_eq!(selection.path, "/dev/ttyUSB7");
}

#[test]
fn test_custom_table_replaces_the_defaults() {
    // Arrange: only a CH340 clone is allowed
    let known = KnownDevices {
        manufacturer_substrings: vec![],
        ids: vec![UsbId::pair("1a86", "7523")],
    };
    let clone = SerialDescriptor::new("/dev/ttyUSB1").with_usb_ids(0x1a86, 0x7523);
    let ports = vec![uno(), clone];

    // Act
    let found = locate(&ports, &known);

    // Assert
    assert_eq!(found.map(|d| d.path.as_str()), Some("/dev/ttyUSB1"));
}

#[test]
fn test_observer_sees_every_candidate_up_to_the_match() {
    // Arrange
    let ports = vec![bluetooth(), uno(), ftdi_nano()];
    let mut seen = Vec::new();

    // Act
    locate_with(&ports, &KnownDevices::default(), |d, matched| {
        seen.push((d.path.clone(), matched));
    });

    // Assert
    assert_eq!(
        seen,
        vec![
            ("/dev/ttyS0".to_string(), false),
            ("/dev/ttyACM0".to_string(), true),
        ]
    );
}

#[test]
fn test_framed_serial_bytes_become_readings() {
    // Arrange: a CRLF device read with the default LF delimiter
    let mut framer = LineFramer::new(Delimiter::default());

    // Act
    let readings: Vec<SensorReading> = framer
        .push(b"42\r\n\r\nDATA;LDR=17;MON=1\r\n")
        .iter()
        .filter_map(|f| SensorReading::from_frame(f))
        .collect();

    // Assert: the blank line is skipped
    assert_eq!(
        readings,
        vec![
            SensorReading::new(Scalar::Integer(42)),
            SensorReading::new(Scalar::Integer(17)),
        ]
    );
}
