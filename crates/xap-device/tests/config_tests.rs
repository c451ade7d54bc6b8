//! Device configuration tests

use xap_core::{Level, State};
use xap_device::{Device, DeviceConfig, DeviceError, EndpointKind};

const CONFIG: &str = r#"
address = "ACME.Lighting.apartment"
uid = "ff345600"
interval = 30

[[endpoints]]
name = "Output 1"
output = true
state = "off"
level = "0/30"

[[endpoints]]
name = "Switch"
uid = 7
state = "?"

[[endpoints]]
name = "Display"
output = true
state = "on"
text = ""
display_text = "Idle"
"#;

#[test]
fn test_load_full_config() {
    let device = DeviceConfig::from_toml(CONFIG).unwrap().build().unwrap();
    assert_eq!(device.address().as_str(), "ACME.Lighting.apartment");
    assert_eq!(device.uid().as_str(), "FF345600");
    assert_eq!(device.interval(), 30);
    assert_eq!(device.len(), 3);

    let output = device.endpoint("output 1").unwrap();
    assert_eq!(output.uid(), 1);
    assert_eq!(output.kind(), EndpointKind::Output);
    assert_eq!(output.state(), State::Off);
    assert_eq!(
        output.level(),
        Some(Level::Ratio {
            numerator: 0,
            denominator: 30
        })
    );

    let switch = device.endpoint("switch").unwrap();
    assert_eq!(switch.uid(), 7);
    assert_eq!(switch.kind(), EndpointKind::Input);
    assert_eq!(switch.state(), State::Unknown);

    let display = device.endpoint("display").unwrap();
    assert_eq!(display.uid(), 2);
    assert_eq!(display.display_text(), Some("Idle"));
}

#[test]
fn test_random_uid_when_absent() {
    let config = DeviceConfig::from_toml("address = \"a.b.c\"\n").unwrap();
    let device = config.build().unwrap();
    assert!(device.uid().as_str().starts_with("FF"));
    assert!(device.uid().as_str().ends_with("00"));
}

#[test]
fn test_invalid_configs() {
    let cases = [
        // Wildcard device address
        "address = \"a.b.*\"\n",
        // Bad uid
        "address = \"a.b.c\"\nuid = \"FF000000\"\n",
        // Missing state
        "address = \"a.b.c\"\n[[endpoints]]\nname = \"x\"\n",
        // Duplicate names
        "address = \"a.b.c\"\n[[endpoints]]\nname = \"x\"\nstate = \"on\"\n[[endpoints]]\nname = \"X\"\nstate = \"on\"\n",
        // Bad level
        "address = \"a.b.c\"\n[[endpoints]]\nname = \"x\"\nstate = \"on\"\nlevel = \"half\"\n",
    ];
    for text in cases {
        let result = DeviceConfig::from_toml(text).and_then(|c| c.build());
        assert!(result.is_err(), "expected error for {:?}", text);
    }
}

#[test]
fn test_load_missing_file() {
    assert!(matches!(
        DeviceConfig::load("/nonexistent/device.toml"),
        Err(DeviceError::Config(_))
    ));
}
