use caltools::cfg::SystemConfig;
use std::path::PathBuf;
use std::time::Duration;

fn serialize_config(config: &SystemConfig) -> String {
    let ser = serde_json::to_string(config).unwrap();
    return ser;
}

fn deserialize_config(config: &str) -> SystemConfig {
    let de: SystemConfig = serde_json::from_str(config).unwrap();
    return de;
}

#[test]
fn serde_roundtrip() {
    let config = SystemConfig {
        description: String::from("bench crate, 2 FEB/Ds"),
        bias_calibration: Some(PathBuf::from("tables/bias_calibration.tsv")),
        bias_settings: Some(PathBuf::from("tables/bias_settings.tsv")),
        bias_settling: Duration::from_millis(1500),
    };
    let serconfig = serialize_config(&config);
    let deconfig = deserialize_config(&serconfig);
    assert_eq!(config, deconfig);
}

#[test]
fn de_simple() {
    let x = r#"{
        "description": "minimal system",
        "bias_calibration": null,
        "bias_settings": null
    }"#;

    let de: SystemConfig = serde_json::from_str(x).unwrap();

    let r = SystemConfig {
        description: String::from("minimal system"),
        ..Default::default()
    };

    assert_eq!(r, de);
    // settling falls back to the 2 s default when unspecified
    assert_eq!(Duration::from_secs(2), de.bias_settling);
}

#[test]
fn de_humantime_settling() {
    let x = r#"{
        "description": "slow supply",
        "bias_calibration": null,
        "bias_settings": "tables/bias_settings.tsv",
        "bias_settling": "5s"
    }"#;

    let de: SystemConfig = serde_json::from_str(x).unwrap();
    assert_eq!(
        Duration::from(
            "5s".parse::<humantime::Duration>().unwrap()
        ),
        de.bias_settling
    );
    assert_eq!(None, de.bias_calibration);
    assert_eq!(Some(PathBuf::from("tables/bias_settings.tsv")), de.bias_settings);
}
