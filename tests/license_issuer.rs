//! The issuer binary produces files the stub accepts

mod common;

use std::process::Command;
use tempfile::TempDir;
use xlaunch::LicenseRecord;
use xlaunch::Remaining;
use xlaunch::exit_codes::EXIT_CONFIG_ERROR;
use xlaunch::license::{LicenseSource, evaluate, parse_local};

fn issuer() -> Command {
    Command::new(env!("CARGO_BIN_EXE_xlaunch-license"))
}

#[test]
fn test_issued_license_is_accepted() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("key.x");

    let status = issuer()
        .args(["--code", common::CODE])
        .args(["--start", "2024-01-01 00:00:00"])
        .args(["--end", "2024-12-31 23:59:59"])
        .args(["--hex-key", common::HEX_KEY, "--hex-iv", common::HEX_IV])
        .arg("-o")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let blob = std::fs::read(&output).unwrap();
    assert_eq!(blob.len() % 16, 0);

    let record = LicenseRecord::open(
        &blob,
        &hex::decode(common::HEX_KEY).unwrap(),
        &hex::decode(common::HEX_IV).unwrap(),
    )
    .unwrap();
    assert_eq!(record.code, common::CODE);
    assert_eq!(record.valid_end_date, "2024-12-31 23:59:59");

    // Fallback dates are long expired; the file decides
    let config = common::config("2000-01-01 00:00:00", "2000-01-02 00:00:00");
    let now = parse_local("2024-12-31 23:59:00").unwrap();
    assert_eq!(
        evaluate(&config, &LicenseSource::File(blob), now),
        Ok(Remaining::Bounded(std::time::Duration::from_secs(59)))
    );
}

#[test]
fn test_issuer_rejects_bad_dates() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("key.x");

    let status = issuer()
        .args(["--code", common::CODE, "--start", "01/01/2024"])
        .args(["--hex-key", common::HEX_KEY, "--hex-iv", common::HEX_IV])
        .arg("-o")
        .arg(&output)
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(EXIT_CONFIG_ERROR));
    assert!(!output.exists());
}
