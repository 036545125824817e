//! License evaluation
//!
//! A license is either an encrypted `key.x` file next to the stub or, when that
//! file cannot be read, the start/end dates compiled into the binary. The
//! evaluator turns it into a [`Remaining`] lifetime or rejects it.
//!
//! Only the file path checks the license `code`. The compiled-in dates are
//! trusted as-is.

use crate::config::StubConfig;
use crate::crypto::{decrypt_aes_cbc, encrypt_aes_cbc};
use crate::defaults::{DATE_FORMAT, LICENSE_FILE_NAME};
use crate::exceptions::{Result, StubError};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Decrypted license payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub valid_start_date: String,
    /// Empty means the license never expires
    #[serde(default)]
    pub valid_end_date: String,
}

impl LicenseRecord {
    /// Decrypt and parse a `key.x` blob
    pub fn open(blob: &[u8], key: &[u8], iv: &[u8]) -> std::result::Result<Self, LicenseError> {
        let plain = decrypt_aes_cbc(blob, key, iv).map_err(|e| {
            warn!("🔐 License decryption failed: {e}");
            LicenseError::Invalid(e.to_string())
        })?;
        serde_json::from_slice(&plain).map_err(|e| {
            warn!("🔐 License payload is not a license record: {e}");
            LicenseError::Invalid(e.to_string())
        })
    }

    /// Serialize and encrypt into the `key.x` wire form
    pub fn seal(&self, key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        let plain = serde_json::to_vec(self)?;
        Ok(encrypt_aes_cbc(&plain, key, iv)?)
    }
}

/// Where the license dates come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseSource {
    /// Raw bytes of an external license file
    File(Vec<u8>),
    /// Dates compiled into the stub
    Embedded,
}

impl LicenseSource {
    pub fn describe(&self) -> &'static str {
        match self {
            LicenseSource::File(_) => LICENSE_FILE_NAME,
            LicenseSource::Embedded => "embedded",
        }
    }
}

/// Read `key.x` from `dir`, falling back to the embedded dates
pub fn read_license_source(dir: &Path) -> LicenseSource {
    let path = dir.join(LICENSE_FILE_NAME);
    match fs::read(&path) {
        Ok(bytes) => {
            debug!("🔑 Read license file {:?} ({} bytes)", path, bytes.len());
            LicenseSource::File(bytes)
        }
        Err(e) => {
            warn!("failed to read {LICENSE_FILE_NAME} -> use app key info ({e})");
            LicenseSource::Embedded
        }
    }
}

/// Lifetime left on an accepted license
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// No end date; no expiry timer is armed
    Unbounded,
    /// Strictly positive time until the end date
    Bounded(Duration),
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Unbounded => write!(f, "unbounded"),
            Remaining::Bounded(d) => {
                let secs = d.as_secs();
                write!(
                    f,
                    "{}d {:02}h {:02}m {:02}s",
                    secs / 86_400,
                    (secs % 86_400) / 3_600,
                    (secs % 3_600) / 60,
                    secs % 60
                )
            }
        }
    }
}

/// Why a license was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseError {
    /// Undecryptable, unparsable, or issued for another build
    Invalid(String),
    /// A date does not match `YYYY-MM-DD HH:MM:SS` in local time
    DateParse(String),
    /// The start date is still in the future
    NotYetValid(String),
    /// The end date has passed
    Expired(String),
}

impl fmt::Display for LicenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LicenseError::Invalid(reason) => write!(f, "license error: {reason}"),
            LicenseError::DateParse(reason) => write!(f, "date parse error: {reason}"),
            LicenseError::NotYetValid(start) => write!(f, "date expired: not valid before {start}"),
            LicenseError::Expired(end) => write!(f, "date expired: ended {end}"),
        }
    }
}

impl std::error::Error for LicenseError {}

/// The validity window a license resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseWindow {
    pub start: String,
    pub end: String,
}

impl LicenseWindow {
    /// Resolve the window from a license source
    ///
    /// # Errors
    ///
    /// File sources fail with [`LicenseError::Invalid`] when the stub's key or
    /// IV is malformed, the blob does not decrypt or parse, or the code differs
    /// from the one compiled into this stub.
    pub fn resolve(
        config: &StubConfig,
        source: &LicenseSource,
    ) -> std::result::Result<Self, LicenseError> {
        match source {
            LicenseSource::Embedded => Ok(LicenseWindow {
                start: config.valid_start_date.clone(),
                end: config.valid_end_date.clone(),
            }),
            LicenseSource::File(blob) => {
                let key = config.key_bytes().map_err(config_to_license)?;
                let iv = config.iv_bytes().map_err(config_to_license)?;
                let record = LicenseRecord::open(blob, &key, &iv)?;
                if record.code != config.code {
                    warn!("🔐 License code does not match this build");
                    return Err(LicenseError::Invalid("code mismatch".to_string()));
                }
                Ok(LicenseWindow {
                    start: record.valid_start_date,
                    end: record.valid_end_date,
                })
            }
        }
    }

    /// Compute the remaining lifetime at `now`
    pub fn remaining_at(
        &self,
        now: DateTime<Local>,
    ) -> std::result::Result<Remaining, LicenseError> {
        let start = parse_local(&self.start)?;
        if now < start {
            return Err(LicenseError::NotYetValid(self.start.clone()));
        }

        if self.end.is_empty() {
            return Ok(Remaining::Unbounded);
        }

        let end = parse_local(&self.end)?;
        if now > end {
            return Err(LicenseError::Expired(self.end.clone()));
        }

        match (end - now).to_std() {
            Ok(left) if !left.is_zero() => Ok(Remaining::Bounded(left)),
            _ => Err(LicenseError::Expired(self.end.clone())),
        }
    }
}

/// Evaluate a license source at `now`
pub fn evaluate(
    config: &StubConfig,
    source: &LicenseSource,
    now: DateTime<Local>,
) -> std::result::Result<Remaining, LicenseError> {
    let remaining = LicenseWindow::resolve(config, source)?.remaining_at(now)?;
    info!(
        "✅ License accepted from {} (remaining: {})",
        source.describe(),
        remaining
    );
    Ok(remaining)
}

/// Evaluate the license found next to the stub against the wall clock
pub fn check_license(
    config: &StubConfig,
    exe_dir: &Path,
) -> std::result::Result<Remaining, LicenseError> {
    let source = read_license_source(exe_dir);
    evaluate(config, &source, Local::now())
}

/// Parse a license date in the local time zone
///
/// Ambiguous times (DST fold) take the earlier instant; times that do not
/// exist locally are rejected.
pub fn parse_local(value: &str) -> std::result::Result<DateTime<Local>, LicenseError> {
    let naive = NaiveDateTime::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| LicenseError::DateParse(format!("{value:?}: {e}")))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| LicenseError::DateParse(format!("{value:?} does not exist locally")))
}

fn config_to_license(err: StubError) -> LicenseError {
    warn!("🔐 {err}");
    LicenseError::Invalid(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::KeyBundle;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f";
    const HEX_IV: &str = "f0e0d0c0b0a090807060504030201000";

    fn config(start: &str, end: &str) -> StubConfig {
        StubConfig {
            code: "6f1c2a9e-build".to_string(),
            hex_key: HEX_KEY.to_string(),
            hex_iv: HEX_IV.to_string(),
            valid_start_date: start.to_string(),
            valid_end_date: end.to_string(),
            key_bundle: KeyBundle::new("AES", "128", "128", "pw"),
            app_args: String::new(),
            runtime_command: "java".to_string(),
        }
    }

    fn now() -> DateTime<Local> {
        parse_local("2025-06-15 12:00:00").unwrap()
    }

    fn sealed(code: &str, start: &str, end: &str) -> LicenseSource {
        let record = LicenseRecord {
            code: code.to_string(),
            valid_start_date: start.to_string(),
            valid_end_date: end.to_string(),
        };
        let blob = record
            .seal(&hex::decode(HEX_KEY).unwrap(), &hex::decode(HEX_IV).unwrap())
            .unwrap();
        LicenseSource::File(blob)
    }

    #[test]
    fn test_future_start_is_not_yet_valid() {
        for end in ["", "2025-06-01 00:00:00", "2030-01-01 00:00:00", "garbage"] {
            let cfg = config("2025-06-16 00:00:00", end);
            assert!(matches!(
                evaluate(&cfg, &LicenseSource::Embedded, now()),
                Err(LicenseError::NotYetValid(_))
            ));
        }
    }

    #[test]
    fn test_empty_end_is_unbounded() {
        let cfg = config("2020-01-01 00:00:00", "");
        assert_eq!(
            evaluate(&cfg, &LicenseSource::Embedded, now()),
            Ok(Remaining::Unbounded)
        );
    }

    #[test]
    fn test_past_end_is_expired() {
        let cfg = config("2020-01-01 00:00:00", "2025-06-15 11:59:59");
        assert_eq!(
            evaluate(&cfg, &LicenseSource::Embedded, now()),
            Err(LicenseError::Expired("2025-06-15 11:59:59".to_string()))
        );
    }

    #[test]
    fn test_end_equal_to_now_is_expired() {
        let cfg = config("2020-01-01 00:00:00", "2025-06-15 12:00:00");
        assert!(matches!(
            evaluate(&cfg, &LicenseSource::Embedded, now()),
            Err(LicenseError::Expired(_))
        ));
    }

    #[test]
    fn test_bounded_remaining_is_end_minus_now() {
        let cfg = config("2025-06-15 12:00:00", "2025-06-15 14:30:00");
        let remaining = evaluate(&cfg, &LicenseSource::Embedded, now()).unwrap();
        assert_eq!(
            remaining,
            Remaining::Bounded(Duration::from_secs(2 * 3600 + 30 * 60))
        );
        assert_eq!(remaining.to_string(), "0d 02h 30m 00s");

        let later = now() + ChronoDuration::minutes(30);
        assert_eq!(
            evaluate(&cfg, &LicenseSource::Embedded, later).unwrap(),
            Remaining::Bounded(Duration::from_secs(2 * 3600))
        );
    }

    #[test]
    fn test_unparsable_dates() {
        let cfg = config("2025/01/01", "");
        assert!(matches!(
            evaluate(&cfg, &LicenseSource::Embedded, now()),
            Err(LicenseError::DateParse(_))
        ));

        let cfg = config("", "");
        assert!(matches!(
            evaluate(&cfg, &LicenseSource::Embedded, now()),
            Err(LicenseError::DateParse(_))
        ));

        let cfg = config("2020-01-01 00:00:00", "tomorrow");
        assert!(matches!(
            evaluate(&cfg, &LicenseSource::Embedded, now()),
            Err(LicenseError::DateParse(_))
        ));
    }

    #[test]
    fn test_file_license_overrides_embedded_dates() {
        // Embedded window is expired, the file grants an open-ended license
        let cfg = config("2020-01-01 00:00:00", "2020-01-02 00:00:00");
        let source = sealed(&cfg.code, "2024-01-01 00:00:00", "");
        assert_eq!(evaluate(&cfg, &source, now()), Ok(Remaining::Unbounded));
    }

    #[test]
    fn test_file_license_code_mismatch() {
        let cfg = config("2020-01-01 00:00:00", "");
        let source = sealed("other-build", "2024-01-01 00:00:00", "");
        assert_eq!(
            evaluate(&cfg, &source, now()),
            Err(LicenseError::Invalid("code mismatch".to_string()))
        );
    }

    #[test]
    fn test_file_license_tampered_or_truncated() {
        let cfg = config("2020-01-01 00:00:00", "");
        let LicenseSource::File(mut blob) = sealed(&cfg.code, "2024-01-01 00:00:00", "") else {
            unreachable!()
        };

        blob.pop();
        assert!(matches!(
            evaluate(&cfg, &LicenseSource::File(blob.clone()), now()),
            Err(LicenseError::Invalid(_))
        ));

        blob.truncate(0);
        assert!(matches!(
            evaluate(&cfg, &LicenseSource::File(blob), now()),
            Err(LicenseError::Invalid(_))
        ));
    }

    #[test]
    fn test_file_license_with_malformed_stub_key() {
        let mut cfg = config("2020-01-01 00:00:00", "");
        let source = sealed(&cfg.code, "2024-01-01 00:00:00", "");
        cfg.hex_key = "not-hex".to_string();
        assert!(matches!(
            evaluate(&cfg, &source, now()),
            Err(LicenseError::Invalid(_))
        ));
    }

    #[test]
    fn test_record_json_field_names() {
        let record: LicenseRecord =
            serde_json::from_str(r#"{"code":"c","validStartDate":"s"}"#).unwrap();
        assert_eq!(record.code, "c");
        assert_eq!(record.valid_start_date, "s");
        assert_eq!(record.valid_end_date, "");

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("validEndDate").is_some());
    }

    #[test]
    fn test_read_license_source() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_license_source(dir.path()), LicenseSource::Embedded);

        fs::write(dir.path().join(LICENSE_FILE_NAME), [1u8, 2, 3]).unwrap();
        assert_eq!(
            read_license_source(dir.path()),
            LicenseSource::File(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_check_license_without_file_uses_embedded() {
        let dir = TempDir::new().unwrap();
        let cfg = config("2000-01-01 00:00:00", "");
        assert_eq!(check_license(&cfg, dir.path()), Ok(Remaining::Unbounded));

        let cfg = config("2000-01-01 00:00:00", "2000-01-02 00:00:00");
        assert!(matches!(
            check_license(&cfg, dir.path()),
            Err(LicenseError::Expired(_))
        ));
    }
}
