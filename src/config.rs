//! Build-time configuration of the stub
//!
//! Every value here is stamped into the binary by `build.rs`. The launcher
//! builds one [`StubConfig`] at start-up and passes it by reference; nothing is
//! mutated afterwards.

use crate::defaults::STAGED_ARTIFACT_NAME;
use crate::exceptions::{Result, StubError};
use crate::handoff::KeyBundle;

/// Immutable launcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubConfig {
    /// License code a `key.x` file must carry to be accepted
    pub code: String,
    /// AES key for `key.x`, hex encoded
    pub hex_key: String,
    /// AES IV for `key.x`, hex encoded
    pub hex_iv: String,
    /// Fallback start date used when no license file is present
    pub valid_start_date: String,
    /// Fallback end date; empty means no expiry
    pub valid_end_date: String,
    /// Key material handed to the protected program
    pub key_bundle: KeyBundle,
    /// Extra runtime arguments placed before `-jar app.jar`
    pub app_args: String,
    /// Runtime executable inside the run directory's bin folder
    pub runtime_command: String,
}

impl StubConfig {
    /// Configuration stamped into this binary at build time
    pub fn embedded() -> Self {
        StubConfig {
            code: env!("XLAUNCH_CODE").to_string(),
            hex_key: env!("XLAUNCH_HEX_KEY").to_string(),
            hex_iv: env!("XLAUNCH_HEX_IV").to_string(),
            valid_start_date: env!("XLAUNCH_VALID_START").to_string(),
            valid_end_date: env!("XLAUNCH_VALID_END").to_string(),
            key_bundle: KeyBundle::new(
                env!("XLAUNCH_KEY_ALGORITHM"),
                env!("XLAUNCH_KEY_SIZE"),
                env!("XLAUNCH_IV_SIZE"),
                env!("XLAUNCH_KEY_PASSWORD"),
            ),
            app_args: env!("XLAUNCH_APP_ARGS").to_string(),
            runtime_command: env!("XLAUNCH_RUNTIME_COMMAND").to_string(),
        }
    }

    /// Decoded license key
    pub fn key_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.hex_key)
            .map_err(|e| StubError::Config(format!("license key is not valid hex: {e}")))
    }

    /// Decoded license IV
    pub fn iv_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.hex_iv)
            .map_err(|e| StubError::Config(format!("license IV is not valid hex: {e}")))
    }

    /// Arguments for the runtime: `<app_args> -jar app.jar` then `extra`
    pub fn launch_args(&self, extra: &[String]) -> Vec<String> {
        let mut args: Vec<String> = self
            .app_args
            .split_whitespace()
            .map(String::from)
            .collect();
        args.push("-jar".to_string());
        args.push(STAGED_ARTIFACT_NAME.to_string());
        args.extend_from_slice(extra);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StubConfig {
        StubConfig {
            code: "build-42".to_string(),
            hex_key: "00112233445566778899aabbccddeeff".to_string(),
            hex_iv: "zz".to_string(),
            valid_start_date: "2024-01-01 00:00:00".to_string(),
            valid_end_date: String::new(),
            key_bundle: KeyBundle::new("AES", "128", "128", "secret"),
            app_args: "  -Xmx512m   -XX:+DisableAttachMechanism ".to_string(),
            runtime_command: "java".to_string(),
        }
    }

    #[test]
    fn test_launch_args_order() {
        let args = sample().launch_args(&["--port".to_string(), "8080".to_string()]);
        assert_eq!(
            args,
            vec![
                "-Xmx512m",
                "-XX:+DisableAttachMechanism",
                "-jar",
                "app.jar",
                "--port",
                "8080"
            ]
        );
    }

    #[test]
    fn test_launch_args_without_app_args() {
        let mut config = sample();
        config.app_args = String::new();
        assert_eq!(config.launch_args(&[]), vec!["-jar", "app.jar"]);
    }

    #[test]
    fn test_hex_decoding() {
        let config = sample();
        assert_eq!(config.key_bytes().unwrap().len(), 16);
        assert!(matches!(config.iv_bytes(), Err(StubError::Config(_))));
    }

    #[test]
    fn test_embedded_has_runtime_command() {
        let config = StubConfig::embedded();
        assert!(!config.runtime_command.is_empty());
    }
}
