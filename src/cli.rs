//! CLI mode handlers, enabled with `XLAUNCH_CLI=1`

use crate::config::StubConfig;
use crate::defaults::{CLI_ENV, STAGED_ARTIFACT_NAME};
use crate::exit_codes::{EXIT_FAILURE, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::launcher::{LaunchOptions, LaunchPhase};
use crate::license::{LicenseWindow, evaluate};
use crate::version::full_version;
use chrono::Local;
use std::io::{self, Write};

/// Route a CLI-mode command; no command means `info`
pub fn dispatch(args: &[String], config: &StubConfig, options: &LaunchOptions) -> i32 {
    let command = args.first().map_or("info", String::as_str);
    log::debug!("🖥️ CLI command: {command}");

    let mut out = io::stdout().lock();
    match command {
        "info" => show_info(&mut out, config, options),
        "check" => check(&mut out, config, options),
        "help" | "--help" => {
            print_help(&mut out);
            EXIT_SUCCESS
        }
        _ => {
            eprintln!("Error: Unknown command '{command}'");
            eprintln!("Available commands: info, check, help");
            EXIT_INVALID_ARGS
        }
    }
}

/// Print version, license window and remaining time
pub fn show_info<W: Write>(out: &mut W, config: &StubConfig, options: &LaunchOptions) -> i32 {
    let source = options.license_source();
    let _ = writeln!(out, "xlaunch stub {}", full_version());
    let _ = writeln!(out, "License source: {}", source.describe());

    match LicenseWindow::resolve(config, &source) {
        Ok(window) => {
            let until = if window.end.is_empty() { "never" } else { window.end.as_str() };
            let _ = writeln!(out, "Valid from: {}", window.start);
            let _ = writeln!(out, "Valid until: {until}");
            match window.remaining_at(Local::now()) {
                Ok(remaining) => {
                    let _ = writeln!(out, "Remaining: {remaining}");
                }
                Err(e) => {
                    let _ = writeln!(out, "Status: {e}");
                }
            }
        }
        Err(e) => {
            let _ = writeln!(out, "Status: {e}");
        }
    }

    let _ = writeln!(out, "Runtime: {}", config.runtime_command);
    let _ = writeln!(out, "Artifact: {STAGED_ARTIFACT_NAME}");
    EXIT_SUCCESS
}

/// Exit 0 when the license is valid now, the failure code otherwise
pub fn check<W: Write>(out: &mut W, config: &StubConfig, options: &LaunchOptions) -> i32 {
    match evaluate(config, &options.license_source(), Local::now()) {
        Ok(remaining) => {
            let _ = writeln!(out, "license valid (remaining: {remaining})");
            EXIT_SUCCESS
        }
        Err(e) => {
            log::warn!("🔐 {e}");
            let _ = writeln!(out, "{}", LaunchPhase::License.message());
            EXIT_FAILURE
        }
    }
}

pub fn print_help<W: Write>(out: &mut W) {
    let _ = writeln!(out, "xlaunch stub - CLI Mode");
    let _ = writeln!(out);
    let _ = writeln!(out, "Available commands:");
    let _ = writeln!(out, "  info    Show version and license window (default)");
    let _ = writeln!(out, "  check   Exit 0 if the license is currently valid");
    let _ = writeln!(out, "  help    Show this help message");
    let _ = writeln!(out);
    let _ = writeln!(out, "Usage:");
    let _ = writeln!(out, "  {CLI_ENV}=1 ./app <command>");
    let _ = writeln!(out);
    let _ = writeln!(out, "Without {CLI_ENV} every argument goes to the application.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::KeyBundle;
    use crate::license::LicenseRecord;
    use tempfile::TempDir;

    fn config(end: &str) -> StubConfig {
        StubConfig {
            code: "cli-test".to_string(),
            hex_key: "2b7e151628aed2a6abf7158809cf4f3c".to_string(),
            hex_iv: "000102030405060708090a0b0c0d0e0f".to_string(),
            valid_start_date: "2000-01-01 00:00:00".to_string(),
            valid_end_date: end.to_string(),
            key_bundle: KeyBundle::new("AES", "128", "128", "pw"),
            app_args: String::new(),
            runtime_command: "java".to_string(),
        }
    }

    fn options_in(dir: &TempDir) -> LaunchOptions {
        LaunchOptions {
            exe_dir: Some(dir.path().to_path_buf()),
            ..LaunchOptions::default()
        }
    }

    #[test]
    fn test_info_embedded_unbounded() {
        let dir = TempDir::new().unwrap();
        let mut out = Vec::new();
        let code = show_info(&mut out, &config(""), &options_in(&dir));
        let text = String::from_utf8(out).unwrap();

        assert_eq!(code, EXIT_SUCCESS);
        assert!(text.contains("License source: embedded"));
        assert!(text.contains("Valid until: never"));
        assert!(text.contains("Remaining: unbounded"));
    }

    #[test]
    fn test_info_reads_license_file() {
        let dir = TempDir::new().unwrap();
        let cfg = config("2000-01-02 00:00:00");
        let record = LicenseRecord {
            code: cfg.code.clone(),
            valid_start_date: "2001-01-01 00:00:00".to_string(),
            valid_end_date: "2099-12-31 23:59:59".to_string(),
        };
        let blob = record
            .seal(&cfg.key_bytes().unwrap(), &cfg.iv_bytes().unwrap())
            .unwrap();
        std::fs::write(dir.path().join("key.x"), blob).unwrap();

        let mut out = Vec::new();
        show_info(&mut out, &cfg, &options_in(&dir));
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("License source: key.x"));
        assert!(text.contains("Valid from: 2001-01-01 00:00:00"));
        assert!(text.contains("Valid until: 2099-12-31 23:59:59"));
    }

    #[test]
    fn test_check_exit_codes() {
        let dir = TempDir::new().unwrap();

        let mut out = Vec::new();
        assert_eq!(check(&mut out, &config(""), &options_in(&dir)), EXIT_SUCCESS);

        let mut out = Vec::new();
        assert_eq!(
            check(&mut out, &config("2000-01-02 00:00:00"), &options_in(&dir)),
            EXIT_FAILURE
        );
        assert_eq!(String::from_utf8(out).unwrap(), "license expired\n");
    }

    #[test]
    fn test_unknown_command() {
        let dir = TempDir::new().unwrap();
        let args = vec!["extract".to_string()];
        assert_eq!(
            dispatch(&args, &config(""), &options_in(&dir)),
            EXIT_INVALID_ARGS
        );
    }
}
