//! Launch orchestration
//!
//! Runs the three phases in order and stops at the first failure:
//!
//! 1. License: `key.x` beside the executable, else the embedded dates
//! 2. Prepare: recreate the run directory from the embedded assets
//! 3. Run: spawn the runtime, hand it the key, supervise it until exit or expiry
//!
//! Each failure is tagged with its phase. The binary prints only the phase
//! message; details go to the log.

use crate::assets::EmbeddedAssets;
use crate::config::StubConfig;
use crate::defaults::UNIQUE_RUN_DIR_ENV;
use crate::exceptions::StubError;
use crate::license::{LicenseError, LicenseSource, Remaining, evaluate, read_license_source};
use crate::paths::RunPaths;
use crate::stage::stage;
use crate::supervisor::{self, LaunchCommand, RunOutcome};
use crate::utils::{executable_dir, is_env_true};
use crate::version::VERSION;
use chrono::Local;
use log::{debug, error, info, trace, warn};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Options for a launch
#[derive(Debug, Default, Clone)]
pub struct LaunchOptions {
    /// Root of the run directory tree; the system temp dir when unset
    pub run_root: Option<PathBuf>,
    /// Directory searched for `key.x`; embedded dates are used when unset
    pub exe_dir: Option<PathBuf>,
    /// Use a fresh run directory per launch and remove it afterwards
    pub unique_run_dir: bool,
}

impl LaunchOptions {
    /// Options for the stub binary: temp root, the executable's directory,
    /// unique run directories when `XLAUNCH_UNIQUE_RUN_DIR` is set
    pub fn from_env() -> Self {
        let exe_dir = match executable_dir() {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!("⚠️ Cannot locate executable directory: {e}");
                None
            }
        };
        LaunchOptions {
            run_root: None,
            exe_dir,
            unique_run_dir: is_env_true(UNIQUE_RUN_DIR_ENV),
        }
    }

    fn root(&self) -> PathBuf {
        self.run_root.clone().unwrap_or_else(env::temp_dir)
    }

    /// License source for this launch
    pub fn license_source(&self) -> LicenseSource {
        match &self.exe_dir {
            Some(dir) => read_license_source(dir),
            None => LicenseSource::Embedded,
        }
    }
}

/// Phase a launch failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    License,
    Prepare,
    Run,
}

impl LaunchPhase {
    /// Line printed to stdout when this phase fails
    pub fn message(&self) -> &'static str {
        match self {
            LaunchPhase::License => "license expired",
            LaunchPhase::Prepare => "pre",
            LaunchPhase::Run => "run",
        }
    }
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaunchPhase::License => "license",
            LaunchPhase::Prepare => "prepare",
            LaunchPhase::Run => "run",
        };
        f.write_str(name)
    }
}

/// Why a launch did not end in a clean application exit
#[derive(Debug)]
pub enum LaunchFailure {
    /// A phase failed before or while starting the child
    Failed { phase: LaunchPhase, source: StubError },
    /// The application exited non-zero or was killed by a signal (code 1)
    AppFailed(i32),
    /// The license ran out and the child was killed
    Expired,
}

impl LaunchFailure {
    fn at<E: Into<StubError>>(phase: LaunchPhase) -> impl FnOnce(E) -> LaunchFailure {
        move |err| {
            let source = err.into();
            error!("❌ {phase} phase failed: {source}");
            LaunchFailure::Failed { phase, source }
        }
    }

    pub fn phase(&self) -> Option<LaunchPhase> {
        match self {
            LaunchFailure::Failed { phase, .. } => Some(*phase),
            LaunchFailure::AppFailed(_) => Some(LaunchPhase::Run),
            LaunchFailure::Expired => None,
        }
    }

    /// The one line the binary prints to stdout before exiting
    pub fn message(&self) -> &'static str {
        match self {
            LaunchFailure::Failed { phase, .. } => phase.message(),
            LaunchFailure::AppFailed(_) => LaunchPhase::Run.message(),
            LaunchFailure::Expired => "stop process",
        }
    }
}

impl fmt::Display for LaunchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchFailure::Failed { phase, source } => write!(f, "{phase} phase failed: {source}"),
            LaunchFailure::AppFailed(code) => write!(f, "application exited with code {code}"),
            LaunchFailure::Expired => write!(f, "license expired while running"),
        }
    }
}

impl std::error::Error for LaunchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchFailure::Failed { source, .. } => Some(source),
            LaunchFailure::AppFailed(_) | LaunchFailure::Expired => None,
        }
    }
}

/// Validate the license, stage the run directory and supervise the runtime
///
/// `args` are appended after `-jar app.jar` unchanged. Succeeds only when the
/// application exits with code 0.
///
/// # Errors
///
/// Returns the failing phase, [`LaunchFailure::AppFailed`] for any other
/// application exit, or [`LaunchFailure::Expired`] when the child was killed
/// at the license end date.
pub fn launch(
    config: &StubConfig,
    assets: &EmbeddedAssets<'_>,
    args: &[String],
    options: &LaunchOptions,
) -> Result<(), LaunchFailure> {
    info!("🔐 xlaunch stub {VERSION} starting");
    trace!("📋 Forwarded arguments: {args:?}");

    let remaining =
        check_license(config, options).map_err(LaunchFailure::at(LaunchPhase::License))?;

    let paths = if options.unique_run_dir {
        RunPaths::unique(options.root(), &config.code)
    } else {
        RunPaths::new(options.root(), &config.code)
    };
    debug!("📁 Run id: {}", paths.run_id());

    stage(assets.runtime_image, assets.artifact, &paths)
        .map_err(LaunchFailure::at(LaunchPhase::Prepare))?;

    let command = LaunchCommand {
        executable: paths.executable(&config.runtime_command),
        args: config.launch_args(args),
        working_dir: paths.bin(),
    };
    let payload = config.key_bundle.encode();

    let outcome = supervisor::run(&command, &payload, remaining);
    if options.unique_run_dir {
        remove_run_dir(&paths.runtime());
    }

    match outcome.map_err(LaunchFailure::at(LaunchPhase::Run))? {
        RunOutcome::Exited(0) => {
            info!("✅ Application exited cleanly");
            Ok(())
        }
        RunOutcome::Exited(code) => {
            error!("❌ Application exited with code {code}");
            Err(LaunchFailure::AppFailed(code))
        }
        RunOutcome::Expired => Err(LaunchFailure::Expired),
    }
}

/// Evaluate the license for `options` against the wall clock
pub fn check_license(
    config: &StubConfig,
    options: &LaunchOptions,
) -> Result<Remaining, LicenseError> {
    evaluate(config, &options.license_source(), Local::now())
}

fn remove_run_dir(runtime_dir: &Path) {
    // The per-launch directory is the parent of the runtime folder
    let Some(run_dir) = runtime_dir.parent() else {
        return;
    };
    match fs::remove_dir_all(run_dir) {
        Ok(()) => debug!("🧹 Removed run directory {run_dir:?}"),
        Err(e) => warn!("⚠️ Failed to remove run directory {run_dir:?}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::KeyBundle;
    use tempfile::TempDir;

    fn config(end: &str) -> StubConfig {
        StubConfig {
            code: "launcher-test".to_string(),
            hex_key: "000102030405060708090a0b0c0d0e0f".to_string(),
            hex_iv: "000102030405060708090a0b0c0d0e0f".to_string(),
            valid_start_date: "2000-01-01 00:00:00".to_string(),
            valid_end_date: end.to_string(),
            key_bundle: KeyBundle::new("AES", "128", "128", "pw"),
            app_args: String::new(),
            runtime_command: "java".to_string(),
        }
    }

    fn options(root: &TempDir, exe_dir: &TempDir) -> LaunchOptions {
        LaunchOptions {
            run_root: Some(root.path().to_path_buf()),
            exe_dir: Some(exe_dir.path().to_path_buf()),
            unique_run_dir: false,
        }
    }

    fn image_without_runtime() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let data = b"runtime notes";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "lib/README", &data[..]).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_phase_messages() {
        assert_eq!(LaunchPhase::License.message(), "license expired");
        assert_eq!(LaunchPhase::Prepare.message(), "pre");
        assert_eq!(LaunchPhase::Run.message(), "run");
        assert_eq!(LaunchFailure::Expired.message(), "stop process");
    }

    #[test]
    fn test_application_failure_reports_run_phase() {
        for code in [1, 7, 255] {
            let failure = LaunchFailure::AppFailed(code);
            assert_eq!(failure.phase(), Some(LaunchPhase::Run));
            assert_eq!(failure.message(), "run");
            assert_eq!(failure.to_string(), format!("application exited with code {code}"));
        }
        assert_eq!(LaunchFailure::Expired.phase(), None);
    }

    #[test]
    fn test_expired_fallback_stops_before_staging() {
        let root = TempDir::new().unwrap();
        let exe_dir = TempDir::new().unwrap();
        let image = image_without_runtime();
        let assets = EmbeddedAssets::new(&image, b"jar");

        let failure = launch(
            &config("2000-01-02 00:00:00"),
            &assets,
            &[],
            &options(&root, &exe_dir),
        )
        .unwrap_err();

        assert_eq!(failure.phase(), Some(LaunchPhase::License));
        assert_eq!(failure.message(), "license expired");
        assert!(!root.path().join("deploy").exists());
    }

    #[test]
    fn test_invalid_license_file_is_license_failure() {
        let root = TempDir::new().unwrap();
        let exe_dir = TempDir::new().unwrap();
        fs::write(exe_dir.path().join("key.x"), [7u8; 32]).unwrap();
        let image = image_without_runtime();
        let assets = EmbeddedAssets::new(&image, b"jar");

        let failure = launch(&config(""), &assets, &[], &options(&root, &exe_dir)).unwrap_err();
        assert_eq!(failure.phase(), Some(LaunchPhase::License));
    }

    #[test]
    fn test_empty_image_is_prepare_failure() {
        let root = TempDir::new().unwrap();
        let exe_dir = TempDir::new().unwrap();
        let assets = EmbeddedAssets::new(&[], b"jar");

        let failure = launch(&config(""), &assets, &[], &options(&root, &exe_dir)).unwrap_err();
        assert_eq!(failure.phase(), Some(LaunchPhase::Prepare));
        assert_eq!(failure.message(), "pre");
    }

    #[test]
    fn test_missing_runtime_is_run_failure() {
        let root = TempDir::new().unwrap();
        let exe_dir = TempDir::new().unwrap();
        let image = image_without_runtime();
        let assets = EmbeddedAssets::new(&image, b"jar");

        let failure = launch(&config(""), &assets, &[], &options(&root, &exe_dir)).unwrap_err();
        assert_eq!(failure.phase(), Some(LaunchPhase::Run));
        assert_eq!(failure.message(), "run");

        // Staging still happened
        let paths = RunPaths::new(root.path(), "launcher-test");
        assert_eq!(fs::read(paths.artifact()).unwrap(), b"jar");
        assert!(paths.runtime().join("lib/README").exists());
    }

    #[test]
    fn test_unique_run_dir_is_removed() {
        let root = TempDir::new().unwrap();
        let exe_dir = TempDir::new().unwrap();
        let image = image_without_runtime();
        let assets = EmbeddedAssets::new(&image, b"jar");
        let mut opts = options(&root, &exe_dir);
        opts.unique_run_dir = true;

        let failure = launch(&config(""), &assets, &[], &opts).unwrap_err();
        assert_eq!(failure.phase(), Some(LaunchPhase::Run));

        let leftovers: Vec<_> = fs::read_dir(root.path().join("deploy"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_options_without_exe_dir_use_embedded() {
        let opts = LaunchOptions::default();
        assert_eq!(opts.license_source(), LicenseSource::Embedded);
    }
}
