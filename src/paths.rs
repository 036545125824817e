//! Run directory layout
//!
//! `<root>/deploy/<run id>/jdk/` holds the extracted runtime; the protected
//! artifact and the runtime executable live in its `bin/` folder. The run id
//! is the first ten hex characters of `hex(code)`, so every stub built with
//! the same code shares one directory. Two such stubs running at the same
//! time race on it; enable unique run directories to avoid that.

use crate::defaults::{
    BIN_DIR, DEPLOY_DIR, RUN_ID_HEX_LEN, RUN_TOKEN_LEN, RUNTIME_DIR, STAGED_ARTIFACT_NAME,
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::path::{Path, PathBuf};

/// Manages the paths of one launch
#[derive(Debug, Clone)]
pub struct RunPaths {
    root: PathBuf,
    run_id: String,
}

impl RunPaths {
    /// Deterministic layout derived from the license code
    pub fn new(root: impl Into<PathBuf>, code: &str) -> Self {
        Self {
            root: root.into(),
            run_id: run_id_for(code),
        }
    }

    /// Layout with a random token appended to the run id
    pub fn unique(root: impl Into<PathBuf>, code: &str) -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RUN_TOKEN_LEN)
            .map(char::from)
            .collect();
        Self {
            root: root.into(),
            run_id: format!("{}-{}", run_id_for(code), token.to_lowercase()),
        }
    }

    /// Directory recreated on every launch
    pub fn runtime(&self) -> PathBuf {
        self.root.join(DEPLOY_DIR).join(&self.run_id).join(RUNTIME_DIR)
    }

    /// Folder holding the runtime executable and the artifact; the child's cwd
    pub fn bin(&self) -> PathBuf {
        self.runtime().join(BIN_DIR)
    }

    /// Staged artifact, always `bin/app.jar`
    pub fn artifact(&self) -> PathBuf {
        self.bin().join(STAGED_ARTIFACT_NAME)
    }

    /// Runtime executable, with `.exe` appended on Windows
    pub fn executable(&self, command: &str) -> PathBuf {
        let path = self.bin().join(command);
        if cfg!(windows) && Path::new(command).extension().is_none() {
            path.with_extension("exe")
        } else {
            path
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

fn run_id_for(code: &str) -> String {
    let encoded = hex::encode(code.as_bytes());
    encoded[..RUN_ID_HEX_LEN.min(encoded.len())].to_string()
}
