//! Assets compiled into the stub by `build.rs`

use crate::defaults::DEV_RUNTIME_IMAGE_ENV;
use log::{debug, warn};
use std::env;
use std::fs;
use std::path::Path;

/// Runtime image (tar or tar.gz) and protected artifact
#[derive(Clone, Copy)]
pub struct EmbeddedAssets<'a> {
    pub runtime_image: &'a [u8],
    pub artifact: &'a [u8],
}

static RUNTIME_IMAGE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/runtime.img"));
static APP_ARTIFACT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/app.artifact"));

impl EmbeddedAssets<'static> {
    /// Assets baked into this binary
    pub fn embedded() -> Self {
        EmbeddedAssets {
            runtime_image: RUNTIME_IMAGE,
            artifact: APP_ARTIFACT,
        }
    }
}

/// Runtime image for a stub built without one
///
/// Reads the file named by `XLAUNCH_DEV_RUNTIME_IMAGE`. Returns `None` when an
/// image is embedded, the variable is unset, or the file cannot be read.
pub fn dev_runtime_image() -> Option<Vec<u8>> {
    if !RUNTIME_IMAGE.is_empty() {
        return None;
    }
    let path = env::var_os(DEV_RUNTIME_IMAGE_ENV)?;
    read_dev_runtime_image(Path::new(&path))
}

fn read_dev_runtime_image(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(image) => {
            debug!("📦 Using development runtime image {path:?} ({} bytes)", image.len());
            Some(image)
        }
        Err(e) => {
            warn!("⚠️ Cannot read development runtime image {path:?}: {e}");
            None
        }
    }
}

impl<'a> EmbeddedAssets<'a> {
    pub fn new(runtime_image: &'a [u8], artifact: &'a [u8]) -> Self {
        EmbeddedAssets {
            runtime_image,
            artifact,
        }
    }
}

// Sizes only; the payloads can be hundreds of megabytes
impl std::fmt::Debug for EmbeddedAssets<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedAssets")
            .field("runtime_image", &format_args!("{} bytes", self.runtime_image.len()))
            .field("artifact", &format_args!("{} bytes", self.artifact.len()))
            .finish()
    }
}
