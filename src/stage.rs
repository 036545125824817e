//! Run directory staging
//!
//! The run directory is wiped and rebuilt on every launch from the embedded
//! runtime image (a tar archive, optionally gzip compressed) plus the
//! protected artifact. Every archive path is checked before anything is
//! written for it; entries that would land outside the run directory abort
//! the whole staging.

#![allow(clippy::module_name_repetitions)]

use crate::defaults::{DEFAULT_DIR_PERMS, DEFAULT_FILE_PERMS};
use crate::paths::RunPaths;
use flate2::read::GzDecoder;
use log::{debug, error, info, trace};
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

/// Why the run directory could not be prepared
#[derive(Debug)]
pub enum StageError {
    /// Filesystem or archive I/O failed
    Io {
        context: String,
        source: io::Error,
    },
    /// An archive entry escapes the run directory
    UnsafePath(String),
    /// No runtime image was embedded
    EmptyImage,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Io { context, source } => write!(f, "{context}: {source}"),
            StageError::UnsafePath(path) => write!(f, "invalid file path: {path}"),
            StageError::EmptyImage => write!(f, "runtime image is empty"),
        }
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StageError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn io_err(context: impl Into<String>) -> impl FnOnce(io::Error) -> StageError {
    let context = context.into();
    move |source| StageError::Io { context, source }
}

/// Recreate the run directory and populate it
///
/// Returns the runtime directory on success. On error the directory may be
/// partially populated and must not be used.
pub fn stage(
    runtime_image: &[u8],
    artifact: &[u8],
    paths: &RunPaths,
) -> Result<PathBuf, StageError> {
    let runtime_dir = paths.runtime();
    info!("📁 Staging run directory {runtime_dir:?}");

    reset_dir(&runtime_dir)?;

    let count = extract_runtime_image(runtime_image, &runtime_dir)?;
    debug!("📦 Extracted {count} runtime entries");

    write_artifact(&paths.artifact(), artifact)?;

    info!("✅ Run directory ready");
    Ok(runtime_dir)
}

/// Remove `dir` recursively and create it again, empty
pub fn reset_dir(dir: &Path) -> Result<(), StageError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!("🧹 Removed previous run directory {dir:?}"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(format!("remove {}", dir.display()))(e)),
    }
    create_dir_secure(dir)
}

fn create_dir_secure(dir: &Path) -> Result<(), StageError> {
    fs::create_dir_all(dir).map_err(io_err(format!("mkdir {}", dir.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = fs::Permissions::from_mode(u32::from(DEFAULT_DIR_PERMS));
        fs::set_permissions(dir, permissions)
            .map_err(io_err(format!("chmod {}", dir.display())))?;
    }
    Ok(())
}

/// Extract a tar or tar.gz image under `dest`, returning the entry count
pub fn extract_runtime_image(image: &[u8], dest: &Path) -> Result<usize, StageError> {
    if image.is_empty() {
        return Err(StageError::EmptyImage);
    }

    if is_gzip(image) {
        trace!("🗜️ Runtime image is gzip compressed");
        extract_tar(GzDecoder::new(image), dest)
    } else {
        extract_tar(image, dest)
    }
}

fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&[0x1f, 0x8b])
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<usize, StageError> {
    let mut archive = Archive::new(reader);
    let mut count = 0;

    for entry_result in archive.entries().map_err(io_err("read archive"))? {
        let mut entry = entry_result.map_err(io_err("read archive entry"))?;
        let raw_path = entry
            .path()
            .map_err(io_err("read archive entry path"))?
            .into_owned();

        let Some(relative) = sanitize_entry_path(&raw_path)? else {
            trace!("⏭️ Skipping root entry {raw_path:?}");
            continue;
        };

        let entry_type = entry.header().entry_type();
        if matches!(entry_type, EntryType::Symlink | EntryType::Link) {
            check_link_target(&relative, &entry)?;
        }

        trace!("📄 Extracting: {relative:?}");

        // unpack_in creates parents and resolves hard links under `dest`
        let unpacked = entry
            .unpack_in(dest)
            .map_err(io_err(format!("unpack {}", relative.display())))?;
        if !unpacked {
            return Err(StageError::UnsafePath(raw_path.display().to_string()));
        }

        // Symlinks would forward chmod to their target
        #[cfg(unix)]
        if matches!(entry_type, EntryType::Regular | EntryType::Directory) {
            let mode = entry
                .header()
                .mode()
                .map_err(io_err(format!("read mode of {}", relative.display())))?;
            apply_mode(&dest.join(&relative), mode)?;
        }

        count += 1;
    }

    Ok(count)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> Result<(), StageError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(io_err(format!("chmod {:o} {}", mode, path.display())))
}

/// Normalize an archive path, rejecting anything that leaves the root
///
/// Returns `None` for entries that name the root itself (`./`).
pub fn sanitize_entry_path(path: &Path) -> Result<Option<PathBuf>, StageError> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                error!("🚨 Rejecting unsafe archive entry {path:?}");
                return Err(StageError::UnsafePath(path.display().to_string()));
            }
        }
    }
    Ok(if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    })
}

fn check_link_target<R: Read>(
    relative: &Path,
    entry: &tar::Entry<'_, R>,
) -> Result<(), StageError> {
    let Some(target) = entry
        .link_name()
        .map_err(io_err("read archive link target"))?
    else {
        return Ok(());
    };

    // Symlink targets resolve from the link's folder, hard links from the root
    let mut depth: usize = match entry.header().entry_type() {
        EntryType::Symlink => relative.components().count().saturating_sub(1),
        _ => 0,
    };

    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => depth -= 1,
            _ => {
                error!("🚨 Rejecting link {relative:?} -> {target:?}");
                return Err(StageError::UnsafePath(format!(
                    "{} -> {}",
                    relative.display(),
                    target.display()
                )));
            }
        }
    }
    Ok(())
}

fn write_artifact(path: &Path, data: &[u8]) -> Result<(), StageError> {
    if let Some(parent) = path.parent() {
        create_dir_secure(parent)?;
    }

    debug!("📝 Writing {} bytes to {:?}", data.len(), path);
    fs::write(path, data).map_err(io_err(format!("write {}", path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(u32::from(DEFAULT_FILE_PERMS)))
            .map_err(io_err(format!("chmod {}", path.display())))?;
    }
    Ok(())
}
