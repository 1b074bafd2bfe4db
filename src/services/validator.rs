use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::domain::{AbsolutePath, TypeConstraintError};
use crate::platform::DriveSource;

/// Gate in front of every filesystem read or write.
///
/// A candidate is accepted only when its normalized absolute form lies inside
/// one of the roots reported by the [`DriveSource`] at call time, compared
/// segment by segment. Relative candidates are resolved against `base_dir`
/// rather than the process working directory.
#[derive(Clone)]
pub struct PathValidator {
    drives: Arc<dyn DriveSource>,
    base_dir: PathBuf,
}

impl PathValidator {
    pub fn new(drives: Arc<dyn DriveSource>, base_dir: PathBuf) -> Self {
        Self { drives, base_dir }
    }

    /// Current roots, as reported by the drive source.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.drives.roots()
    }

    /// Absolute, lexically normalized form of `candidate`.
    ///
    /// `..` segments are folded without touching the disk and can never climb
    /// above the filesystem root.
    pub fn resolve(&self, candidate: &Path) -> Result<PathBuf, TypeConstraintError> {
        let raw = candidate.as_os_str();
        if raw.is_empty() || raw.as_encoded_bytes().contains(&0) {
            return Err(TypeConstraintError::InvalidPath);
        }

        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        };
        if !joined.is_absolute() {
            return Err(TypeConstraintError::InvalidPath);
        }

        Ok(normalize_lexically(&joined))
    }

    /// Returns `true` when `candidate` may be accessed.
    pub fn validate(&self, candidate: impl AsRef<Path>, require_exists: bool) -> bool {
        self.validated(candidate, require_exists).is_some()
    }

    /// Validates `candidate` and hands back its resolved form on success.
    pub fn validated(
        &self,
        candidate: impl AsRef<Path>,
        require_exists: bool,
    ) -> Option<AbsolutePath> {
        let candidate = candidate.as_ref();
        let absolute = match self.resolve(candidate) {
            Ok(path) => path,
            Err(_) => {
                log::debug!("Rejected malformed path {:?}", candidate);
                return None;
            }
        };

        let roots: Vec<PathBuf> = self
            .drives
            .roots()
            .iter()
            .filter_map(|root| self.resolve(root).ok())
            .collect();

        if !is_within(&absolute, &roots) {
            log::debug!("Rejected {} outside of allowed roots", absolute.display());
            return None;
        }

        if require_exists && !absolute.try_exists().unwrap_or(false) {
            log::debug!("Rejected {}: does not exist", absolute.display());
            return None;
        }

        // Symlinks inside a root may still point elsewhere.
        if !real_path_within(&absolute, &roots) {
            log::debug!("Rejected {}: resolves outside of roots", absolute.display());
            return None;
        }

        Some(AbsolutePath::new(absolute))
    }
}

impl std::fmt::Debug for PathValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathValidator")
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(normalize_prefix(prefix.as_os_str())),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Drive letters compare case-insensitively on Windows.
#[cfg(windows)]
fn normalize_prefix(prefix: &std::ffi::OsStr) -> std::ffi::OsString {
    prefix.to_ascii_uppercase()
}

#[cfg(not(windows))]
fn normalize_prefix(prefix: &std::ffi::OsStr) -> std::ffi::OsString {
    prefix.to_os_string()
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// components below it. `None` when that ancestor cannot be resolved.
fn canonicalize_existing_ancestor(path: &Path) -> Option<PathBuf> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        let name = current.file_name()?;
        missing.push(name);
        current = current.parent()?;
        if current.symlink_metadata().is_ok() {
            let mut real = fs::canonicalize(current).ok()?;
            real.extend(missing.iter().rev());
            return Some(real);
        }
    }
}

fn is_within(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| path.starts_with(root))
}

fn real_path_within(path: &Path, roots: &[PathBuf]) -> bool {
    let real = match fs::canonicalize(path) {
        Ok(real) => real,
        Err(_) => {
            if path.symlink_metadata().is_ok() {
                // Dangling link: it exists but its target cannot be resolved.
                return false;
            }
            match canonicalize_existing_ancestor(path) {
                Some(real) => real,
                None => return false,
            }
        }
    };

    let real_roots: Vec<PathBuf> = roots
        .iter()
        .map(|root| fs::canonicalize(root).unwrap_or_else(|_| root.clone()))
        .collect();
    is_within(&real, &real_roots)
}
