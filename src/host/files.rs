use crate::errors::{AppError, AppResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Confines file passthrough to root directories. Reads and writes have
/// separate roots, and protected paths are never writable even inside a
/// writable root. Paths are compared after canonicalisation, so `..` and
/// symlinks cannot step out.
#[derive(Debug, Clone)]
pub struct FileAccess {
    readable: Vec<PathBuf>,
    writable: Vec<PathBuf>,
    protected: Vec<PathBuf>,
}

impl FileAccess {
    pub fn new(readable: Vec<PathBuf>, writable: Vec<PathBuf>) -> Self {
        Self {
            readable,
            writable,
            protected: Vec::new(),
        }
    }

    /// A protected directory covers everything below it.
    pub fn protecting(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.protected.extend(paths);
        self
    }

    pub fn resolve_readable(&self, raw: &str) -> AppResult<PathBuf> {
        let candidate = absolute(raw)?;
        let canonical = candidate
            .canonicalize()
            .map_err(|err| AppError::Io(format!("Failed to resolve '{}': {}", raw, err)))?;
        ensure_within(&self.readable, &canonical, raw)?;
        Ok(canonical)
    }

    pub fn resolve_writable(&self, raw: &str) -> AppResult<PathBuf> {
        let candidate = absolute(raw)?;
        let file_name = candidate
            .file_name()
            .ok_or_else(|| AppError::Policy(format!("'{}' does not name a file", raw)))?;
        let parent = candidate
            .parent()
            .ok_or_else(|| AppError::Policy(format!("'{}' has no parent directory", raw)))?
            .canonicalize()
            .map_err(|err| AppError::Io(format!("Failed to resolve parent of '{}': {}", raw, err)))?;

        let target = parent.join(file_name);
        let resolved = match std::fs::symlink_metadata(&target) {
            Ok(metadata) if metadata.file_type().is_symlink() => target.canonicalize().map_err(|_| {
                AppError::Policy(format!("'{}' is a symlink to a file that does not exist", raw))
            })?,
            Ok(_) => target
                .canonicalize()
                .map_err(|err| AppError::Io(format!("Failed to resolve '{}': {}", raw, err)))?,
            Err(err) if err.kind() == ErrorKind::NotFound => target,
            Err(err) => return Err(AppError::Io(format!("Failed to inspect '{}': {}", raw, err))),
        };

        ensure_within(&self.writable, &resolved, raw)?;
        if self
            .protected
            .iter()
            .map(|path| canonical_or_lexical(path))
            .any(|protected| resolved.starts_with(&protected))
        {
            return Err(AppError::Policy(format!(
                "'{}' is a driver program or script location and cannot be written",
                raw
            )));
        }
        Ok(resolved)
    }
}

fn ensure_within(roots: &[PathBuf], path: &Path, raw: &str) -> AppResult<()> {
    let allowed = roots
        .iter()
        .filter_map(|root| root.canonicalize().ok())
        .any(|root| path.starts_with(&root));
    if !allowed {
        return Err(AppError::Policy(format!(
            "'{}' is outside the directories the control center may access",
            raw
        )));
    }
    Ok(())
}

// Missing files still compare by their canonical parent.
fn canonical_or_lexical(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent().and_then(|parent| parent.canonicalize().ok()), path.file_name()) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

fn absolute(raw: &str) -> AppResult<PathBuf> {
    let candidate = Path::new(raw.trim());
    if !candidate.is_absolute() {
        return Err(AppError::Policy(format!("File path '{}' must be absolute", raw)));
    }
    Ok(candidate.to_path_buf())
}
