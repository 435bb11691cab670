//! Resource root discovery and per-user writable locations.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub const CORE_DIR: &str = "core";
pub const OPTIONS_MARKER: &str = "options.cfg";
pub const UI_ENTRY_FILE: &str = "main.ui";
pub const SHARED_CORE_DIR: &str = "trellis-core";

/// Upper bound on parent hops; deeper trees than this are not supported.
const MAX_ASCENT: usize = 128;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no `{core}/{marker}` found above {start}")]
    RootNotFound {
        start: PathBuf,
        core: String,
        marker: String,
    },
    #[error("UI entry file `{file}` not found in {root} or its shared core folder")]
    UiEntryNotFound { root: PathBuf, file: String },
    #[error("cannot locate the running executable: {0}")]
    Executable(#[source] std::io::Error),
}

/// Folders discovered at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRoots {
    /// The `core` folder holding the marker and config files.
    pub options_folder: PathBuf,
    /// Folder holding the UI entry file and shared resources.
    pub core_folder: PathBuf,
    /// Full path of the UI entry file.
    pub ui_entry: PathBuf,
}

impl ResourceRoots {
    /// Parent of the `core` folder; the working directory plugins expect.
    pub fn app_root(&self) -> &Path {
        self.options_folder
            .parent()
            .unwrap_or(self.options_folder.as_path())
    }

    pub fn core_path(&self, file: impl AsRef<Path>) -> PathBuf {
        self.core_folder.join(file)
    }
}

/// Walks ancestor directories looking for `<dir>/core/<marker>`.
#[derive(Debug, Clone)]
pub struct FolderResolver {
    core_dir: String,
    marker: String,
    ui_entry: String,
    shared_core: PathBuf,
    max_ascent: usize,
}

impl Default for FolderResolver {
    fn default() -> Self {
        Self {
            core_dir: CORE_DIR.to_string(),
            marker: OPTIONS_MARKER.to_string(),
            ui_entry: UI_ENTRY_FILE.to_string(),
            shared_core: Path::new("..").join("..").join(SHARED_CORE_DIR),
            max_ascent: MAX_ASCENT,
        }
    }
}

impl FolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_ui_entry(mut self, file: impl Into<String>) -> Self {
        self.ui_entry = file.into();
        self
    }

    pub fn with_max_ascent(mut self, hops: usize) -> Self {
        self.max_ascent = hops;
        self
    }

    /// Starts the search from the directory holding the running executable.
    pub fn resolve_from_executable(&self) -> Result<ResourceRoots, ResolveError> {
        let exe = std::env::current_exe().map_err(ResolveError::Executable)?;
        let start = exe.parent().unwrap_or(Path::new(".")).to_path_buf();
        self.resolve(&start)
    }

    pub fn resolve(&self, start: &Path) -> Result<ResourceRoots, ResolveError> {
        let options_folder = self.locate_root(start)?;
        let core_folder = self.locate_ui_entry(&options_folder)?;
        let ui_entry = core_folder.join(&self.ui_entry);
        debug!(
            options = %options_folder.display(),
            core = %core_folder.display(),
            "resource folders resolved"
        );
        Ok(ResourceRoots {
            options_folder,
            core_folder,
            ui_entry,
        })
    }

    /// Returns `<candidate>/core` for the nearest ancestor carrying the marker.
    pub fn locate_root(&self, start: &Path) -> Result<PathBuf, ResolveError> {
        let start = fs::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
        for candidate in start.ancestors().take(self.max_ascent) {
            let core = candidate.join(&self.core_dir);
            if core.join(&self.marker).is_file() {
                return Ok(core);
            }
        }
        Err(ResolveError::RootNotFound {
            start,
            core: self.core_dir.clone(),
            marker: self.marker.clone(),
        })
    }

    fn locate_ui_entry(&self, root: &Path) -> Result<PathBuf, ResolveError> {
        if root.join(&self.ui_entry).is_file() {
            return Ok(root.to_path_buf());
        }
        let shared = root.join(&self.shared_core);
        if shared.join(&self.ui_entry).is_file() {
            return Ok(fs::canonicalize(&shared).unwrap_or(shared));
        }
        Err(ResolveError::UiEntryNotFound {
            root: root.to_path_buf(),
            file: self.ui_entry.clone(),
        })
    }
}

/// Per-user writable folder, keyed by the plugin currently in use.
#[derive(Debug, Clone)]
pub struct UserPaths {
    base: Option<PathBuf>,
    hidden: bool,
}

impl UserPaths {
    /// Uses `%APPDATA%` on Windows and `$HOME` elsewhere unless
    /// `ignore_user_local` is set, in which case everything lands in `.`.
    pub fn new(ignore_user_local: bool) -> Self {
        if ignore_user_local {
            return Self::current_dir_only();
        }
        if cfg!(windows) {
            Self {
                base: dirs::data_dir(),
                hidden: false,
            }
        } else {
            Self {
                base: dirs::home_dir(),
                hidden: true,
            }
        }
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
            hidden: true,
        }
    }

    pub fn current_dir_only() -> Self {
        Self {
            base: None,
            hidden: false,
        }
    }

    pub fn app_folder(&self, plugin: Option<&str>) -> PathBuf {
        match (&self.base, plugin.filter(|name| !name.is_empty())) {
            (Some(base), Some(plugin)) if self.hidden => base.join(format!(".{plugin}")),
            (Some(base), Some(plugin)) => base.join(plugin),
            _ => PathBuf::from("."),
        }
    }

    /// Resolves `basename` inside the user folder, falling back to the
    /// working directory. With `must_exist`, only existing files are
    /// returned.
    pub fn filespec(
        &self,
        plugin: Option<&str>,
        basename: &str,
        must_exist: bool,
    ) -> Option<PathBuf> {
        let folder = self.app_folder(plugin);
        if !folder.exists() {
            if let Err(err) = fs::create_dir_all(&folder) {
                warn!(?err, folder = %folder.display(), "cannot create user folder");
            }
        }
        let candidate = folder.join(basename);
        if !must_exist || candidate.is_file() {
            return Some(candidate);
        }
        let local = PathBuf::from(basename);
        if local.is_file() {
            return Some(local);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn finds_core_in_ancestor() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        touch(&base.join("a/b/core/options.cfg"));
        touch(&base.join("a/b/core/main.ui"));
        fs::create_dir_all(base.join("a/b/c")).unwrap();

        let roots = FolderResolver::new().resolve(&base.join("a/b/c")).unwrap();
        assert_eq!(roots.options_folder, base.join("a/b/core"));
        assert_eq!(roots.core_folder, base.join("a/b/core"));
        assert_eq!(roots.ui_entry, base.join("a/b/core/main.ui"));
        assert_eq!(roots.app_root(), base.join("a/b").as_path());
    }

    #[test]
    fn ui_entry_falls_back_to_shared_core() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        touch(&base.join("a/b/core/options.cfg"));
        touch(&base.join("a/trellis-core/main.ui"));

        let roots = FolderResolver::new().resolve(&base.join("a/b")).unwrap();
        assert_eq!(roots.options_folder, base.join("a/b/core"));
        assert_eq!(roots.core_folder, base.join("a/trellis-core"));
    }

    #[test]
    fn missing_marker_fails() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();
        let resolver = FolderResolver::new().with_marker("trellis-marker-that-does-not-exist.cfg");
        let err = resolver.resolve(&dir.path().join("x/y")).unwrap_err();
        assert!(matches!(err, ResolveError::RootNotFound { .. }));
    }

    #[test]
    fn missing_ui_entry_fails() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("core/options.cfg"));
        let err = FolderResolver::new().resolve(dir.path()).unwrap_err();
        assert!(matches!(err, ResolveError::UiEntryNotFound { .. }));
    }

    #[test]
    fn ascent_bound_is_respected() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        touch(&base.join("core/options.cfg"));
        fs::create_dir_all(base.join("1/2/3")).unwrap();
        let resolver = FolderResolver::new().with_max_ascent(2);
        assert!(resolver.locate_root(&base.join("1/2/3")).is_err());
        let resolver = FolderResolver::new().with_max_ascent(4);
        assert_eq!(resolver.locate_root(&base.join("1/2/3")).unwrap(), base.join("core"));
    }

    #[test]
    fn user_folder_follows_plugin() {
        let dir = tempdir().unwrap();
        let paths = UserPaths::with_base(dir.path());
        assert_eq!(paths.app_folder(Some("orbit")), dir.path().join(".orbit"));
        assert_eq!(paths.app_folder(None), PathBuf::from("."));
        assert_eq!(
            UserPaths::current_dir_only().app_folder(Some("orbit")),
            PathBuf::from(".")
        );

        let spec = paths.filespec(Some("orbit"), "windowpos.txt", false).unwrap();
        assert_eq!(spec, dir.path().join(".orbit/windowpos.txt"));
        assert!(dir.path().join(".orbit").is_dir());
        assert!(paths
            .filespec(Some("orbit"), "trellis-never-written.txt", true)
            .is_none());
    }
}
