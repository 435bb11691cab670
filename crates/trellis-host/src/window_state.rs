//! Window and console geometry persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::paths::UserPaths;

pub const WINDOW_FILE: &str = "windowpos.txt";
pub const CONSOLE_FILE: &str = "consolepos.txt";

/// Coordinates beyond this magnitude are window-system noise.
pub const SANE_COORDINATE_BOUND: i32 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WindowGeometry {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_sane(&self) -> bool {
        let bound = -SANE_COORDINATE_BOUND..=SANE_COORDINATE_BOUND;
        bound.contains(&self.x) && bound.contains(&self.y)
    }

    pub fn has_area(&self) -> bool {
        self.width != 0 && self.height != 0
    }

    pub fn same_size(&self, other: &WindowGeometry) -> bool {
        self.width == other.width && self.height == other.height
    }

    fn to_text(self) -> String {
        format!("{}\n{}\n{}\n{}\n", self.x, self.y, self.width, self.height)
    }

    fn from_text(text: &str) -> Option<Self> {
        let mut values = text.split_whitespace().map(str::parse::<i32>);
        let mut next = || values.next()?.ok();
        Some(Self::new(next()?, next()?, next()?, next()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowStyle {
    #[default]
    Decorated,
    Borderless,
}

/// Window-system state that decides whether a geometry change is worth
/// remembering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistConditions {
    pub fullscreen: bool,
    pub style: WindowStyle,
    pub frame: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    SkippedFullscreen,
    SkippedBorderless,
    SkippedStartup,
    SkippedInsane,
}

#[derive(Debug, Clone)]
pub struct WindowStateStore {
    window_file: PathBuf,
    console_file: PathBuf,
    window_fallback: PathBuf,
    console_fallback: PathBuf,
}

impl WindowStateStore {
    /// Store rooted in a single folder; used directly by tests and tools.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            window_file: dir.join(WINDOW_FILE),
            console_file: dir.join(CONSOLE_FILE),
            window_fallback: dir.join(WINDOW_FILE),
            console_fallback: dir.join(CONSOLE_FILE),
        }
    }

    /// Store in the user folder of `plugin`, reading from the working
    /// directory when the user folder has no saved state yet.
    pub fn for_user(paths: &UserPaths, plugin: Option<&str>) -> Self {
        let folder = paths.app_folder(plugin);
        Self {
            window_file: paths
                .filespec(plugin, WINDOW_FILE, false)
                .unwrap_or_else(|| folder.join(WINDOW_FILE)),
            console_file: paths
                .filespec(plugin, CONSOLE_FILE, false)
                .unwrap_or_else(|| folder.join(CONSOLE_FILE)),
            window_fallback: PathBuf::from(WINDOW_FILE),
            console_fallback: PathBuf::from(CONSOLE_FILE),
        }
    }

    pub fn window_file(&self) -> &Path {
        &self.window_file
    }

    pub fn console_file(&self) -> &Path {
        &self.console_file
    }

    pub fn persist(
        &self,
        geometry: WindowGeometry,
        conditions: PersistConditions,
    ) -> io::Result<PersistOutcome> {
        let outcome = if conditions.fullscreen {
            PersistOutcome::SkippedFullscreen
        } else if conditions.style == WindowStyle::Borderless {
            PersistOutcome::SkippedBorderless
        } else if conditions.frame == 0 {
            PersistOutcome::SkippedStartup
        } else if !geometry.is_sane() {
            PersistOutcome::SkippedInsane
        } else {
            fs::write(&self.window_file, geometry.to_text())?;
            PersistOutcome::Written
        };
        trace!(?geometry, ?outcome, "window geometry persist");
        Ok(outcome)
    }

    pub fn load(&self) -> Option<WindowGeometry> {
        read_geometry(&self.window_file, &self.window_fallback)
    }

    pub fn persist_console(&self, geometry: WindowGeometry) -> io::Result<()> {
        fs::write(&self.console_file, geometry.to_text())
    }

    pub fn load_console(&self) -> Option<WindowGeometry> {
        read_geometry(&self.console_file, &self.console_fallback)
    }
}

fn read_geometry(primary: &Path, fallback: &Path) -> Option<WindowGeometry> {
    let path = if primary.is_file() { primary } else { fallback };
    let text = fs::read_to_string(path).ok()?;
    let geometry = WindowGeometry::from_text(&text);
    if geometry.is_none() {
        debug!(path = %path.display(), "ignoring malformed geometry file");
    }
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn running() -> PersistConditions {
        PersistConditions {
            fullscreen: false,
            style: WindowStyle::Decorated,
            frame: 12,
        }
    }

    #[test]
    fn geometry_round_trip() {
        let dir = tempdir().unwrap();
        let store = WindowStateStore::in_dir(dir.path());
        let geometry = WindowGeometry::new(10, 20, 640, 480);
        assert_eq!(store.persist(geometry, running()).unwrap(), PersistOutcome::Written);
        assert_eq!(fs::read_to_string(store.window_file()).unwrap(), "10\n20\n640\n480\n");
        assert_eq!(store.load(), Some(geometry));
    }

    #[test]
    fn short_or_missing_file_means_no_geometry() {
        let dir = tempdir().unwrap();
        let store = WindowStateStore::in_dir(dir.path());
        assert_eq!(store.load(), None);
        fs::write(store.window_file(), "10\n20\n640\n").unwrap();
        assert_eq!(store.load(), None);
        fs::write(store.window_file(), "10\n20\nwide\n480\n").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn insane_geometry_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let store = WindowStateStore::in_dir(dir.path());
        store
            .persist(WindowGeometry::new(1, 2, 300, 200), running())
            .unwrap();
        let before = fs::read(store.window_file()).unwrap();

        let outcome = store
            .persist(WindowGeometry::new(-9000, 0, 640, 480), running())
            .unwrap();
        assert_eq!(outcome, PersistOutcome::SkippedInsane);
        assert_eq!(fs::read(store.window_file()).unwrap(), before);
    }

    #[test]
    fn skip_conditions() {
        let dir = tempdir().unwrap();
        let store = WindowStateStore::in_dir(dir.path());
        let geometry = WindowGeometry::new(0, 0, 800, 600);

        let fullscreen = PersistConditions {
            fullscreen: true,
            ..running()
        };
        let borderless = PersistConditions {
            style: WindowStyle::Borderless,
            ..running()
        };
        let startup = PersistConditions {
            frame: 0,
            ..running()
        };
        assert_eq!(
            store.persist(geometry, fullscreen).unwrap(),
            PersistOutcome::SkippedFullscreen
        );
        assert_eq!(
            store.persist(geometry, borderless).unwrap(),
            PersistOutcome::SkippedBorderless
        );
        assert_eq!(
            store.persist(geometry, startup).unwrap(),
            PersistOutcome::SkippedStartup
        );
        assert!(!store.window_file().exists());
    }

    #[test]
    fn console_geometry_is_ungated() {
        let dir = tempdir().unwrap();
        let store = WindowStateStore::in_dir(dir.path());
        let geometry = WindowGeometry::new(-7000, 0, 800, 1000);
        store.persist_console(geometry).unwrap();
        assert_eq!(store.load_console(), Some(geometry));
        assert_eq!(store.load(), None);
    }
}
