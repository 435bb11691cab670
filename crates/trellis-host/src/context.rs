//! Process-wide state fixed at startup.

use std::sync::Arc;

use tracing::{info, warn};

use crate::options::{Options, StartupPlugin};
use crate::paths::{ResourceRoots, UserPaths};
use crate::vars::{DumpFormat, VarRegistry};
use crate::window_state::WindowStateStore;

pub const VARS_DUMP_FILE: &str = "varslastquit.txt";
pub const VARS_DUMP_C_FILE: &str = "varslastquit.c.txt";

/// Everything the host reads but never changes after startup: discovered
/// folders, the frozen options and the user folder policy.
///
/// Built once in `main` and handed to the host; [`teardown`](Self::teardown)
/// runs after the frame loop has ended.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    roots: ResourceRoots,
    options: Arc<Options>,
    user_paths: UserPaths,
    startup: Option<StartupPlugin>,
    dev: bool,
}

impl ProcessContext {
    pub fn new(roots: ResourceRoots, options: Arc<Options>, dev: bool) -> Self {
        let user_paths = UserPaths::new(options.ignore_user_local());
        let startup = options.startup_plugin();
        Self {
            roots,
            options,
            user_paths,
            startup,
            dev,
        }
    }

    pub fn with_user_paths(mut self, user_paths: UserPaths) -> Self {
        self.user_paths = user_paths;
        self
    }

    pub fn roots(&self) -> &ResourceRoots {
        &self.roots
    }

    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    pub fn user_paths(&self) -> &UserPaths {
        &self.user_paths
    }

    pub fn startup_plugin(&self) -> Option<&StartupPlugin> {
        self.startup.as_ref()
    }

    pub fn dev(&self) -> bool {
        self.dev
    }

    /// Plugin whose user folder holds per-user files: the active one, or the
    /// startup plugin before anything is active.
    pub fn user_plugin<'a>(&'a self, active: Option<&'a str>) -> Option<&'a str> {
        active.or_else(|| self.startup.as_ref().map(|startup| startup.name.as_str()))
    }

    pub fn window_store(&self, active: Option<&str>) -> WindowStateStore {
        WindowStateStore::for_user(&self.user_paths, self.user_plugin(active))
    }

    /// Writes the runtime variable dumps. Failures are logged; exit proceeds.
    pub fn teardown(&self, vars: &VarRegistry, active: Option<&str>) {
        let plugin = self.user_plugin(active);
        for (file, format) in [
            (VARS_DUMP_FILE, DumpFormat::Plain),
            (VARS_DUMP_C_FILE, DumpFormat::CDeclarations),
        ] {
            let Some(path) = self.user_paths.filespec(plugin, file, false) else {
                continue;
            };
            match vars.save(&path, format) {
                Ok(()) => info!(path = %path.display(), "runtime variables saved"),
                Err(err) => warn!(%err, path = %path.display(), "cannot save runtime variables"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::options::OptionsBuilder;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn roots() -> ResourceRoots {
        ResourceRoots {
            options_folder: PathBuf::from("app/core"),
            core_folder: PathBuf::from("app/core"),
            ui_entry: PathBuf::from("app/core/main.ui"),
        }
    }

    #[test]
    fn user_plugin_prefers_active() {
        let mut builder = OptionsBuilder::new();
        builder.set("startupPlugin", "_orbit");
        let process = ProcessContext::new(roots(), builder.build(), false);
        assert_eq!(process.user_plugin(None), Some("orbit"));
        assert_eq!(process.user_plugin(Some("pulse")), Some("pulse"));
        assert!(!process.startup_plugin().unwrap().persist_as_default);
    }

    #[test]
    fn teardown_dumps_both_formats() {
        let dir = tempdir().unwrap();
        let process = ProcessContext::new(roots(), OptionsBuilder::new().build(), false)
            .with_user_paths(UserPaths::with_base(dir.path()));
        let mut vars = VarRegistry::new();
        vars.register("Orbit_speed", 1.5);

        process.teardown(&vars, Some("orbit"));

        let folder = dir.path().join(".orbit");
        assert_eq!(
            fs::read_to_string(folder.join(VARS_DUMP_FILE)).unwrap(),
            "Orbit_speed=1.5\n"
        );
        assert_eq!(
            fs::read_to_string(folder.join(VARS_DUMP_C_FILE)).unwrap(),
            "double Orbit_speed = 1.5;\n"
        );
    }
}
