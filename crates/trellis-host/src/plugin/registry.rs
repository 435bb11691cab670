use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::options::Options;

/// Entry points a plugin may expose. Both are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryPoint {
    Startup,
    Shutdown,
}

impl EntryPoint {
    pub fn name(self) -> &'static str {
        match self {
            EntryPoint::Startup => "startup",
            EntryPoint::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntryPoint {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "startup" => Ok(EntryPoint::Startup),
            "shutdown" => Ok(EntryPoint::Shutdown),
            other => Err(format!("unknown plugin entry point `{other}`")),
        }
    }
}

/// A no-argument plugin procedure. Failures propagate to the frame loop.
pub type Hook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct PluginDescriptor {
    name: String,
    base_path: PathBuf,
    entry_points: BTreeMap<EntryPoint, Hook>,
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .field("entry_points", &self.entry_points.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            entry_points: BTreeMap::new(),
        }
    }

    pub fn with_entry_point<F>(mut self, entry: EntryPoint, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.entry_points.insert(entry, Arc::new(hook));
        self
    }

    pub fn with_startup<F>(self, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.with_entry_point(EntryPoint::Startup, hook)
    }

    pub fn with_shutdown<F>(self, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.with_entry_point(EntryPoint::Shutdown, hook)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn entry_point(&self, entry: EntryPoint) -> Option<&Hook> {
        self.entry_points.get(&entry)
    }

    /// Looks an entry point up by its textual name.
    pub fn entry_point_named(&self, name: &str) -> Option<&Hook> {
        name.parse().ok().and_then(|entry| self.entry_point(entry))
    }

    /// Prefix shared by this plugin's runtime variables (`Orbit_` for `orbit`).
    pub fn var_prefix(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => format!("{}{}_", first.to_uppercase(), chars.as_str()),
            None => String::new(),
        }
    }
}

/// Lookup over descriptors supplied by the embedding application.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginDescriptor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor, replacing any previous one with the same name.
    pub fn register(&mut self, descriptor: PluginDescriptor) -> &mut Self {
        self.plugins
            .insert(descriptor.name().to_string(), descriptor);
        self
    }

    /// Descriptors in alphabetic order of name.
    pub fn enumerate(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.plugins.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn lookup(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Resolves a file relative to `plugin`'s resources. The
    /// `pluginPath_<name>` option overrides the descriptor's base path.
    pub fn plugin_path(
        &self,
        options: &Options,
        plugin: &str,
        file: impl AsRef<Path>,
    ) -> Option<PathBuf> {
        let base = match options.plugin_path(plugin) {
            Some(path) => PathBuf::from(path),
            None => self.lookup(plugin)?.base_path().to_path_buf(),
        };
        Some(base.join(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionsBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn enumerate_is_alphabetic() {
        let mut registry = PluginRegistry::new();
        registry
            .register(PluginDescriptor::new("pulse", "plugins/pulse"))
            .register(PluginDescriptor::new("null", "plugins/null"))
            .register(PluginDescriptor::new("orbit", "plugins/orbit"));
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["null", "orbit", "pulse"]);
        assert!(registry.lookup("orbit").is_some());
        assert!(registry.lookup("ghost").is_none());
    }

    #[test]
    fn entry_points_resolve_by_name() {
        let descriptor = PluginDescriptor::new("orbit", "plugins/orbit").with_startup(|| Ok(()));
        assert!(descriptor.entry_point_named("startup").is_some());
        assert!(descriptor.entry_point_named("shutdown").is_none());
        assert!(descriptor.entry_point_named("render").is_none());
        assert_eq!(descriptor.var_prefix(), "Orbit_");
    }

    #[test]
    fn plugin_path_prefers_option() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginDescriptor::new("orbit", "plugins/orbit"));
        let mut builder = OptionsBuilder::new();
        builder.set("pluginPath_pulse", "/opt/pulse");
        let options = builder.build();

        assert_eq!(
            registry.plugin_path(&options, "orbit", "orbit.ui"),
            Some(PathBuf::from("plugins/orbit/orbit.ui"))
        );
        assert_eq!(
            registry.plugin_path(&options, "pulse", "pulse.ui"),
            Some(PathBuf::from("/opt/pulse/pulse.ui"))
        );
        assert_eq!(registry.plugin_path(&options, "ghost", "x"), None);
    }
}
