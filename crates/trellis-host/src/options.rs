//! Process-wide key/value options.
//!
//! Options are merged once at startup from the config files in the options
//! folder and the command line, then frozen behind an `Arc` and only read.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const FULLSCREEN: &str = "fullscreen";
pub const STARTUP_PLUGIN: &str = "startupPlugin";
pub const IGNORE_USER_LOCAL: &str = "ignoreUserLocal";
pub const COPY_PIXELS: &str = "copyPixels";
pub const KEY_BINDING_PREFIX: &str = "key_";
pub const PLUGIN_PATH_PREFIX: &str = "pluginPath_";

const DEFAULT_CONFIG: &str = "default.cfg";
const OPTIONS_CONFIG: &str = "options.cfg";
const DEV_CONFIG: &str = "dev.cfg";
const LOCAL_CONFIG: &str = "local.cfg";

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("command-line option `{0}` is not of the form key=value")]
    Malformed(String),
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        other => other.parse::<f64>().ok().map(|number| number != 0.0),
    }
}

/// The plugin to start with and whether it may become the saved default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupPlugin {
    pub name: String,
    pub persist_as_default: bool,
}

impl StartupPlugin {
    /// A leading `_` marks a one-off choice that must not be persisted.
    pub fn from_option(raw: &str) -> Option<Self> {
        let (name, persist_as_default) = match raw.strip_prefix('_') {
            Some(rest) => (rest, false),
            None => (raw, true),
        };
        let name = name.trim();
        (!name.is_empty()).then(|| Self {
            name: name.to_string(),
            persist_as_default,
        })
    }
}

/// Frozen option map.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Options {
    values: BTreeMap<String, String>,
}

impl Options {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(parse_bool)
    }

    /// Missing or unparsable flags read as off.
    pub fn flag(&self, key: &str) -> bool {
        self.get_bool(key).unwrap_or(false)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|value| value.trim().parse().ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|value| value.trim().parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fullscreen(&self) -> bool {
        self.flag(FULLSCREEN)
    }

    pub fn ignore_user_local(&self) -> bool {
        self.flag(IGNORE_USER_LOCAL)
    }

    pub fn copy_pixels(&self) -> Option<bool> {
        self.get_bool(COPY_PIXELS)
    }

    pub fn startup_plugin(&self) -> Option<StartupPlugin> {
        self.get(STARTUP_PLUGIN).and_then(StartupPlugin::from_option)
    }

    pub fn plugin_path(&self, plugin: &str) -> Option<&str> {
        self.get(&format!("{PLUGIN_PATH_PREFIX}{plugin}"))
    }

    /// `key_<name> = <messages>` entries.
    pub fn key_bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter_map(|(key, value)| {
            key.strip_prefix(KEY_BINDING_PREFIX)
                .filter(|name| !name.is_empty() && name.chars().all(char::is_alphanumeric))
                .map(|name| (name, value))
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct OptionsBuilder {
    values: BTreeMap<String, String>,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Accepts a `key=value` argument.
    pub fn set_pair(&mut self, pair: &str) -> Result<&mut Self, OptionsError> {
        let (key, value) = pair
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| OptionsError::Malformed(pair.to_string()))?;
        Ok(self.set(key.trim(), value.trim()))
    }

    /// Merges one config file. A missing file is not an error; returns
    /// whether the file was present.
    pub fn load_file(&mut self, path: &Path) -> Result<bool, OptionsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(OptionsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let table = text
            .parse::<toml::Table>()
            .map_err(|source| OptionsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        flatten_into(&mut self.values, "", table);
        debug!(path = %path.display(), "config file merged");
        Ok(true)
    }

    /// Loads `default.cfg`, `options.cfg`, `dev.cfg` (dev builds only) and
    /// `local.cfg`, later files overriding earlier ones.
    pub fn load_folder(&mut self, folder: &Path, dev: bool) -> Result<&mut Self, OptionsError> {
        let mut files = vec![DEFAULT_CONFIG, OPTIONS_CONFIG];
        if dev {
            files.push(DEV_CONFIG);
        }
        files.push(LOCAL_CONFIG);
        for file in files {
            self.load_file(&folder.join(file))?;
        }
        Ok(self)
    }

    pub fn build(self) -> Arc<Options> {
        Arc::new(Options {
            values: self.values,
        })
    }
}

fn flatten_into(values: &mut BTreeMap<String, String>, prefix: &str, table: toml::Table) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::String(text) => {
                values.insert(key, text);
            }
            toml::Value::Boolean(flag) => {
                values.insert(key, if flag { "1" } else { "0" }.to_string());
            }
            toml::Value::Table(inner) => flatten_into(values, &key, inner),
            toml::Value::Array(_) => warn!(%key, "array values are not supported in options"),
            other => {
                values.insert(key, other.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn later_files_and_cli_override() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("default.cfg"),
            "fullscreen = false\nstartupPlugin = \"orbit\"\nrate = 30\n",
        )
        .unwrap();
        fs::write(dir.path().join("options.cfg"), "rate = 60\n").unwrap();
        fs::write(dir.path().join("dev.cfg"), "rate = 90\n").unwrap();
        fs::write(dir.path().join("local.cfg"), "[window]\ntitle = \"Trellis\"\n").unwrap();

        let mut builder = OptionsBuilder::new();
        builder.load_folder(dir.path(), false).unwrap();
        builder.set_pair("fullscreen=1").unwrap();
        let options = builder.build();

        assert_eq!(options.get("rate"), Some("60"));
        assert_eq!(options.get_i64("rate"), Some(60));
        assert_eq!(options.get("window.title"), Some("Trellis"));
        assert!(options.fullscreen());
        assert_eq!(
            options.startup_plugin(),
            Some(StartupPlugin {
                name: "orbit".into(),
                persist_as_default: true
            })
        );
    }

    #[test]
    fn dev_config_only_in_dev_mode() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("options.cfg"), "rate = 60\n").unwrap();
        fs::write(dir.path().join("dev.cfg"), "rate = 90\n").unwrap();
        let mut builder = OptionsBuilder::new();
        builder.load_folder(dir.path(), true).unwrap();
        assert_eq!(builder.build().get("rate"), Some("90"));
    }

    #[test]
    fn malformed_inputs_are_errors() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("options.cfg"), "rate = = 3\n").unwrap();
        let mut builder = OptionsBuilder::new();
        assert!(matches!(
            builder.load_folder(dir.path(), false),
            Err(OptionsError::Parse { .. })
        ));
        assert!(matches!(
            builder.set_pair("novalue"),
            Err(OptionsError::Malformed(_))
        ));
    }

    #[test]
    fn underscore_marks_transient_startup_plugin() {
        assert_eq!(
            StartupPlugin::from_option("_pulse"),
            Some(StartupPlugin {
                name: "pulse".into(),
                persist_as_default: false
            })
        );
        assert_eq!(StartupPlugin::from_option("_"), None);
        assert_eq!(StartupPlugin::from_option(""), None);
    }

    #[test]
    fn key_bindings_and_bools() {
        let mut builder = OptionsBuilder::new();
        builder
            .set("key_f5", "type=PluginChange which=orbit")
            .set("key_", "ignored")
            .set("copyPixels", "off");
        let options = builder.build();
        let bindings: Vec<_> = options.key_bindings().collect();
        assert_eq!(bindings, vec![("f5", "type=PluginChange which=orbit")]);
        assert_eq!(options.copy_pixels(), Some(false));
        assert!(!options.ignore_user_local());
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("2"), Some(true));
        assert_eq!(parse_bool("maybe"), None);
    }
}
