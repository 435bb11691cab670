//! Named runtime variables that plugins expose for live tweaking.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::message::Message;
use crate::options::Options;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Var {
    value: f64,
    default: f64,
}

/// Plain `name=value` lines or C declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Plain,
    CDeclarations,
}

#[derive(Debug, Clone, Default)]
pub struct VarRegistry {
    vars: BTreeMap<String, Var>,
}

impl VarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` with `default`; an existing variable keeps its value.
    pub fn register(&mut self, name: impl Into<String>, default: f64) {
        self.vars.entry(name.into()).or_insert(Var {
            value: default,
            default,
        });
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.vars.get(name).map(|var| var.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Returns false when `name` is not registered.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match self.vars.get_mut(name) {
            Some(var) => {
                var.value = value;
                true
            }
            None => false,
        }
    }

    pub fn reset_default(&mut self, name: &str) -> bool {
        match self.vars.get_mut(name) {
            Some(var) => {
                var.value = var.default;
                true
            }
            None => false,
        }
    }

    pub fn names_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.vars
            .keys()
            .map(String::as_str)
            .filter(move |name| name.starts_with(prefix))
    }

    /// Applies every option whose key names a registered variable.
    pub fn apply_options(&mut self, options: &Options) -> usize {
        let mut applied = 0;
        for (key, value) in options.iter() {
            if let Some(var) = self.vars.get_mut(key) {
                var.value = value.trim().parse().unwrap_or(0.0);
                applied += 1;
            }
        }
        applied
    }

    /// Applies a `SetVar` message: `val`, `toggle`, `delta` or `scale`, in
    /// that order of precedence, then an optional `reset`.
    pub fn apply_set_message(&mut self, message: &Message) -> Option<f64> {
        let name = message.text("key")?;
        let current = self.get(&name)?;
        let mut value = current;
        if let Some(explicit) = message.f64("val") {
            value = explicit;
        } else if message.has("toggle") {
            value = if current == 0.0 { 1.0 } else { 0.0 };
        } else if let Some(delta) = message.f64("delta") {
            value += delta;
        } else if let Some(scale) = message.f64("scale") {
            value *= scale;
        }
        self.set(&name, value);
        if message.i64("reset").unwrap_or(0) != 0 {
            self.reset_default(&name);
        }
        let value = self.get(&name)?;
        debug!(var = %name, value, "runtime variable updated");
        Some(value)
    }

    pub fn render(&self, format: DumpFormat) -> String {
        let mut out = String::new();
        for (name, var) in &self.vars {
            let _ = match format {
                DumpFormat::Plain => writeln!(out, "{name}={}", var.value),
                DumpFormat::CDeclarations => writeln!(out, "double {name} = {:?};", var.value),
            };
        }
        out
    }

    pub fn save(&self, path: &Path, format: DumpFormat) -> io::Result<()> {
        fs::write(path, self.render(format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionsBuilder;
    use pretty_assertions::assert_eq;

    fn registry() -> VarRegistry {
        let mut vars = VarRegistry::new();
        vars.register("Orbit_speed", 2.0);
        vars.register("Orbit_trail", 0.0);
        vars
    }

    #[test]
    fn set_var_operations() {
        let mut vars = registry();
        let set = |wire: &str, vars: &mut VarRegistry| {
            vars.apply_set_message(&Message::parse(wire).unwrap())
        };
        assert_eq!(set("type=SetVar key=Orbit_speed val=5", &mut vars), Some(5.0));
        assert_eq!(set("type=SetVar key=Orbit_speed delta=-1", &mut vars), Some(4.0));
        assert_eq!(set("type=SetVar key=Orbit_speed scale=0.5", &mut vars), Some(2.0));
        assert_eq!(set("type=SetVar key=Orbit_trail toggle=1", &mut vars), Some(1.0));
        assert_eq!(set("type=SetVar key=Orbit_trail toggle=1", &mut vars), Some(0.0));
        assert_eq!(set("type=SetVar key=Orbit_speed val=9 reset=1", &mut vars), Some(2.0));
        assert_eq!(set("type=SetVar key=Missing val=1", &mut vars), None);
    }

    #[test]
    fn options_override_defaults() {
        let mut vars = registry();
        let mut builder = OptionsBuilder::new();
        builder.set("Orbit_speed", "7.5").set("fullscreen", "1");
        assert_eq!(vars.apply_options(&builder.build()), 1);
        assert_eq!(vars.get("Orbit_speed"), Some(7.5));
    }

    #[test]
    fn dumps_both_formats() {
        let vars = registry();
        assert_eq!(vars.render(DumpFormat::Plain), "Orbit_speed=2\nOrbit_trail=0\n");
        assert_eq!(
            vars.render(DumpFormat::CDeclarations),
            "double Orbit_speed = 2.0;\ndouble Orbit_trail = 0.0;\n"
        );
        let names: Vec<_> = vars.names_with_prefix("Orbit_").collect();
        assert_eq!(names, vec!["Orbit_speed", "Orbit_trail"]);
    }
}
