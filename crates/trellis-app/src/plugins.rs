//! Built-in plugins shipped with the binary.

use std::path::Path;

use tracing::info;
use trellis_host::{Message, MessageSender, PluginDescriptor, PluginRegistry, VarRegistry};

/// Runtime variables the built-in plugins expose, with their defaults.
pub const PLUGIN_VARS: &[(&str, f64)] = &[
    ("Orbit_speed", 1.0),
    ("Orbit_radius", 2.5),
    ("Orbit_trails", 0.0),
    ("Pulse_rate", 0.5),
    ("Pulse_gain", 1.0),
];

pub fn register_vars(vars: &mut VarRegistry) {
    for &(name, default) in PLUGIN_VARS {
        vars.register(name, default);
    }
}

pub fn builtin_registry(app_root: &Path, sender: &MessageSender) -> PluginRegistry {
    let plugins = app_root.join("plugins");
    let mut registry = PluginRegistry::new();
    registry
        .register(PluginDescriptor::new("null", plugins.join("null")))
        .register(orbit(&plugins, sender))
        .register(pulse(&plugins, sender));
    registry
}

fn orbit(plugins: &Path, sender: &MessageSender) -> PluginDescriptor {
    let on_start = sender.clone();
    let on_stop = sender.clone();
    PluginDescriptor::new("orbit", plugins.join("orbit"))
        .with_startup(move || {
            info!("orbit: camera rig attached");
            on_start.send(
                Message::new("UiSet")
                    .with("toUi", "pluginExtraUi")
                    .with("key", "label")
                    .with("val", "orbit controls"),
            );
            on_start.send_wire("type=SetVar key=Orbit_trails val=1")?;
            Ok(())
        })
        .with_shutdown(move || {
            info!("orbit: camera rig detached");
            on_stop.send_wire("type=SetVar key=Orbit_trails reset=1")?;
            Ok(())
        })
}

fn pulse(plugins: &Path, sender: &MessageSender) -> PluginDescriptor {
    let on_start = sender.clone();
    PluginDescriptor::new("pulse", plugins.join("pulse"))
        .with_startup(move || {
            info!("pulse: oscillator running");
            on_start.send(Message::new("SetVar").with("key", "Pulse_gain").with("scale", 0.5));
            Ok(())
        })
        .with_shutdown(|| {
            info!("pulse: oscillator stopped");
            Ok(())
        })
}
