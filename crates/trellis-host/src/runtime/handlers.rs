//! Message handlers the host installs on its own bus.

use tracing::{debug, warn};

use crate::bus::MessageBus;
use crate::message::Message;
use crate::window_state::WindowGeometry;

use super::HostContext;

pub const DEFAULT_WINDOW: WindowGeometry = WindowGeometry::new(100, 100, 640, 480);
pub const DEFAULT_CONSOLE: WindowGeometry = WindowGeometry::new(0, 0, 800, 1000);
pub const CHOICE_PANEL: &str = "pluginChoices";

pub(crate) fn install(bus: &mut MessageBus<HostContext>) {
    bus.register("PluginChange", plugin_change);
    bus.register("SetVar", set_var);
    bus.register("QuitApp", |msg: &mut Message, ctx: &mut HostContext| {
        ctx.window.close();
        msg.consume();
    });
    bus.register("ResetWindow", reset_window);
    bus.register("WindowPos_Load", load_window_pos);
    bus.register("ToggleConsole", toggle_console);
    bus.register("BuildPluginChoiceButton", build_choice_panel);
    bus.set_default(route_out);
}

fn plugin_change(msg: &mut Message, ctx: &mut HostContext) {
    match msg.text("which") {
        Some(which) => {
            if ctx.switcher.request_switch(&which) {
                debug!(plugin = %which, "plugin switch requested");
            }
        }
        None => warn!(%msg, "PluginChange without `which`"),
    }
    msg.consume();
}

// Unknown variables fall through so the UI can claim them.
fn set_var(msg: &mut Message, ctx: &mut HostContext) {
    if ctx.vars.apply_set_message(msg).is_some() {
        msg.consume();
    }
}

fn reset_window(msg: &mut Message, ctx: &mut HostContext) {
    if !ctx.fullscreen {
        ctx.window.set_geometry(DEFAULT_WINDOW);
    }
    msg.consume();
}

fn load_window_pos(msg: &mut Message, ctx: &mut HostContext) {
    if !ctx.fullscreen {
        let store = ctx.process.window_store(ctx.switcher.active().as_deref());
        if let Some(saved) = store.load() {
            debug!(?saved, "restoring window geometry");
            ctx.window.set_geometry(saved);
        }
    }
    msg.consume();
}

fn toggle_console(msg: &mut Message, ctx: &mut HostContext) {
    msg.consume();
    let active = ctx.switcher.active();
    let Some(console) = ctx.console.as_mut() else {
        debug!("no console attached");
        return;
    };
    if console.is_visible() {
        console.hide();
        return;
    }
    let geometry = ctx
        .process
        .window_store(active.as_deref())
        .load_console()
        .unwrap_or(DEFAULT_CONSOLE);
    console.set_geometry(geometry);
    console.show();
}

fn build_choice_panel(msg: &mut Message, ctx: &mut HostContext) {
    let panel = msg
        .text("panel")
        .map(|panel| panel.into_owned())
        .unwrap_or_else(|| CHOICE_PANEL.to_string());
    if !ctx.ui.populate_choice_panel(&panel, &ctx.choices) {
        warn!(%panel, "plugin choice panel not found in the UI tree");
    }
    msg.consume();
}

/// Remote peers see a message first, then the widget tree.
fn route_out(msg: &mut Message, ctx: &mut HostContext) {
    if let Some(transport) = ctx.transport.as_mut() {
        transport.forward(msg);
    }
    if !msg.is_consumed() && ctx.ui.dispatch(msg) {
        msg.consume();
    }
}
