//! The frame loop.
//!
//! One [`Host::step`] is one frame: poll input, drain the transport, apply a
//! pending plugin switch, dispatch messages, update the UI, sync window
//! geometry, render and swap. Everything runs on the calling thread.

mod clock;
mod handlers;
mod observer;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::{Console, GraphicsBackend, Transport, UiToolkit, WindowSystem};
use crate::bus::{MessageBus, MessageSender};
use crate::context::ProcessContext;
use crate::message::Message;
use crate::plugin::{
    ChoicePanel, LifecycleError, MaintainOutcome, PluginDescriptor, PluginLifecycleManager,
    PluginRegistry, PluginSwitcher, SwitchEnvironment,
};
use crate::vars::VarRegistry;
use crate::window_state::{PersistConditions, PersistOutcome, WindowGeometry};

pub use clock::FrameClock;
pub use handlers::{CHOICE_PANEL, DEFAULT_CONSOLE, DEFAULT_WINDOW};
pub use observer::{FrameObserver, FrameStage, TracingObserver};

use observer::StageTimer;

/// UI node listing the active plugin's editable variables.
pub const PLUGIN_VARS_NODE: &str = "pluginVars";
/// UI node plugins attach their own widgets under.
pub const PLUGIN_EXTRA_UI_NODE: &str = "pluginExtraUi";
pub const PLUGIN_PANEL_NODE: &str = "pluginPanel";
pub const CHOICE_GROUP: &str = "pluginChoiceButtons";

const DEFAULT_KEY_BINDINGS: &[(&str, &str)] = &[
    ("escape", "type=QuitApp"),
    ("alt_x", "type=QuitApp"),
    ("space", "type=UiToggle key=visible toUi=controlPanel; type=MouseShow"),
    ("alt_z", "type=UiToggle key=visible toUi=fpsGraph"),
    ("alt_w", "type=ResetWindow"),
    ("f11", "type=ResetWindow"),
    ("f1", "type=ToggleConsole"),
    ("f2", "type=Profiler_Toggle"),
    ("f3", "type=Profiler_Reset"),
    ("f4", "type=Profiler_Dump"),
];

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("failed to load UI entry {path}")]
    UiLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Continue,
    Closed,
}

/// The collaborators a host drives.
pub struct Collaborators {
    pub window: Box<dyn WindowSystem>,
    pub graphics: Box<dyn GraphicsBackend>,
    pub ui: Box<dyn UiToolkit>,
    pub console: Option<Box<dyn Console>>,
    pub transport: Option<Box<dyn Transport>>,
}

/// State the bus hands to every handler.
pub struct HostContext {
    pub window: Box<dyn WindowSystem>,
    pub ui: Box<dyn UiToolkit>,
    pub console: Option<Box<dyn Console>>,
    pub transport: Option<Box<dyn Transport>>,
    pub vars: VarRegistry,
    pub process: ProcessContext,
    pub switcher: PluginSwitcher,
    pub sender: MessageSender,
    pub choices: ChoicePanel,
    pub fullscreen: bool,
}

pub struct Host {
    bus: MessageBus<HostContext>,
    lifecycle: PluginLifecycleManager,
    registry: PluginRegistry,
    ctx: HostContext,
    graphics: Box<dyn GraphicsBackend>,
    clock: FrameClock,
    observer: Option<Box<dyn FrameObserver>>,
    copy_pixels: bool,
    last_geometry: Option<WindowGeometry>,
    last_console: Option<WindowGeometry>,
    frame: u64,
}

impl Host {
    /// Takes the bus up front so plugin hooks can hold its sender before the
    /// host exists. Handlers already on `bus` run ahead of the built-ins.
    pub fn new(
        mut bus: MessageBus<HostContext>,
        process: ProcessContext,
        registry: PluginRegistry,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators {
            window,
            graphics,
            ui,
            console,
            transport,
        } = collaborators;

        handlers::install(&mut bus);
        let lifecycle = PluginLifecycleManager::new();

        let options = process.options();
        let copy_pixels = graphics.uses_dirty_rects() && options.copy_pixels().unwrap_or(true);
        let fullscreen = options.fullscreen();
        let choices = ChoicePanel::build(&registry, process.dev());

        let ctx = HostContext {
            window,
            ui,
            console,
            transport,
            vars: VarRegistry::new(),
            switcher: lifecycle.switcher(),
            sender: bus.sender(),
            choices,
            fullscreen,
            process,
        };

        Self {
            bus,
            lifecycle,
            registry,
            ctx,
            graphics,
            clock: FrameClock::wall(),
            observer: None,
            copy_pixels,
            last_geometry: None,
            last_console: None,
            frame: 0,
        }
    }

    pub fn with_clock(mut self, clock: FrameClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: impl FrameObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn sender(&self) -> MessageSender {
        self.bus.sender()
    }

    /// Adds a handler ahead of the default route. Built-in tags keep their
    /// built-in handler first.
    pub fn register_handler<F>(&mut self, tag: impl Into<String>, handler: F)
    where
        F: FnMut(&mut Message, &mut HostContext) + 'static,
    {
        self.bus.register(tag, handler);
    }

    pub fn vars_mut(&mut self) -> &mut VarRegistry {
        &mut self.ctx.vars
    }

    pub fn vars(&self) -> &VarRegistry {
        &self.ctx.vars
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &PluginLifecycleManager {
        &self.lifecycle
    }

    pub fn context(&self) -> &HostContext {
        &self.ctx
    }

    /// Completed frames.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn copy_pixels(&self) -> bool {
        self.copy_pixels
    }

    /// Queues the startup work and loads the UI entry file. Nothing is
    /// dispatched until the first frame.
    pub fn start(&mut self) -> Result<(), HostError> {
        let applied = self.ctx.vars.apply_options(self.ctx.process.options());
        debug!(applied, "runtime variables overridden from options");

        self.bind_keys();
        self.bus.enqueue(Message::new("WindowPos_Load"));

        let entry = self.ctx.process.roots().ui_entry.clone();
        self.ctx
            .ui
            .load(&entry)
            .map_err(|source| HostError::UiLoad {
                path: entry.clone(),
                source,
            })?;
        info!(entry = %entry.display(), "UI entry loaded");

        self.bus.enqueue(Message::new("BuildPluginChoiceButton"));

        let startup = self
            .ctx
            .process
            .startup_plugin()
            .map(|startup| startup.name.clone())
            .or_else(|| self.registry.names().next().map(str::to_string));
        match startup {
            Some(name) => {
                info!(plugin = %name, "startup plugin");
                self.bus
                    .enqueue(Message::new("PluginChange").with("which", name));
            }
            None => warn!("no plugins registered; running without one"),
        }
        Ok(())
    }

    fn bind_keys(&mut self) {
        let mut bindings: BTreeMap<&str, &str> = DEFAULT_KEY_BINDINGS.iter().copied().collect();
        let options = self.ctx.process.options().clone();
        bindings.extend(options.key_bindings());
        for (key, wire) in bindings {
            match Message::parse_batch(wire) {
                Ok(messages) => self.ctx.ui.bind_key(key, messages),
                Err(err) => warn!(%err, key, "ignoring key binding"),
            }
        }
    }

    /// Runs one frame. Returns [`FrameStatus::Closed`] once the window has
    /// closed; nothing is rendered in that frame.
    pub fn step(&mut self) -> Result<FrameStatus, HostError> {
        let now = self.clock.tick();
        let mut timer = StageTimer::start();

        self.ctx.window.poll_events();
        timer.lap(self.observer.as_deref_mut(), FrameStage::Input);

        if let Some(transport) = self.ctx.transport.as_mut() {
            transport.drain_into(&self.ctx.sender);
        }
        timer.lap(self.observer.as_deref_mut(), FrameStage::Transport);

        let mut scope = SwitchScope {
            bus: &mut self.bus,
            ctx: &mut self.ctx,
            now,
        };
        let outcome = self.lifecycle.maintain(&self.registry, &mut scope)?;
        if let MaintainOutcome::Switched { to, .. } = outcome {
            debug!(plugin = %to, frame = self.frame, "plugin active");
        }
        timer.lap(self.observer.as_deref_mut(), FrameStage::Maintain);

        self.bus.dispatch(&mut self.ctx, now);
        timer.lap(self.observer.as_deref_mut(), FrameStage::Dispatch);

        self.ctx.ui.update(now);
        timer.lap(self.observer.as_deref_mut(), FrameStage::Update);

        if !self.ctx.window.is_open() {
            return Ok(FrameStatus::Closed);
        }

        self.sync_geometry();
        timer.lap(self.observer.as_deref_mut(), FrameStage::Geometry);

        self.graphics.begin_frame();
        if self.copy_pixels {
            self.graphics.copy_front_to_back();
        }
        self.ctx.ui.render();
        timer.lap(self.observer.as_deref_mut(), FrameStage::Render);

        self.graphics.swap_buffers();
        timer.lap(self.observer.as_deref_mut(), FrameStage::Swap);

        timer.finish(self.observer.as_deref_mut(), self.frame);
        self.frame += 1;
        Ok(FrameStatus::Continue)
    }

    // Polled by equality each frame; window-system resize callbacks reenter.
    fn sync_geometry(&mut self) {
        let geometry = self.ctx.window.geometry();
        if self.last_geometry != Some(geometry) {
            let resized = self
                .last_geometry
                .map_or(true, |last| !last.same_size(&geometry));
            self.last_geometry = Some(geometry);
            if geometry.has_area() {
                self.graphics.set_viewport(geometry.width, geometry.height);
                self.graphics.clear();
                if resized {
                    self.ctx
                        .ui
                        .reshape(geometry.width as f32, geometry.height as f32);
                }
                self.persist_window(geometry);
            }
        }

        let Some(console) = self.ctx.console.as_ref() else {
            return;
        };
        if !console.is_visible() {
            return;
        }
        let geometry = console.geometry();
        if self.last_console == Some(geometry) {
            return;
        }
        let first_sighting = self.last_console.is_none() && self.frame == 0;
        self.last_console = Some(geometry);
        if first_sighting {
            return;
        }
        let store = self.ctx.process.window_store(self.lifecycle.active().as_deref());
        if let Err(err) = store.persist_console(geometry) {
            warn!(%err, path = %store.console_file().display(), "cannot save console geometry");
        }
    }

    fn persist_window(&self, geometry: WindowGeometry) {
        let conditions = PersistConditions {
            fullscreen: self.ctx.fullscreen,
            style: self.ctx.window.style(),
            frame: self.frame,
        };
        let store = self.ctx.process.window_store(self.lifecycle.active().as_deref());
        match store.persist(geometry, conditions) {
            Ok(PersistOutcome::Written) => {
                debug!(?geometry, path = %store.window_file().display(), "window geometry saved")
            }
            Ok(_) => {}
            Err(err) => warn!(
                %err,
                path = %store.window_file().display(),
                "cannot save window geometry"
            ),
        }
    }

    /// Starts the host and steps until the window closes, then shuts down.
    pub fn run(&mut self) -> Result<u64, HostError> {
        self.start()?;
        while self.step()? == FrameStatus::Continue {}
        self.shutdown()?;
        Ok(self.frame)
    }

    /// Shuts down the active plugin, releases the window system and dumps
    /// runtime variables.
    pub fn shutdown(&mut self) -> Result<(), HostError> {
        let last = self.lifecycle.shutdown_active(&self.registry).map_err(|err| {
            error!(%err, "plugin shutdown failed");
            err
        })?;
        self.ctx.window.terminate();
        self.ctx.process.teardown(&self.ctx.vars, last.as_deref());
        info!(frames = self.frame, "host stopped");
        Ok(())
    }
}

/// What a plugin switch reaches: the bus for the forced dispatch and the UI.
struct SwitchScope<'a> {
    bus: &'a mut MessageBus<HostContext>,
    ctx: &'a mut HostContext,
    now: f64,
}

impl SwitchEnvironment for SwitchScope<'_> {
    fn clear_plugin_vars(&mut self) {
        self.bus
            .enqueue(Message::new("VarEdit_Clear").with("toUi", PLUGIN_VARS_NODE));
    }

    fn dispatch_now(&mut self) {
        self.bus.dispatch(self.ctx, self.now);
    }

    fn collect_garbage(&mut self) {
        self.ctx.ui.collect_garbage();
    }

    fn clear_plugin_ui(&mut self) {
        self.ctx.ui.clear_children(PLUGIN_EXTRA_UI_NODE);
    }

    fn reset_view(&mut self) {
        self.ctx.ui.reset_view();
    }

    fn announce(&mut self, previous: Option<&str>, next: &PluginDescriptor) {
        let name = next.name();
        for message in [
            Message::new("UiSet")
                .with("key", "selected")
                .with("val", 0)
                .with("toUiGroup", CHOICE_GROUP),
            Message::new("VarEdit_Add")
                .with("toUi", PLUGIN_VARS_NODE)
                .with("regexp", format!("^{}.*", next.var_prefix())),
            Message::new("VarEdit_Sort")
                .with("which", "order")
                .with("toUi", PLUGIN_VARS_NODE),
            Message::new("PluginChanged")
                .with("which", name)
                .with("previous", previous.unwrap_or("")),
            Message::new("PluginLoadUi").with("which", name),
        ] {
            self.bus.enqueue(message);
        }
        if !self.ctx.ui.set_property(PLUGIN_PANEL_NODE, "plugin", name) {
            debug!(node = PLUGIN_PANEL_NODE, "no plugin panel to label");
        }
    }
}
