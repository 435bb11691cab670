use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, error, info, trace};

use super::registry::{EntryPoint, PluginDescriptor, PluginRegistry};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("plugin `{plugin}` failed in its {entry} entry point")]
    Hook {
        plugin: String,
        entry: EntryPoint,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginState {
    pub active: Option<String>,
    pub pending: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active(String),
    SwitchPending {
        active: Option<String>,
        target: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintainOutcome {
    /// Nothing was pending.
    Unchanged,
    Switched { from: Option<String>, to: String },
    /// The target had no descriptor. Nothing changed: the previous plugin
    /// stays active and the target stays pending.
    Aborted { target: String },
}

/// What a switch touches outside the manager, in the order it touches it.
pub trait SwitchEnvironment {
    /// Empties the editable-variable panel of the outgoing plugin.
    fn clear_plugin_vars(&mut self);
    /// Runs one message dispatch pass immediately.
    fn dispatch_now(&mut self);
    /// Reclaims UI nodes released by the outgoing plugin.
    fn collect_garbage(&mut self);
    /// Drops UI attached on behalf of the outgoing plugin.
    fn clear_plugin_ui(&mut self);
    fn reset_view(&mut self);
    /// Tells other collaborators that `next` is taking over.
    fn announce(&mut self, previous: Option<&str>, next: &PluginDescriptor);
}

fn request(state: &RefCell<PluginState>, target: &str) -> bool {
    let target = target.trim();
    if target.is_empty() {
        return false;
    }
    let mut state = state.borrow_mut();
    if state.active.as_deref() == Some(target) {
        debug!(plugin = %target, "plugin already active");
        return false;
    }
    state.pending = Some(target.to_string());
    true
}

/// Handle for message handlers to queue a switch without owning the manager.
#[derive(Debug, Clone)]
pub struct PluginSwitcher {
    state: Rc<RefCell<PluginState>>,
}

impl PluginSwitcher {
    pub fn request_switch(&self, target: &str) -> bool {
        request(&self.state, target)
    }

    pub fn active(&self) -> Option<String> {
        self.state.borrow().active.clone()
    }
}

/// Owns the active/pending plugin pair and applies switches once per frame.
#[derive(Debug, Default)]
pub struct PluginLifecycleManager {
    state: Rc<RefCell<PluginState>>,
    unresolved: Option<String>,
}

impl PluginLifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switcher(&self) -> PluginSwitcher {
        PluginSwitcher {
            state: Rc::clone(&self.state),
        }
    }

    /// Queues `target`. Only the latest request before the next
    /// [`maintain`](Self::maintain) counts. Naming the running plugin is
    /// ignored and leaves any queued switch alone. Returns whether a switch
    /// is now pending for `target`.
    pub fn request_switch(&self, target: &str) -> bool {
        request(&self.state, target)
    }

    pub fn state(&self) -> PluginState {
        self.state.borrow().clone()
    }

    pub fn active(&self) -> Option<String> {
        self.state.borrow().active.clone()
    }

    pub fn pending(&self) -> Option<String> {
        self.state.borrow().pending.clone()
    }

    pub fn phase(&self) -> Phase {
        let state = self.state.borrow();
        match (&state.active, &state.pending) {
            (active, Some(target)) => Phase::SwitchPending {
                active: active.clone(),
                target: target.clone(),
            },
            (Some(active), None) => Phase::Active(active.clone()),
            (None, None) => Phase::Idle,
        }
    }

    /// Applies a pending switch. Must run outside rendering, once per frame.
    ///
    /// The old plugin's `shutdown` always returns before anything of the new
    /// plugin runs. Hook failures are returned untouched; the caller decides
    /// whether the process can continue.
    pub fn maintain(
        &mut self,
        registry: &PluginRegistry,
        env: &mut dyn SwitchEnvironment,
    ) -> Result<MaintainOutcome, LifecycleError> {
        let Some(target) = self.pending() else {
            return Ok(MaintainOutcome::Unchanged);
        };

        let Some(next) = registry.lookup(&target) else {
            // The target stays pending until a later request replaces it;
            // only the first failed attempt per target is reported.
            if self.unresolved.as_deref() != Some(target.as_str()) {
                error!(
                    plugin = %target,
                    "plugin switch aborted: no plugin registered under that name"
                );
                self.unresolved = Some(target.clone());
            } else {
                trace!(plugin = %target, "plugin switch still unresolved");
            }
            return Ok(MaintainOutcome::Aborted { target });
        };
        self.unresolved = None;

        let previous = self.active();
        debug!(from = ?previous, to = %target, "applying plugin switch");

        env.clear_plugin_vars();
        env.dispatch_now();

        if let Some(outgoing) = previous.as_deref().and_then(|name| registry.lookup(name)) {
            invoke(outgoing, EntryPoint::Shutdown)?;
        }
        env.collect_garbage();
        env.clear_plugin_ui();
        env.reset_view();
        env.announce(previous.as_deref(), next);

        {
            let mut state = self.state.borrow_mut();
            state.active = Some(target.clone());
            self.clear_pending_locked(&mut state, &target);
        }

        invoke(next, EntryPoint::Startup)?;
        info!(from = ?previous, to = %target, "plugin switched");
        Ok(MaintainOutcome::Switched {
            from: previous,
            to: target,
        })
    }

    /// Runs the active plugin's `shutdown` at process exit and leaves the
    /// manager idle.
    pub fn shutdown_active(
        &mut self,
        registry: &PluginRegistry,
    ) -> Result<Option<String>, LifecycleError> {
        let Some(active) = self.active() else {
            return Ok(None);
        };
        if let Some(descriptor) = registry.lookup(&active) {
            invoke(descriptor, EntryPoint::Shutdown)?;
        }
        let mut state = self.state.borrow_mut();
        state.active = None;
        state.pending = None;
        info!(plugin = %active, "plugin shut down");
        Ok(Some(active))
    }

    // A request that arrived while the switch was running survives for the
    // next tick.
    fn clear_pending_locked(&self, state: &mut PluginState, target: &str) {
        if state.pending.as_deref() == Some(target) {
            state.pending = None;
        }
    }
}

fn invoke(descriptor: &PluginDescriptor, entry: EntryPoint) -> Result<(), LifecycleError> {
    let Some(hook) = descriptor.entry_point(entry) else {
        return Ok(());
    };
    debug!(plugin = descriptor.name(), %entry, "invoking plugin entry point");
    hook().map_err(|source| LifecycleError::Hook {
        plugin: descriptor.name().to_string(),
        entry,
        source,
    })
}
