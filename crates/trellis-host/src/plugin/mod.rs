//! Plugin descriptors, lookup, and the switch state machine.
//!
//! At most one plugin is active. Switches are requested from message
//! handlers and applied by [`PluginLifecycleManager::maintain`] at the start
//! of the next frame, before anything renders.

mod choices;
mod lifecycle;
mod registry;

pub use choices::{ChoicePanel, PluginChoice, NULL_PLUGIN};
pub use lifecycle::{
    LifecycleError, MaintainOutcome, Phase, PluginLifecycleManager, PluginState, PluginSwitcher,
    SwitchEnvironment,
};
pub use registry::{EntryPoint, Hook, PluginDescriptor, PluginRegistry};
