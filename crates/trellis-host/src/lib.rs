//! Host runtime for plugin-extensible interactive applications.
//!
//! The host discovers its resource folders, runs a single-threaded frame
//! loop around a textual message bus and swaps the one active plugin at a
//! frame boundary, so the UI and renderer never see two plugins at once.
//! Windowing, graphics and the widget tree are supplied by the embedding
//! application through the traits in [`backend`].

pub mod backend;
pub mod bus;
pub mod context;
pub mod logging;
pub mod message;
pub mod options;
pub mod paths;
pub mod plugin;
pub mod runtime;
pub mod transport;
pub mod vars;
pub mod window_state;

pub use backend::{Console, GraphicsBackend, Transport, UiToolkit, WindowSystem};
pub use bus::{Handler, MessageBus, MessageSender};
pub use context::ProcessContext;
pub use message::{Message, Value, WireError};
pub use options::{Options, OptionsBuilder, OptionsError, StartupPlugin};
pub use paths::{FolderResolver, ResolveError, ResourceRoots, UserPaths};
pub use plugin::{
    ChoicePanel, EntryPoint, LifecycleError, MaintainOutcome, Phase, PluginDescriptor,
    PluginLifecycleManager, PluginRegistry, PluginSwitcher,
};
pub use runtime::{
    Collaborators, FrameClock, FrameObserver, FrameStage, FrameStatus, Host, HostContext,
    HostError, TracingObserver,
};
pub use transport::{channel_transport, ChannelTransport, TransportPeer};
pub use vars::{DumpFormat, VarRegistry};
pub use window_state::{WindowGeometry, WindowStateStore, WindowStyle};
