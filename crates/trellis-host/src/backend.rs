//! Interfaces to the collaborators the host drives but does not implement:
//! the window system, graphics backend, UI toolkit, console and message
//! transport.

use std::path::Path;

use crate::bus::MessageSender;
use crate::message::Message;
use crate::plugin::ChoicePanel;
use crate::window_state::{WindowGeometry, WindowStyle};

pub trait WindowSystem {
    /// Pumps pending input and timer events into the UI toolkit.
    fn poll_events(&mut self);
    fn is_open(&self) -> bool;
    fn geometry(&self) -> WindowGeometry;
    fn set_geometry(&mut self, geometry: WindowGeometry);
    fn style(&self) -> WindowStyle {
        WindowStyle::Decorated
    }
    fn close(&mut self);
    /// Releases the window system after the loop ends.
    fn terminate(&mut self) {}
}

pub trait GraphicsBackend {
    fn set_viewport(&mut self, width: i32, height: i32);
    fn clear(&mut self);
    /// Resets per-frame transform state before the UI tree renders.
    fn begin_frame(&mut self) {}
    fn uses_dirty_rects(&self) -> bool {
        false
    }
    fn copy_front_to_back(&mut self) {}
    fn swap_buffers(&mut self);
}

pub trait UiToolkit {
    /// Executes the UI entry file that builds the initial widget tree.
    fn load(&mut self, entry: &Path) -> anyhow::Result<()>;
    /// Offers a message to the widget tree; returns true when a widget
    /// consumed it.
    fn dispatch(&mut self, message: &Message) -> bool;
    fn update(&mut self, now: f64);
    fn render(&mut self);
    fn reshape(&mut self, width: f32, height: f32);
    fn collect_garbage(&mut self);
    /// Removes all children of the named node. Unknown nodes are ignored.
    fn clear_children(&mut self, node: &str);
    /// Returns false when no node has that name.
    fn set_property(&mut self, node: &str, key: &str, value: &str) -> bool;
    fn bind_key(&mut self, key: &str, messages: Vec<Message>);
    /// Returns false when the panel does not exist.
    fn populate_choice_panel(&mut self, panel: &str, choices: &ChoicePanel) -> bool;
    /// Restores the shared camera/viewpoint to its defaults.
    fn reset_view(&mut self);
}

/// Auxiliary diagnostic console window.
pub trait Console {
    fn geometry(&self) -> WindowGeometry;
    fn set_geometry(&mut self, geometry: WindowGeometry);
    fn is_visible(&self) -> bool;
    fn show(&mut self);
    fn hide(&mut self);
}

/// Moves messages between this process and remote peers.
pub trait Transport {
    /// Queues every message that arrived since the last call.
    fn drain_into(&mut self, sender: &MessageSender) -> usize;
    /// Offered every message the default handler sees, before the UI tree.
    /// Consume the message to keep it from the UI.
    fn forward(&mut self, message: &mut Message);
}
