//! Collaborators for running the host without a display.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{ensure, Context};
use parking_lot::Mutex;
use tracing::{debug, info, trace};
use trellis_host::{ChoicePanel, GraphicsBackend, Message, UiToolkit, WindowGeometry, WindowSystem};

/// Window that stays open for a fixed number of polls, or until closed.
#[derive(Debug)]
pub struct HeadlessWindow {
    geometry: WindowGeometry,
    remaining: Option<u64>,
    pacing: Duration,
    open: bool,
}

impl HeadlessWindow {
    pub fn new(geometry: WindowGeometry, frames: Option<u64>, pacing: Duration) -> Self {
        Self {
            geometry,
            remaining: frames,
            pacing,
            open: true,
        }
    }
}

impl WindowSystem for HeadlessWindow {
    fn poll_events(&mut self) {
        if !self.pacing.is_zero() {
            thread::sleep(self.pacing);
        }
        match self.remaining.as_mut() {
            Some(0) => self.open = false,
            Some(left) => *left -= 1,
            None => {}
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    fn set_geometry(&mut self, geometry: WindowGeometry) {
        debug!(?geometry, "headless window moved");
        self.geometry = geometry;
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn terminate(&mut self) {
        debug!("headless window released");
    }
}

#[derive(Debug, Default)]
pub struct HeadlessGraphics {
    frames: u64,
    viewport: (i32, i32),
}

impl GraphicsBackend for HeadlessGraphics {
    fn set_viewport(&mut self, width: i32, height: i32) {
        self.viewport = (width, height);
    }

    fn clear(&mut self) {}

    fn swap_buffers(&mut self) {
        self.frames += 1;
        trace!(frame = self.frames, viewport = ?self.viewport, "swap");
    }
}

/// What the headless widget tree has been told to show.
#[derive(Debug, Default, Clone)]
pub struct UiSnapshot {
    pub entry: Option<PathBuf>,
    pub key_bindings: BTreeMap<String, Vec<String>>,
    pub properties: BTreeMap<(String, String), String>,
    pub choices: Vec<String>,
    pub routed: Vec<String>,
    pub renders: u64,
}

/// Widget tree stand-in. Accepts anything addressed to a UI node and keeps
/// a snapshot the caller can inspect after the run.
#[derive(Debug, Default)]
pub struct HeadlessUi {
    snapshot: Arc<Mutex<UiSnapshot>>,
}

impl HeadlessUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Mutex<UiSnapshot>> {
        Arc::clone(&self.snapshot)
    }
}

impl UiToolkit for HeadlessUi {
    fn load(&mut self, entry: &Path) -> anyhow::Result<()> {
        ensure!(entry.is_file(), "UI entry {} is not a file", entry.display());
        let source = std::fs::read_to_string(entry)
            .with_context(|| format!("failed to read {}", entry.display()))?;
        info!(entry = %entry.display(), bytes = source.len(), "headless UI loaded");
        self.snapshot.lock().entry = Some(entry.to_path_buf());
        Ok(())
    }

    fn dispatch(&mut self, message: &Message) -> bool {
        let addressed = message.has("toUi") || message.has("toUiGroup");
        debug!(%message, addressed, "ui message");
        if addressed {
            self.snapshot.lock().routed.push(message.to_string());
        }
        addressed
    }

    fn update(&mut self, _now: f64) {}

    fn render(&mut self) {
        self.snapshot.lock().renders += 1;
    }

    fn reshape(&mut self, width: f32, height: f32) {
        debug!(width, height, "ui reshaped");
    }

    fn collect_garbage(&mut self) {}

    fn clear_children(&mut self, node: &str) {
        debug!(node, "ui subtree cleared");
    }

    fn set_property(&mut self, node: &str, key: &str, value: &str) -> bool {
        self.snapshot
            .lock()
            .properties
            .insert((node.to_string(), key.to_string()), value.to_string());
        true
    }

    fn bind_key(&mut self, key: &str, messages: Vec<Message>) {
        let wire = messages.iter().map(Message::to_string).collect();
        self.snapshot.lock().key_bindings.insert(key.to_string(), wire);
    }

    fn populate_choice_panel(&mut self, panel: &str, choices: &ChoicePanel) -> bool {
        let mut snapshot = self.snapshot.lock();
        snapshot.choices = choices
            .choices
            .iter()
            .map(|choice| format!("{} [{}]", choice.label, choice.key_binding))
            .collect();
        info!(
            panel,
            entries = snapshot.choices.len(),
            columns = choices.columns,
            "plugin chooser built"
        );
        true
    }

    fn reset_view(&mut self) {}
}
