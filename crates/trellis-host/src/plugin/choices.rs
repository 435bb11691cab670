use crate::message::Message;

use super::registry::PluginRegistry;

/// Placeholder plugin hidden from the chooser outside dev mode.
pub const NULL_PLUGIN: &str = "null";

const WIDE_PANEL_THRESHOLD: usize = 20;
const FIRST_KEY_MAJOR: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct PluginChoice {
    pub label: String,
    pub key_binding: String,
    pub message: Message,
}

/// Contents of the plugin chooser panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoicePanel {
    pub columns: u32,
    pub choices: Vec<PluginChoice>,
}

impl ChoicePanel {
    pub fn build(registry: &PluginRegistry, dev: bool) -> Self {
        let columns = if registry.len() > WIDE_PANEL_THRESHOLD { 3 } else { 2 };
        let mut major = FIRST_KEY_MAJOR;
        let mut minor = 1;
        let mut choices = Vec::with_capacity(registry.len());
        for name in registry.names() {
            if !dev && name == NULL_PLUGIN {
                continue;
            }
            choices.push(PluginChoice {
                label: name.to_string(),
                key_binding: format!("{major}.{minor}"),
                message: Message::new("PluginChange").with("which", name),
            });
            minor += 1;
            if minor > 9 {
                minor = 0;
                major += 1;
            }
        }
        Self { columns, choices }
    }
}
