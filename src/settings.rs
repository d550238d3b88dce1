use crate::highlight::model::{Context, EnabledContexts, StyleTable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_refresh_interval_ms() -> u64 {
    100
}

fn default_ready_timeout_ms() -> u64 {
    200
}

fn default_display_change_delay_ms() -> u64 {
    100
}

/// Per-context on/off switches. Every other notion of "enabled" is derived
/// from these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextToggles {
    #[serde(default = "default_true")]
    pub highlight_focus: bool,
    #[serde(default = "default_true")]
    pub highlight_navigator: bool,
    #[serde(default = "default_true")]
    pub highlight_browse_mode: bool,
}

impl Default for ContextToggles {
    fn default() -> Self {
        Self {
            highlight_focus: true,
            highlight_navigator: true,
            highlight_browse_mode: true,
        }
    }
}

impl ContextToggles {
    pub fn all(enabled: bool) -> Self {
        Self {
            highlight_focus: enabled,
            highlight_navigator: enabled,
            highlight_browse_mode: enabled,
        }
    }

    pub fn enabled_contexts(&self) -> EnabledContexts {
        EnabledContexts {
            focus: self.highlight_focus,
            navigator: self.highlight_navigator,
            browse_mode: self.highlight_browse_mode,
        }
    }

    /// Aggregate state: the engine should be running while any context is on.
    pub fn any_enabled(&self) -> bool {
        !self.enabled_contexts().is_empty()
    }

    pub fn set(&mut self, context: Context, enabled: bool) {
        match context {
            Context::Focus => self.highlight_focus = enabled,
            Context::Navigator => self.highlight_navigator = enabled,
            Context::BrowseMode => self.highlight_browse_mode = enabled,
            Context::FocusNavigator => {
                self.highlight_focus = enabled;
                self.highlight_navigator = enabled;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightSettings {
    #[serde(default)]
    pub contexts: ContextToggles,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    #[serde(default = "default_display_change_delay_ms")]
    pub display_change_delay_ms: u64,
    #[serde(default)]
    pub styles: StyleTable,
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            contexts: ContextToggles::default(),
            refresh_interval_ms: default_refresh_interval_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            display_change_delay_ms: default_display_change_delay_ms(),
            styles: StyleTable::default(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl HighlightSettings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut settings: Self = serde_json::from_str(&content)?;
        let sanitized = settings.styles.sanitized();
        if sanitized != settings.styles {
            tracing::warn!(
                "highlight style uses the transparent key color; adjusting so it stays visible"
            );
            settings.styles = sanitized;
        }
        Ok(settings)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn display_change_delay(&self) -> Duration {
        Duration::from_millis(self.display_change_delay_ms)
    }
}
