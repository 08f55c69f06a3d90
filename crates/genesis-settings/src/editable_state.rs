//! Editable state of a setting and change reasons.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Why did a setting change?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeReason {
    /// Changed by the user.
    Change,
    /// A setting this one depends on changed.
    DependencyChanged,
    /// Reset to the configured default.
    ResetToDefault,
    /// Restored to the value captured at initialization or last apply.
    RestoreToInitial,
}

/// Visibility and editability snapshot of a setting, with the reasons behind it.
///
/// Restrictions only accumulate: once hidden or disabled during an evaluation
/// pass, nothing can make the setting visible or enabled again in that pass.
/// A fresh state is built for every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditableState {
    visible: bool,
    enabled: bool,
    resetable: bool,
    hide_from_analytics: bool,
    disabled_reasons: Vec<String>,
    disabled_options: Vec<String>,
    hidden_reasons: Vec<String>,
}

impl Default for EditableState {
    fn default() -> Self {
        Self {
            visible: true,
            enabled: true,
            resetable: true,
            hide_from_analytics: false,
            disabled_reasons: Vec::new(),
            disabled_options: Vec::new(),
            hidden_reasons: Vec::new(),
        }
    }
}

impl EditableState {
    /// Create a fully visible, enabled, resetable state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Is the setting visible?
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Is the setting editable?
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Does "reset to default" apply to this setting?
    #[must_use]
    pub const fn is_resetable(&self) -> bool {
        self.resetable
    }

    /// Should analytics skip this setting?
    #[must_use]
    pub const fn is_hidden_from_analytics(&self) -> bool {
        self.hide_from_analytics
    }

    /// User facing reasons the setting is disabled.
    #[must_use]
    pub fn disabled_reasons(&self) -> &[String] {
        &self.disabled_reasons
    }

    /// Discrete option keys that must not be offered.
    #[must_use]
    pub fn disabled_options(&self) -> &[String] {
        &self.disabled_options
    }

    /// Developer reasons the setting is hidden. Only recorded in debug builds.
    #[must_use]
    pub fn hidden_reasons(&self) -> &[String] {
        &self.hidden_reasons
    }

    /// Hide the setting. A developer reason is expected.
    pub fn hide(&mut self, dev_reason: &str) {
        if dev_reason.is_empty() {
            warn!("To hide a setting, you must provide a developer reason");
        }

        self.visible = false;

        if cfg!(debug_assertions) {
            self.hidden_reasons.push(dev_reason.to_string());
        }
    }

    /// Disable the setting with a reason shown to the player.
    pub fn disable(&mut self, reason: &str) {
        if reason.is_empty() {
            warn!("To disable a setting, you must provide a reason that can be shown to players");
        }

        self.enabled = false;
        self.disabled_reasons.push(reason.to_string());
    }

    /// Hide one discrete option from the player.
    pub fn disable_option(&mut self, option: &str) {
        if self.disabled_options.iter().any(|o| o == option) {
            warn!(option, "Option has already been disabled");
            return;
        }

        self.disabled_options.push(option.to_string());
    }

    /// Prevent "reset to default" from touching this setting.
    pub fn unable_to_reset(&mut self) {
        self.resetable = false;
    }

    /// Exclude this setting from analytics reporting.
    pub fn hide_from_analytics(&mut self) {
        self.hide_from_analytics = true;
    }

    /// Hide it in every way possible: hidden, not resetable, not reported.
    pub fn kill(&mut self, dev_reason: &str) {
        self.hide(dev_reason);
        self.hide_from_analytics();
        self.unable_to_reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = EditableState::new();
        assert!(state.is_visible());
        assert!(state.is_enabled());
        assert!(state.is_resetable());
        assert!(!state.is_hidden_from_analytics());
        assert!(state.disabled_reasons().is_empty());
    }

    #[test]
    fn test_kill() {
        let mut state = EditableState::new();
        state.kill("Platform does not support window mode");

        assert!(!state.is_visible());
        assert!(!state.is_resetable());
        assert!(state.is_hidden_from_analytics());
        assert!(state.is_enabled());
        assert_eq!(state.hidden_reasons().len(), 1);
    }

    #[test]
    fn test_disable_accumulates_reasons() {
        let mut state = EditableState::new();
        state.disable("First");
        state.disable("Second");

        assert!(!state.is_enabled());
        assert_eq!(state.disabled_reasons(), ["First", "Second"]);
    }

    #[test]
    fn test_disable_option_once() {
        let mut state = EditableState::new();
        state.disable_option("Mature");
        state.disable_option("Mature");
        assert_eq!(state.disabled_options(), ["Mature"]);
    }
}
