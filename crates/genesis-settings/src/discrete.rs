//! Discrete value settings: a choice among string-keyed options.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::codec::{LinearColor, OptionCodec};
use crate::data_source::DataSource;
use crate::editable_state::EditableState;
use crate::error::{SettingsError, SettingsResult};
use crate::player::LocalPlayer;

/// Equality predicate between a stored value and an option key.
pub type OptionMatcher = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// One selectable option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteOption {
    /// Canonical key written through the setter
    pub key: String,
    /// Text shown to the player
    pub text: String,
}

/// Value data for a discrete setting.
#[derive(Clone)]
pub struct DiscreteValue {
    options: Vec<DiscreteOption>,
    default: Option<String>,
    initial: String,
    getter: Option<Arc<dyn DataSource>>,
    setter: Option<Arc<dyn DataSource>>,
    matcher: Option<OptionMatcher>,
}

impl Default for DiscreteValue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DiscreteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscreteValue")
            .field("options", &self.options)
            .field("default", &self.default)
            .field("initial", &self.initial)
            .field("getter", &self.getter)
            .field("setter", &self.setter)
            .finish_non_exhaustive()
    }
}

impl DiscreteValue {
    /// Create a value with no options and no data source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: Vec::new(),
            default: None,
            initial: String::new(),
            getter: None,
            setter: None,
            matcher: None,
        }
    }

    /// Boolean value with "OFF" / "ON" options.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new()
            .with_typed_option(false, "OFF")
            .with_typed_option(true, "ON")
    }

    /// Numeric value: options compare by parsed number, so "60" matches "60.0".
    #[must_use]
    pub fn numeric() -> Self {
        Self::new().with_matcher(|a, b| match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        })
    }

    /// Color value: one option per color, displayed as `#RRGGBB`.
    #[must_use]
    pub fn colors(colors: &[LinearColor]) -> Self {
        colors
            .iter()
            .fold(Self::new(), |value, color| value.with_typed_option(*color, color.to_srgb_hex()))
    }

    /// Use the same source for reading and writing.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.getter = Some(Arc::clone(&source));
        self.setter = Some(source);
        self
    }

    /// Set the getter.
    #[must_use]
    pub fn with_getter(mut self, getter: Arc<dyn DataSource>) -> Self {
        self.getter = Some(getter);
        self
    }

    /// Set the setter.
    #[must_use]
    pub fn with_setter(mut self, setter: Arc<dyn DataSource>) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Add an option. Duplicate keys are logged and skipped.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        if let Err(err) = self.add_option(key, text) {
            warn!(%err, "Ignoring option");
        }
        self
    }

    /// Add an option from a typed value.
    #[must_use]
    pub fn with_typed_option<T: OptionCodec>(self, value: T, text: impl Into<String>) -> Self {
        self.with_option(value.encode(), text)
    }

    /// Set the default option key.
    #[must_use]
    pub fn with_default(mut self, key: impl Into<String>) -> Self {
        self.default = Some(key.into());
        self
    }

    /// Set the default from a typed value.
    #[must_use]
    pub fn with_typed_default<T: OptionCodec>(self, value: T) -> Self {
        self.with_default(value.encode())
    }

    /// Replace the option equality predicate.
    #[must_use]
    pub fn with_matcher(mut self, matcher: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Self {
        self.matcher = Some(Arc::new(matcher));
        self
    }

    /// Add an option.
    pub fn add_option(&mut self, key: impl Into<String>, text: impl Into<String>) -> SettingsResult<()> {
        let key = key.into();
        if self.has_option(&key) {
            return Err(SettingsError::DuplicateOption {
                setting: String::new(),
                option: key,
            });
        }
        self.options.push(DiscreteOption {
            key,
            text: text.into(),
        });
        Ok(())
    }

    /// Remove an option by key. Returns true if it existed.
    pub fn remove_option(&mut self, key: &str) -> bool {
        let before = self.options.len();
        self.options.retain(|option| option.key != key);
        self.options.len() != before
    }

    /// Is there an option with this key?
    #[must_use]
    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|option| option.key == key)
    }

    /// Change the "ON" text. The option moves to the end, so this also controls ordering.
    pub fn set_true_text(&mut self, text: impl Into<String>) {
        self.replace_option_text(true.encode(), text.into());
    }

    /// Change the "OFF" text. The option moves to the end, so this also controls ordering.
    pub fn set_false_text(&mut self, text: impl Into<String>) {
        self.replace_option_text(false.encode(), text.into());
    }

    fn replace_option_text(&mut self, key: String, text: String) {
        self.remove_option(&key);
        self.options.push(DiscreteOption { key, text });
    }

    /// Every option, including disabled ones.
    #[must_use]
    pub fn options(&self) -> &[DiscreteOption] {
        &self.options
    }

    /// Key of the option at `index`.
    #[must_use]
    pub fn option_key(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(|option| option.key.as_str())
    }

    /// Configured default key.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Value captured by the last store-initial.
    #[must_use]
    pub fn initial_value(&self) -> &str {
        &self.initial
    }

    /// Getter data source.
    #[must_use]
    pub fn getter(&self) -> Option<&Arc<dyn DataSource>> {
        self.getter.as_ref()
    }

    /// Do both data sources exist and resolve for this player?
    #[must_use]
    pub fn resolve(&self, player: &LocalPlayer) -> bool {
        matches!((&self.getter, &self.setter), (Some(g), Some(s)) if g.resolve(player) && s.resolve(player))
    }

    fn options_equal(&self, a: &str, b: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher(a, b),
            None => a == b,
        }
    }

    fn find_index(&self, value: &str) -> Option<usize> {
        self.options
            .iter()
            .position(|option| self.options_equal(value, &option.key))
    }

    /// Current value through the getter. Empty if there is no getter.
    #[must_use]
    pub fn value_as_string(&self, player: &LocalPlayer) -> String {
        self.getter
            .as_ref()
            .map(|getter| getter.value_as_string(player))
            .unwrap_or_default()
    }

    /// Current value decoded as `T`.
    #[must_use]
    pub fn typed_value<T: OptionCodec>(&self, player: &LocalPlayer) -> Option<T> {
        T::decode(&self.value_as_string(player))
    }

    /// Write through the setter. Returns false if there is no setter.
    pub(crate) fn write(&self, player: &LocalPlayer, value: &str) -> bool {
        match &self.setter {
            Some(setter) => {
                setter.set_value(player, value);
                true
            },
            None => false,
        }
    }

    /// Index of the current value, falling back to the default index.
    #[must_use]
    pub fn option_index(&self, player: &LocalPlayer) -> Option<usize> {
        self.find_index(&self.value_as_string(player))
            .or_else(|| self.default_index())
    }

    /// Index of the default value. `None` without a default or when it matches no option.
    #[must_use]
    pub fn default_index(&self) -> Option<usize> {
        self.default.as_deref().and_then(|default| self.find_index(default))
    }

    /// Texts of the options that are not disabled in `state`.
    ///
    /// Removing disabled options shifts the indices of the ones after them.
    #[must_use]
    pub fn visible_options(&self, state: &EditableState) -> Vec<String> {
        let disabled = state.disabled_options();
        self.options
            .iter()
            .filter(|option| !disabled.contains(&option.key))
            .map(|option| option.text.clone())
            .collect()
    }

    /// Capture the current value as the initial value.
    pub(crate) fn store_initial(&mut self, player: &LocalPlayer) {
        self.initial = self.value_as_string(player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::PropertySource;

    #[test]
    fn test_boolean_options() {
        let value = DiscreteValue::boolean();
        assert_eq!(value.option_key(0), Some("false"));
        assert_eq!(value.option_key(1), Some("true"));
        assert_eq!(value.options()[1].text, "ON");
    }

    #[test]
    fn test_true_text_reorders() {
        let mut value = DiscreteValue::boolean();
        value.set_true_text("Enabled");
        value.set_false_text("Disabled");

        assert_eq!(value.option_key(0), Some("true"));
        assert_eq!(value.options()[0].text, "Enabled");
        assert_eq!(value.option_key(1), Some("false"));
    }

    #[test]
    fn test_duplicate_option_rejected() {
        let mut value = DiscreteValue::new().with_option("a", "A");
        let err = value.add_option("a", "Again").unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateOption { .. }));
        assert_eq!(value.options().len(), 1);
    }

    #[test]
    fn test_option_index_falls_back_to_default() {
        let player = LocalPlayer::new("P1");
        let value = DiscreteValue::boolean()
            .with_source(PropertySource::shared("subtitles"))
            .with_typed_default(true);

        assert_eq!(value.option_index(&player), Some(1));
        assert_eq!(value.default_index(), Some(1));
    }

    #[test]
    fn test_default_index_absent() {
        let value = DiscreteValue::boolean();
        assert_eq!(value.default_index(), None);

        let unmatched = DiscreteValue::boolean().with_default("maybe");
        assert_eq!(unmatched.default_index(), None);
    }

    #[test]
    fn test_numeric_matcher() {
        let player = LocalPlayer::new("P1").with_property("fps", "60.0");
        let value = DiscreteValue::numeric()
            .with_source(PropertySource::shared("fps"))
            .with_typed_option(30_u32, "30")
            .with_typed_option(60_u32, "60");

        assert_eq!(value.option_index(&player), Some(1));
    }

    #[test]
    fn test_visible_options_skip_disabled() {
        let value = DiscreteValue::new()
            .with_option("low", "Low")
            .with_option("mature", "Mature")
            .with_option("high", "High");
        let mut state = EditableState::new();
        state.disable_option("mature");

        assert_eq!(value.visible_options(&state), ["Low", "High"]);
        assert_eq!(value.visible_options(&EditableState::new()).len(), 3);
    }

    #[test]
    fn test_color_options() {
        let value = DiscreteValue::colors(&[LinearColor::WHITE, LinearColor::BLACK]);
        assert_eq!(value.options()[0].text, "#FFFFFF");
        assert_eq!(value.options()[1].text, "#000000");
    }

    #[test]
    fn test_resolve_requires_both_sources() {
        let player = LocalPlayer::new("P1").with_property("x", "1");
        assert!(!DiscreteValue::new().resolve(&player));
        assert!(!DiscreteValue::new().with_getter(PropertySource::shared("x")).resolve(&player));
        assert!(DiscreteValue::new().with_source(PropertySource::shared("x")).resolve(&player));
    }
}
