//! Setting nodes.
//!
//! A [`Setting`] is one row of the options tree: a value, an action, a
//! collection of other settings, or a page that opens its own screen. Nodes
//! live in the registry's arena and refer to each other by [`SettingId`].

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::discrete::DiscreteValue;
use crate::edit_condition::EditCondition;
use crate::editable_state::EditableState;
use crate::ids::SettingId;
use crate::player::LocalPlayer;
use crate::scalar::ScalarValue;

/// Computes non-searchable detail text for the current player.
pub type DynamicDetailsFn = Arc<dyn Fn(&LocalPlayer) -> String + Send + Sync>;

/// Callback run by an action setting.
pub type CustomActionFn = Arc<dyn Fn(&LocalPlayer) + Send + Sync>;

/// Value variants.
#[derive(Debug, Clone)]
pub enum ValueSetting {
    /// Choice among options
    Discrete(DiscreteValue),
    /// Ranged number
    Scalar(ScalarValue),
}

impl ValueSetting {
    fn resolve(&self, player: &LocalPlayer) -> bool {
        match self {
            Self::Discrete(value) => value.resolve(player),
            Self::Scalar(value) => value.resolve(player),
        }
    }

    fn describe_sources(&self) -> String {
        let getter = match self {
            Self::Discrete(value) => value.getter(),
            Self::Scalar(value) => value.getter(),
        };
        getter.map_or_else(|| "no data source".to_string(), |source| source.describe())
    }
}

/// A button row: runs a callback or broadcasts a named action.
#[derive(Clone, Default)]
pub struct ActionSetting {
    action_text: String,
    named_action: Option<String>,
    custom_action: Option<CustomActionFn>,
    dirty_action: bool,
}

impl fmt::Debug for ActionSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSetting")
            .field("action_text", &self.action_text)
            .field("named_action", &self.named_action)
            .field("custom_action", &self.custom_action.is_some())
            .field("dirty_action", &self.dirty_action)
            .finish()
    }
}

impl ActionSetting {
    /// Action with the given button text.
    #[must_use]
    pub fn new(action_text: impl Into<String>) -> Self {
        Self {
            action_text: action_text.into(),
            ..Self::default()
        }
    }

    /// Broadcast this named action when executed.
    #[must_use]
    pub fn with_named_action(mut self, action: impl Into<String>) -> Self {
        self.named_action = Some(action.into());
        self
    }

    /// Run a callback when executed. Takes precedence over the named action.
    #[must_use]
    pub fn with_custom_action(mut self, f: impl Fn(&LocalPlayer) + Send + Sync + 'static) -> Self {
        self.custom_action = Some(Arc::new(f));
        self
    }

    /// Executing the action counts as changing settings.
    #[must_use]
    pub fn with_dirty_action(mut self, dirty: bool) -> Self {
        self.dirty_action = dirty;
        self
    }

    /// Button text.
    #[must_use]
    pub fn action_text(&self) -> &str {
        &self.action_text
    }

    /// Named action tag.
    #[must_use]
    pub fn named_action(&self) -> Option<&str> {
        self.named_action.as_deref()
    }

    /// Custom callback.
    #[must_use]
    pub fn custom_action(&self) -> Option<&CustomActionFn> {
        self.custom_action.as_ref()
    }

    /// Does executing this action dirty the settings?
    #[must_use]
    pub const fn is_dirty_action(&self) -> bool {
        self.dirty_action
    }
}

/// A collection shown on its own screen.
#[derive(Debug, Clone, Default)]
pub struct PageSetting {
    navigation_text: String,
}

impl PageSetting {
    /// Text of the button that opens the page.
    #[must_use]
    pub fn navigation_text(&self) -> &str {
        &self.navigation_text
    }
}

/// What a setting is.
#[derive(Debug, Clone)]
pub enum SettingKind {
    /// Holds a value
    Value(ValueSetting),
    /// Runs an action
    Action(ActionSetting),
    /// Groups child settings inline
    Collection,
    /// Groups child settings on a separate screen
    Page(PageSetting),
}

impl SettingKind {
    /// Short name used in errors and snapshots.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Value(ValueSetting::Discrete(_)) => "discrete value",
            Self::Value(ValueSetting::Scalar(_)) => "scalar value",
            Self::Action(_) => "action",
            Self::Collection => "collection",
            Self::Page(_) => "page",
        }
    }
}

/// One node of the settings tree.
pub struct Setting {
    pub(crate) dev_name: String,
    pub(crate) display_name: String,
    pub(crate) description: String,
    pub(crate) description_plain: String,
    pub(crate) warning: String,
    pub(crate) tags: Vec<String>,
    pub(crate) dynamic_details: Option<DynamicDetailsFn>,
    pub(crate) parent: Option<SettingId>,
    pub(crate) children: Vec<SettingId>,
    pub(crate) edit_conditions: Vec<EditCondition>,
    pub(crate) dependents: Vec<SettingId>,
    pub(crate) edit_state: EditableState,
    pub(crate) edit_state_revision: u64,
    pub(crate) initialized: bool,
    pub(crate) ready: bool,
    pub(crate) registered: bool,
    pub(crate) report_analytics: bool,
    pub(crate) relay_dependency_changes: bool,
    pub(crate) broadcasting_change: bool,
    pub(crate) broadcasting_edit_condition: bool,
    pub(crate) kind: SettingKind,
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("dev_name", &self.dev_name)
            .field("kind", &self.kind.name())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("edit_state", &self.edit_state)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl Setting {
    fn new(dev_name: impl Into<String>, kind: SettingKind) -> Self {
        let report_analytics = matches!(kind, SettingKind::Value(_));
        Self {
            dev_name: dev_name.into(),
            display_name: String::new(),
            description: String::new(),
            description_plain: String::new(),
            warning: String::new(),
            tags: Vec::new(),
            dynamic_details: None,
            parent: None,
            children: Vec::new(),
            edit_conditions: Vec::new(),
            dependents: Vec::new(),
            edit_state: EditableState::new(),
            edit_state_revision: 0,
            initialized: false,
            ready: false,
            registered: false,
            report_analytics,
            relay_dependency_changes: false,
            broadcasting_change: false,
            broadcasting_edit_condition: false,
            kind,
        }
    }

    /// Discrete value setting.
    #[must_use]
    pub fn discrete(dev_name: impl Into<String>, value: DiscreteValue) -> Self {
        Self::new(dev_name, SettingKind::Value(ValueSetting::Discrete(value)))
    }

    /// Scalar value setting.
    #[must_use]
    pub fn scalar(dev_name: impl Into<String>, value: ScalarValue) -> Self {
        Self::new(dev_name, SettingKind::Value(ValueSetting::Scalar(value)))
    }

    /// Action setting.
    #[must_use]
    pub fn action(dev_name: impl Into<String>, action: ActionSetting) -> Self {
        Self::new(dev_name, SettingKind::Action(action))
    }

    /// Inline collection.
    #[must_use]
    pub fn collection(dev_name: impl Into<String>) -> Self {
        Self::new(dev_name, SettingKind::Collection)
    }

    /// Page with the given navigation text.
    #[must_use]
    pub fn page(dev_name: impl Into<String>, navigation_text: impl Into<String>) -> Self {
        Self::new(
            dev_name,
            SettingKind::Page(PageSetting {
                navigation_text: navigation_text.into(),
            }),
        )
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the rich text description. Markup is stripped for search.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self.description_plain = strip_rich_text(&self.description);
        self
    }

    /// Set the rich text warning.
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = warning.into();
        self
    }

    /// Add a tag. Tags are deduplicated.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    /// Add an edit condition.
    #[must_use]
    pub fn with_edit_condition(mut self, condition: EditCondition) -> Self {
        self.edit_conditions.push(condition);
        self
    }

    /// Compute extra detail text from the player.
    #[must_use]
    pub fn with_dynamic_details(mut self, f: impl Fn(&LocalPlayer) -> String + Send + Sync + 'static) -> Self {
        self.dynamic_details = Some(Arc::new(f));
        self
    }

    /// Opt in or out of analytics reporting.
    #[must_use]
    pub fn with_report_analytics(mut self, report: bool) -> Self {
        self.report_analytics = report;
        self
    }

    /// Re-broadcast a change with reason `DependencyChanged` whenever a dependency's value changes.
    #[must_use]
    pub fn with_relay_dependency_changes(mut self, relay: bool) -> Self {
        self.relay_dependency_changes = relay;
        self
    }

    /// Stable identifier, unique within a registry.
    #[must_use]
    pub fn dev_name(&self) -> &str {
        &self.dev_name
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Description with markup.
    #[must_use]
    pub fn description_rich_text(&self) -> &str {
        &self.description
    }

    /// Description without markup.
    #[must_use]
    pub fn description_plain_text(&self) -> &str {
        &self.description_plain
    }

    /// Warning with markup.
    #[must_use]
    pub fn warning_rich_text(&self) -> &str {
        &self.warning
    }

    /// Tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Has this tag?
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Extra detail text for the player, empty if not configured.
    #[must_use]
    pub fn dynamic_details(&self, player: &LocalPlayer) -> String {
        self.dynamic_details.as_ref().map(|f| f(player)).unwrap_or_default()
    }

    /// Parent collection.
    #[must_use]
    pub const fn parent(&self) -> Option<SettingId> {
        self.parent
    }

    /// Children (empty for values and actions).
    #[must_use]
    pub fn children(&self) -> &[SettingId] {
        &self.children
    }

    /// Edit conditions in evaluation order.
    #[must_use]
    pub fn edit_conditions(&self) -> &[EditCondition] {
        &self.edit_conditions
    }

    /// Settings that re-evaluate when this one changes.
    #[must_use]
    pub fn dependents(&self) -> &[SettingId] {
        &self.dependents
    }

    /// Cached edit state. Never recomputed on read.
    #[must_use]
    pub fn edit_state(&self) -> &EditableState {
        &self.edit_state
    }

    /// Incremented on every edit state refresh.
    #[must_use]
    pub const fn edit_state_revision(&self) -> u64 {
        self.edit_state_revision
    }

    /// Bound to a player?
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Finished startup?
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Part of a registry?
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Reported to analytics?
    #[must_use]
    pub const fn report_analytics(&self) -> bool {
        self.report_analytics
    }

    /// Relays dependency value changes?
    #[must_use]
    pub const fn relays_dependency_changes(&self) -> bool {
        self.relay_dependency_changes
    }

    /// Kind data.
    #[must_use]
    pub fn kind(&self) -> &SettingKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut SettingKind {
        &mut self.kind
    }

    /// Collection or page?
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self.kind, SettingKind::Collection | SettingKind::Page(_))
    }

    /// Page?
    #[must_use]
    pub const fn is_page(&self) -> bool {
        matches!(self.kind, SettingKind::Page(_))
    }

    /// Value setting?
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self.kind, SettingKind::Value(_))
    }

    /// Discrete value data.
    #[must_use]
    pub fn as_discrete(&self) -> Option<&DiscreteValue> {
        match &self.kind {
            SettingKind::Value(ValueSetting::Discrete(value)) => Some(value),
            _ => None,
        }
    }

    /// Scalar value data.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match &self.kind {
            SettingKind::Value(ValueSetting::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    /// Action data.
    #[must_use]
    pub fn as_action(&self) -> Option<&ActionSetting> {
        match &self.kind {
            SettingKind::Action(action) => Some(action),
            _ => None,
        }
    }

    /// Current value in string form. `None` for non-value settings.
    #[must_use]
    pub fn value_as_string(&self, player: &LocalPlayer) -> Option<String> {
        match &self.kind {
            SettingKind::Value(ValueSetting::Discrete(value)) => Some(value.value_as_string(player)),
            SettingKind::Value(ValueSetting::Scalar(value)) => Some(value.value(player).to_string()),
            _ => None,
        }
    }

    /// Value reported to analytics. Empty for non-value settings.
    #[must_use]
    pub fn analytics_value(&self, player: &LocalPlayer) -> String {
        self.value_as_string(player).unwrap_or_default()
    }

    /// Kind specific edit state rules, applied after every edit condition.
    pub(crate) fn gather_kind_state(&self, player: &LocalPlayer, state: &mut EditableState) {
        if let SettingKind::Value(value) = &self.kind {
            if !value.resolve(player) {
                state.kill("data source did not resolve");
            }
        }
    }

    /// Development checks run once startup completes.
    pub(crate) fn lint(&self, player: &LocalPlayer) {
        if self.dev_name.is_empty() {
            warn!("A setting has no dev name");
        }
        if self.display_name.is_empty() {
            warn!(setting = %self.dev_name, "You must provide a display name for settings");
        }

        match &self.kind {
            SettingKind::Value(value) => {
                if !value.resolve(player) {
                    warn!(
                        setting = %self.dev_name,
                        source = %value.describe_sources(),
                        "Data source did not resolve, are all properties defined?"
                    );
                }
                if self.description.is_empty() {
                    warn!(setting = %self.dev_name, "You must provide a description or it should specifically say \"(unused)\"");
                }
            },
            SettingKind::Action(action) => {
                if action.action_text.is_empty() {
                    warn!(setting = %self.dev_name, "You must provide action text for action settings");
                }
                if action.named_action.is_none() && action.custom_action.is_none() {
                    warn!(setting = %self.dev_name, "Action settings need a named action or a custom action");
                }
            },
            SettingKind::Page(page) => {
                if page.navigation_text.is_empty() {
                    warn!(setting = %self.dev_name, "You must provide navigation text for pages");
                }
                if self.description.is_empty() {
                    warn!(setting = %self.dev_name, "You must provide a description for pages");
                }
            },
            SettingKind::Collection => {},
        }
    }

    /// Capture the current value as the initial value. No-op for non-values.
    pub(crate) fn store_initial(&mut self, player: &LocalPlayer) {
        match &mut self.kind {
            SettingKind::Value(ValueSetting::Discrete(value)) => value.store_initial(player),
            SettingKind::Value(ValueSetting::Scalar(value)) => value.store_initial(player),
            _ => {},
        }
    }
}

/// Remove `<tag>` markup from rich text.
#[must_use]
pub fn strip_rich_text(rich: &str) -> String {
    let mut plain = String::with_capacity(rich.len());
    let mut in_tag = false;
    for c in rich.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(c),
            _ => {},
        }
    }
    plain
}
