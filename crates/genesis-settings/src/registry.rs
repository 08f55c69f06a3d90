//! Settings registry.
//!
//! The registry owns every setting of one local player. It links the tree,
//! drives initialization, evaluates edit conditions, relays setting events to
//! listeners and answers filter queries for the UI.
//!
//! Events are delivered over crossbeam channels: call [`SettingRegistry::subscribe`]
//! and drain the receiver. Edit condition re-evaluation requests and data
//! source readiness also arrive over channels and are handled by
//! [`SettingRegistry::pump`], which every mutating operation calls on exit.

mod values;

use std::fmt;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::arena::SettingArena;
use crate::data_source::ReadySignal;
use crate::edit_condition::{ConditionTrigger, EditCondition, EditConditionContext};
use crate::editable_state::{ChangeReason, EditableState};
use crate::error::{SettingsError, SettingsResult};
use crate::filter::{self, FilterState};
use crate::ids::{RegistryId, SettingId};
use crate::player::LocalPlayer;
use crate::setting::{Setting, SettingKind, ValueSetting};

pub use values::SettingSnapshot;

/// Events relayed from registered settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A setting's value changed.
    SettingChanged {
        /// Setting
        setting: SettingId,
        /// Why
        reason: ChangeReason,
    },
    /// A setting was applied.
    SettingApplied {
        /// Setting
        setting: SettingId,
    },
    /// A setting's edit state was re-evaluated.
    EditConditionChanged {
        /// Setting
        setting: SettingId,
    },
    /// An action setting broadcast a named action.
    NamedAction {
        /// Action setting
        setting: SettingId,
        /// Action tag
        action: String,
    },
    /// A page asked to be opened.
    Navigation {
        /// Page setting
        setting: SettingId,
    },
}

impl RegistryEvent {
    /// Setting the event is about.
    #[must_use]
    pub const fn setting(&self) -> SettingId {
        match self {
            Self::SettingChanged { setting, .. }
            | Self::SettingApplied { setting }
            | Self::EditConditionChanged { setting }
            | Self::NamedAction { setting, .. }
            | Self::Navigation { setting } => *setting,
        }
    }
}

/// Builds the settings tree of a registry. Re-run on regeneration.
pub trait RegistryBuilder: Send + Sync {
    /// Create and register every top-level setting.
    fn build(&self, registry: &mut SettingRegistry) -> SettingsResult<()>;

    /// Called after a registered setting is applied.
    fn on_setting_applied(&self, _registry: &SettingRegistry, _setting: SettingId) {}

    /// Persist applied settings.
    fn save_changes(&self, _registry: &SettingRegistry) {}
}

/// Owns the settings tree of one local player.
pub struct SettingRegistry {
    id: RegistryId,
    player: Arc<LocalPlayer>,
    settings: SettingArena,
    top_level: Vec<SettingId>,
    registered: Vec<SettingId>,
    by_dev_name: AHashMap<String, SettingId>,
    listeners: Vec<Sender<RegistryEvent>>,
    refresh_tx: Sender<SettingId>,
    refresh_rx: Receiver<SettingId>,
    ready_tx: Sender<SettingId>,
    ready_rx: Receiver<SettingId>,
    // Dropped on regenerate so property watchers of old settings die.
    alive: Arc<()>,
    builder: Option<Arc<dyn RegistryBuilder>>,
}

impl fmt::Debug for SettingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingRegistry")
            .field("id", &self.id)
            .field("player", &self.player.name())
            .field("top_level", &self.top_level)
            .field("registered", &self.registered.len())
            .field("listeners", &self.listeners.len())
            .field("has_builder", &self.builder.is_some())
            .finish_non_exhaustive()
    }
}

impl SettingRegistry {
    /// Create an empty registry for a player.
    #[must_use]
    pub fn new(player: Arc<LocalPlayer>) -> Self {
        let (refresh_tx, refresh_rx) = unbounded();
        let (ready_tx, ready_rx) = unbounded();
        Self {
            id: RegistryId::new(),
            player,
            settings: SettingArena::new(),
            top_level: Vec::new(),
            registered: Vec::new(),
            by_dev_name: AHashMap::new(),
            listeners: Vec::new(),
            refresh_tx,
            refresh_rx,
            ready_tx,
            ready_rx,
            alive: Arc::new(()),
            builder: None,
        }
    }

    /// Create a registry and build its tree.
    pub fn with_builder(player: Arc<LocalPlayer>, builder: Arc<dyn RegistryBuilder>) -> SettingsResult<Self> {
        let mut registry = Self::new(player);
        registry.builder = Some(Arc::clone(&builder));
        builder.build(&mut registry)?;
        registry.pump();
        debug!(
            registry = registry.id.raw(),
            settings = registry.registered.len(),
            "Settings registry built"
        );
        Ok(registry)
    }

    /// Registry identifier.
    #[must_use]
    pub const fn id(&self) -> RegistryId {
        self.id
    }

    /// Owning player.
    #[must_use]
    pub fn player(&self) -> &Arc<LocalPlayer> {
        &self.player
    }

    /// Every setting of this registry.
    #[must_use]
    pub fn settings(&self) -> &SettingArena {
        &self.settings
    }

    /// Look up a setting.
    #[must_use]
    pub fn setting(&self, id: SettingId) -> Option<&Setting> {
        self.settings.get(id)
    }

    /// Top-level settings in registration order.
    #[must_use]
    pub fn top_level_settings(&self) -> &[SettingId] {
        &self.top_level
    }

    /// Every registered setting, parents before children.
    #[must_use]
    pub fn registered_settings(&self) -> &[SettingId] {
        &self.registered
    }

    /// Cached edit state of a setting.
    #[must_use]
    pub fn edit_state(&self, id: SettingId) -> Option<&EditableState> {
        self.settings.get(id).map(Setting::edit_state)
    }

    /// Find a registered setting by dev name.
    #[must_use]
    pub fn find_setting_by_dev_name(&self, dev_name: &str) -> Option<SettingId> {
        self.by_dev_name.get(dev_name).copied()
    }

    /// Receive every event relayed by this registry from now on.
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        let (tx, rx) = unbounded();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: RegistryEvent) {
        self.listeners.retain(|listener| listener.send(event.clone()).is_ok());
    }

    pub(crate) fn setting_ref(&self, id: SettingId) -> SettingsResult<&Setting> {
        self.settings.get(id).ok_or(SettingsError::StaleSetting(id))
    }

    fn dev_name_of(&self, id: SettingId) -> String {
        self.settings
            .get(id)
            .map_or_else(|| id.to_string(), |setting| setting.dev_name.clone())
    }

    // ========================================================================
    // Tree
    // ========================================================================

    /// Store a detached setting and return its handle.
    pub fn create(&mut self, setting: Setting) -> SettingId {
        self.settings.insert(setting)
    }

    /// Add `child` to a collection or page.
    ///
    /// If the parent is already initialized the child is initialized right
    /// away. If the parent is registered the child's subtree is registered too.
    pub fn add_setting(&mut self, parent: SettingId, child: SettingId) -> SettingsResult<()> {
        let parent_setting = self.setting_ref(parent)?;
        let child_setting = self.setting_ref(child)?;

        if !parent_setting.is_collection() {
            return Err(SettingsError::NotACollection(parent_setting.dev_name.clone()));
        }
        if parent_setting.children.contains(&child) {
            return Err(SettingsError::AlreadyMember {
                collection: parent_setting.dev_name.clone(),
                child: child_setting.dev_name.clone(),
            });
        }
        if child_setting.parent.is_some() {
            return Err(SettingsError::AlreadyParented {
                child: child_setting.dev_name.clone(),
            });
        }
        if self.top_level.contains(&child) {
            return Err(SettingsError::AlreadyRegistered(child_setting.dev_name.clone()));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(SettingsError::Cycle {
                parent: parent_setting.dev_name.clone(),
                child: child_setting.dev_name.clone(),
            });
        }

        let parent_registered = parent_setting.registered;
        let parent_initialized = parent_setting.initialized;

        if parent_registered {
            self.validate_registration(child)?;
        }

        if let Some(setting) = self.settings.get_mut(child) {
            setting.parent = Some(parent);
        }
        if let Some(setting) = self.settings.get_mut(parent) {
            setting.children.push(child);
        }

        if parent_registered {
            self.mark_registered(child);
        }
        if parent_initialized {
            self.initialize_setting(child);
        }

        self.pump();
        Ok(())
    }

    fn is_ancestor(&self, ancestor: SettingId, of: SettingId) -> bool {
        let mut next = self.settings.get(of).and_then(Setting::parent);
        while let Some(id) = next {
            if id == ancestor {
                return true;
            }
            next = self.settings.get(id).and_then(Setting::parent);
        }
        false
    }

    /// Register a top-level setting and its whole subtree.
    ///
    /// Dev names must be unique within the registry and a setting can only
    /// be registered once. The setting is initialized if it was not already.
    pub fn register_setting(&mut self, id: SettingId) -> SettingsResult<()> {
        let setting = self.setting_ref(id)?;
        if setting.parent.is_some() {
            return Err(SettingsError::AlreadyParented {
                child: setting.dev_name.clone(),
            });
        }
        let initialized = setting.initialized;

        self.validate_registration(id)?;
        self.top_level.push(id);
        self.mark_registered(id);

        if !initialized {
            self.initialize_setting(id);
        }

        self.pump();
        debug!(setting = %self.dev_name_of(id), registered = self.registered.len(), "Registered setting");
        Ok(())
    }

    fn validate_registration(&self, root: SettingId) -> SettingsResult<()> {
        let mut seen = AHashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let setting = self.setting_ref(id)?;
            if setting.registered {
                return Err(SettingsError::AlreadyRegistered(setting.dev_name.clone()));
            }
            if !setting.dev_name.is_empty()
                && (self.by_dev_name.contains_key(&setting.dev_name) || !seen.insert(setting.dev_name.as_str()))
            {
                return Err(SettingsError::DuplicateDevName(setting.dev_name.clone()));
            }
            stack.extend(setting.children.iter().rev());
        }
        Ok(())
    }

    fn mark_registered(&mut self, id: SettingId) {
        let Some(setting) = self.settings.get_mut(id) else {
            return;
        };
        setting.registered = true;
        if !setting.dev_name.is_empty() {
            self.by_dev_name.insert(setting.dev_name.clone(), id);
        }
        let children = setting.children.clone();

        self.registered.push(id);
        for child in children {
            self.mark_registered(child);
        }
    }

    /// Add an edit condition. It is evaluated on the next refresh.
    pub fn add_edit_condition(&mut self, id: SettingId, condition: EditCondition) -> SettingsResult<()> {
        let trigger = ConditionTrigger::new(id, self.refresh_tx.clone()).with_owner(&self.alive);
        let setting = self.settings.get_mut(id).ok_or(SettingsError::StaleSetting(id))?;
        if setting.initialized {
            condition.initialize(&self.player, &trigger);
        }
        setting.edit_conditions.push(condition);
        Ok(())
    }

    /// Re-evaluate `id` whenever `dependency` changes value or edit state.
    pub fn add_edit_dependency(&mut self, id: SettingId, dependency: SettingId) -> SettingsResult<()> {
        self.setting_ref(id)?;
        let source = self.setting_ref(dependency)?;
        if id == dependency {
            return Err(SettingsError::Cycle {
                parent: source.dev_name.clone(),
                child: source.dev_name.clone(),
            });
        }

        if let Some(source) = self.settings.get_mut(dependency) {
            if !source.dependents.contains(&id) {
                source.dependents.push(id);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bind a setting (and its children) to the registry's player and start it up.
    pub fn initialize(&mut self, id: SettingId) -> SettingsResult<()> {
        self.setting_ref(id)?;
        self.initialize_setting(id);
        self.pump();
        Ok(())
    }

    fn initialize_setting(&mut self, id: SettingId) {
        let trigger = ConditionTrigger::new(id, self.refresh_tx.clone()).with_owner(&self.alive);
        let Some(setting) = self.settings.get_mut(id) else {
            return;
        };
        if setting.initialized {
            return;
        }
        setting.initialized = true;

        for condition in &setting.edit_conditions {
            condition.initialize(&self.player, &trigger);
        }
        let children = setting.children.clone();

        for child in children {
            self.initialize_setting(child);
        }

        self.startup(id);
        self.process_ready();
    }

    fn startup(&mut self, id: SettingId) {
        let signal = ReadySignal::new(id, self.ready_tx.clone());
        let getter = match self.settings.get(id).map(Setting::kind) {
            Some(SettingKind::Value(ValueSetting::Discrete(value))) => value.getter().cloned(),
            Some(SettingKind::Value(ValueSetting::Scalar(value))) => value.getter().cloned(),
            Some(_) => None,
            None => return,
        };

        match getter {
            Some(getter) => getter.startup(&self.player, signal),
            None => signal.complete(),
        }
    }

    fn process_ready(&mut self) -> usize {
        let mut count = 0;
        while let Ok(id) = self.ready_rx.try_recv() {
            self.startup_complete(id);
            count += 1;
        }
        count
    }

    fn startup_complete(&mut self, id: SettingId) {
        let Some(setting) = self.settings.get_mut(id) else {
            return;
        };
        if setting.ready {
            warn!(setting = %setting.dev_name, "Startup completed twice");
            return;
        }
        setting.ready = true;

        if let Some(setting) = self.settings.get(id) {
            setting.lint(&self.player);
        }
        self.refresh(id, false);
        if let Some(setting) = self.settings.get_mut(id) {
            setting.store_initial(&self.player);
        }
    }

    /// Handle queued readiness signals and edit condition refresh requests.
    ///
    /// Returns the number of signals handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = self.process_ready();
        while let Ok(id) = self.refresh_rx.try_recv() {
            self.refresh(id, true);
            handled += 1 + self.process_ready();
        }
        handled
    }

    /// Have all registered settings finished startup?
    pub fn is_finished_initializing(&mut self) -> bool {
        self.pump();
        self.registered
            .iter()
            .all(|&id| self.settings.get(id).is_some_and(Setting::is_ready))
    }

    /// Destroy every setting and rebuild the tree from the builder.
    ///
    /// Every handle issued before becomes stale. Listeners stay subscribed.
    pub fn regenerate(&mut self) -> SettingsResult<()> {
        let builder = self.builder.clone().ok_or(SettingsError::NoBuilder)?;
        debug!(registry = self.id.raw(), destroyed = self.settings.len(), "Regenerating settings");

        self.settings.clear();
        self.top_level.clear();
        self.registered.clear();
        self.by_dev_name.clear();

        // Drop the old channels so watchers held by destroyed settings die.
        let (refresh_tx, refresh_rx) = unbounded();
        let (ready_tx, ready_rx) = unbounded();
        self.refresh_tx = refresh_tx;
        self.refresh_rx = refresh_rx;
        self.ready_tx = ready_tx;
        self.ready_rx = ready_rx;
        self.alive = Arc::new(());
        self.player.prune_watchers();

        builder.build(self)?;
        self.pump();
        Ok(())
    }

    // ========================================================================
    // Edit state and change notification
    // ========================================================================

    /// Recompute the edit state from scratch.
    ///
    /// Broadcasts an edit condition change when the state differs or `notify` is set.
    pub fn refresh_editable_state(&mut self, id: SettingId, notify: bool) -> SettingsResult<()> {
        self.setting_ref(id)?;
        self.refresh(id, notify);
        self.pump();
        Ok(())
    }

    fn refresh(&mut self, id: SettingId, notify: bool) {
        let Some(setting) = self.settings.get(id) else {
            return;
        };

        let ctx = EditConditionContext::new(&self.player, &self.settings, id);
        let mut state = EditableState::new();
        for condition in &setting.edit_conditions {
            condition.gather_edit_state(&ctx, &mut state);
        }
        setting.gather_kind_state(&self.player, &mut state);

        let Some(setting) = self.settings.get_mut(id) else {
            return;
        };
        let changed = setting.edit_state != state;
        setting.edit_state = state;
        setting.edit_state_revision += 1;

        if changed || notify {
            self.broadcast_edit_conditions_changed(id);
        }
    }

    /// Broadcast a change of `id` to dependents and listeners.
    pub fn notify_setting_changed(&mut self, id: SettingId, reason: ChangeReason) -> SettingsResult<()> {
        self.setting_ref(id)?;
        self.broadcast_setting_changed(id, reason);
        self.pump();
        Ok(())
    }

    fn broadcast_setting_changed(&mut self, id: SettingId, reason: ChangeReason) {
        let Some(setting) = self.settings.get_mut(id) else {
            return;
        };

        for condition in &setting.edit_conditions {
            condition.setting_changed(&self.player, id, reason);
        }

        if setting.broadcasting_change {
            trace!(setting = %setting.dev_name, ?reason, "Dropping re-entrant change notification");
            return;
        }
        setting.broadcasting_change = true;
        let registered = setting.registered;
        let dependents = setting.dependents.clone();

        if registered {
            self.emit(RegistryEvent::SettingChanged { setting: id, reason });
        }
        for dependent in dependents {
            self.handle_edit_dependency_changed(dependent, Some(reason));
        }

        if let Some(setting) = self.settings.get_mut(id) {
            setting.broadcasting_change = false;
        }
    }

    fn broadcast_edit_conditions_changed(&mut self, id: SettingId) {
        let Some(setting) = self.settings.get_mut(id) else {
            return;
        };
        if setting.broadcasting_edit_condition {
            trace!(setting = %setting.dev_name, "Dropping re-entrant edit condition notification");
            return;
        }
        setting.broadcasting_edit_condition = true;
        let registered = setting.registered;
        let dependents = setting.dependents.clone();

        if registered {
            self.emit(RegistryEvent::EditConditionChanged { setting: id });
        }
        for dependent in dependents {
            self.handle_edit_dependency_changed(dependent, None);
        }

        if let Some(setting) = self.settings.get_mut(id) {
            setting.broadcasting_edit_condition = false;
        }
    }

    /// `reason` is set for value changes and `None` for edit state changes.
    fn handle_edit_dependency_changed(&mut self, id: SettingId, reason: Option<ChangeReason>) {
        let Some(setting) = self.settings.get(id) else {
            return;
        };

        // Chains stop at settings already broadcasting.
        if setting.relay_dependency_changes && reason.is_some() {
            self.broadcast_setting_changed(id, ChangeReason::DependencyChanged);
        }

        self.refresh(id, true);
    }

    // ========================================================================
    // Queries and actions
    // ========================================================================

    /// Flat list of settings to display for a filter.
    #[must_use]
    pub fn get_settings_for_filter(&self, filter: &FilterState) -> Vec<SettingId> {
        filter::settings_for_filter(&self.settings, filter, &self.top_level)
    }

    /// Apply a setting: inform its conditions, relay the event and call the builder hook.
    pub fn apply(&mut self, id: SettingId) -> SettingsResult<()> {
        let setting = self.settings.get(id).ok_or(SettingsError::StaleSetting(id))?;
        for condition in &setting.edit_conditions {
            condition.setting_applied(&self.player, id);
        }

        if setting.registered {
            self.emit(RegistryEvent::SettingApplied { setting: id });
            if let Some(builder) = self.builder.clone() {
                builder.on_setting_applied(self, id);
            }
        }

        self.pump();
        Ok(())
    }

    /// Ask the builder to persist applied settings.
    pub fn save_changes(&self) {
        if let Some(builder) = &self.builder {
            builder.save_changes(self);
        }
    }

    /// Run an action setting.
    ///
    /// The custom callback wins over the named action. Dirty actions then
    /// report a change.
    pub fn execute_action(&mut self, id: SettingId) -> SettingsResult<()> {
        let setting = self.setting_ref(id)?;
        let SettingKind::Action(action) = setting.kind() else {
            return Err(SettingsError::WrongKind {
                setting: setting.dev_name.clone(),
                expected: "action",
            });
        };

        let custom = action.custom_action().cloned();
        let named = action.named_action().map(str::to_string);
        let dirty = action.is_dirty_action();
        let registered = setting.registered;

        if let Some(custom) = custom {
            custom(self.player.as_ref());
        } else if let Some(action) = named {
            if registered {
                self.emit(RegistryEvent::NamedAction { setting: id, action });
            }
        } else {
            warn!(setting = %self.dev_name_of(id), "Action has nothing to execute");
        }

        if dirty {
            self.broadcast_setting_changed(id, ChangeReason::Change);
        }

        self.pump();
        Ok(())
    }

    /// Ask the UI to open a page.
    pub fn execute_navigation(&mut self, id: SettingId) -> SettingsResult<()> {
        let setting = self.setting_ref(id)?;
        if !setting.is_page() {
            return Err(SettingsError::WrongKind {
                setting: setting.dev_name.clone(),
                expected: "page",
            });
        }
        if setting.registered {
            self.emit(RegistryEvent::Navigation { setting: id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{GatedSource, PropertySource};
    use crate::discrete::DiscreteValue;
    use crate::scalar::ScalarValue;
    use crate::setting::ActionSetting;
    use parking_lot::Mutex;

    fn player() -> Arc<LocalPlayer> {
        Arc::new(
            LocalPlayer::new("P1")
                .with_property("subtitles", "true")
                .with_property("volume", "80")
                .with_property("quality", "high"),
        )
    }

    fn bool_setting(name: &str, property: &str) -> Setting {
        Setting::discrete(name, DiscreteValue::boolean().with_source(PropertySource::shared(property)))
            .with_display_name(name)
            .with_description(format!("{name} description"))
    }

    fn drain(rx: &Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_register_and_find() {
        let mut registry = SettingRegistry::new(player());
        let audio = registry.create(Setting::collection("Audio"));
        let subtitles = registry.create(bool_setting("Subtitles", "subtitles"));
        registry.add_setting(audio, subtitles).unwrap();
        registry.register_setting(audio).unwrap();

        assert_eq!(registry.top_level_settings(), [audio]);
        assert_eq!(registry.registered_settings(), [audio, subtitles]);
        assert_eq!(registry.find_setting_by_dev_name("Subtitles"), Some(subtitles));
        assert_eq!(registry.find_setting_by_dev_name("Missing"), None);
        assert!(registry.setting(subtitles).unwrap().is_registered());
        assert!(registry.is_finished_initializing());
    }

    #[test]
    fn test_tree_integrity_errors() {
        let mut registry = SettingRegistry::new(player());
        let audio = registry.create(Setting::collection("Audio"));
        let video = registry.create(Setting::collection("Video"));
        let subtitles = registry.create(bool_setting("Subtitles", "subtitles"));

        registry.add_setting(audio, subtitles).unwrap();
        assert!(matches!(
            registry.add_setting(audio, subtitles),
            Err(SettingsError::AlreadyMember { .. })
        ));
        assert!(matches!(
            registry.add_setting(video, subtitles),
            Err(SettingsError::AlreadyParented { .. })
        ));
        assert!(matches!(
            registry.add_setting(subtitles, video),
            Err(SettingsError::NotACollection(_))
        ));

        registry.add_setting(video, audio).unwrap();
        assert!(matches!(registry.add_setting(audio, video), Err(SettingsError::Cycle { .. })));
        assert_eq!(registry.setting(subtitles).unwrap().parent(), Some(audio));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = SettingRegistry::new(player());
        let audio = registry.create(Setting::collection("Audio"));
        registry.register_setting(audio).unwrap();
        assert!(matches!(
            registry.register_setting(audio),
            Err(SettingsError::AlreadyRegistered(_))
        ));

        let other = registry.create(Setting::collection("Audio"));
        assert!(matches!(
            registry.register_setting(other),
            Err(SettingsError::DuplicateDevName(name)) if name == "Audio"
        ));
        assert_eq!(registry.top_level_settings(), [audio]);
    }

    #[test]
    fn test_duplicate_dev_name_in_subtree() {
        let mut registry = SettingRegistry::new(player());
        let audio = registry.create(Setting::collection("Audio"));
        let a = registry.create(bool_setting("Subtitles", "subtitles"));
        let b = registry.create(bool_setting("Subtitles", "subtitles"));
        registry.add_setting(audio, a).unwrap();
        registry.add_setting(audio, b).unwrap();

        assert!(matches!(
            registry.register_setting(audio),
            Err(SettingsError::DuplicateDevName(_))
        ));
        assert!(registry.registered_settings().is_empty());
    }

    #[test]
    fn test_adding_to_registered_collection_registers_child() {
        let mut registry = SettingRegistry::new(player());
        let audio = registry.create(Setting::collection("Audio"));
        registry.register_setting(audio).unwrap();

        let subtitles = registry.create(bool_setting("Subtitles", "subtitles"));
        registry.add_setting(audio, subtitles).unwrap();

        let setting = registry.setting(subtitles).unwrap();
        assert!(setting.is_registered());
        assert!(setting.is_initialized());
        assert!(setting.is_ready());
        assert_eq!(registry.find_setting_by_dev_name("Subtitles"), Some(subtitles));
    }

    #[test]
    fn test_events_are_relayed() {
        let mut registry = SettingRegistry::new(player());
        let rx = registry.subscribe();
        let audio = registry.create(Setting::collection("Audio"));
        let subtitles = registry.create(bool_setting("Subtitles", "subtitles"));
        registry.add_setting(audio, subtitles).unwrap();
        registry.register_setting(audio).unwrap();
        drain(&rx);

        registry.notify_setting_changed(subtitles, ChangeReason::Change).unwrap();
        registry.apply(subtitles).unwrap();

        let events = drain(&rx);
        assert_eq!(
            events,
            [
                RegistryEvent::SettingChanged {
                    setting: subtitles,
                    reason: ChangeReason::Change
                },
                RegistryEvent::SettingApplied { setting: subtitles },
            ]
        );
    }

    #[test]
    fn test_unregistered_settings_do_not_relay() {
        let mut registry = SettingRegistry::new(player());
        let rx = registry.subscribe();
        let subtitles = registry.create(bool_setting("Subtitles", "subtitles"));

        registry.notify_setting_changed(subtitles, ChangeReason::Change).unwrap();
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_dependency_triggers_refresh() {
        let mut registry = SettingRegistry::new(player());
        let audio = registry.create(Setting::collection("Audio"));
        let a = registry.create(bool_setting("A", "subtitles"));
        let b = registry.create(bool_setting("B", "quality"));
        registry.add_setting(audio, a).unwrap();
        registry.add_setting(audio, b).unwrap();
        registry.add_edit_dependency(b, a).unwrap();
        registry.register_setting(audio).unwrap();

        let before = registry.setting(b).unwrap().edit_state_revision();
        let b_value = registry.value_as_string(b);
        registry.set_value_from_string(a, "false").unwrap();

        assert!(registry.setting(b).unwrap().edit_state_revision() > before);
        assert_eq!(registry.value_as_string(b), b_value);
    }

    #[test]
    fn test_dependency_drives_edit_state() {
        let mut registry = SettingRegistry::new(player());
        let audio = registry.create(Setting::collection("Audio"));
        let subtitles = registry.create(bool_setting("Subtitles", "subtitles"));
        let size = registry.create(bool_setting("LargeText", "quality"));
        registry.add_setting(audio, subtitles).unwrap();
        registry.add_setting(audio, size).unwrap();
        registry
            .add_edit_condition(
                size,
                EditCondition::when("SubtitlesOn", move |ctx, state| {
                    if ctx.value_as_string(subtitles).as_deref() != Some("true") {
                        state.disable("Subtitles are off");
                    }
                }),
            )
            .unwrap();
        registry.add_edit_dependency(size, subtitles).unwrap();
        registry.register_setting(audio).unwrap();

        assert!(registry.edit_state(size).unwrap().is_enabled());
        registry.set_value_from_string(subtitles, "false").unwrap();
        assert!(!registry.edit_state(size).unwrap().is_enabled());
        registry.set_value_from_string(subtitles, "true").unwrap();
        assert!(registry.edit_state(size).unwrap().is_enabled());
    }

    #[test]
    fn test_mutual_dependencies_terminate() {
        let mut registry = SettingRegistry::new(player());
        let video = registry.create(Setting::collection("Video"));
        let a = registry.create(bool_setting("A", "subtitles").with_relay_dependency_changes(true));
        let b = registry.create(bool_setting("B", "quality").with_relay_dependency_changes(true));
        registry.add_setting(video, a).unwrap();
        registry.add_setting(video, b).unwrap();
        registry.add_edit_dependency(a, b).unwrap();
        registry.add_edit_dependency(b, a).unwrap();
        registry.register_setting(video).unwrap();
        let rx = registry.subscribe();

        registry.set_value_from_string(a, "false").unwrap();

        let changes: Vec<_> = drain(&rx)
            .into_iter()
            .filter_map(|event| match event {
                RegistryEvent::SettingChanged { setting, reason } => Some((setting, reason)),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            [(a, ChangeReason::Change), (b, ChangeReason::DependencyChanged)]
        );
    }

    #[test]
    fn test_relay_reaches_whole_chain() {
        let mut registry = SettingRegistry::new(player());
        let video = registry.create(Setting::collection("Video"));
        let a = registry.create(bool_setting("A", "subtitles").with_relay_dependency_changes(true));
        let b = registry.create(bool_setting("B", "quality").with_relay_dependency_changes(true));
        let c = registry.create(bool_setting("C", "quality").with_relay_dependency_changes(true));
        for id in [a, b, c] {
            registry.add_setting(video, id).unwrap();
        }
        registry.add_edit_dependency(b, a).unwrap();
        registry.add_edit_dependency(c, b).unwrap();
        registry.register_setting(video).unwrap();
        let rx = registry.subscribe();

        registry.set_value_from_string(a, "false").unwrap();

        let changes: Vec<_> = drain(&rx)
            .into_iter()
            .filter_map(|event| match event {
                RegistryEvent::SettingChanged { setting, reason } => Some((setting, reason)),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            [
                (a, ChangeReason::Change),
                (b, ChangeReason::DependencyChanged),
                (c, ChangeReason::DependencyChanged),
            ]
        );
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut registry = SettingRegistry::new(player());
        let a = registry.create(bool_setting("A", "subtitles"));
        assert!(matches!(registry.add_edit_dependency(a, a), Err(SettingsError::Cycle { .. })));
    }

    #[test]
    fn test_condition_watching_property_refreshes() {
        let player = player();
        player.define_property(crate::edit_condition::LATENCY_STATS_PROPERTY, "false");
        let mut registry = SettingRegistry::new(Arc::clone(&player));
        let stats = registry.create(Setting::collection("Stats"));
        let marker = registry.create(
            bool_setting("Marker", "quality").with_edit_condition(EditCondition::LatencyStatsEnabled),
        );
        registry.add_setting(stats, marker).unwrap();
        registry.register_setting(stats).unwrap();
        assert!(!registry.edit_state(marker).unwrap().is_enabled());

        player.set_property(crate::edit_condition::LATENCY_STATS_PROPERTY, "true");
        assert!(!registry.edit_state(marker).unwrap().is_enabled());
        registry.pump();
        assert!(registry.edit_state(marker).unwrap().is_enabled());
    }

    #[test]
    fn test_deferred_startup() {
        let mut registry = SettingRegistry::new(player());
        let gate = Arc::new(GatedSource::new(PropertySource::shared("volume")));
        let audio = registry.create(Setting::collection("Audio"));
        let volume = registry.create(Setting::scalar(
            "Volume",
            ScalarValue::new(0.0, 100.0, 5.0).with_source(gate.clone()),
        ));
        registry.add_setting(audio, volume).unwrap();
        registry.register_setting(audio).unwrap();

        assert!(!registry.is_finished_initializing());
        assert!(!registry.setting(volume).unwrap().is_ready());

        gate.open();
        assert!(registry.is_finished_initializing());
        assert_eq!(registry.setting(volume).unwrap().as_scalar().unwrap().initial_value(), 80.0);
    }

    #[test]
    fn test_unresolved_source_kills_setting() {
        let mut registry = SettingRegistry::new(player());
        let audio = registry.create(Setting::collection("Audio"));
        let broken = registry.create(bool_setting("Broken", "does_not_exist"));
        registry.add_setting(audio, broken).unwrap();
        registry.register_setting(audio).unwrap();

        let state = registry.edit_state(broken).unwrap();
        assert!(!state.is_visible());
        assert!(state.is_hidden_from_analytics());
    }

    #[test]
    fn test_actions() {
        let mut registry = SettingRegistry::new(player());
        let rx = registry.subscribe();
        let ran = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&ran);

        let root = registry.create(Setting::collection("Gameplay"));
        let custom = registry.create(Setting::action(
            "ResetTutorials",
            ActionSetting::new("Reset")
                .with_custom_action(move |_| *counter.lock() += 1)
                .with_dirty_action(true),
        ));
        let named = registry.create(Setting::action(
            "SafeZone",
            ActionSetting::new("Edit").with_named_action("GameSettings.Action.EditSafeZone"),
        ));
        registry.add_setting(root, custom).unwrap();
        registry.add_setting(root, named).unwrap();
        registry.register_setting(root).unwrap();
        drain(&rx);

        registry.execute_action(custom).unwrap();
        registry.execute_action(named).unwrap();

        assert_eq!(*ran.lock(), 1);
        assert_eq!(
            drain(&rx),
            [
                RegistryEvent::SettingChanged {
                    setting: custom,
                    reason: ChangeReason::Change
                },
                RegistryEvent::NamedAction {
                    setting: named,
                    action: "GameSettings.Action.EditSafeZone".to_string()
                },
            ]
        );
        assert!(matches!(registry.execute_action(root), Err(SettingsError::WrongKind { .. })));
    }

    #[test]
    fn test_navigation() {
        let mut registry = SettingRegistry::new(player());
        let rx = registry.subscribe();
        let root = registry.create(Setting::collection("Audio"));
        let page = registry.create(Setting::page("SubtitlePage", "Options").with_description("Subtitles"));
        registry.add_setting(root, page).unwrap();
        registry.register_setting(root).unwrap();
        drain(&rx);

        registry.execute_navigation(page).unwrap();
        assert_eq!(drain(&rx), [RegistryEvent::Navigation { setting: page }]);
        assert!(registry.execute_navigation(root).is_err());
    }

    struct CountingBuilder {
        builds: Mutex<u32>,
        applied: Mutex<Vec<String>>,
    }

    impl RegistryBuilder for CountingBuilder {
        fn build(&self, registry: &mut SettingRegistry) -> SettingsResult<()> {
            *self.builds.lock() += 1;
            let audio = registry.create(Setting::collection("Audio"));
            let subtitles = registry.create(bool_setting("Subtitles", "subtitles"));
            registry.add_setting(audio, subtitles)?;
            registry.register_setting(audio)
        }

        fn on_setting_applied(&self, registry: &SettingRegistry, setting: SettingId) {
            if let Some(setting) = registry.setting(setting) {
                self.applied.lock().push(setting.dev_name().to_string());
            }
        }
    }

    #[test]
    fn test_regenerate_invalidates_handles() {
        let builder = Arc::new(CountingBuilder {
            builds: Mutex::new(0),
            applied: Mutex::new(Vec::new()),
        });
        let mut registry = SettingRegistry::with_builder(player(), builder.clone()).unwrap();
        let old = registry.find_setting_by_dev_name("Subtitles").unwrap();

        registry.apply(old).unwrap();
        registry.regenerate().unwrap();

        assert_eq!(*builder.builds.lock(), 2);
        assert_eq!(*builder.applied.lock(), ["Subtitles"]);
        assert!(registry.setting(old).is_none());
        assert!(matches!(registry.apply(old), Err(SettingsError::StaleSetting(_))));

        let new = registry.find_setting_by_dev_name("Subtitles").unwrap();
        assert_ne!(new, old);
        assert_eq!(registry.registered_settings().len(), 2);
    }

    #[test]
    fn test_regenerate_without_builder() {
        let mut registry = SettingRegistry::new(player());
        assert!(matches!(registry.regenerate(), Err(SettingsError::NoBuilder)));
    }

    #[test]
    fn test_tree_integrity_after_build() {
        let mut registry = SettingRegistry::new(player());
        let video = registry.create(Setting::collection("Video"));
        let display = registry.create(Setting::collection("Display"));
        let page = registry.create(Setting::page("Advanced", "Edit"));
        let vsync = registry.create(bool_setting("VSync", "quality"));
        registry.add_setting(video, display).unwrap();
        registry.add_setting(display, page).unwrap();
        registry.add_setting(page, vsync).unwrap();
        registry.register_setting(video).unwrap();

        for &id in registry.registered_settings() {
            let setting = registry.setting(id).unwrap();
            match setting.parent() {
                Some(parent) => {
                    let siblings = registry.setting(parent).unwrap().children();
                    assert_eq!(siblings.iter().filter(|&&c| c == id).count(), 1);
                },
                None => assert!(registry.top_level_settings().contains(&id)),
            }
        }
    }
}
