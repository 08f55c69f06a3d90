//! Change tracking for the settings screen.
//!
//! The tracker subscribes to a registry and records which settings changed
//! since the last apply or restore, so the UI can show "apply / discard"
//! prompts and roll back unsaved edits.

use ahash::AHashSet;
use crossbeam_channel::Receiver;
use tracing::{debug, trace, warn};

use crate::editable_state::ChangeReason;
use crate::error::{SettingsError, SettingsResult};
use crate::ids::{RegistryId, SettingId};
use crate::registry::{RegistryEvent, SettingRegistry};

/// Records dirty settings of one watched registry.
#[derive(Debug, Default)]
pub struct RegistryChangeTracker {
    watched: Option<(RegistryId, Receiver<RegistryEvent>)>,
    dirty: Vec<SettingId>,
    dirty_set: AHashSet<SettingId>,
    settings_changed: bool,
    restoring: bool,
}

impl RegistryChangeTracker {
    /// Create a tracker that watches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching `registry`. Previous dirty state and subscription are dropped.
    pub fn watch_registry(&mut self, registry: &mut SettingRegistry) {
        self.clear_dirty_state();
        self.stop_watching();
        self.watched = Some((registry.id(), registry.subscribe()));
        debug!(registry = registry.id().raw(), "Change tracker watching registry");
    }

    /// Stop watching. The registry prunes the dead listener on its next event.
    pub fn stop_watching(&mut self) {
        if let Some((id, _)) = self.watched.take() {
            trace!(registry = id.raw(), "Change tracker stopped watching");
        }
    }

    /// Is a registry being watched?
    #[must_use]
    pub const fn is_watching(&self) -> bool {
        self.watched.is_some()
    }

    /// Forget every dirty setting.
    pub fn clear_dirty_state(&mut self) {
        // Queued notifications predate the clear.
        self.drain();
        if self.restoring {
            warn!("Dirty state cleared while restoring settings");
            return;
        }
        self.settings_changed = false;
        self.dirty.clear();
        self.dirty_set.clear();
    }

    /// Has any watched setting changed since the last clear?
    pub fn have_settings_been_changed(&mut self) -> bool {
        self.drain();
        self.settings_changed
    }

    /// Settings changed since the last clear, in first-change order.
    pub fn dirty_settings(&mut self) -> &[SettingId] {
        self.drain();
        &self.dirty
    }

    fn drain(&mut self) {
        let Some((_, rx)) = &self.watched else {
            return;
        };
        let events: Vec<RegistryEvent> = rx.try_iter().collect();
        for event in events {
            if let RegistryEvent::SettingChanged { setting, reason } = event {
                self.handle_setting_changed(setting, reason);
            }
        }
    }

    fn handle_setting_changed(&mut self, setting: SettingId, reason: ChangeReason) {
        if self.restoring {
            return;
        }
        if self.dirty_set.insert(setting) {
            self.dirty.push(setting);
            trace!(%setting, ?reason, "Setting marked dirty");
        }
        self.settings_changed = true;
    }

    fn check_registry(&self, registry: &SettingRegistry) -> SettingsResult<()> {
        match &self.watched {
            Some((id, _)) if *id == registry.id() => Ok(()),
            _ => Err(SettingsError::RegistryMismatch),
        }
    }

    /// Apply every dirty setting, store its value as the new baseline and clear.
    ///
    /// Settings destroyed since they were marked dirty are skipped.
    pub fn apply_changes(&mut self, registry: &mut SettingRegistry) -> SettingsResult<()> {
        self.check_registry(registry)?;
        self.drain();

        let dirty = self.dirty.clone();
        let mut applied = 0;
        for setting in dirty {
            let is_value = registry.setting(setting).is_some_and(|s| s.is_value());
            if !is_value {
                continue;
            }
            registry.apply(setting)?;
            registry.store_initial(setting)?;
            applied += 1;
        }

        debug!(applied, "Applied setting changes");
        self.clear_dirty_state();
        Ok(())
    }

    /// Write the initial value back into every dirty setting and clear.
    ///
    /// The changes this causes are not recorded.
    pub fn restore_to_initial(&mut self, registry: &mut SettingRegistry) -> SettingsResult<()> {
        self.check_registry(registry)?;
        self.drain();

        self.restoring = true;
        let dirty = self.dirty.clone();
        let mut restored = 0;
        let mut result = Ok(());
        for setting in dirty {
            if !registry.setting(setting).is_some_and(|s| s.is_value()) {
                continue;
            }
            if let Err(err) = registry.restore_to_initial(setting) {
                result = Err(err);
                break;
            }
            restored += 1;
        }
        // Swallow the notifications caused by the restore itself.
        self.drain();
        self.restoring = false;

        debug!(restored, "Restored settings to initial values");
        self.clear_dirty_state();
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data_source::PropertySource;
    use crate::discrete::DiscreteValue;
    use crate::player::LocalPlayer;
    use crate::scalar::ScalarValue;
    use crate::setting::Setting;

    struct Fixture {
        registry: SettingRegistry,
        subtitles: SettingId,
        volume: SettingId,
    }

    fn fixture() -> Fixture {
        let player = Arc::new(
            LocalPlayer::new("P1")
                .with_property("subtitles", "false")
                .with_property("volume", "80"),
        );
        let mut registry = SettingRegistry::new(player);
        let audio = registry.create(Setting::collection("Audio"));
        let subtitles = registry.create(Setting::discrete(
            "Subtitles",
            DiscreteValue::boolean().with_source(PropertySource::shared("subtitles")),
        ));
        let volume = registry.create(Setting::scalar(
            "Volume",
            ScalarValue::new(0.0, 100.0, 5.0).with_source(PropertySource::shared("volume")),
        ));
        registry.add_setting(audio, subtitles).unwrap();
        registry.add_setting(audio, volume).unwrap();
        registry.register_setting(audio).unwrap();

        Fixture {
            registry,
            subtitles,
            volume,
        }
    }

    #[test]
    fn test_change_marks_dirty() {
        let mut f = fixture();
        let mut tracker = RegistryChangeTracker::new();
        tracker.watch_registry(&mut f.registry);
        assert!(!tracker.have_settings_been_changed());

        f.registry.set_value_from_string(f.subtitles, "true").unwrap();
        f.registry.set_value_from_string(f.subtitles, "false").unwrap();

        assert!(tracker.have_settings_been_changed());
        assert_eq!(tracker.dirty_settings(), [f.subtitles]);
    }

    #[test]
    fn test_clear_discards_queued_changes() {
        let mut f = fixture();
        let mut tracker = RegistryChangeTracker::new();
        tracker.watch_registry(&mut f.registry);

        f.registry.set_value_from_string(f.subtitles, "true").unwrap();
        tracker.clear_dirty_state();

        assert!(!tracker.have_settings_been_changed());
        assert!(tracker.dirty_settings().is_empty());

        f.registry.set_scalar_value(f.volume, 20.0).unwrap();
        assert_eq!(tracker.dirty_settings(), [f.volume]);
    }

    #[test]
    fn test_restore_to_initial() {
        let mut f = fixture();
        let mut tracker = RegistryChangeTracker::new();
        tracker.watch_registry(&mut f.registry);

        f.registry.set_value_from_string(f.subtitles, "true").unwrap();
        f.registry.set_scalar_value(f.volume, 20.0).unwrap();
        tracker.restore_to_initial(&mut f.registry).unwrap();

        assert_eq!(f.registry.value_as_string(f.subtitles).as_deref(), Some("false"));
        assert_eq!(f.registry.scalar_value(f.volume), Some(80.0));
        assert!(!tracker.have_settings_been_changed());
        assert!(tracker.dirty_settings().is_empty());
    }

    #[test]
    fn test_apply_changes_moves_baseline() {
        let mut f = fixture();
        let mut tracker = RegistryChangeTracker::new();
        tracker.watch_registry(&mut f.registry);
        let rx = f.registry.subscribe();

        f.registry.set_scalar_value(f.volume, 20.0).unwrap();
        tracker.apply_changes(&mut f.registry).unwrap();
        assert!(!tracker.have_settings_been_changed());
        assert!(rx
            .try_iter()
            .any(|event| event == RegistryEvent::SettingApplied { setting: f.volume }));

        f.registry.set_scalar_value(f.volume, 60.0).unwrap();
        tracker.restore_to_initial(&mut f.registry).unwrap();
        assert_eq!(f.registry.scalar_value(f.volume), Some(20.0));
    }

    #[test]
    fn test_wrong_registry_rejected() {
        let mut f = fixture();
        let mut other = fixture();
        let mut tracker = RegistryChangeTracker::new();
        tracker.watch_registry(&mut f.registry);

        assert!(matches!(
            tracker.apply_changes(&mut other.registry),
            Err(SettingsError::RegistryMismatch)
        ));
        tracker.stop_watching();
        assert!(!tracker.is_watching());
        assert!(matches!(
            tracker.restore_to_initial(&mut f.registry),
            Err(SettingsError::RegistryMismatch)
        ));
    }

    #[test]
    fn test_rewatch_clears_state() {
        let mut f = fixture();
        let mut tracker = RegistryChangeTracker::new();
        tracker.watch_registry(&mut f.registry);
        f.registry.set_value_from_string(f.subtitles, "true").unwrap();
        assert!(tracker.have_settings_been_changed());

        tracker.watch_registry(&mut f.registry);
        assert!(!tracker.have_settings_been_changed());
    }

    #[test]
    fn test_stale_settings_skipped_after_regenerate() {
        struct Builder;
        impl crate::registry::RegistryBuilder for Builder {
            fn build(&self, registry: &mut SettingRegistry) -> SettingsResult<()> {
                let volume = registry.create(Setting::scalar(
                    "Volume",
                    ScalarValue::new(0.0, 100.0, 5.0).with_source(PropertySource::shared("volume")),
                ));
                registry.register_setting(volume)
            }
        }

        let player = Arc::new(LocalPlayer::new("P1").with_property("volume", "80"));
        let mut registry = SettingRegistry::with_builder(player, Arc::new(Builder)).unwrap();
        let mut tracker = RegistryChangeTracker::new();
        tracker.watch_registry(&mut registry);

        let old = registry.find_setting_by_dev_name("Volume").unwrap();
        registry.set_scalar_value(old, 40.0).unwrap();
        registry.regenerate().unwrap();

        tracker.apply_changes(&mut registry).unwrap();
        assert!(!tracker.have_settings_been_changed());
    }
}
