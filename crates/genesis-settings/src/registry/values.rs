//! Value reads and writes.
//!
//! Every write goes through the setting's data source and then broadcasts a
//! change, so dependents and listeners see it before the call returns.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::SettingRegistry;
use crate::editable_state::ChangeReason;
use crate::error::{SettingsError, SettingsResult};
use crate::filter::FilterState;
use crate::ids::SettingId;
use crate::setting::{Setting, SettingKind, ValueSetting};

/// Flat, serializable view of one setting for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingSnapshot {
    /// Handle
    pub id: SettingId,
    /// Dev name
    pub dev_name: String,
    /// Display name
    pub display_name: String,
    /// Kind name
    pub kind: String,
    /// Parent collection
    pub parent: Option<SettingId>,
    /// Shown?
    pub visible: bool,
    /// Editable?
    pub enabled: bool,
    /// Can be reset to default?
    pub resetable: bool,
    /// Why it is disabled
    pub disabled_reasons: Vec<String>,
    /// Current value in string form
    pub value: Option<String>,
    /// Current value as displayed
    pub display_value: Option<String>,
    /// Selectable option texts (discrete only)
    pub options: Vec<String>,
    /// Index of the current option (discrete only)
    pub selected_option: Option<usize>,
    /// Button text (actions only)
    pub action_text: Option<String>,
    /// Button text (pages only)
    pub navigation_text: Option<String>,
}

fn wrong_kind(setting: &Setting, expected: &'static str) -> SettingsError {
    SettingsError::WrongKind {
        setting: setting.dev_name.clone(),
        expected,
    }
}

impl SettingRegistry {
    // ========================================================================
    // Reads
    // ========================================================================

    /// Current value in string form. `None` for stale handles and non-values.
    #[must_use]
    pub fn value_as_string(&self, id: SettingId) -> Option<String> {
        self.settings.get(id)?.value_as_string(&self.player)
    }

    /// Index of the current option, falling back to the default option.
    #[must_use]
    pub fn discrete_option_index(&self, id: SettingId) -> Option<usize> {
        self.settings.get(id)?.as_discrete()?.option_index(&self.player)
    }

    /// Index of the default option.
    #[must_use]
    pub fn discrete_default_index(&self, id: SettingId) -> Option<usize> {
        self.settings.get(id)?.as_discrete()?.default_index()
    }

    /// Option texts not disabled by the setting's edit state.
    #[must_use]
    pub fn discrete_options(&self, id: SettingId) -> Option<Vec<String>> {
        let setting = self.settings.get(id)?;
        Some(setting.as_discrete()?.visible_options(setting.edit_state()))
    }

    /// Current scalar value.
    #[must_use]
    pub fn scalar_value(&self, id: SettingId) -> Option<f64> {
        Some(self.settings.get(id)?.as_scalar()?.value(&self.player))
    }

    /// Current scalar value mapped into `[0, 1]`.
    #[must_use]
    pub fn scalar_value_normalized(&self, id: SettingId) -> Option<f64> {
        Some(self.settings.get(id)?.as_scalar()?.value_normalized(&self.player))
    }

    /// Display text of the current value.
    ///
    /// Scalars go through their format. Discrete values show the text of the
    /// selected option, or the raw value if it matches none.
    #[must_use]
    pub fn formatted_text(&self, id: SettingId) -> Option<String> {
        match self.settings.get(id)?.kind() {
            SettingKind::Value(ValueSetting::Scalar(value)) => Some(value.formatted_text(&self.player)),
            SettingKind::Value(ValueSetting::Discrete(value)) => {
                let text = value
                    .option_index(&self.player)
                    .and_then(|index| value.options().get(index))
                    .map(|option| option.text.clone());
                Some(text.unwrap_or_else(|| value.value_as_string(&self.player)))
            },
            _ => None,
        }
    }

    /// Value reported to analytics, or `None` if the setting opted out.
    #[must_use]
    pub fn analytics_value(&self, id: SettingId) -> Option<String> {
        let setting = self.settings.get(id)?;
        if !setting.report_analytics() || setting.edit_state().is_hidden_from_analytics() {
            return None;
        }
        Some(setting.analytics_value(&self.player))
    }

    /// Extra detail text for the registry's player.
    #[must_use]
    pub fn dynamic_details(&self, id: SettingId) -> Option<String> {
        Some(self.settings.get(id)?.dynamic_details(&self.player))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write a value in string form and broadcast a change.
    pub fn set_value_from_string(&mut self, id: SettingId, value: &str) -> SettingsResult<()> {
        self.set_value_from_string_with_reason(id, value, ChangeReason::Change)
    }

    /// Write a value in string form and broadcast a change with `reason`.
    ///
    /// Scalar settings parse the string and quantize it.
    pub fn set_value_from_string_with_reason(
        &mut self,
        id: SettingId,
        value: &str,
        reason: ChangeReason,
    ) -> SettingsResult<()> {
        let setting = self.setting_ref(id)?;
        let written = match setting.kind() {
            SettingKind::Value(ValueSetting::Discrete(discrete)) => discrete.write(&self.player, value),
            SettingKind::Value(ValueSetting::Scalar(scalar)) => {
                let parsed = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|parsed| parsed.is_finite())
                    .ok_or_else(|| SettingsError::InvalidValue {
                        setting: setting.dev_name.clone(),
                        value: value.to_string(),
                    })?;
                scalar.write(&self.player, parsed).is_some()
            },
            _ => return Err(wrong_kind(setting, "value")),
        };

        self.finish_write(id, written, reason);
        Ok(())
    }

    /// Select the option at `index`.
    pub fn set_discrete_option_by_index(&mut self, id: SettingId, index: usize) -> SettingsResult<()> {
        let setting = self.setting_ref(id)?;
        let discrete = setting.as_discrete().ok_or_else(|| wrong_kind(setting, "discrete value"))?;
        let key = discrete
            .option_key(index)
            .ok_or(SettingsError::OptionIndexOutOfRange {
                index,
                count: discrete.options().len(),
            })?
            .to_string();

        let written = discrete.write(&self.player, &key);
        self.finish_write(id, written, ChangeReason::Change);
        Ok(())
    }

    /// Add an option to a discrete setting.
    pub fn add_discrete_option(
        &mut self,
        id: SettingId,
        key: impl Into<String>,
        text: impl Into<String>,
    ) -> SettingsResult<()> {
        let setting = self.settings.get_mut(id).ok_or(SettingsError::StaleSetting(id))?;
        let dev_name = setting.dev_name.clone();
        match setting.kind_mut() {
            SettingKind::Value(ValueSetting::Discrete(discrete)) => {
                discrete.add_option(key, text).map_err(|err| match err {
                    SettingsError::DuplicateOption { option, .. } => SettingsError::DuplicateOption {
                        setting: dev_name,
                        option,
                    },
                    other => other,
                })
            },
            _ => Err(SettingsError::WrongKind {
                setting: dev_name,
                expected: "discrete value",
            }),
        }
    }

    /// Remove an option from a discrete setting. Returns whether it existed.
    pub fn remove_discrete_option(&mut self, id: SettingId, key: &str) -> SettingsResult<bool> {
        let setting = self.settings.get_mut(id).ok_or(SettingsError::StaleSetting(id))?;
        let dev_name = setting.dev_name.clone();
        match setting.kind_mut() {
            SettingKind::Value(ValueSetting::Discrete(discrete)) => Ok(discrete.remove_option(key)),
            _ => Err(SettingsError::WrongKind {
                setting: dev_name,
                expected: "discrete value",
            }),
        }
    }

    /// Quantize and write a scalar value. Returns the committed value.
    pub fn set_scalar_value(&mut self, id: SettingId, value: f64) -> SettingsResult<f64> {
        self.set_scalar_value_with_reason(id, value, ChangeReason::Change)
    }

    /// Quantize and write a scalar value, broadcasting `reason`.
    pub fn set_scalar_value_with_reason(
        &mut self,
        id: SettingId,
        value: f64,
        reason: ChangeReason,
    ) -> SettingsResult<f64> {
        let setting = self.setting_ref(id)?;
        let scalar = setting.as_scalar().ok_or_else(|| wrong_kind(setting, "scalar value"))?;
        if !value.is_finite() {
            return Err(SettingsError::InvalidValue {
                setting: setting.dev_name.clone(),
                value: value.to_string(),
            });
        }

        let committed = scalar.write(&self.player, value);
        self.finish_write(id, committed.is_some(), reason);
        Ok(committed.unwrap_or_else(|| scalar_quantized(self, id, value)))
    }

    /// Write a normalized scalar value. Returns the committed source value.
    pub fn set_scalar_value_normalized(&mut self, id: SettingId, normalized: f64) -> SettingsResult<f64> {
        let setting = self.setting_ref(id)?;
        let scalar = setting.as_scalar().ok_or_else(|| wrong_kind(setting, "scalar value"))?;
        let value = scalar.denormalize(normalized);
        self.set_scalar_value(id, value)
    }

    fn finish_write(&mut self, id: SettingId, written: bool, reason: ChangeReason) {
        if !written {
            warn!(setting = %self.dev_name_of(id), "Setting has no setter, value not written");
            return;
        }
        self.broadcast_setting_changed(id, reason);
        self.pump();
    }

    // ========================================================================
    // Baselines
    // ========================================================================

    /// Capture the current value as the initial value.
    pub fn store_initial(&mut self, id: SettingId) -> SettingsResult<()> {
        let setting = self.settings.get_mut(id).ok_or(SettingsError::StaleSetting(id))?;
        setting.store_initial(&self.player);
        Ok(())
    }

    /// Write the default value, if one is configured.
    pub fn reset_to_default(&mut self, id: SettingId) -> SettingsResult<()> {
        let setting = self.setting_ref(id)?;
        let written = match setting.kind() {
            SettingKind::Value(ValueSetting::Discrete(discrete)) => match discrete.default_value() {
                Some(default) => discrete.write(&self.player, default),
                None => return Ok(()),
            },
            SettingKind::Value(ValueSetting::Scalar(scalar)) => match scalar.default_value() {
                Some(default) => scalar.write(&self.player, default).is_some(),
                None => return Ok(()),
            },
            _ => return Ok(()),
        };

        self.finish_write(id, written, ChangeReason::ResetToDefault);
        Ok(())
    }

    /// Write the stored initial value back.
    pub fn restore_to_initial(&mut self, id: SettingId) -> SettingsResult<()> {
        let setting = self.setting_ref(id)?;
        let written = match setting.kind() {
            SettingKind::Value(ValueSetting::Discrete(discrete)) => {
                discrete.write(&self.player, discrete.initial_value())
            },
            SettingKind::Value(ValueSetting::Scalar(scalar)) => {
                scalar.write(&self.player, scalar.initial_value()).is_some()
            },
            _ => return Ok(()),
        };

        self.finish_write(id, written, ChangeReason::RestoreToInitial);
        Ok(())
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Snapshot of one setting.
    pub fn snapshot_setting(&self, id: SettingId) -> SettingsResult<SettingSnapshot> {
        let setting = self.setting_ref(id)?;
        let state = setting.edit_state();

        let (options, selected_option) = match setting.as_discrete() {
            Some(discrete) => (
                discrete.options().iter().map(|option| option.text.clone()).collect(),
                discrete.option_index(&self.player),
            ),
            None => (Vec::new(), None),
        };
        let navigation_text = match setting.kind() {
            SettingKind::Page(page) => Some(page.navigation_text().to_string()),
            _ => None,
        };

        Ok(SettingSnapshot {
            id,
            dev_name: setting.dev_name.clone(),
            display_name: setting.display_name.clone(),
            kind: setting.kind().name().to_string(),
            parent: setting.parent,
            visible: state.is_visible(),
            enabled: state.is_enabled(),
            resetable: state.is_resetable(),
            disabled_reasons: state.disabled_reasons().to_vec(),
            value: setting.value_as_string(&self.player),
            display_value: self.formatted_text(id),
            options,
            selected_option,
            action_text: setting.as_action().map(|action| action.action_text().to_string()),
            navigation_text,
        })
    }

    /// Snapshot of every setting the filter lists, in display order.
    pub fn snapshot(&self, filter: &FilterState) -> SettingsResult<Vec<SettingSnapshot>> {
        self.get_settings_for_filter(filter)
            .into_iter()
            .map(|id| self.snapshot_setting(id))
            .collect()
    }

    /// [`Self::snapshot`] as pretty JSON.
    pub fn snapshot_json(&self, filter: &FilterState) -> SettingsResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot(filter)?)?)
    }
}

fn scalar_quantized(registry: &SettingRegistry, id: SettingId, value: f64) -> f64 {
    registry
        .settings
        .get(id)
        .and_then(Setting::as_scalar)
        .map_or(value, |scalar| scalar.quantize(value))
}
