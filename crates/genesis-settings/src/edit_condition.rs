//! Edit conditions: rules that restrict a setting's visibility and editability.
//!
//! Conditions are evaluated in the order they were added against one shared
//! [`EditableState`]. Each condition can only hide, disable or kill, so the
//! final state is the conjunction of every condition's verdict.

use std::fmt;
use std::sync::{Arc, Weak};

use crossbeam_channel::Sender;
use tracing::trace;

use crate::arena::SettingArena;
use crate::editable_state::{ChangeReason, EditableState};
use crate::ids::SettingId;
use crate::player::{FramePacingMode, LocalPlayer};

/// Player property holding the "enable latency tracking stats" switch.
pub const LATENCY_STATS_PROPERTY: &str = "enable_latency_tracking_stats";

/// Requests re-evaluation of one setting's edit state.
///
/// Requests are queued and handled the next time the registry pumps.
#[derive(Debug, Clone)]
pub struct ConditionTrigger {
    setting: SettingId,
    sender: Sender<SettingId>,
    owner: Option<Weak<()>>,
}

impl ConditionTrigger {
    /// Create a trigger for `setting`.
    #[must_use]
    pub fn new(setting: SettingId, sender: Sender<SettingId>) -> Self {
        Self {
            setting,
            sender,
            owner: None,
        }
    }

    /// Tie the trigger to `owner`. It dies once every strong reference is dropped.
    #[must_use]
    pub fn with_owner(mut self, owner: &Arc<()>) -> Self {
        self.owner = Some(Arc::downgrade(owner));
        self
    }

    /// False once the owning registry generation is gone.
    #[must_use]
    pub fn is_live(&self) -> bool {
        match &self.owner {
            Some(owner) => owner.strong_count() > 0,
            None => true,
        }
    }

    /// Setting this trigger refreshes.
    #[must_use]
    pub const fn setting(&self) -> SettingId {
        self.setting
    }

    /// Queue a refresh. Returns false once the registry is gone.
    pub fn fire(&self) -> bool {
        self.is_live() && self.sender.send(self.setting).is_ok()
    }
}

/// Read-only view handed to conditions while they gather edit state.
pub struct EditConditionContext<'a> {
    player: &'a LocalPlayer,
    settings: &'a SettingArena,
    setting: SettingId,
}

impl<'a> EditConditionContext<'a> {
    pub(crate) fn new(player: &'a LocalPlayer, settings: &'a SettingArena, setting: SettingId) -> Self {
        Self {
            player,
            settings,
            setting,
        }
    }

    /// The local player.
    #[must_use]
    pub fn player(&self) -> &'a LocalPlayer {
        self.player
    }

    /// The setting being evaluated.
    #[must_use]
    pub const fn setting(&self) -> SettingId {
        self.setting
    }

    /// Current value of another value setting, in its string form.
    #[must_use]
    pub fn value_as_string(&self, id: SettingId) -> Option<String> {
        self.settings
            .get(id)
            .and_then(|setting| setting.value_as_string(self.player))
    }

    /// Current edit state of another setting.
    #[must_use]
    pub fn edit_state(&self, id: SettingId) -> Option<&'a EditableState> {
        self.settings.get(id).map(crate::setting::Setting::edit_state)
    }
}

/// What to do when a platform trait check fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitResponse {
    /// Kill the setting, with a developer reason.
    Kill(String),
    /// Disable the setting, with a player facing reason.
    Disable(String),
}

/// How a frame pacing condition treats a matching mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePacingMatch {
    /// Only available when the platform uses the mode.
    EnableIf,
    /// Unavailable when the platform uses the mode.
    DisableIf,
}

type GatherFn = dyn Fn(&EditConditionContext<'_>, &mut EditableState) + Send + Sync;
type ChangedFn = dyn Fn(&LocalPlayer, SettingId, ChangeReason) + Send + Sync;
type AppliedFn = dyn Fn(&LocalPlayer, SettingId) + Send + Sync;

/// Ad hoc condition built from a closure.
#[derive(Clone)]
pub struct WhenCondition {
    name: String,
    gather: Arc<GatherFn>,
    watched_properties: Vec<String>,
    on_changed: Option<Arc<ChangedFn>>,
    on_applied: Option<Arc<AppliedFn>>,
}

impl WhenCondition {
    /// Create a condition from a gather closure.
    pub fn new(
        name: impl Into<String>,
        gather: impl Fn(&EditConditionContext<'_>, &mut EditableState) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            gather: Arc::new(gather),
            watched_properties: Vec::new(),
            on_changed: None,
            on_applied: None,
        }
    }

    /// Re-evaluate whenever the named player property changes.
    #[must_use]
    pub fn watching(mut self, property: impl Into<String>) -> Self {
        self.watched_properties.push(property.into());
        self
    }

    /// Called whenever the owning setting changes.
    #[must_use]
    pub fn on_changed(
        mut self,
        f: impl Fn(&LocalPlayer, SettingId, ChangeReason) + Send + Sync + 'static,
    ) -> Self {
        self.on_changed = Some(Arc::new(f));
        self
    }

    /// Called whenever the owning setting is applied.
    #[must_use]
    pub fn on_applied(mut self, f: impl Fn(&LocalPlayer, SettingId) + Send + Sync + 'static) -> Self {
        self.on_applied = Some(Arc::new(f));
        self
    }

    /// Debug name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for WhenCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhenCondition")
            .field("name", &self.name)
            .field("watched_properties", &self.watched_properties)
            .finish_non_exhaustive()
    }
}

/// A rule restricting when a setting can be seen or edited.
#[derive(Debug, Clone)]
pub enum EditCondition {
    /// Check a platform trait tag.
    PlatformTrait {
        /// Trait tag
        platform_trait: String,
        /// Whether the trait should be present
        desired: bool,
        /// Response when the check fails
        response: TraitResponse,
    },
    /// Only the primary local player may edit.
    PrimaryPlayerOnly,
    /// Kill unless the platform allows changing individual video quality settings.
    GranularVideoQuality {
        /// Developer reason
        kill_reason: String,
    },
    /// Require (or forbid) a frame pacing mode.
    FramePacing {
        /// Mode to compare against
        mode: FramePacingMode,
        /// How a match is treated
        matching: FramePacingMatch,
    },
    /// Disable unless latency tracking stats are supported.
    LatencyStatsSupported,
    /// Disable unless latency tracking stats are switched on. Re-evaluates when the switch changes.
    LatencyStatsEnabled,
    /// Disable unless latency markers are supported (and, if required, running on NVIDIA).
    LatencyMarkersSupported,
    /// Closure based condition.
    When(WhenCondition),
}

impl EditCondition {
    /// Kill the setting if the platform lacks a trait.
    #[must_use]
    pub fn kill_if_missing(platform_trait: impl Into<String>, kill_reason: impl Into<String>) -> Self {
        Self::PlatformTrait {
            platform_trait: platform_trait.into(),
            desired: true,
            response: TraitResponse::Kill(kill_reason.into()),
        }
    }

    /// Disable the setting if the platform lacks a trait.
    #[must_use]
    pub fn disable_if_missing(platform_trait: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlatformTrait {
            platform_trait: platform_trait.into(),
            desired: true,
            response: TraitResponse::Disable(reason.into()),
        }
    }

    /// Kill the setting if the platform has a trait.
    #[must_use]
    pub fn kill_if_present(platform_trait: impl Into<String>, kill_reason: impl Into<String>) -> Self {
        Self::PlatformTrait {
            platform_trait: platform_trait.into(),
            desired: false,
            response: TraitResponse::Kill(kill_reason.into()),
        }
    }

    /// Disable the setting if the platform has a trait.
    #[must_use]
    pub fn disable_if_present(platform_trait: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlatformTrait {
            platform_trait: platform_trait.into(),
            desired: false,
            response: TraitResponse::Disable(reason.into()),
        }
    }

    /// Closure based condition.
    pub fn when(
        name: impl Into<String>,
        gather: impl Fn(&EditConditionContext<'_>, &mut EditableState) + Send + Sync + 'static,
    ) -> Self {
        Self::When(WhenCondition::new(name, gather))
    }

    /// Bind to the player. Conditions that watch external state register here.
    pub fn initialize(&self, player: &LocalPlayer, trigger: &ConditionTrigger) {
        match self {
            Self::LatencyStatsEnabled => {
                player.watch_property(LATENCY_STATS_PROPERTY, trigger.clone());
            },
            Self::When(when) => {
                for property in &when.watched_properties {
                    player.watch_property(property.clone(), trigger.clone());
                }
            },
            _ => {},
        }
    }

    /// The owning setting changed.
    pub fn setting_changed(&self, player: &LocalPlayer, setting: SettingId, reason: ChangeReason) {
        if let Self::When(WhenCondition {
            on_changed: Some(f), ..
        }) = self
        {
            f(player, setting, reason);
        }
    }

    /// The owning setting was applied.
    pub fn setting_applied(&self, player: &LocalPlayer, setting: SettingId) {
        if let Self::When(WhenCondition {
            on_applied: Some(f), ..
        }) = self
        {
            f(player, setting);
        }
    }

    /// Tighten `state` according to this condition.
    pub fn gather_edit_state(&self, ctx: &EditConditionContext<'_>, state: &mut EditableState) {
        let player = ctx.player();
        match self {
            Self::PlatformTrait {
                platform_trait,
                desired,
                response,
            } => {
                if player.profile().has_trait(platform_trait) != *desired {
                    match response {
                        TraitResponse::Kill(reason) => state.kill(reason),
                        TraitResponse::Disable(reason) => state.disable(reason),
                    }
                }
            },
            Self::PrimaryPlayerOnly => {
                if !player.is_primary() {
                    state.disable("Can only be changed by the primary player.");
                }
            },
            Self::GranularVideoQuality { kill_reason } => {
                if !player.profile().supports_granular_video_quality {
                    state.kill(kill_reason);
                }
            },
            Self::FramePacing { mode, matching } => {
                let matches = player.profile().frame_pacing == *mode;
                let matches_are_bad = *matching == FramePacingMatch::DisableIf;
                if matches == matches_are_bad {
                    state.kill("Frame pacing mode does not match requirements");
                }
            },
            Self::LatencyStatsSupported => {
                if !player.profile().supports_latency_stats {
                    state.disable("Latency performance stats are not supported on this device");
                }
            },
            Self::LatencyStatsEnabled => {
                if player.property_bool(LATENCY_STATS_PROPERTY) != Some(true) {
                    state.disable("Latency Tracking Stats must be enabled to use this.");
                }
            },
            Self::LatencyMarkersSupported => {
                let profile = player.profile();
                if !profile.supports_latency_markers {
                    state.disable("Latency markers are not supported on this device");
                }
                if profile.latency_markers_require_nvidia && !profile.is_nvidia {
                    state.disable("Latency markers only work on NVIDIA devices.");
                }
            },
            Self::When(when) => {
                (when.gather)(ctx, state);
            },
        }
        trace!(condition = %self.describe(), setting = %ctx.setting(), "Gathered edit state");
    }

    /// Debug description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::PlatformTrait {
                platform_trait,
                desired,
                response,
            } => {
                let action = match response {
                    TraitResponse::Kill(_) => "Kill",
                    TraitResponse::Disable(_) => "Disable",
                };
                let when = if *desired { "Missing" } else { "Present" };
                format!("{action}If{when}({platform_trait})")
            },
            Self::PrimaryPlayerOnly => "WhenPlayingAsPrimaryPlayer".to_string(),
            Self::GranularVideoQuality { .. } => "VideoQuality".to_string(),
            Self::FramePacing { mode, matching } => format!("FramePacingMode({mode:?}, {matching:?})"),
            Self::LatencyStatsSupported => "LatencyStatsSupported".to_string(),
            Self::LatencyStatsEnabled => "LatencyStatsCurrentlyEnabled".to_string(),
            Self::LatencyMarkersSupported => "LatencyMarkersSupported".to_string(),
            Self::When(when) => format!("When({})", when.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlatformProfile;
    use crossbeam_channel::unbounded;

    fn gather(condition: &EditCondition, player: &LocalPlayer) -> EditableState {
        let arena = SettingArena::new();
        let ctx = EditConditionContext::new(player, &arena, SettingId::from_raw(0, 0));
        let mut state = EditableState::new();
        condition.gather_edit_state(&ctx, &mut state);
        state
    }

    #[test]
    fn test_platform_trait_kill_if_missing() {
        let condition = EditCondition::kill_if_missing("Platform.Trait.SupportsWindowedMode", "No windows");
        let bare = LocalPlayer::new("P1");
        let desktop = LocalPlayer::new("P1")
            .with_profile(PlatformProfile::new().with_trait("Platform.Trait.SupportsWindowedMode"));

        let state = gather(&condition, &bare);
        assert!(!state.is_visible());
        assert!(state.is_hidden_from_analytics());
        assert!(gather(&condition, &desktop).is_visible());
    }

    #[test]
    fn test_platform_trait_disable_if_present() {
        let condition = EditCondition::disable_if_present("Platform.Trait.Console", "Not on console");
        let console = LocalPlayer::new("P1").with_profile(PlatformProfile::new().with_trait("Platform.Trait.Console"));

        let state = gather(&condition, &console);
        assert!(state.is_visible());
        assert!(!state.is_enabled());
        assert_eq!(state.disabled_reasons(), ["Not on console"]);
    }

    #[test]
    fn test_primary_player_only() {
        let guest = LocalPlayer::new("P2").with_primary(false);
        let state = gather(&EditCondition::PrimaryPlayerOnly, &guest);
        assert!(!state.is_enabled());
        assert!(gather(&EditCondition::PrimaryPlayerOnly, &LocalPlayer::new("P1")).is_enabled());
    }

    #[test]
    fn test_frame_pacing() {
        let console = LocalPlayer::new("P1")
            .with_profile(PlatformProfile::new().with_frame_pacing(FramePacingMode::ConsoleStyle));
        let enable_if_console = EditCondition::FramePacing {
            mode: FramePacingMode::ConsoleStyle,
            matching: FramePacingMatch::EnableIf,
        };
        let disable_if_console = EditCondition::FramePacing {
            mode: FramePacingMode::ConsoleStyle,
            matching: FramePacingMatch::DisableIf,
        };

        assert!(gather(&enable_if_console, &console).is_visible());
        assert!(!gather(&disable_if_console, &console).is_visible());
        assert!(!gather(&enable_if_console, &LocalPlayer::new("P1")).is_visible());
    }

    #[test]
    fn test_latency_markers_require_nvidia() {
        let player = LocalPlayer::new("P1").with_profile(PlatformProfile::new().with_latency_support(true, true));
        let state = gather(&EditCondition::LatencyMarkersSupported, &player);
        assert_eq!(state.disabled_reasons(), ["Latency markers only work on NVIDIA devices."]);

        player.update_profile(|p| p.is_nvidia = true);
        assert!(gather(&EditCondition::LatencyMarkersSupported, &player).is_enabled());
    }

    #[test]
    fn test_latency_stats_enabled_watches_property() {
        let player = LocalPlayer::new("P1").with_property(LATENCY_STATS_PROPERTY, "false");
        let (tx, rx) = unbounded();
        let id = SettingId::from_raw(7, 1);

        EditCondition::LatencyStatsEnabled.initialize(&player, &ConditionTrigger::new(id, tx));
        assert!(!gather(&EditCondition::LatencyStatsEnabled, &player).is_enabled());

        player.set_property(LATENCY_STATS_PROPERTY, "true");
        assert_eq!(rx.try_recv().ok(), Some(id));
        assert!(gather(&EditCondition::LatencyStatsEnabled, &player).is_enabled());
    }

    #[test]
    fn test_when_condition() {
        let condition = EditCondition::when("NeverResettable", |_, state| state.unable_to_reset());
        let state = gather(&condition, &LocalPlayer::new("P1"));
        assert!(!state.is_resetable());
        assert_eq!(condition.describe(), "When(NeverResettable)");
    }

    #[test]
    fn test_describe_platform_trait() {
        let condition = EditCondition::kill_if_missing("Trait.A", "reason");
        assert_eq!(condition.describe(), "KillIfMissing(Trait.A)");
    }
}
