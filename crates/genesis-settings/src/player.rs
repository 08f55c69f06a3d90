//! Local player context: platform profile and the named local settings store.
//!
//! Settings never own their data. Data sources read and write named
//! properties on the player, and edit conditions inspect the player's
//! platform profile. Property watchers let a condition request re-evaluation
//! when a property changes outside of the settings tree.

use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::edit_condition::ConditionTrigger;

/// How the platform paces frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FramePacingMode {
    /// Free frame rate with an optional limit.
    #[default]
    DesktopStyle,
    /// Fixed presets such as 30/60 Hz.
    ConsoleStyle,
    /// Battery-aware mobile presets.
    MobileStyle,
}

/// Capabilities of the device the game runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Platform trait tags (e.g. "Platform.Trait.SupportsWindowedMode").
    pub traits: AHashSet<String>,
    /// Frame pacing model.
    pub frame_pacing: FramePacingMode,
    /// Whether individual video quality settings can be changed.
    pub supports_granular_video_quality: bool,
    /// Whether latency tracking stats are available.
    pub supports_latency_stats: bool,
    /// Whether latency markers are available.
    pub supports_latency_markers: bool,
    /// Whether the GPU is an NVIDIA device.
    pub is_nvidia: bool,
    /// Only allow latency markers on NVIDIA hardware.
    pub latency_markers_require_nvidia: bool,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self {
            traits: AHashSet::new(),
            frame_pacing: FramePacingMode::DesktopStyle,
            supports_granular_video_quality: true,
            supports_latency_stats: false,
            supports_latency_markers: false,
            is_nvidia: false,
            latency_markers_require_nvidia: true,
        }
    }
}

impl PlatformProfile {
    /// Create a desktop profile with no traits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a platform trait.
    #[must_use]
    pub fn with_trait(mut self, platform_trait: impl Into<String>) -> Self {
        self.traits.insert(platform_trait.into());
        self
    }

    /// Set the frame pacing mode.
    #[must_use]
    pub fn with_frame_pacing(mut self, mode: FramePacingMode) -> Self {
        self.frame_pacing = mode;
        self
    }

    /// Set latency stat and marker support.
    #[must_use]
    pub fn with_latency_support(mut self, stats: bool, markers: bool) -> Self {
        self.supports_latency_stats = stats;
        self.supports_latency_markers = markers;
        self
    }

    /// Mark the device as NVIDIA hardware.
    #[must_use]
    pub fn with_nvidia(mut self, is_nvidia: bool) -> Self {
        self.is_nvidia = is_nvidia;
        self
    }

    /// Check for a platform trait.
    #[must_use]
    pub fn has_trait(&self, platform_trait: &str) -> bool {
        self.traits.contains(platform_trait)
    }
}

#[derive(Debug)]
struct PropertyWatcher {
    property: String,
    trigger: ConditionTrigger,
}

/// The local player a settings registry is built for.
///
/// Shared behind an `Arc`. Data sources only hold `&LocalPlayer`, so the
/// mutable parts sit behind locks.
#[derive(Debug)]
pub struct LocalPlayer {
    name: String,
    primary: bool,
    profile: RwLock<PlatformProfile>,
    properties: RwLock<AHashMap<String, String>>,
    watchers: Mutex<Vec<PropertyWatcher>>,
}

impl LocalPlayer {
    /// Create the primary local player with a default profile.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: true,
            profile: RwLock::new(PlatformProfile::default()),
            properties: RwLock::new(AHashMap::new()),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Set whether this is the primary player (split screen guests are not).
    #[must_use]
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    /// Replace the platform profile.
    #[must_use]
    pub fn with_profile(self, profile: PlatformProfile) -> Self {
        *self.profile.write() = profile;
        self
    }

    /// Define a property with its starting value.
    #[must_use]
    pub fn with_property(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.define_property(name, value);
        self
    }

    /// Player name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Is this the primary local player?
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.primary
    }

    /// Read the platform profile.
    pub fn profile(&self) -> RwLockReadGuard<'_, PlatformProfile> {
        self.profile.read()
    }

    /// Mutate the platform profile.
    ///
    /// Changing platform capabilities usually changes which settings exist,
    /// so callers regenerate the registry afterwards.
    pub fn update_profile(&self, f: impl FnOnce(&mut PlatformProfile)) {
        f(&mut self.profile.write());
    }

    /// Define (or redefine) a property without notifying watchers.
    pub fn define_property(&self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.write().insert(name.into(), value.into());
    }

    /// Is the property defined?
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.read().contains_key(name)
    }

    /// Current value of a property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        self.properties.read().get(name).cloned()
    }

    /// Parse a property as a bool ("true"/"false").
    #[must_use]
    pub fn property_bool(&self, name: &str) -> Option<bool> {
        self.properties.read().get(name).and_then(|v| v.parse().ok())
    }

    /// Write a property. Watchers are notified when the value actually changed.
    ///
    /// Returns true if the value changed.
    pub fn set_property(&self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        let changed = {
            let mut properties = self.properties.write();
            match properties.get_mut(name) {
                Some(existing) if *existing == value => false,
                Some(existing) => {
                    *existing = value;
                    true
                },
                None => {
                    properties.insert(name.to_string(), value);
                    true
                },
            }
        };

        if changed {
            self.notify_watchers(name);
        }

        changed
    }

    /// Request re-evaluation of a setting whenever `property` changes.
    ///
    /// Watchers of destroyed registries are dropped first.
    pub fn watch_property(&self, property: impl Into<String>, trigger: ConditionTrigger) {
        let mut watchers = self.watchers.lock();
        watchers.retain(|watcher| watcher.trigger.is_live());
        watchers.push(PropertyWatcher {
            property: property.into(),
            trigger,
        });
    }

    /// Drop every watcher whose registry is gone.
    pub fn prune_watchers(&self) {
        let mut watchers = self.watchers.lock();
        let before = watchers.len();
        watchers.retain(|watcher| watcher.trigger.is_live());
        let pruned = before - watchers.len();
        if pruned > 0 {
            trace!(pruned, "Pruned property watchers");
        }
    }

    /// Number of live property watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }

    fn notify_watchers(&self, property: &str) {
        let mut watchers = self.watchers.lock();
        watchers.retain(|watcher| {
            if watcher.property != property {
                return true;
            }
            let alive = watcher.trigger.fire();
            if !alive {
                trace!(property, "Dropping watcher of a destroyed registry");
            }
            alive
        });
    }
}
