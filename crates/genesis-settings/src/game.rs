//! Standard game settings tree.
//!
//! Builds the Video, Audio and Gameplay collections plus the performance
//! stats page, bound to player properties. Call [`define_default_properties`]
//! on a fresh player before building so every data source resolves.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::codec::{LinearColor, OptionCodec};
use crate::data_source::PropertySource;
use crate::discrete::DiscreteValue;
use crate::edit_condition::{EditCondition, FramePacingMatch, LATENCY_STATS_PROPERTY};
use crate::error::SettingsResult;
use crate::ids::SettingId;
use crate::player::{FramePacingMode, LocalPlayer};
use crate::registry::{RegistryBuilder, SettingRegistry};
use crate::scalar::{ScalarFormat, ScalarValue};
use crate::setting::{ActionSetting, Setting};

/// Player property names used by the game settings.
pub mod property {
    /// Window mode
    pub const WINDOW_MODE: &str = "window_mode";
    /// VSync mode
    pub const VSYNC: &str = "vsync";
    /// Frame rate cap (0 = unlimited)
    pub const MAX_FPS: &str = "max_fps";
    /// Field of view in degrees
    pub const FOV: &str = "fov";
    /// Graphics quality preset
    pub const QUALITY: &str = "quality";
    /// Master volume (0 to 1)
    pub const MASTER_VOLUME: &str = "master_volume";
    /// Music volume (0 to 1)
    pub const MUSIC_VOLUME: &str = "music_volume";
    /// Effects volume (0 to 1)
    pub const SFX_VOLUME: &str = "sfx_volume";
    /// Subtitles on/off
    pub const SUBTITLES_ENABLED: &str = "subtitles_enabled";
    /// Subtitle text size
    pub const SUBTITLE_SIZE: &str = "subtitle_size";
    /// Subtitle text color
    pub const SUBTITLE_COLOR: &str = "subtitle_color";
    /// Difficulty
    pub const DIFFICULTY: &str = "difficulty";
    /// Auto-save interval in minutes (0 = disabled)
    pub const AUTO_SAVE_INTERVAL: &str = "auto_save_interval";
    /// Tutorial prompts on/off
    pub const SHOW_TUTORIALS: &str = "show_tutorials";
    /// Latency markers on/off
    pub const LATENCY_MARKERS: &str = "latency_markers";
    /// Latency flash indicator on/off
    pub const LATENCY_FLASH: &str = "latency_flash_indicators";
}

/// Platform trait gating the window mode setting.
pub const SUPPORTS_WINDOWED_MODE: &str = "Platform.Trait.SupportsWindowedMode";

/// Named action broadcast by the safe zone editor button.
pub const EDIT_SAFE_ZONE_ACTION: &str = "GameSettings.Action.EditSafeZone";

/// Window mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WindowMode {
    /// Windowed mode.
    Windowed,
    /// Borderless fullscreen.
    #[default]
    Borderless,
    /// Exclusive fullscreen.
    Fullscreen,
}
crate::impl_enum_codec!(WindowMode { Windowed, Borderless, Fullscreen });

/// VSync mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VsyncMode {
    /// VSync disabled.
    Off,
    /// VSync enabled.
    #[default]
    On,
    /// Adaptive VSync.
    Adaptive,
}
crate::impl_enum_codec!(VsyncMode { Off, On, Adaptive });

/// Graphics quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QualityLevel {
    /// Low quality for performance.
    Low,
    /// Medium quality.
    #[default]
    Medium,
    /// High quality.
    High,
    /// Ultra quality.
    Ultra,
}
crate::impl_enum_codec!(QualityLevel { Low, Medium, High, Ultra });

/// Game difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GameDifficulty {
    /// No enemies.
    Peaceful,
    /// Easy difficulty.
    Easy,
    /// Normal difficulty.
    #[default]
    Normal,
    /// Hard difficulty.
    Hard,
    /// Permadeath.
    Hardcore,
}
crate::impl_enum_codec!(GameDifficulty { Peaceful, Easy, Normal, Hard, Hardcore });

/// Subtitle text size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SubtitleSize {
    /// Small
    Small,
    /// Medium
    #[default]
    Medium,
    /// Large
    Large,
}
crate::impl_enum_codec!(SubtitleSize { Small, Medium, Large });

const SUBTITLE_COLORS: [LinearColor; 3] = [
    LinearColor::WHITE,
    LinearColor::new(1.0, 1.0, 0.0, 1.0),
    LinearColor::new(0.0, 1.0, 1.0, 1.0),
];

/// Define every property the game settings read, with its default value.
///
/// Properties that already exist keep their value.
pub fn define_default_properties(player: &LocalPlayer) {
    let defaults = [
        (property::WINDOW_MODE, WindowMode::default().encode()),
        (property::VSYNC, VsyncMode::default().encode()),
        (property::MAX_FPS, 0_u32.encode()),
        (property::FOV, 75_u32.encode()),
        (property::QUALITY, QualityLevel::default().encode()),
        (property::MASTER_VOLUME, 0.8_f64.encode()),
        (property::MUSIC_VOLUME, 0.7_f64.encode()),
        (property::SFX_VOLUME, 1.0_f64.encode()),
        (property::SUBTITLES_ENABLED, false.encode()),
        (property::SUBTITLE_SIZE, SubtitleSize::default().encode()),
        (property::SUBTITLE_COLOR, LinearColor::WHITE.encode()),
        (property::DIFFICULTY, GameDifficulty::default().encode()),
        (property::AUTO_SAVE_INTERVAL, 5_u32.encode()),
        (property::SHOW_TUTORIALS, true.encode()),
        (LATENCY_STATS_PROPERTY, false.encode()),
        (property::LATENCY_MARKERS, false.encode()),
        (property::LATENCY_FLASH, false.encode()),
    ];

    for (name, value) in defaults {
        if !player.has_property(name) {
            player.define_property(name, value);
        }
    }
}

fn discrete(
    dev_name: &str,
    display_name: &str,
    description: &str,
    property: &str,
    value: DiscreteValue,
) -> Setting {
    Setting::discrete(dev_name, value.with_source(PropertySource::shared(property)))
        .with_display_name(display_name)
        .with_description(description)
}

fn volume(dev_name: &str, display_name: &str, property: &str, default: f64) -> Setting {
    Setting::scalar(
        dev_name,
        ScalarValue::new(0.0, 1.0, 0.01)
            .with_source(PropertySource::shared(property))
            .with_default(default)
            .with_minimum_limit(0.0)
            .with_maximum_limit(1.0)
            .with_format(ScalarFormat::ZeroToOnePercent),
    )
    .with_display_name(display_name)
    .with_description(format!("Adjusts the {}.", display_name.to_lowercase()))
    .with_tag("Audio")
    .with_edit_condition(EditCondition::PrimaryPlayerOnly)
}

/// Builds the standard game settings tree.
#[derive(Debug, Default)]
pub struct GameSettingsBuilder {
    saved: Mutex<AHashMap<String, String>>,
    applied: Mutex<Vec<String>>,
}

impl GameSettingsBuilder {
    /// Create a builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle for [`SettingRegistry::with_builder`].
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Values captured by the last save, keyed by dev name.
    #[must_use]
    pub fn saved_values(&self) -> AHashMap<String, String> {
        self.saved.lock().clone()
    }

    /// Dev names of applied settings, in apply order.
    #[must_use]
    pub fn applied_settings(&self) -> Vec<String> {
        self.applied.lock().clone()
    }

    fn build_video(registry: &mut SettingRegistry) -> SettingsResult<SettingId> {
        let video = registry.create(
            Setting::collection("Video")
                .with_display_name("Video")
                .with_description("Display and graphics options"),
        );

        let window_mode = registry.create(
            discrete(
                "WindowMode",
                "Window Mode",
                "In Windowed mode you can interact with other windows more easily.",
                property::WINDOW_MODE,
                DiscreteValue::new()
                    .with_typed_option(WindowMode::Windowed, "Windowed")
                    .with_typed_option(WindowMode::Borderless, "Windowed Fullscreen")
                    .with_typed_option(WindowMode::Fullscreen, "Fullscreen")
                    .with_typed_default(WindowMode::default()),
            )
            .with_edit_condition(EditCondition::kill_if_missing(
                SUPPORTS_WINDOWED_MODE,
                "Platform does not support window mode",
            )),
        );

        let vsync = registry.create(
            discrete(
                "VerticalSync",
                "Vertical Sync",
                "Synchronizes the frame rate with the display to prevent <RichText.Bold>tearing</>.",
                property::VSYNC,
                DiscreteValue::new()
                    .with_typed_option(VsyncMode::Off, "Off")
                    .with_typed_option(VsyncMode::On, "On")
                    .with_typed_option(VsyncMode::Adaptive, "Adaptive")
                    .with_typed_default(VsyncMode::default()),
            )
            .with_edit_condition(EditCondition::FramePacing {
                mode: FramePacingMode::DesktopStyle,
                matching: FramePacingMatch::EnableIf,
            }),
        );

        let max_fps = registry.create(
            discrete(
                "FrameRateLimit",
                "Frame Rate Limit",
                "Caps the frame rate when vertical sync is off.",
                property::MAX_FPS,
                DiscreteValue::numeric()
                    .with_typed_option(30_u32, "30")
                    .with_typed_option(60_u32, "60")
                    .with_typed_option(120_u32, "120")
                    .with_typed_option(0_u32, "Unlimited")
                    .with_typed_default(0_u32),
            )
            .with_edit_condition(EditCondition::FramePacing {
                mode: FramePacingMode::DesktopStyle,
                matching: FramePacingMatch::EnableIf,
            })
            .with_edit_condition(EditCondition::when("VsyncOff", move |ctx, state| {
                let mode = ctx.value_as_string(vsync).and_then(|v| VsyncMode::decode(&v));
                if mode != Some(VsyncMode::Off) {
                    state.disable("Turn off vertical sync to limit the frame rate.");
                }
            })),
        );

        let fov = registry.create(
            Setting::scalar(
                "FieldOfView",
                ScalarValue::new(60.0, 120.0, 1.0)
                    .with_source(PropertySource::shared(property::FOV))
                    .with_default(75.0)
                    .with_minimum_limit(60.0)
                    .with_maximum_limit(120.0)
                    .with_format(ScalarFormat::SourceAsInteger),
            )
            .with_display_name("Field of View")
            .with_description("Horizontal field of view in degrees."),
        );

        let quality = registry.create(
            discrete(
                "QualityPreset",
                "Quality Preset",
                "Overall graphics quality.",
                property::QUALITY,
                DiscreteValue::new()
                    .with_typed_option(QualityLevel::Low, "Low")
                    .with_typed_option(QualityLevel::Medium, "Medium")
                    .with_typed_option(QualityLevel::High, "High")
                    .with_typed_option(QualityLevel::Ultra, "Ultra")
                    .with_typed_default(QualityLevel::default()),
            )
            .with_edit_condition(EditCondition::GranularVideoQuality {
                kill_reason: "Platform does not support granular video quality".to_string(),
            }),
        );

        for child in [window_mode, vsync, max_fps, fov, quality] {
            registry.add_setting(video, child)?;
        }
        registry.add_edit_dependency(max_fps, vsync)?;
        Ok(video)
    }

    fn build_audio(registry: &mut SettingRegistry) -> SettingsResult<SettingId> {
        let audio = registry.create(
            Setting::collection("Audio")
                .with_display_name("Audio")
                .with_description("Volume and subtitle options"),
        );

        let master = registry.create(volume("MasterVolume", "Master Volume", property::MASTER_VOLUME, 0.8));
        let music = registry.create(volume("MusicVolume", "Music Volume", property::MUSIC_VOLUME, 0.7));
        let sfx = registry.create(volume("EffectsVolume", "Effects Volume", property::SFX_VOLUME, 1.0));

        let subtitles_page = registry.create(
            Setting::page("SubtitlePage", "Options")
                .with_display_name("Subtitles")
                .with_description("Subtitle display options"),
        );
        let subtitles = registry.create(discrete(
            "SubtitlesEnabled",
            "Subtitles",
            "Show subtitles for dialogue.",
            property::SUBTITLES_ENABLED,
            DiscreteValue::boolean().with_typed_default(false),
        ));
        let subtitles_off = move |ctx: &crate::edit_condition::EditConditionContext<'_>,
                                  state: &mut crate::editable_state::EditableState| {
            let enabled = ctx.value_as_string(subtitles).and_then(|v| bool::decode(&v));
            if enabled != Some(true) {
                state.disable("Subtitles are turned off.");
            }
        };
        let size = registry.create(
            discrete(
                "SubtitleTextSize",
                "Text Size",
                "Size of the subtitle text.",
                property::SUBTITLE_SIZE,
                DiscreteValue::new()
                    .with_typed_option(SubtitleSize::Small, "Small")
                    .with_typed_option(SubtitleSize::Medium, "Medium")
                    .with_typed_option(SubtitleSize::Large, "Large")
                    .with_typed_default(SubtitleSize::default()),
            )
            .with_edit_condition(EditCondition::when("SubtitlesOn", subtitles_off)),
        );
        let color = registry.create(
            discrete(
                "SubtitleTextColor",
                "Text Color",
                "Color of the subtitle text.",
                property::SUBTITLE_COLOR,
                DiscreteValue::colors(&SUBTITLE_COLORS).with_typed_default(LinearColor::WHITE),
            )
            .with_edit_condition(EditCondition::when("SubtitlesOn", subtitles_off)),
        );

        for child in [master, music, sfx, subtitles_page] {
            registry.add_setting(audio, child)?;
        }
        for child in [subtitles, size, color] {
            registry.add_setting(subtitles_page, child)?;
        }
        registry.add_edit_dependency(size, subtitles)?;
        registry.add_edit_dependency(color, subtitles)?;
        Ok(audio)
    }

    fn build_gameplay(registry: &mut SettingRegistry) -> SettingsResult<SettingId> {
        let gameplay = registry.create(
            Setting::collection("Gameplay")
                .with_display_name("Gameplay")
                .with_description("Difficulty and interface options"),
        );

        let difficulty = registry.create(discrete(
            "Difficulty",
            "Difficulty",
            "Hardcore enables permadeath.",
            property::DIFFICULTY,
            DiscreteValue::new()
                .with_typed_option(GameDifficulty::Peaceful, "Peaceful")
                .with_typed_option(GameDifficulty::Easy, "Easy")
                .with_typed_option(GameDifficulty::Normal, "Normal")
                .with_typed_option(GameDifficulty::Hard, "Hard")
                .with_typed_option(GameDifficulty::Hardcore, "Hardcore")
                .with_typed_default(GameDifficulty::default()),
        ));

        let auto_save = registry.create(discrete(
            "AutoSaveInterval",
            "Auto-Save",
            "Minutes between automatic saves.",
            property::AUTO_SAVE_INTERVAL,
            DiscreteValue::numeric()
                .with_typed_option(0_u32, "Off")
                .with_typed_option(5_u32, "5 Minutes")
                .with_typed_option(10_u32, "10 Minutes")
                .with_typed_option(15_u32, "15 Minutes")
                .with_typed_default(5_u32),
        ));

        let tutorials = registry.create(discrete(
            "ShowTutorials",
            "Tutorials",
            "Show tutorial prompts.",
            property::SHOW_TUTORIALS,
            DiscreteValue::boolean().with_typed_default(true),
        ));

        let reset_tutorials = registry.create(
            Setting::action(
                "ResetTutorials",
                ActionSetting::new("Reset")
                    .with_custom_action(|player| {
                        player.set_property(property::SHOW_TUTORIALS, true.encode());
                    })
                    .with_dirty_action(true),
            )
            .with_display_name("Reset Tutorials")
            .with_description("Show every tutorial prompt again."),
        );

        let safe_zone = registry.create(
            Setting::action(
                "SafeZone",
                ActionSetting::new("Edit").with_named_action(EDIT_SAFE_ZONE_ACTION),
            )
            .with_display_name("Safe Zone")
            .with_description("Adjust the screen area the interface is drawn in."),
        );

        for child in [difficulty, auto_save, tutorials, reset_tutorials, safe_zone] {
            registry.add_setting(gameplay, child)?;
        }
        registry.add_edit_dependency(tutorials, reset_tutorials)?;
        Ok(gameplay)
    }

    fn build_performance_stats(registry: &mut SettingRegistry) -> SettingsResult<SettingId> {
        let page = registry.create(
            Setting::page("PerfStatsPage", "Edit")
                .with_display_name("Performance Stats")
                .with_description("Configure which performance statistics are shown."),
        );

        let stats = registry.create(
            discrete(
                "LatencyTrackingStats",
                "Enable Latency Tracking Stats",
                "Tracks input latency so it can be shown in the performance stats.",
                LATENCY_STATS_PROPERTY,
                DiscreteValue::boolean().with_typed_default(false),
            )
            .with_edit_condition(EditCondition::LatencyStatsSupported),
        );

        let markers = registry.create(
            discrete(
                "LatencyMarkers",
                "Enable Latency Markers",
                "Adds markers to frames to measure system latency.",
                property::LATENCY_MARKERS,
                DiscreteValue::boolean().with_typed_default(false),
            )
            .with_edit_condition(EditCondition::LatencyMarkersSupported)
            .with_edit_condition(EditCondition::LatencyStatsEnabled),
        );

        let flash = registry.create(
            discrete(
                "LatencyFlashIndicators",
                "Latency Flash Indicator",
                "Flashes the screen when the mouse is clicked so latency can be measured.",
                property::LATENCY_FLASH,
                DiscreteValue::boolean().with_typed_default(false),
            )
            .with_edit_condition(EditCondition::LatencyMarkersSupported)
            .with_edit_condition(EditCondition::LatencyStatsEnabled),
        );

        for child in [stats, markers, flash] {
            registry.add_setting(page, child)?;
        }
        registry.add_edit_dependency(markers, stats)?;
        registry.add_edit_dependency(flash, stats)?;
        registry.add_edit_dependency(stats, markers)?;
        Ok(page)
    }
}

impl RegistryBuilder for GameSettingsBuilder {
    fn build(&self, registry: &mut SettingRegistry) -> SettingsResult<()> {
        define_default_properties(registry.player());

        let video = Self::build_video(registry)?;
        registry.register_setting(video)?;
        let audio = Self::build_audio(registry)?;
        registry.register_setting(audio)?;
        let gameplay = Self::build_gameplay(registry)?;
        registry.register_setting(gameplay)?;
        let stats = Self::build_performance_stats(registry)?;
        registry.register_setting(stats)?;

        debug!(settings = registry.registered_settings().len(), "Built game settings");
        Ok(())
    }

    fn on_setting_applied(&self, registry: &SettingRegistry, setting: SettingId) {
        if let Some(setting) = registry.setting(setting) {
            trace!(setting = %setting.dev_name(), "Game setting applied");
            self.applied.lock().push(setting.dev_name().to_string());
        }
    }

    fn save_changes(&self, registry: &SettingRegistry) {
        let mut saved = self.saved.lock();
        saved.clear();
        for &id in registry.registered_settings() {
            let Some(setting) = registry.setting(id) else {
                continue;
            };
            if let Some(value) = setting.value_as_string(registry.player()) {
                saved.insert(setting.dev_name().to_string(), value);
            }
        }
        debug!(values = saved.len(), "Saved game settings");
    }
}
