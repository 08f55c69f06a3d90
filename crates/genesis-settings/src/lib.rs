//! # Genesis Settings
//!
//! Settings registry for the in-game options screens.
//!
//! This crate provides the in-memory settings engine:
//! - Settings tree (values, actions, collections, pages) in a generational arena
//! - Discrete and scalar value settings bound to player data sources
//! - Edit conditions that show, hide, enable or disable settings
//! - Edit dependencies between settings
//! - Filtering and search for the options UI
//! - Change tracking with apply and restore
//! - The standard game settings tree
//!
//! ```
//! use std::sync::Arc;
//! use genesis_settings::prelude::*;
//!
//! let player = Arc::new(LocalPlayer::new("Player 1"));
//! let mut registry = SettingRegistry::with_builder(player, GameSettingsBuilder::shared())?;
//! let mut tracker = RegistryChangeTracker::new();
//! tracker.watch_registry(&mut registry);
//!
//! let fov = registry.find_setting_by_dev_name("FieldOfView").expect("built");
//! registry.set_scalar_value(fov, 90.0)?;
//! assert!(tracker.have_settings_been_changed());
//!
//! tracker.restore_to_initial(&mut registry)?;
//! assert_eq!(registry.scalar_value(fov), Some(75.0));
//! # Ok::<(), SettingsError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod arena;
pub mod change_tracker;
pub mod codec;
pub mod data_source;
pub mod discrete;
pub mod edit_condition;
pub mod editable_state;
pub mod error;
pub mod filter;
pub mod game;
pub mod ids;
pub mod player;
pub mod registry;
pub mod scalar;
pub mod setting;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arena::*;
    pub use crate::change_tracker::*;
    pub use crate::codec::*;
    pub use crate::data_source::*;
    pub use crate::discrete::*;
    pub use crate::edit_condition::*;
    pub use crate::editable_state::*;
    pub use crate::error::*;
    pub use crate::filter::*;
    pub use crate::game::*;
    pub use crate::ids::*;
    pub use crate::player::*;
    pub use crate::registry::*;
    pub use crate::scalar::*;
    pub use crate::setting::*;
}

pub use prelude::*;
