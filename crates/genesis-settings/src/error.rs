//! Error types for the settings registry.

use thiserror::Error;

use crate::ids::SettingId;

/// Errors raised when the settings tree is misused.
///
/// Tree integrity and identity problems are always reported, in every build
/// profile. Cosmetic problems (missing display text and similar) are logged as
/// warnings instead.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The handle does not refer to a live setting.
    #[error("Setting {0} does not exist (destroyed by regeneration or never created)")]
    StaleSetting(SettingId),

    /// The child already has a parent.
    #[error("Setting '{child}' already has a parent")]
    AlreadyParented {
        /// Dev name of the child
        child: String,
    },

    /// The child is already a member of the collection.
    #[error("Collection '{collection}' already contains '{child}'")]
    AlreadyMember {
        /// Dev name of the collection
        collection: String,
        /// Dev name of the child
        child: String,
    },

    /// The link would make a setting its own ancestor (or its own dependency).
    #[error("Linking '{child}' under '{parent}' would create a cycle")]
    Cycle {
        /// Dev name of the parent (or dependency)
        parent: String,
        /// Dev name of the child (or dependent)
        child: String,
    },

    /// Children can only be added to collections and pages.
    #[error("Setting '{0}' is not a collection")]
    NotACollection(String),

    /// The same setting was registered twice.
    #[error("Setting '{0}' has already been registered")]
    AlreadyRegistered(String),

    /// Two registered settings share a dev name.
    #[error("A setting with dev name '{0}' has already been registered")]
    DuplicateDevName(String),

    /// A discrete option key was added twice.
    #[error("Option '{option}' already exists on '{setting}'")]
    DuplicateOption {
        /// Dev name (or empty while detached) of the setting
        setting: String,
        /// Option key
        option: String,
    },

    /// Discrete option index outside of the option list.
    #[error("Option index {index} out of range (setting has {count} options)")]
    OptionIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of options
        count: usize,
    },

    /// A string value could not be parsed for this setting.
    #[error("Invalid value '{value}' for '{setting}'")]
    InvalidValue {
        /// Dev name of the setting
        setting: String,
        /// Rejected value
        value: String,
    },

    /// The operation does not apply to this kind of setting.
    #[error("Setting '{setting}' is not a {expected}")]
    WrongKind {
        /// Dev name of the setting
        setting: String,
        /// Expected kind
        expected: &'static str,
    },

    /// The change tracker was asked to act on a registry it does not watch.
    #[error("Change tracker is not watching this registry")]
    RegistryMismatch,

    /// Regeneration requested on a registry without a builder.
    #[error("Registry has no builder to regenerate from")]
    NoBuilder,

    /// Snapshot serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
