//! Data sources: where a value setting reads and writes its value.
//!
//! The settings tree never stores values. A value setting holds a getter and
//! a setter data source and goes through them for every read and write.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::trace;

use crate::ids::SettingId;
use crate::player::LocalPlayer;

/// One-shot "data source is ready" notification for a setting.
#[derive(Debug)]
pub struct ReadySignal {
    setting: SettingId,
    sender: Sender<SettingId>,
}

impl ReadySignal {
    /// Create a signal that reports `setting` on `sender`.
    #[must_use]
    pub fn new(setting: SettingId, sender: Sender<SettingId>) -> Self {
        Self { setting, sender }
    }

    /// Setting waiting on this signal.
    #[must_use]
    pub const fn setting(&self) -> SettingId {
        self.setting
    }

    /// Report readiness. Picked up the next time the registry pumps.
    pub fn complete(self) {
        if self.sender.send(self.setting).is_err() {
            trace!(setting = %self.setting, "Registry gone before data source became ready");
        }
    }
}

/// Reads and writes a setting's value on the local player.
pub trait DataSource: Send + Sync {
    /// Can this source be used with the given player?
    fn resolve(&self, player: &LocalPlayer) -> bool;

    /// Current value in its canonical string form. Empty if unset.
    fn value_as_string(&self, player: &LocalPlayer) -> String;

    /// Write a value in its canonical string form.
    fn set_value(&self, player: &LocalPlayer, value: &str);

    /// Debug description.
    fn describe(&self) -> String;

    /// Begin any asynchronous work needed before the value can be read.
    ///
    /// The default implementation is ready immediately.
    fn startup(&self, _player: &LocalPlayer, ready: ReadySignal) {
        ready.complete();
    }
}

impl fmt::Debug for dyn DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Reads and writes a named player property.
#[derive(Debug, Clone)]
pub struct PropertySource {
    property: String,
}

impl PropertySource {
    /// Bind to a property name.
    #[must_use]
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }

    /// Shared handle, ready to be used as getter and setter.
    #[must_use]
    pub fn shared(property: impl Into<String>) -> Arc<dyn DataSource> {
        Arc::new(Self::new(property))
    }

    /// Property name.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }
}

impl DataSource for PropertySource {
    fn resolve(&self, player: &LocalPlayer) -> bool {
        player.has_property(&self.property)
    }

    fn value_as_string(&self, player: &LocalPlayer) -> String {
        player.property(&self.property).unwrap_or_default()
    }

    fn set_value(&self, player: &LocalPlayer, value: &str) {
        player.set_property(&self.property, value);
    }

    fn describe(&self) -> String {
        format!("property '{}'", self.property)
    }
}

type Getter = dyn Fn(&LocalPlayer) -> String + Send + Sync;
type Setter = dyn Fn(&LocalPlayer, &str) + Send + Sync;

/// Data source backed by closures.
pub struct FnSource {
    name: String,
    getter: Box<Getter>,
    setter: Box<Setter>,
}

impl FnSource {
    /// Create a source from a getter and a setter.
    pub fn new(
        name: impl Into<String>,
        getter: impl Fn(&LocalPlayer) -> String + Send + Sync + 'static,
        setter: impl Fn(&LocalPlayer, &str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            getter: Box::new(getter),
            setter: Box::new(setter),
        }
    }
}

impl fmt::Debug for FnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource").field("name", &self.name).finish()
    }
}

impl DataSource for FnSource {
    fn resolve(&self, _player: &LocalPlayer) -> bool {
        true
    }

    fn value_as_string(&self, player: &LocalPlayer) -> String {
        (self.getter)(player)
    }

    fn set_value(&self, player: &LocalPlayer, value: &str) {
        (self.setter)(player, value);
    }

    fn describe(&self) -> String {
        format!("fn '{}'", self.name)
    }
}

/// Wraps a source whose value only becomes readable after some external event
/// (device enumeration, online profile download, ...).
///
/// Startup requests are parked until [`GatedSource::open`] is called.
pub struct GatedSource {
    inner: Arc<dyn DataSource>,
    open: AtomicBool,
    parked: Mutex<Vec<ReadySignal>>,
}

impl GatedSource {
    /// Wrap a source, starting closed.
    #[must_use]
    pub fn new(inner: Arc<dyn DataSource>) -> Self {
        Self {
            inner,
            open: AtomicBool::new(false),
            parked: Mutex::new(Vec::new()),
        }
    }

    /// Is the gate open?
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Open the gate and release every parked startup.
    pub fn open(&self) {
        self.open.store(true, Ordering::Release);
        let parked = std::mem::take(&mut *self.parked.lock());
        for signal in parked {
            signal.complete();
        }
    }
}

impl DataSource for GatedSource {
    fn resolve(&self, player: &LocalPlayer) -> bool {
        self.inner.resolve(player)
    }

    fn value_as_string(&self, player: &LocalPlayer) -> String {
        self.inner.value_as_string(player)
    }

    fn set_value(&self, player: &LocalPlayer, value: &str) {
        self.inner.set_value(player, value);
    }

    fn describe(&self) -> String {
        format!("gated {}", self.inner.describe())
    }

    fn startup(&self, player: &LocalPlayer, ready: ReadySignal) {
        if self.is_open() {
            self.inner.startup(player, ready);
        } else {
            self.parked.lock().push(ready);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_property_source() {
        let player = LocalPlayer::new("P1").with_property("fov", "75");
        let source = PropertySource::new("fov");
        let missing = PropertySource::new("nope");

        assert!(source.resolve(&player));
        assert!(!missing.resolve(&player));
        assert_eq!(source.value_as_string(&player), "75");
        assert_eq!(missing.value_as_string(&player), "");

        source.set_value(&player, "90");
        assert_eq!(player.property("fov").as_deref(), Some("90"));
        assert_eq!(source.describe(), "property 'fov'");
    }

    #[test]
    fn test_fn_source() {
        let player = LocalPlayer::new("P1").with_property("backing", "a");
        let source = FnSource::new(
            "backing",
            |p| p.property("backing").unwrap_or_default().to_uppercase(),
            |p, v| {
                p.set_property("backing", v.to_lowercase());
            },
        );

        assert_eq!(source.value_as_string(&player), "A");
        source.set_value(&player, "B");
        assert_eq!(player.property("backing").as_deref(), Some("b"));
    }

    #[test]
    fn test_default_startup_is_immediate() {
        let player = LocalPlayer::new("P1");
        let (tx, rx) = unbounded();
        let id = SettingId::from_raw(1, 0);

        PropertySource::new("x").startup(&player, ReadySignal::new(id, tx));
        assert_eq!(rx.try_recv().ok(), Some(id));
    }

    #[test]
    fn test_gated_source_parks_startup() {
        let player = LocalPlayer::new("P1");
        let (tx, rx) = unbounded();
        let id = SettingId::from_raw(2, 0);
        let gated = GatedSource::new(PropertySource::shared("x"));

        gated.startup(&player, ReadySignal::new(id, tx));
        assert!(rx.try_recv().is_err());

        gated.open();
        assert!(gated.is_open());
        assert_eq!(rx.try_recv().ok(), Some(id));
    }
}
