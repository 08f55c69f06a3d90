//! Generational storage for settings.

use crate::ids::SettingId;
use crate::setting::Setting;

#[derive(Debug)]
struct Slot {
    generation: u32,
    setting: Option<Setting>,
}

/// Owns every setting of a registry. Handles from a cleared arena stop resolving.
#[derive(Debug, Default)]
pub struct SettingArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl SettingArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a setting and return its handle.
    pub fn insert(&mut self, setting: Setting) -> SettingId {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.setting = Some(setting);
            return SettingId::from_raw(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            setting: Some(setting),
        });
        SettingId::from_raw(index, 0)
    }

    /// Look up a live setting.
    #[must_use]
    pub fn get(&self, id: SettingId) -> Option<&Setting> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.setting.as_ref())
    }

    /// Look up a live setting mutably.
    pub fn get_mut(&mut self, id: SettingId) -> Option<&mut Setting> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.setting.as_mut())
    }

    /// Does the handle refer to a live setting?
    #[must_use]
    pub fn contains(&self, id: SettingId) -> bool {
        self.get(id).is_some()
    }

    /// Destroy every setting. Existing handles become stale.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.setting.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index as u32);
        }
        // Reuse low indices first.
        self.free.reverse();
        self.len = 0;
    }

    /// Number of live settings.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Is the arena empty?
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live settings.
    pub fn iter(&self) -> impl Iterator<Item = (SettingId, &Setting)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.setting
                .as_ref()
                .map(|setting| (SettingId::from_raw(index as u32, slot.generation), setting))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena = SettingArena::new();
        let a = arena.insert(Setting::collection("A"));
        let b = arena.insert(Setting::collection("B"));

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).map(Setting::dev_name), Some("A"));
        assert_eq!(arena.get(b).map(Setting::dev_name), Some("B"));
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut arena = SettingArena::new();
        let a = arena.insert(Setting::collection("A"));
        arena.clear();

        assert!(arena.is_empty());
        assert!(!arena.contains(a));

        let reused = arena.insert(Setting::collection("A2"));
        assert_eq!(reused.index(), a.index());
        assert_ne!(reused, a);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(reused).map(Setting::dev_name), Some("A2"));
    }

    #[test]
    fn test_iter_skips_empty_slots() {
        let mut arena = SettingArena::new();
        arena.insert(Setting::collection("A"));
        arena.clear();
        arena.insert(Setting::collection("B"));

        let names: Vec<_> = arena.iter().map(|(_, s)| s.dev_name().to_string()).collect();
        assert_eq!(names, ["B"]);
    }
}
