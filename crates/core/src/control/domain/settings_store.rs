use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use super::tracking_settings::{SettingsUpdate, TrackingSettings};

/// Live tracking settings shared between the API and the tracking loop.
///
/// Readers take an immutable snapshot per tick, so a tick never sees half of
/// an update. Each accepted change bumps the version.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<RwLock<Versioned>>,
}

struct Versioned {
    settings: Arc<TrackingSettings>,
    version: u64,
}

impl SettingsStore {
    pub fn new(settings: TrackingSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Versioned {
                settings: Arc::new(settings),
                version: 0,
            })),
        }
    }

    pub fn snapshot(&self) -> Arc<TrackingSettings> {
        self.read(|v| v.settings.clone())
    }

    pub fn version(&self) -> u64 {
        self.read(|v| v.version)
    }

    /// Snapshot and version read under the same lock.
    pub fn versioned_snapshot(&self) -> (Arc<TrackingSettings>, u64) {
        self.read(|v| (v.settings.clone(), v.version))
    }

    /// Swaps in a whole new record.
    pub fn replace(&self, settings: TrackingSettings) -> u64 {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.settings = Arc::new(settings);
        guard.version += 1;
        guard.version
    }

    /// Lenient merge of a partial update; see [`TrackingSettings::merge`].
    pub fn merge(&self, partial: &Map<String, Value>) -> SettingsUpdate {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut next = (*guard.settings).clone();
        let mut update = next.merge(partial);
        if update.changed() {
            guard.settings = Arc::new(next);
            guard.version += 1;
        }
        update.version = guard.version;
        update
    }

    fn read<T>(&self, f: impl FnOnce(&Versioned) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(TrackingSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn partial(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_snapshot_survives_later_updates() {
        let store = SettingsStore::default();
        let before = store.snapshot();
        store.merge(&partial(json!({ "deadzone_x": 80 })));
        assert_eq!(before.deadzone_x, 50);
        assert_eq!(store.snapshot().deadzone_x, 80);
    }

    #[test]
    fn test_version_bumps_only_on_change() {
        let store = SettingsStore::default();
        assert_eq!(store.version(), 0);

        let update = store.merge(&partial(json!({ "unknown_key": 1 })));
        assert_eq!(update.version, 0);

        let update = store.merge(&partial(json!({ "rotation_speed": 40 })));
        assert_eq!(update.version, 1);

        assert_eq!(store.replace(TrackingSettings::default()), 2);
        assert_eq!(store.versioned_snapshot().1, 2);
    }

    #[test]
    fn test_clones_share_state() {
        let store = SettingsStore::default();
        let other = store.clone();
        other.merge(&partial(json!({ "face_size_min": 10 })));
        assert_eq!(store.snapshot().face_size_min, 10);
    }

    #[test]
    fn test_concurrent_merges_all_land() {
        let store = SettingsStore::default();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.merge(&partial(json!({ "deadzone_x": 10 + i })));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.version(), 8);
        assert!((10..18).contains(&store.snapshot().deadzone_x));
    }
}
