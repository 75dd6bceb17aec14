//! The save / switch / delete / list operations
//!
//! Each command receives the store and the display config client it works
//! on; nothing is shared between invocations.

use anyhow::{Context, Result};
use tracing::info;

use crate::display_config::{variant, DisplayConfig, StateSnapshot};
use crate::reconcile::{reconcile, ModeStrategy};
use crate::store::{ProfileStore, StoreError};

/// Capture the live display state under `name`
pub fn save_profile(
    client: &impl DisplayConfig,
    store: &impl ProfileStore,
    name: &str,
    overwrite: bool,
) -> Result<()> {
    if !overwrite && store.exists(name).context("Failed to check for an existing profile")? {
        return Err(StoreError::AlreadyExists(name.to_string()))
            .context("Refusing to replace the profile, pass --overwrite to replace it");
    }

    let state = client
        .read_current_state()
        .context("Failed to read the current display state")?;
    variant::check_references(&state).context("Current display state is inconsistent")?;
    for monitor in &state.monitors {
        info!(
            connector = %monitor.id.connector,
            name = monitor.display_name().unwrap_or("unknown"),
            "capturing monitor"
        );
    }

    let bytes = serde_json::to_vec_pretty(&state).context("Failed to serialize display state to JSON")?;
    store
        .store(name, &bytes)
        .with_context(|| format!("Failed to store profile '{name}'"))?;

    info!(profile = %name, serial = state.serial, "saved profile");
    Ok(())
}

/// Read and parse a saved profile
pub fn load_profile(store: &impl ProfileStore, name: &str) -> Result<StateSnapshot> {
    let bytes = store
        .load(name)
        .with_context(|| format!("Failed to load profile '{name}'"))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse profile '{name}'"))
}

/// Reapply a saved state against the live session
pub fn apply_profile(
    client: &impl DisplayConfig,
    name: &str,
    saved: &StateSnapshot,
    strategy: ModeStrategy,
) -> Result<()> {
    let live = client
        .read_current_state()
        .context("Failed to read the current display state")?;

    let request = reconcile(saved, &live, strategy)
        .with_context(|| format!("Cannot switch to profile '{name}'"))?;

    client
        .apply_layout(&request)
        .context("Failed to apply monitors config")?;

    info!(profile = %name, serial = request.serial, "switched profile");
    Ok(())
}

pub fn delete_profile(store: &impl ProfileStore, name: &str) -> Result<()> {
    store
        .delete(name)
        .with_context(|| format!("Failed to delete profile '{name}'"))?;
    info!(profile = %name, "deleted profile");
    Ok(())
}

pub fn list_profiles(store: &impl ProfileStore) -> Result<Vec<String>> {
    store.list().context("Failed to list profiles")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display_config::{
        ApplyMethod, ApplyRequest, ClientError, ConnectorAndMonitorId, DecodeError, LogicalMonitor,
        Monitor, MonitorMode, Properties, PropertyValue,
    };
    use crate::reconcile::ReconcileError;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// In-memory compositor: hands out `state`, records applied requests
    struct FakeDisplayConfig {
        state: StateSnapshot,
        reject: bool,
        applied: RefCell<Vec<ApplyRequest>>,
    }

    impl FakeDisplayConfig {
        fn new(state: StateSnapshot) -> Self {
            Self { state, reject: false, applied: RefCell::new(Vec::new()) }
        }
    }

    impl DisplayConfig for FakeDisplayConfig {
        fn read_current_state(&self) -> Result<StateSnapshot, ClientError> {
            Ok(self.state.clone())
        }

        fn apply_layout(&self, request: &ApplyRequest) -> Result<(), ClientError> {
            if self.reject || request.serial != self.state.serial {
                return Err(ClientError::Rejected {
                    method: "ApplyMonitorsConfig",
                    name: "org.freedesktop.DBus.Error.AccessDenied".to_string(),
                    detail: "The requested configuration is based on stale information".to_string(),
                });
            }
            self.applied.borrow_mut().push(request.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        files: RefCell<BTreeMap<String, Vec<u8>>>,
    }

    impl ProfileStore for MemoryStore {
        fn store(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
            crate::store::validate_name(name)?;
            self.files.borrow_mut().insert(name.to_string(), data.to_vec());
            Ok(())
        }

        fn load(&self, name: &str) -> Result<Vec<u8>, StoreError> {
            self.files
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(name.to_string()))
        }

        fn list(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.files.borrow().keys().cloned().collect())
        }

        fn delete(&self, name: &str) -> Result<(), StoreError> {
            self.files
                .borrow_mut()
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound(name.to_string()))
        }

        fn exists(&self, name: &str) -> Result<bool, StoreError> {
            Ok(self.files.borrow().contains_key(name))
        }
    }

    fn desk_state(serial: u32, current: &str) -> StateSnapshot {
        let id = ConnectorAndMonitorId::new("DP-1", "VSC", "VX2705", "W6Z213");
        let modes = ["1920x1080@60", "2560x1440@144"]
            .iter()
            .map(|m| MonitorMode {
                id: m.to_string(),
                width: if m.starts_with("1920") { 1920 } else { 2560 },
                height: if m.starts_with("1920") { 1080 } else { 1440 },
                refresh_rate: if m.ends_with("60") { 60.0 } else { 144.0 },
                preferred_scale: 1.0,
                supported_scales: vec![1.0, 2.0],
                properties: if *m == current {
                    BTreeMap::from([("is-current".to_string(), PropertyValue::Bool(true))])
                } else {
                    Properties::new()
                },
            })
            .collect();

        StateSnapshot {
            serial,
            monitors: vec![Monitor {
                id: id.clone(),
                modes,
                properties: BTreeMap::from([(
                    "display-name".to_string(),
                    PropertyValue::Text("ViewSonic".to_string()),
                )]),
            }],
            logical_monitors: vec![LogicalMonitor {
                x: 0,
                y: 0,
                scale: 1.0,
                transform: 0,
                primary: true,
                monitors: vec![id],
                properties: Properties::new(),
            }],
            properties: Properties::new(),
        }
    }

    #[test]
    fn test_save_writes_json_snapshot() {
        let client = FakeDisplayConfig::new(desk_state(11, "2560x1440@144"));
        let store = MemoryStore::default();

        save_profile(&client, &store, "work", false).unwrap();

        let bytes = store.load("work").unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["serial"], 11);
        assert_eq!(json["monitors"][0]["id"]["connector"], "DP-1");
        assert_eq!(json["monitors"][0]["modes"][1]["refresh_rate"], 144.0);
        assert_eq!(json["logical_monitors"][0]["primary"], true);
        assert!(json["properties"].is_object());
    }

    #[test]
    fn test_save_rejects_dangling_reference() {
        let mut state = desk_state(7, "1920x1080@60");
        state.logical_monitors[0].monitors[0].connector = "HDMI-9".to_string();
        let client = FakeDisplayConfig::new(state);
        let store = MemoryStore::default();

        let err = save_profile(&client, &store, "broken", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::DanglingMonitor { .. })
        ));
        assert!(!store.exists("broken").unwrap());
    }

    #[test]
    fn test_switch_ignores_dangling_live_reference() {
        let mut live_state = desk_state(9, "1920x1080@60");
        live_state.logical_monitors.push(LogicalMonitor {
            x: 1920,
            y: 0,
            scale: 1.0,
            transform: 0,
            primary: false,
            monitors: vec![ConnectorAndMonitorId::new("HDMI-9", "X", "Y", "Z")],
            properties: Properties::new(),
        });
        let live = FakeDisplayConfig::new(live_state);
        let saved = desk_state(1, "2560x1440@144");

        apply_profile(&live, "work", &saved, ModeStrategy::SavedId).unwrap();
        assert_eq!(live.applied.borrow()[0].serial, 9);
    }

    #[test]
    fn test_save_refuses_overwrite_without_flag() {
        let client = FakeDisplayConfig::new(desk_state(1, "1920x1080@60"));
        let store = MemoryStore::default();
        store.store("work", b"previous").unwrap();

        assert!(save_profile(&client, &store, "work", false).is_err());
        assert_eq!(store.load("work").unwrap(), b"previous");

        save_profile(&client, &store, "work", true).unwrap();
        assert_ne!(store.load("work").unwrap(), b"previous");
    }

    #[test]
    fn test_save_list_delete_scenario() {
        let client = FakeDisplayConfig::new(desk_state(1, "1920x1080@60"));
        let store = MemoryStore::default();

        save_profile(&client, &store, "work", false).unwrap();
        assert!(list_profiles(&store).unwrap().contains(&"work".to_string()));

        delete_profile(&store, "work").unwrap();
        assert!(!list_profiles(&store).unwrap().contains(&"work".to_string()));

        let err = load_profile(&store, "work").unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::NotFound(_))));
    }

    #[test]
    fn test_switch_restores_saved_mode_with_live_serial() {
        let store = MemoryStore::default();
        save_profile(&FakeDisplayConfig::new(desk_state(3, "2560x1440@144")), &store, "gaming", false).unwrap();

        let live = FakeDisplayConfig::new(desk_state(42, "1920x1080@60"));
        let saved = load_profile(&store, "gaming").unwrap();
        apply_profile(&live, "gaming", &saved, ModeStrategy::SavedId).unwrap();

        let applied = live.applied.borrow();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].serial, 42);
        assert_eq!(applied[0].method, ApplyMethod::Persistent);
        assert_eq!(applied[0].logical_monitors[0].monitors[0].mode, "2560x1440@144");
        assert!(applied[0].properties.is_empty());
    }

    #[test]
    fn test_switch_surfaces_rejection() {
        let mut live = FakeDisplayConfig::new(desk_state(5, "1920x1080@60"));
        live.reject = true;
        let saved = desk_state(1, "1920x1080@60");

        let err = apply_profile(&live, "work", &saved, ModeStrategy::SavedId).unwrap_err();
        assert!(matches!(err.downcast_ref::<ClientError>(), Some(ClientError::Rejected { .. })));
        assert!(live.applied.borrow().is_empty());
    }

    #[test]
    fn test_switch_inconsistent_profile_applies_nothing() {
        let live = FakeDisplayConfig::new(desk_state(5, "1920x1080@60"));
        let mut saved = desk_state(1, "1920x1080@60");
        for mode in &mut saved.monitors[0].modes {
            mode.properties.clear();
        }

        let err = apply_profile(&live, "broken", &saved, ModeStrategy::SavedId).unwrap_err();
        assert!(matches!(err.downcast_ref::<ReconcileError>(), Some(ReconcileError::NoCurrentMode(_))));
        assert!(live.applied.borrow().is_empty());
    }

    #[test]
    fn test_load_rejects_malformed_profile() {
        let store = MemoryStore::default();
        store.store("junk", b"{\"serial\": 1}").unwrap();
        assert!(load_profile(&store, "junk").is_err());
    }
}
