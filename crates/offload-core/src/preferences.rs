// SPDX-License-Identifier: AGPL-3.0
// Offload Core - Preferences persistence
//
// Mode, saved server profiles, and the active-profile pointer are stored in
// a local JSON file. No cloud sync, no tracking, just local persistence.

use crate::types::{AppError, Mode, Preferences, ServerProfile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use tokio::sync::watch;

/// On-disk document. The profile list is double-encoded as a JSON string
/// under `servers_json`, the layout of the settings container this store
/// replaced.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default)]
    mode: Option<Mode>,
    #[serde(default)]
    servers_json: String,
    #[serde(default)]
    active_server_id: Option<String>,
}

impl PreferencesFile {
    fn into_preferences(self) -> Preferences {
        let servers = decode_profiles(&self.servers_json);
        // The active pointer must reference an existing profile; anything
        // else (e.g. after a degraded decode) is cleared.
        let active_server_id = self
            .active_server_id
            .filter(|id| servers.iter().any(|s| &s.id == id));

        Preferences {
            mode: self.mode,
            servers,
            active_server_id,
        }
    }

    fn from_preferences(preferences: &Preferences) -> Result<Self, AppError> {
        Ok(Self {
            mode: preferences.mode,
            servers_json: encode_profiles(&preferences.servers)?,
            active_server_id: preferences.active_server_id.clone(),
        })
    }
}

fn encode_profiles(servers: &[ServerProfile]) -> Result<String, AppError> {
    serde_json::to_string(servers)
        .map_err(|e| AppError::Serialization(format!("Failed to serialize server list: {}", e)))
}

/// Decode the stored profile list, degrading to an empty list on corrupt
/// data rather than failing the read.
fn decode_profiles(raw: &str) -> Vec<ServerProfile> {
    if raw.is_empty() {
        return Vec::new();
    }

    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!("Failed to parse saved server list, starting empty: {}", e);
        Vec::new()
    })
}

/// In-memory snapshot of preferences, persisted to disk on every mutation
/// and observable through a watch channel.
pub struct PreferencesStore {
    state: RwLock<Preferences>,
    tx: watch::Sender<Preferences>,
    file_path: PathBuf,
}

impl PreferencesStore {
    /// Create a store at the platform config location, loading from disk if
    /// available.
    pub fn new() -> Result<Self, AppError> {
        Self::open(Self::preferences_path()?)
    }

    /// Create a store backed by the given file, loading it if present.
    pub fn open(file_path: PathBuf) -> Result<Self, AppError> {
        tracing::info!("Preferences file path: {:?}", file_path);

        let preferences = if file_path.exists() {
            tracing::info!("Loading preferences from disk");
            let content = fs::read_to_string(&file_path)
                .map_err(|e| AppError::FileIo(format!("Failed to read preferences: {}", e)))?;

            let file: PreferencesFile = serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse preferences, using defaults: {}", e);
                PreferencesFile::default()
            });

            file.into_preferences()
        } else {
            tracing::info!("No preferences file found, using defaults");
            Preferences::default()
        };

        let (tx, _) = watch::channel(preferences.clone());
        let store = Self {
            state: RwLock::new(preferences),
            tx,
            file_path,
        };

        // Persist defaults if the file doesn't exist yet
        if !store.file_path.exists() {
            tracing::info!("Creating initial preferences file");
            let snapshot = store.get();
            store.persist(&snapshot)?;
        }

        Ok(store)
    }

    /// Get the path to the preferences file
    fn preferences_path() -> Result<PathBuf, AppError> {
        let config_dir = directories::ProjectDirs::from("com", "offload", "offload")
            .ok_or_else(|| AppError::FileIo("Could not determine config directory".to_string()))?
            .config_dir()
            .to_path_buf();

        // Ensure the directory exists
        fs::create_dir_all(&config_dir)
            .map_err(|e| AppError::FileIo(format!("Failed to create config dir: {}", e)))?;

        Ok(config_dir.join("preferences.json"))
    }

    /// Persist a snapshot to disk. The temp-file-then-rename replace keeps
    /// the previous document intact if the write fails partway.
    fn persist(&self, preferences: &Preferences) -> Result<(), AppError> {
        let file = PreferencesFile::from_preferences(preferences)?;

        let content = serde_json::to_string_pretty(&file).map_err(|e| {
            AppError::Serialization(format!("Failed to serialize preferences: {}", e))
        })?;

        let tmp_path = self.file_path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| {
            AppError::FileIo(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        fs::rename(&tmp_path, &self.file_path)
            .map_err(|e| AppError::FileIo(format!("Failed to move preferences into place: {}", e)))?;

        Ok(())
    }

    /// Subscribe to preference snapshots. The receiver is primed with the
    /// current snapshot and notified after every successful mutation.
    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }

    /// Get the current snapshot
    pub fn get(&self) -> Preferences {
        self.state.read().unwrap().clone()
    }

    /// Apply one mutation. Disk comes first; memory and subscribers only see
    /// the new snapshot once it is durably committed.
    fn mutate(&self, apply: impl FnOnce(&mut Preferences)) -> Result<(), AppError> {
        let mut state = self.state.write().unwrap();
        let mut updated = state.clone();
        apply(&mut updated);

        if let Err(e) = self.persist(&updated) {
            tracing::error!("Failed to persist preferences: {}", e);
            return Err(e);
        }

        *state = updated.clone();
        // send_replace stores the snapshot even when nobody subscribes
        self.tx.send_replace(updated);
        Ok(())
    }

    /// Save a successful cloud login: upsert the profile (a replaced profile
    /// keeps its list position), make it active, switch to cloud mode.
    pub fn save_cloud_login(
        &self,
        server_address: &str,
        username: &str,
        password: &str,
        access_token: &str,
    ) -> Result<(), AppError> {
        let profile = ServerProfile::new(server_address, username, password, access_token);
        tracing::info!("Saving cloud login for {}", profile.id);

        self.mutate(|prefs| {
            let id = profile.id.clone();
            match prefs.servers.iter_mut().find(|s| s.id == id) {
                Some(existing) => *existing = profile,
                None => prefs.servers.push(profile),
            }
            prefs.mode = Some(Mode::Cloud);
            prefs.active_server_id = Some(id);
        })
    }

    /// Switch to local mode. Saved server profiles are kept.
    pub fn save_local_mode(&self) -> Result<(), AppError> {
        self.mutate(|prefs| {
            prefs.mode = Some(Mode::Local);
            prefs.active_server_id = None;
        })
    }

    /// Set the mode unconditionally. Cloud mode is not validated against an
    /// existing active server; consumers check `active_server()` themselves.
    pub fn set_mode(&self, mode: Mode) -> Result<(), AppError> {
        self.mutate(|prefs| {
            prefs.mode = Some(mode);
        })
    }

    /// Make the given profile active and force cloud mode. Silently a no-op
    /// when no profile has that id.
    pub fn set_active_server(&self, id: &str) -> Result<(), AppError> {
        self.mutate(|prefs| {
            if prefs.servers.iter().any(|s| s.id == id) {
                prefs.active_server_id = Some(id.to_string());
                prefs.mode = Some(Mode::Cloud);
            }
        })
    }

    /// Remove a profile. Removing the last profile falls back to local mode;
    /// removing the active profile repoints to the first remaining one.
    pub fn remove_server(&self, id: &str) -> Result<(), AppError> {
        self.mutate(|prefs| {
            let was_active = prefs.active_server_id.as_deref() == Some(id);
            let before = prefs.servers.len();
            prefs.servers.retain(|s| s.id != id);
            if prefs.servers.len() == before {
                return;
            }

            if prefs.servers.is_empty() {
                prefs.active_server_id = None;
                prefs.mode = Some(Mode::Local);
            } else if was_active {
                prefs.active_server_id = prefs.servers.first().map(|s| s.id.clone());
            }
        })
    }
}
