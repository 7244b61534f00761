//! Gesture profile storage
//!
//! The classifier only ever sees a snapshot; stores own the durable list and
//! callers push a fresh snapshot into the classifier after every change.

use anyhow::Context;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::classifier::GestureProfile;

/// Somewhere gesture profiles live between runs.
pub trait ProfileStore {
    fn load_profiles(&self) -> anyhow::Result<Vec<GestureProfile>>;
    fn save_profiles(&self, profiles: &[GestureProfile]) -> anyhow::Result<()>;
}

/// Profiles as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add `profile`, replacing any existing profile for the same character.
    /// Returns the updated list.
    pub fn upsert(&self, profile: GestureProfile) -> anyhow::Result<Vec<GestureProfile>> {
        let mut profiles = self.load_profiles()?;
        match profiles.iter_mut().find(|p| p.character == profile.character) {
            Some(existing) => {
                debug!("Replacing profile for {:?}", profile.character);
                *existing = profile;
            }
            None => profiles.push(profile),
        }
        self.save_profiles(&profiles)?;
        Ok(profiles)
    }

    /// Delete the profile for `character`. Returns whether one existed.
    pub fn remove(&self, character: &str) -> anyhow::Result<bool> {
        let mut profiles = self.load_profiles()?;
        let before = profiles.len();
        profiles.retain(|p| p.character != character);
        if profiles.len() == before {
            return Ok(false);
        }
        self.save_profiles(&profiles)?;
        Ok(true)
    }
}

impl ProfileStore for JsonProfileStore {
    fn load_profiles(&self) -> anyhow::Result<Vec<GestureProfile>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read profiles {}", self.path.display()));
            }
        };
        let profiles: Vec<GestureProfile> = serde_json::from_str(&text)
            .with_context(|| format!("Invalid profiles file {}", self.path.display()))?;
        debug!("Loaded {} profiles from {}", profiles.len(), self.path.display());
        Ok(profiles)
    }

    fn save_profiles(&self, profiles: &[GestureProfile]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(profiles)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write profiles {}", self.path.display()))?;
        info!("Saved {} profiles to {}", profiles.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ProfileLandmark;
    use crate::landmarks::JointName;

    fn profile(character: &str, x: f32) -> GestureProfile {
        GestureProfile::new(character, vec![ProfileLandmark::new(JointName::Wrist, x, 0.5)])
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonProfileStore::new(dir.path().join("profiles.json"));
        assert!(store.load_profiles().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_same_character() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonProfileStore::new(dir.path().join("nested/profiles.json"));
        store.upsert(profile("A", 0.1)).unwrap();
        store.upsert(profile("B", 0.2)).unwrap();
        let profiles = store.upsert(profile("A", 0.3)).unwrap();

        assert_eq!(profiles.len(), 2);
        let reloaded = store.load_profiles().unwrap();
        assert_eq!(reloaded, profiles);
        assert_eq!(reloaded[0].character, "A");
        assert_eq!(reloaded[0].landmarks[0].x, 0.3);
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonProfileStore::new(dir.path().join("profiles.json"));
        store.upsert(profile("A", 0.1)).unwrap();
        assert!(store.remove("A").unwrap());
        assert!(!store.remove("A").unwrap());
        assert!(store.load_profiles().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, "{not json").unwrap();
        assert!(JsonProfileStore::new(path).load_profiles().is_err());
    }

    #[test]
    fn test_reads_profiles_without_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(
            &path,
            r#"[{"character":"H","landmarks":[{"joint":"indexTip","x":0.4,"y":0.7}]}]"#,
        )
        .unwrap();
        let profiles = JsonProfileStore::new(path).load_profiles().unwrap();
        assert_eq!(profiles[0].landmarks[0].joint, JointName::IndexTip);
        assert_eq!(profiles[0].landmarks[0].z, 0.0);
    }
}
