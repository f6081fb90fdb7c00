use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MAX_ROW_LIMIT: u32 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub asset_root: PathBuf,
    pub public_asset_prefix: String,
    pub default_row_limit: u32,
    pub capability_ttl_secs: Option<u64>,
    pub max_logo_bytes: u64,
    pub max_document_bytes: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("storage/tenants"),
            public_asset_prefix: "/assets".to_string(),
            default_row_limit: 200,
            capability_ttl_secs: None,
            max_logo_bytes: 2 * 1024 * 1024,
            max_document_bytes: 20 * 1024 * 1024,
            log_dir: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path).map_err(|error| AppError::Io(error.to_string()))?;
        let settings: Settings = serde_json::from_slice(&bytes)?;
        Ok(settings.normalized())
    }

    pub fn apply_patch(&self, patch: serde_json::Value) -> AppResult<Self> {
        let mut current = serde_json::to_value(self)?;
        merge_json(&mut current, patch);
        let updated: Settings = serde_json::from_value(current)?;
        Ok(updated.normalized())
    }

    pub fn capability_ttl(&self) -> Option<Duration> {
        self.capability_ttl_secs.map(Duration::from_secs)
    }

    pub fn row_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_row_limit)
            .clamp(1, MAX_ROW_LIMIT)
    }

    fn normalized(mut self) -> Self {
        self.default_row_limit = self.default_row_limit.clamp(1, MAX_ROW_LIMIT);
        if self.public_asset_prefix.trim().is_empty() {
            self.public_asset_prefix = "/assets".to_string();
        }
        self
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::load(&dir.path().join("absent.json")).expect("settings");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults_and_clamps_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "assetRoot": "/srv/assets", "defaultRowLimit": 9000 }"#).expect("write");

        let settings = Settings::load(&path).expect("settings");
        assert_eq!(settings.asset_root, PathBuf::from("/srv/assets"));
        assert_eq!(settings.default_row_limit, MAX_ROW_LIMIT);
        assert_eq!(settings.public_asset_prefix, "/assets");
    }

    #[test]
    fn patch_merges_over_existing_values() {
        let settings = Settings::default()
            .apply_patch(serde_json::json!({ "capabilityTtlSecs": 30, "defaultRowLimit": 0 }))
            .expect("patched");
        assert_eq!(settings.capability_ttl(), Some(Duration::from_secs(30)));
        assert_eq!(settings.default_row_limit, 1);
        assert_eq!(settings.max_logo_bytes, Settings::default().max_logo_bytes);
    }

    #[test]
    fn row_limit_is_capped() {
        let settings = Settings::default();
        assert_eq!(settings.row_limit(None), 200);
        assert_eq!(settings.row_limit(Some(10)), 10);
        assert_eq!(settings.row_limit(Some(10_000)), MAX_ROW_LIMIT);
    }
}
