//! Keyed item store persisted as a single JSON file.
//!
//! Writes are atomic (temp file + rename) so a crash mid-write never
//! corrupts existing records. A corrupted file on load is backed up and
//! replaced with an empty store rather than crashing the process. Callers
//! reload before each polling pass to tolerate concurrent external edits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{error, info, warn};

use crate::error::TrackError;
use crate::models::{ExtractionResult, TrackedItem};
use crate::sites::{adapter_for, detect_site, SiteAdapter};

pub struct ItemStore {
    path: PathBuf,
    items: HashMap<String, TrackedItem>,
}

impl ItemStore {
    /// Open (or initialize) the store at the given path.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = load_items(&path);
        Self { path, items }
    }

    /// Re-read the store from disk, dropping in-memory state.
    pub fn reload(&mut self) {
        self.items = load_items(&self.path);
    }

    /// Persist all items atomically.
    pub fn save(&self) -> Result<(), TrackError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.items)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Create a new tracked item after validating the URL against a site
    /// adapter. No network call is made here.
    pub fn create(
        &mut self,
        url: &str,
        target_price: f64,
        tag: Option<String>,
    ) -> Result<TrackedItem, TrackError> {
        if target_price <= 0.0 {
            return Err(TrackError::InvalidInput(format!(
                "target price must be positive, got {}",
                target_price
            )));
        }
        let site = detect_site(url).ok_or_else(|| {
            TrackError::InvalidInput(format!("unsupported or non-product URL: {}", url))
        })?;
        debug_assert!(adapter_for(site).is_valid_url(url));

        let item = TrackedItem::new(url, target_price, site, tag);
        self.items.insert(item.id.clone(), item.clone());
        self.save()?;
        info!(
            "Tracking {} on {} (target ₹{})",
            item.url, item.site, item.target_price
        );
        Ok(item)
    }

    pub fn get(&self, id: &str) -> Option<&TrackedItem> {
        self.items.get(id)
    }

    /// All tracked items, oldest first by id for stable listings.
    pub fn list(&self) -> Vec<TrackedItem> {
        let mut items: Vec<_> = self.items.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Delete an item. Returns false when the id is unknown.
    pub fn delete(&mut self, id: &str) -> Result<bool, TrackError> {
        match self.items.remove(id) {
            Some(item) => {
                self.save()?;
                info!(
                    "Stopped tracking {}",
                    item.title.as_deref().unwrap_or(&item.url)
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fold a successful extraction result into an item's observed state.
    ///
    /// Failed results are rejected here so a failed cycle can never zero
    /// out a previously known price.
    pub fn update_observed(
        &mut self,
        id: &str,
        result: &ExtractionResult,
    ) -> Result<bool, TrackError> {
        if !result.success {
            return Ok(false);
        }
        let Some(item) = self.items.get_mut(id) else {
            return Ok(false);
        };
        item.apply_result(result);
        self.save()?;
        Ok(true)
    }
}

fn load_items(path: &Path) -> HashMap<String, TrackedItem> {
    if !path.exists() {
        return HashMap::new();
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to read item store {:?}: {}", path, e);
            return HashMap::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            // Keep the evidence, start empty.
            error!("Item store {:?} is corrupted: {}", path, e);
            let ts = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let backup = path.with_extension(format!("json.bak.{}", ts));
            match std::fs::copy(path, &backup) {
                Ok(_) => warn!("Backed up corrupted store to {:?}", backup),
                Err(e) => error!("Failed to back up corrupted store: {}", e),
            }
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> ItemStore {
        ItemStore::open(dir.path().join("items.json"))
    }

    #[test]
    fn create_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        let item = store
            .create("https://www.amazon.in/dp/B0ABC12345", 28000.0, None)
            .unwrap();
        assert_eq!(item.site, crate::models::Site::Amazon);

        let mut reopened = store_in(&dir);
        reopened.reload();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get(&item.id).unwrap().target_price, 28000.0);
    }

    #[test]
    fn create_rejects_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        assert!(matches!(
            store.create("https://example.com/p/1", 100.0, None),
            Err(TrackError::InvalidInput(_))
        ));
        assert!(matches!(
            store.create("https://www.amazon.in/dp/B0ABC12345", 0.0, None),
            Err(TrackError::InvalidInput(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let item = store
            .create("https://www.amazon.in/dp/B0ABC12345", 500.0, None)
            .unwrap();

        assert!(store.delete(&item.id).unwrap());
        assert!(!store.delete(&item.id).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn failed_result_never_regresses_observed_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let item = store
            .create("https://www.amazon.in/dp/B0ABC12345", 28000.0, None)
            .unwrap();

        let mut good = ExtractionResult::failure(&item.url, "");
        good.success = true;
        good.error = None;
        good.title = "Widget".into();
        good.price = 25000.0;
        good.in_stock = true;
        store.update_observed(&item.id, &good).unwrap();

        let bad = ExtractionResult::failure(&item.url, "all fetch strategies exhausted");
        assert!(!store.update_observed(&item.id, &bad).unwrap());
        assert_eq!(store.get(&item.id).unwrap().current_price, Some(25000.0));
    }

    #[test]
    fn corrupted_store_backs_up_and_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, "{not valid json").unwrap();

        let store = ItemStore::open(&path);
        assert!(store.is_empty());

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn legacy_flat_coupon_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(
            &path,
            r#"{
                "old-id": {
                    "id": "old-id",
                    "url": "https://www.amazon.in/dp/B0ABC12345",
                    "target_price": 999.0,
                    "site": "amazon",
                    "coupon": "Flat ₹100 off with coupon"
                }
            }"#,
        )
        .unwrap();

        let store = ItemStore::open(&path);
        let coupon = store.get("old-id").unwrap().coupon.clone().unwrap();
        assert!(coupon.available);
        assert_eq!(coupon.description, "Flat ₹100 off with coupon");
    }
}
