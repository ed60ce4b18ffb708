//! Device-local cache for the unauthenticated practice flow.

use crate::core::io::Storage;
use crate::core::model::{ExtractedStructure, FrameworkStories};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub const PRACTICE_LOGLINE: &str = "practice_logline";
pub const PRACTICE_STORIES: &str = "practice_stories";
pub const PRACTICE_PLOT_POINTS: &str = "practice_plot_points";
pub const PRACTICE_EXTRACTED_STRUCTURE: &str = "practice_extracted_structure";

/// JSON values stored one file per key. Failures are logged and swallowed.
pub struct LocalCache {
    storage: Arc<dyn Storage>,
    folder: String,
}

impl LocalCache {
    pub fn new(storage: Arc<dyn Storage>, data_folder: &str) -> Self {
        Self {
            storage,
            folder: Path::new(data_folder)
                .join("cache")
                .to_string_lossy()
                .into_owned(),
        }
    }

    fn path(&self, key: &str) -> String {
        Path::new(&self.folder)
            .join(format!("{}.json", key))
            .to_string_lossy()
            .into_owned()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let content = match self.storage.read_string(&self.path(key)).await {
            Ok(content) => content?,
            Err(e) => {
                warn!("Failed to read cached {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring unreadable cached {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let content = match serde_json::to_string(value) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to encode {} for cache: {}", key, e);
                return;
            }
        };
        match self.storage.write(&self.path(key), content.as_bytes()).await {
            Ok(()) => debug!("Cached {}", key),
            Err(e) => warn!("Failed to cache {}: {}", key, e),
        }
    }

    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.storage.delete(&self.path(key)).await {
            warn!("Failed to clear cached {}: {}", key, e);
        }
    }

    /// Writes `value`, or removes the key when there is nothing to keep.
    pub async fn put<T: Serialize>(&self, key: &str, value: Option<&T>) {
        match value {
            Some(value) => self.set(key, value).await,
            None => self.remove(key).await,
        }
    }
}

/// Practice artifacts mirrored into the cache on every change.
pub struct PracticeStore {
    cache: LocalCache,
    logline: String,
    stories: FrameworkStories,
    plot_points: Option<Vec<String>>,
    extracted_structure: Option<ExtractedStructure>,
}

impl PracticeStore {
    /// Restores whatever the cache holds from an earlier run.
    pub async fn open(cache: LocalCache) -> Self {
        let logline = cache.get(PRACTICE_LOGLINE).await.unwrap_or_default();
        let stories = cache.get(PRACTICE_STORIES).await.unwrap_or_default();
        let plot_points = cache.get(PRACTICE_PLOT_POINTS).await;
        let extracted_structure = cache.get(PRACTICE_EXTRACTED_STRUCTURE).await;
        Self {
            cache,
            logline,
            stories,
            plot_points,
            extracted_structure,
        }
    }

    pub fn logline(&self) -> &str {
        &self.logline
    }

    pub fn stories(&self) -> &FrameworkStories {
        &self.stories
    }

    pub fn plot_points(&self) -> Option<&[String]> {
        self.plot_points.as_deref()
    }

    pub fn extracted_structure(&self) -> Option<&ExtractedStructure> {
        self.extracted_structure.as_ref()
    }

    pub async fn set_logline(&mut self, logline: impl Into<String>) {
        self.logline = logline.into();
        if self.logline.is_empty() {
            self.cache.remove(PRACTICE_LOGLINE).await;
        } else {
            self.cache.set(PRACTICE_LOGLINE, &self.logline).await;
        }
    }

    pub async fn set_stories(&mut self, stories: FrameworkStories) {
        self.stories = stories;
        let value = (!self.stories.is_empty()).then_some(&self.stories);
        self.cache.put(PRACTICE_STORIES, value).await;
    }

    pub async fn set_plot_points(&mut self, plot_points: Option<Vec<String>>) {
        self.plot_points = plot_points;
        self.cache
            .put(PRACTICE_PLOT_POINTS, self.plot_points.as_ref())
            .await;
    }

    pub async fn set_extracted_structure(&mut self, extracted: Option<ExtractedStructure>) {
        self.extracted_structure = extracted;
        self.cache
            .put(PRACTICE_EXTRACTED_STRUCTURE, self.extracted_structure.as_ref())
            .await;
    }
}
