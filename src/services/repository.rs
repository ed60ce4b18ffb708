//! Session record persistence: where the staged story lives between runs.

use crate::core::error::{Result, StoryError};
use crate::core::io::Storage;
use crate::core::model::{Character, StoryStructure, Treatment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use url::Url;

/// One persisted wizard session. The latest-created record per user wins.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: String,
    #[serde(default)]
    pub logline: String,
    #[serde(default)]
    pub structure: Option<StoryStructure>,
    #[serde(default)]
    pub character: Option<Character>,
    #[serde(default)]
    pub first_act_treatment: Option<Treatment>,
    pub created_at: DateTime<Utc>,
}

/// Content of a new record.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct SessionDraft {
    pub logline: String,
    pub structure: Option<StoryStructure>,
    pub character: Option<Character>,
    pub first_act_treatment: Option<Treatment>,
}

/// Partial update. Only fields that are `Some` are written; `Some(None)` clears.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<Option<StoryStructure>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<Option<Character>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_act_treatment: Option<Option<Treatment>>,
}

impl SessionPatch {
    fn apply(self, record: &mut SessionRecord) {
        if let Some(logline) = self.logline {
            record.logline = logline;
        }
        if let Some(structure) = self.structure {
            record.structure = structure;
        }
        if let Some(character) = self.character {
            record.character = character;
        }
        if let Some(treatment) = self.first_act_treatment {
            record.first_act_treatment = treatment;
        }
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Most recently created record for `user_id`, if any.
    async fn latest(&self, user_id: &str) -> Result<Option<SessionRecord>>;

    /// Creates a record and returns its id.
    async fn insert(&self, user_id: &str, draft: SessionDraft) -> Result<i64>;

    async fn update(&self, id: i64, patch: SessionPatch) -> Result<()>;
}

fn latest_of<'a>(
    records: impl Iterator<Item = &'a SessionRecord>,
    user_id: &str,
) -> Option<SessionRecord> {
    records
        .filter(|r| r.user_id == user_id)
        .max_by_key(|r| (r.created_at, r.id))
        .cloned()
}

fn new_record(id: i64, user_id: &str, draft: SessionDraft) -> SessionRecord {
    SessionRecord {
        id,
        user_id: user_id.to_string(),
        logline: draft.logline,
        structure: draft.structure,
        character: draft.character,
        first_act_treatment: draft.first_act_treatment,
        created_at: Utc::now(),
    }
}

// --- In-memory ---

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: Mutex<Vec<SessionRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records_for(&self, user_id: &str) -> usize {
        self.lock().iter().filter(|r| r.user_id == user_id).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SessionRecord>> {
        // Mutations are single pushes or assignments, so a poisoned lock is still consistent.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn latest(&self, user_id: &str) -> Result<Option<SessionRecord>> {
        Ok(latest_of(self.lock().iter(), user_id))
    }

    async fn insert(&self, user_id: &str, draft: SessionDraft) -> Result<i64> {
        let mut records = self.lock();
        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        records.push(new_record(id, user_id, draft));
        Ok(id)
    }

    async fn update(&self, id: i64, patch: SessionPatch) -> Result<()> {
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoryError::Persistence(format!("record {} not found", id)))?;
        patch.apply(record);
        Ok(())
    }
}

// --- Device-local file ---

/// Records kept in a single JSON file on this device.
pub struct LocalRepository {
    storage: Arc<dyn Storage>,
    path: String,
}

impl LocalRepository {
    pub const FILE_NAME: &'static str = "sessions.json";

    pub fn new(storage: Arc<dyn Storage>, data_folder: &str) -> Self {
        let path = std::path::Path::new(data_folder)
            .join(Self::FILE_NAME)
            .to_string_lossy()
            .into_owned();
        Self { storage, path }
    }

    async fn read_all(&self) -> Result<Vec<SessionRecord>> {
        let content = self
            .storage
            .read_string(&self.path)
            .await
            .map_err(|e| StoryError::Persistence(e.to_string()))?;
        match content {
            Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(&text)?),
            _ => Ok(Vec::new()),
        }
    }

    async fn write_all(&self, records: &[SessionRecord]) -> Result<()> {
        let content = serde_json::to_string_pretty(records)?;
        self.storage
            .write(&self.path, content.as_bytes())
            .await
            .map_err(|e| StoryError::Persistence(e.to_string()))
    }
}

#[async_trait]
impl SessionRepository for LocalRepository {
    async fn latest(&self, user_id: &str) -> Result<Option<SessionRecord>> {
        Ok(latest_of(self.read_all().await?.iter(), user_id))
    }

    async fn insert(&self, user_id: &str, draft: SessionDraft) -> Result<i64> {
        let mut records = self.read_all().await?;
        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        records.push(new_record(id, user_id, draft));
        self.write_all(&records).await?;
        debug!("Inserted session {} into {}", id, self.path);
        Ok(id)
    }

    async fn update(&self, id: i64, patch: SessionPatch) -> Result<()> {
        let mut records = self.read_all().await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoryError::Persistence(format!("record {} not found", id)))?;
        patch.apply(record);
        self.write_all(&records).await
    }
}

// --- Remote table ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    pub api_key: String,
    /// Signed-in user's bearer token. Falls back to the api key.
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "story".to_string()
}

/// PostgREST table accessed over HTTP.
#[derive(Debug)]
pub struct RemoteRepository {
    client: reqwest::Client,
    config: RemoteConfig,
}

#[derive(Deserialize)]
struct InsertedRow {
    id: i64,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    draft: SessionDraft,
}

impl RemoteRepository {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn table_url(&self, query: &[(&str, String)]) -> Result<Url> {
        let base = format!(
            "{}/rest/v1/{}",
            self.config.url.trim_end_matches('/'),
            self.config.table
        );
        let mut url = Url::parse(&base).map_err(|e| StoryError::Config(e.to_string()))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        request
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", token))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoryError::Persistence(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoryError::Persistence(format!(
                "{} {}",
                status,
                body.trim()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl SessionRepository for RemoteRepository {
    async fn latest(&self, user_id: &str) -> Result<Option<SessionRecord>> {
        let url = self.table_url(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("order", "created_at.desc".to_string()),
            ("limit", "1".to_string()),
        ])?;
        let rows: Vec<SessionRecord> = self
            .send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| StoryError::Persistence(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, user_id: &str, draft: SessionDraft) -> Result<i64> {
        let url = self.table_url(&[])?;
        let rows: Vec<InsertedRow> = self
            .send(
                self.client
                    .post(url)
                    .header("Prefer", "return=representation")
                    .json(&[InsertRow { user_id, draft }]),
            )
            .await?
            .json()
            .await
            .map_err(|e| StoryError::Persistence(e.to_string()))?;
        let id = rows
            .first()
            .map(|r| r.id)
            .ok_or_else(|| StoryError::Persistence("insert returned no rows".to_string()))?;
        info!("Created remote session {}", id);
        Ok(id)
    }

    async fn update(&self, id: i64, patch: SessionPatch) -> Result<()> {
        let url = self.table_url(&[("id", format!("eq.{}", id))])?;
        self.send(self.client.patch(url).json(&patch)).await?;
        Ok(())
    }
}

/// Picks the backing store: remote when configured, this device otherwise.
pub fn create_repository(
    remote: Option<&RemoteConfig>,
    storage: Arc<dyn Storage>,
    data_folder: &str,
) -> Arc<dyn SessionRepository> {
    match remote {
        Some(config) => Arc::new(RemoteRepository::new(config.clone())),
        None => Arc::new(LocalRepository::new(storage, data_folder)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::core::model::{Act, Beat};

    fn structure() -> StoryStructure {
        StoryStructure {
            acts: vec![
                Act {
                    name: "1막".to_string(),
                    beats: vec![Beat::new("설정", "농부가 산다"), Beat::new("문제 발생", "용이 온다")],
                },
                Act {
                    name: "2막".to_string(),
                    beats: vec![Beat::new("대결", "싸운다")],
                },
            ],
            ..Default::default()
        }
    }

    async fn exercise(repo: &dyn SessionRepository) -> Result<()> {
        assert_eq!(repo.latest("alice").await?, None);

        let id = repo
            .insert(
                "alice",
                SessionDraft {
                    logline: "농부가 용을 잡는다".to_string(),
                    structure: Some(structure()),
                    ..Default::default()
                },
            )
            .await?;

        repo.update(
            id,
            SessionPatch {
                character: Some(Some(Character {
                    name: "민수".to_string(),
                    ..Default::default()
                })),
                ..Default::default()
            },
        )
        .await?;

        let record = repo.latest("alice").await?.unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.structure, Some(structure()));
        assert_eq!(record.character.unwrap().name, "민수");
        assert_eq!(record.first_act_treatment, None);
        assert_eq!(repo.latest("bob").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_in_memory_repository() -> Result<()> {
        let repo = InMemoryRepository::new();
        exercise(&repo).await?;
        assert_eq!(repo.records_for("alice"), 1);
        assert!(repo.update(99, SessionPatch::default()).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_local_repository_survives_restart() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().to_str().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());

        exercise(&LocalRepository::new(storage.clone(), folder)).await?;

        let reopened = LocalRepository::new(storage, folder);
        let record = reopened.latest("alice").await?.unwrap();
        // Act and beat order survive the file.
        let acts: Vec<_> = record.structure.unwrap().acts.into_iter().map(|a| a.name).collect();
        assert_eq!(acts, vec!["1막", "2막"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_latest_prefers_newest_record() -> Result<()> {
        let repo = InMemoryRepository::new();
        repo.insert("alice", SessionDraft { logline: "old".into(), ..Default::default() })
            .await?;
        repo.insert("alice", SessionDraft { logline: "new".into(), ..Default::default() })
            .await?;
        assert_eq!(repo.latest("alice").await?.unwrap().logline, "new");
        Ok(())
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = SessionPatch {
            structure: Some(None),
            logline: Some("x".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({"logline": "x", "structure": null}));
        assert_eq!(serde_json::to_value(SessionPatch::default()).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_remote_urls() {
        let repo = RemoteRepository::new(RemoteConfig {
            url: "https://example.supabase.co/".to_string(),
            api_key: "anon".to_string(),
            access_token: None,
            user_id: None,
            table: default_table(),
        });
        let url = repo
            .table_url(&[("user_id", "eq.u 1".to_string()), ("limit", "1".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.supabase.co/rest/v1/story?user_id=eq.u+1&limit=1"
        );
    }

    #[test]
    fn test_record_decodes_remote_row() {
        let row = r#"{
            "id": 7,
            "user_id": "u1",
            "logline": "x",
            "structure": null,
            "character": null,
            "first_act_treatment": {"설정": [{"장면_번호": "1", "장면_제목": "t", "장면_내용": "c"}]},
            "created_at": "2024-05-01T10:00:00+00:00"
        }"#;
        let record: SessionRecord = serde_json::from_str(row).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.first_act_treatment.unwrap().scene_count(), 1);
    }
}
