//! The staged story: logline, structure, character and first-act treatment,
//! held in memory and upserted into a [`SessionRepository`].
//!
//! The store is the only writer to the backing record. Saves are sequential
//! through `&mut self`; concurrent sessions on other devices are not detected
//! and the last write wins.

use crate::core::error::{Result, StoryError};
use crate::core::model::{Character, StoryStructure, Treatment};
use crate::services::repository::{SessionDraft, SessionPatch, SessionRecord, SessionRepository};
use log::{debug, info, warn};
use std::sync::Arc;

/// A generated artifact of the staged story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Logline,
    Structure,
    Character,
    Treatment,
}

impl Artifact {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            Artifact::Logline => 0,
            Artifact::Structure => 1,
            Artifact::Character => 2,
            Artifact::Treatment => 3,
        }
    }
}

/// `Absent -> Generating -> Present -> (Editing -> Present)*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Absent,
    Generating,
    Present,
    Editing,
}

/// Issued when a generation starts. Only the most recent token for an
/// artifact may apply its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct RequestToken {
    artifact: Artifact,
    generation: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    phase: Phase,
    latest: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Snapshot {
    logline: String,
    structure: Option<StoryStructure>,
    character: Option<Character>,
    treatment: Option<Treatment>,
}

impl From<SessionRecord> for Snapshot {
    fn from(record: SessionRecord) -> Self {
        Self {
            logline: record.logline,
            structure: record.structure,
            character: record.character,
            treatment: record.first_act_treatment,
        }
    }
}

pub struct StoryStore {
    repository: Arc<dyn SessionRepository>,
    user_id: String,
    record_id: Option<i64>,
    working: Snapshot,
    saved: Snapshot,
    dirty: bool,
    slots: [Slot; Artifact::COUNT],
}

impl StoryStore {
    /// Loads the latest record for `user_id`. Never fails: an unreadable
    /// backing store is logged and the session starts empty.
    pub async fn load(repository: Arc<dyn SessionRepository>, user_id: impl Into<String>) -> Self {
        let mut store = Self {
            repository,
            user_id: user_id.into(),
            record_id: None,
            working: Snapshot::default(),
            saved: Snapshot::default(),
            dirty: false,
            slots: Default::default(),
        };
        if let Err(e) = store.reload().await {
            warn!("Failed to load saved story, starting fresh: {}", e);
        }
        store
    }

    /// Replaces the working copy with the latest persisted record.
    pub async fn reload(&mut self) -> Result<()> {
        let (record_id, snapshot) = match self.repository.latest(&self.user_id).await? {
            Some(record) => {
                info!("Loaded story session {}", record.id);
                (Some(record.id), Snapshot::from(record))
            }
            None => (None, Snapshot::default()),
        };
        self.record_id = record_id;
        self.working = snapshot.clone();
        self.saved = snapshot;
        self.dirty = false;
        for artifact in [
            Artifact::Logline,
            Artifact::Structure,
            Artifact::Character,
            Artifact::Treatment,
        ] {
            self.settle(artifact);
        }
        Ok(())
    }

    pub fn record_id(&self) -> Option<i64> {
        self.record_id
    }

    pub fn logline(&self) -> &str {
        &self.working.logline
    }

    pub fn structure(&self) -> Option<&StoryStructure> {
        self.working.structure.as_ref()
    }

    pub fn character(&self) -> Option<&Character> {
        self.working.character.as_ref()
    }

    pub fn treatment(&self) -> Option<&Treatment> {
        self.working.treatment.as_ref()
    }

    // --- Setters ---

    pub fn set_logline(&mut self, logline: impl Into<String>) {
        self.working.logline = logline.into();
        self.touch(Artifact::Logline);
    }

    pub fn set_structure(&mut self, structure: Option<StoryStructure>) {
        self.working.structure = structure;
        self.touch(Artifact::Structure);
    }

    pub fn set_character(&mut self, character: Option<Character>) {
        self.working.character = character;
        self.touch(Artifact::Character);
    }

    pub fn set_treatment(&mut self, treatment: Option<Treatment>) {
        self.working.treatment = treatment;
        self.touch(Artifact::Treatment);
    }

    /// Edits one beat in place. Returns false when the beat does not exist.
    pub fn edit_beat(&mut self, act: &str, beat: &str, content: impl Into<String>) -> bool {
        let changed = self
            .working
            .structure
            .as_mut()
            .is_some_and(|s| s.set_beat_content(act, beat, content));
        if changed {
            self.dirty = true;
        }
        changed
    }

    /// Edits one scene in place. Returns false when the scene does not exist.
    pub fn edit_scene(&mut self, beat: &str, index: usize, title: &str, content: &str) -> bool {
        let scene = self
            .working
            .treatment
            .as_mut()
            .and_then(|t| t.scene_mut(beat, index));
        match scene {
            Some(scene) => {
                scene.title = title.to_string();
                scene.content = content.to_string();
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    fn touch(&mut self, artifact: Artifact) {
        self.dirty = true;
        if self.phase(artifact) != Phase::Generating {
            self.settle(artifact);
        }
    }

    fn has_value(&self, artifact: Artifact) -> bool {
        match artifact {
            Artifact::Logline => !self.working.logline.is_empty(),
            Artifact::Structure => self.working.structure.is_some(),
            Artifact::Character => self.working.character.is_some(),
            Artifact::Treatment => self.working.treatment.is_some(),
        }
    }

    fn settle(&mut self, artifact: Artifact) {
        self.slots[artifact.index()].phase = if self.has_value(artifact) {
            Phase::Present
        } else {
            Phase::Absent
        };
    }

    // --- Lifecycle ---

    pub fn phase(&self, artifact: Artifact) -> Phase {
        self.slots[artifact.index()].phase
    }

    /// Marks `artifact` as generating and supersedes any request in flight.
    pub fn begin_generation(&mut self, artifact: Artifact) -> RequestToken {
        let slot = &mut self.slots[artifact.index()];
        slot.latest += 1;
        slot.phase = Phase::Generating;
        RequestToken {
            artifact,
            generation: slot.latest,
        }
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.slots[token.artifact.index()].latest == token.generation
    }

    fn accept(&mut self, token: RequestToken) -> bool {
        if self.is_current(token) {
            true
        } else {
            debug!(
                "Discarding stale {:?} response (generation {})",
                token.artifact, token.generation
            );
            false
        }
    }

    /// Applies a generated logline if `token` is still current.
    pub fn complete_logline(&mut self, token: RequestToken, logline: String) -> bool {
        if !self.accept(token) {
            return false;
        }
        self.working.logline = logline;
        self.dirty = true;
        self.settle(Artifact::Logline);
        true
    }

    pub fn complete_structure(&mut self, token: RequestToken, structure: StoryStructure) -> bool {
        if !self.accept(token) {
            return false;
        }
        self.working.structure = Some(structure);
        self.dirty = true;
        self.settle(Artifact::Structure);
        true
    }

    pub fn complete_character(&mut self, token: RequestToken, character: Character) -> bool {
        if !self.accept(token) {
            return false;
        }
        self.working.character = Some(character);
        self.dirty = true;
        self.settle(Artifact::Character);
        true
    }

    pub fn complete_treatment(&mut self, token: RequestToken, treatment: Treatment) -> bool {
        if !self.accept(token) {
            return false;
        }
        self.working.treatment = Some(treatment);
        self.dirty = true;
        self.settle(Artifact::Treatment);
        true
    }

    /// A failed generation leaves the previous value untouched.
    pub fn fail_generation(&mut self, token: RequestToken) {
        if self.accept(token) {
            self.settle(token.artifact);
        }
    }

    pub fn begin_edit(&mut self, artifact: Artifact) -> bool {
        if self.phase(artifact) != Phase::Present {
            return false;
        }
        self.slots[artifact.index()].phase = Phase::Editing;
        true
    }

    pub fn finish_edit(&mut self, artifact: Artifact) {
        if self.phase(artifact) == Phase::Editing {
            self.settle(artifact);
        }
    }

    // --- Change detection ---

    /// Unsaved edits exist. Stays set after a failed save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn has_changes(&self) -> bool {
        self.working != self.saved
    }

    pub fn has_structure_changes(&self) -> bool {
        self.working.logline != self.saved.logline
            || self.working.structure != self.saved.structure
            || self.working.character != self.saved.character
    }

    pub fn has_treatment_changes(&self) -> bool {
        self.working.treatment != self.saved.treatment
    }

    // --- Persistence ---

    /// Upserts logline, structure and character. `structure` and `character`
    /// replace the working copy when given; a character already present is
    /// saved either way. Returns false when there was nothing to write.
    pub async fn save_story(
        &mut self,
        structure: Option<StoryStructure>,
        character: Option<Character>,
    ) -> Result<bool> {
        if let Some(structure) = structure {
            self.set_structure(Some(structure));
        }
        if let Some(character) = character {
            self.set_character(Some(character));
        }

        match self.record_id {
            Some(id) => {
                if !self.has_structure_changes() {
                    debug!("Story unchanged, skipping save");
                    self.refresh_dirty();
                    return Ok(false);
                }
                let patch = SessionPatch {
                    logline: Some(self.working.logline.clone()),
                    structure: Some(self.working.structure.clone()),
                    character: self.working.character.clone().map(Some),
                    first_act_treatment: None,
                };
                self.repository.update(id, patch).await?;
                info!("Updated story session {}", id);
            }
            None => {
                let draft = SessionDraft {
                    logline: self.working.logline.clone(),
                    structure: self.working.structure.clone(),
                    character: self.working.character.clone(),
                    first_act_treatment: self.working.treatment.clone(),
                };
                let id = self.repository.insert(&self.user_id, draft).await?;
                info!("Created story session {}", id);
                self.record_id = Some(id);
                self.saved.treatment = self.working.treatment.clone();
            }
        }

        self.saved.logline = self.working.logline.clone();
        self.saved.structure = self.working.structure.clone();
        if self.working.character.is_some() {
            self.saved.character = self.working.character.clone();
        }
        self.refresh_dirty();
        Ok(true)
    }

    /// Writes the first-act treatment into the existing record. Returns
    /// false when the treatment is unchanged since the last save.
    pub async fn save_treatment(&mut self, treatment: Option<Treatment>) -> Result<bool> {
        let id = self.record_id.ok_or(StoryError::NoSessionRecord)?;
        if let Some(treatment) = treatment {
            self.set_treatment(Some(treatment));
        }
        if !self.has_treatment_changes() {
            debug!("Treatment unchanged, skipping save");
            self.refresh_dirty();
            return Ok(false);
        }

        let patch = SessionPatch {
            first_act_treatment: Some(self.working.treatment.clone()),
            ..Default::default()
        };
        self.repository.update(id, patch).await?;
        info!("Saved first-act treatment to session {}", id);

        self.saved.treatment = self.working.treatment.clone();
        self.refresh_dirty();
        Ok(true)
    }

    fn refresh_dirty(&mut self) {
        self.dirty = self.has_changes();
    }
}
