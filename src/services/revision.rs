//! Beat locking and the prompt context handed to revision requests.
//!
//! Locking is advisory: locked beats are described to the model as fixed, and
//! nothing checks that the reply honoured them.

use crate::core::model::{Character, StoryStructure};
use crate::services::prompts::Variables;
use std::collections::BTreeSet;

/// Marker used when no beat is locked.
pub const NO_LOCKED_BEATS: &str = "(없음)";

/// Beats pinned by the writer for this session. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockedBeats {
    beats: BTreeSet<(String, String)>,
}

impl LockedBeats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the lock on one beat and returns whether it is now locked.
    pub fn toggle(&mut self, act: &str, beat: &str) -> bool {
        let key = (act.to_string(), beat.to_string());
        if self.beats.remove(&key) {
            false
        } else {
            self.beats.insert(key);
            true
        }
    }

    pub fn lock(&mut self, act: &str, beat: &str) {
        self.beats.insert((act.to_string(), beat.to_string()));
    }

    pub fn is_locked(&self, act: &str, beat: &str) -> bool {
        self.beats.contains(&(act.to_string(), beat.to_string()))
    }

    pub fn clear(&mut self) {
        self.beats.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    /// Drops locks whose beat no longer exists after a revision renamed it.
    pub fn retain_existing(&mut self, structure: &StoryStructure) {
        self.beats
            .retain(|(act, beat)| structure.beat(act, beat).is_some());
    }

    /// One "do not change" line per locked beat, in story order, quoting the
    /// beat's current content verbatim.
    pub fn context(&self, structure: &StoryStructure) -> String {
        let lines: Vec<String> = structure
            .acts
            .iter()
            .flat_map(|act| act.beats.iter().map(move |beat| (act, beat)))
            .filter(|(act, beat)| self.is_locked(&act.name, &beat.name))
            .map(|(act, beat)| {
                format!(
                    "- [변경 금지] {} / {}: {}",
                    act.name, beat.name, beat.content
                )
            })
            .collect();

        if lines.is_empty() {
            NO_LOCKED_BEATS.to_string()
        } else {
            lines.join("\n")
        }
    }
}

fn structure_json(structure: &StoryStructure) -> String {
    serde_json::to_string_pretty(structure).unwrap_or_else(|_| structure.to_outline())
}

/// Variables for `revise_story_structure`.
pub fn revision_variables(
    logline: &str,
    structure: &StoryStructure,
    direction: &str,
    locked: &LockedBeats,
) -> Variables {
    Variables::from([
        ("logline".to_string(), logline.to_string()),
        ("structure".to_string(), structure_json(structure)),
        ("direction".to_string(), direction.to_string()),
        ("locked_beats".to_string(), locked.context(structure)),
    ])
}

/// Variables for `revise_story_with_character`.
pub fn character_revision_variables(
    logline: &str,
    structure: &StoryStructure,
    character: &Character,
    locked: &LockedBeats,
) -> Variables {
    Variables::from([
        ("logline".to_string(), logline.to_string()),
        ("structure".to_string(), structure_json(structure)),
        ("character".to_string(), character_text(character)),
        ("locked_beats".to_string(), locked.context(structure)),
    ])
}

/// Labelled character sheet with relationships in canonical text form.
pub fn character_text(character: &Character) -> String {
    character
        .fields()
        .into_iter()
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect::<Vec<_>>()
        .join("\n")
}
