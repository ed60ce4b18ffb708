//! Story artifacts produced by the wizard stages.
//!
//! Wire keys follow the JSON shape the prompts ask the model for, which is
//! also the shape stored in the session record, so these types deserialize
//! model output and persisted rows alike.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// A named value inside a JSON object whose key order carries meaning.
pub trait NamedEntry: Sized {
    type Value: Serialize + for<'de> Deserialize<'de>;

    fn from_parts(name: String, value: Self::Value) -> Self;
    fn name(&self) -> &str;
    fn value(&self) -> &Self::Value;
}

/// (De)serializes a `Vec<T>` as a JSON object, keeping key order.
mod ordered {
    use super::*;

    pub fn serialize<S, T>(entries: &Vec<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: NamedEntry,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for entry in entries {
            map.serialize_entry(entry.name(), entry.value())?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: NamedEntry,
    {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: NamedEntry> Visitor<'de> for OrderedVisitor<T> {
            type Value = Vec<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Vec<T>, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, T::Value>()? {
                    entries.push(T::from_parts(name, value));
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Accepts a string, number or boolean and keeps it as text. Models are loose
/// about scalar types (`"나이": 17`).
pub(crate) fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("expected a scalar, got {}", other))),
    }
}

fn lenient_index<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| de::Error::custom(format!("invalid scene number: {}", n))),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid scene number: {}", s))),
        other => Err(de::Error::custom(format!("invalid scene number: {}", other))),
    }
}

// --- Story structure ---

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct StoryMetadata {
    #[serde(default)]
    pub framework: String,
    #[serde(default)]
    pub logline: String,
    #[serde(default)]
    pub lang: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Beat {
    #[serde(rename = "이름")]
    pub name: String,
    #[serde(rename = "내용", default)]
    pub content: String,
}

impl Beat {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Act {
    pub name: String,
    pub beats: Vec<Beat>,
}

impl NamedEntry for Act {
    type Value = Vec<Beat>;

    fn from_parts(name: String, beats: Vec<Beat>) -> Self {
        Self { name, beats }
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn value(&self) -> &Vec<Beat> {
        &self.beats
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct StoryStructure {
    #[serde(default)]
    pub metadata: StoryMetadata,
    #[serde(rename = "막", with = "ordered")]
    pub acts: Vec<Act>,
}

impl StoryStructure {
    pub fn act(&self, name: &str) -> Option<&Act> {
        self.acts.iter().find(|a| a.name == name)
    }

    pub fn beat(&self, act: &str, beat: &str) -> Option<&Beat> {
        self.act(act)?.beats.iter().find(|b| b.name == beat)
    }

    /// Replaces a beat's content in place. Returns false if the beat does not exist.
    pub fn set_beat_content(&mut self, act: &str, beat: &str, content: impl Into<String>) -> bool {
        let found = self
            .acts
            .iter_mut()
            .find(|a| a.name == act)
            .and_then(|a| a.beats.iter_mut().find(|b| b.name == beat));
        match found {
            Some(b) => {
                b.content = content.into();
                true
            }
            None => false,
        }
    }

    pub fn beat_count(&self) -> usize {
        self.acts.iter().map(|a| a.beats.len()).sum()
    }

    /// At least one act, and no act without beats.
    pub fn is_well_formed(&self) -> bool {
        !self.acts.is_empty() && self.acts.iter().all(|a| !a.beats.is_empty())
    }

    /// Plain-text outline: each act as a heading followed by `beat: content` lines.
    pub fn to_outline(&self) -> String {
        self.acts
            .iter()
            .map(|act| {
                let beats = act
                    .beats
                    .iter()
                    .map(|b| format!("{}: {}", b.name, b.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{}:\n{}", act.name, beats)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// --- Character ---

/// Relationships to other characters. Models return either prose or an object
/// keyed by character name; both are accepted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Relationships {
    Text(String),
    Structured(BTreeMap<String, String>),
}

impl Default for Relationships {
    fn default() -> Self {
        Relationships::Text(String::new())
    }
}

impl Relationships {
    /// Canonical text form: prose as is, structured entries as `name: description` lines.
    pub fn to_text(&self) -> String {
        match self {
            Relationships::Text(text) => text.clone(),
            Relationships::Structured(map) => map
                .iter()
                .map(|(name, relation)| format!("{}: {}", name, relation))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn normalized(&self) -> Relationships {
        Relationships::Text(self.to_text())
    }
}

impl fmt::Display for Relationships {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Character {
    #[serde(rename = "이름", default, deserialize_with = "scalar_as_string")]
    pub name: String,
    #[serde(rename = "나이", default, deserialize_with = "scalar_as_string")]
    pub age: String,
    #[serde(rename = "외적_특징", default, deserialize_with = "scalar_as_string")]
    pub external_traits: String,
    #[serde(rename = "외적_목표와_장애물", default, deserialize_with = "scalar_as_string")]
    pub external_goal: String,
    #[serde(rename = "내적_목표와_장애물", default, deserialize_with = "scalar_as_string")]
    pub internal_goal: String,
    #[serde(rename = "결핍", default, deserialize_with = "scalar_as_string")]
    pub deficiency: String,
    #[serde(rename = "욕망과_결핍의_관계", default, deserialize_with = "scalar_as_string")]
    pub desire_and_deficiency: String,
    #[serde(rename = "다른_캐릭터들과의_관계", default)]
    pub relationships: Relationships,
}

impl Character {
    /// Copy with relationships in canonical text form, for display and re-submission.
    pub fn normalized(&self) -> Character {
        Character {
            relationships: self.relationships.normalized(),
            ..self.clone()
        }
    }

    /// Labelled fields in display order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("이름", self.name.clone()),
            ("나이", self.age.clone()),
            ("외적 특징", self.external_traits.clone()),
            ("외적 목표와 장애물", self.external_goal.clone()),
            ("내적 목표와 장애물", self.internal_goal.clone()),
            ("결핍", self.deficiency.clone()),
            ("욕망과 결핍의 관계", self.desire_and_deficiency.clone()),
            ("다른 캐릭터들과의 관계", self.relationships.to_text()),
        ]
    }
}

// --- Treatment ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Scene {
    #[serde(rename = "장면_번호", deserialize_with = "lenient_index")]
    pub number: u32,
    #[serde(rename = "장면_제목", default)]
    pub title: String,
    #[serde(rename = "장면_내용", default)]
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreatmentBeat {
    pub beat: String,
    pub scenes: Vec<Scene>,
}

impl NamedEntry for TreatmentBeat {
    type Value = Vec<Scene>;

    fn from_parts(beat: String, scenes: Vec<Scene>) -> Self {
        Self { beat, scenes }
    }
    fn name(&self) -> &str {
        &self.beat
    }
    fn value(&self) -> &Vec<Scene> {
        &self.scenes
    }
}

/// Scene breakdown of one or more beats, keyed by beat name in narrative order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Treatment {
    pub beats: Vec<TreatmentBeat>,
}

impl Serialize for Treatment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ordered::serialize(&self.beats, serializer)
    }
}

impl<'de> Deserialize<'de> for Treatment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Treatment {
            beats: ordered::deserialize(deserializer)?,
        })
    }
}

impl Treatment {
    pub fn scenes(&self, beat: &str) -> Option<&[Scene]> {
        self.beats
            .iter()
            .find(|b| b.beat == beat)
            .map(|b| b.scenes.as_slice())
    }

    pub fn scene_mut(&mut self, beat: &str, index: usize) -> Option<&mut Scene> {
        self.beats
            .iter_mut()
            .find(|b| b.beat == beat)
            .and_then(|b| b.scenes.get_mut(index))
    }

    pub fn scene_count(&self) -> usize {
        self.beats.iter().map(|b| b.scenes.len()).sum()
    }
}

// --- Practice artifacts ---

/// The three-part shape extracted from a generated story.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedStructure {
    #[serde(rename = "처음", default, deserialize_with = "scalar_as_string")]
    pub beginning: String,
    #[serde(rename = "중간", default, deserialize_with = "scalar_as_string")]
    pub middle: String,
    #[serde(rename = "끝", default, deserialize_with = "scalar_as_string")]
    pub end: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Gulino,
    Vogel,
    Snider,
}

impl Framework {
    pub const ALL: [Framework; 3] = [Framework::Gulino, Framework::Vogel, Framework::Snider];

    pub fn display_name(&self) -> &'static str {
        match self {
            Framework::Gulino => "폴 조셉 줄리노 3막 8시퀀스",
            Framework::Vogel => "크리스토퍼 보글러 영웅의 여정",
            Framework::Snider => "블레이크 스나이더 15장",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Framework::Gulino => {
                "3막을 8개의 시퀀스로 나누어 구조화. 설정 → 문제 발생 → 해결 시도 → 위기 → 결말의 고전적 구조."
            }
            Framework::Vogel => {
                "신화학자 조셉 캠벨의 이론을 각색한 12단계 구조. 일상 → 모험 → 시련 → 귀환의 영웅 서사."
            }
            Framework::Snider => {
                "할리우드 시나리오 작법의 정석. 15개의 장으로 세분화하여 리듬과 템포를 정교하게 조율."
            }
        }
    }

    /// Looks a framework up by the display name the model writes into metadata.
    pub fn from_display_name(name: &str) -> Option<Framework> {
        Self::ALL.into_iter().find(|f| f.display_name() == name)
    }
}

/// One story per framework, generated together from the same logline.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameworkStories {
    pub gulino: Option<StoryStructure>,
    pub vogel: Option<StoryStructure>,
    pub snider: Option<StoryStructure>,
}

impl FrameworkStories {
    pub fn get(&self, framework: Framework) -> Option<&StoryStructure> {
        match framework {
            Framework::Gulino => self.gulino.as_ref(),
            Framework::Vogel => self.vogel.as_ref(),
            Framework::Snider => self.snider.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gulino.is_none() && self.vogel.is_none() && self.snider.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRUCTURE_JSON: &str = r#"{
        "metadata": { "framework": "폴 조셉 줄리노 3막 8시퀀스", "logline": "한 농부가 은하계를 구하는 여정을 떠난다", "lang": "ko" },
        "막": {
            "설정": [
                { "이름": "일상", "내용": "농부는 사막 행성에서 산다." },
                { "이름": "사건의 시작", "내용": "의문의 메시지가 도착한다." }
            ],
            "대립": [
                { "이름": "시련", "내용": "제국의 추격이 시작된다." }
            ],
            "결말": [
                { "이름": "귀환", "내용": "농부는 영웅이 되어 돌아온다." }
            ]
        }
    }"#;

    #[test]
    fn test_act_order_is_preserved() {
        let structure: StoryStructure = serde_json::from_str(STRUCTURE_JSON).unwrap();
        let names: Vec<&str> = structure.acts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["설정", "대립", "결말"]);

        let reencoded = serde_json::to_string(&structure).unwrap();
        let first = reencoded.find("설정").unwrap();
        let second = reencoded.find("대립").unwrap();
        let third = reencoded.find("결말").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_outline_lists_beats_under_acts() {
        let structure: StoryStructure = serde_json::from_str(STRUCTURE_JSON).unwrap();
        let outline = structure.to_outline();
        assert!(outline.starts_with("설정:\n일상: 농부는 사막 행성에서 산다."));
        assert!(outline.contains("\n\n대립:\n시련: 제국의 추격이 시작된다."));
        assert_eq!(structure.beat_count(), 4);
        assert!(structure.is_well_formed());
    }

    #[test]
    fn test_set_beat_content() {
        let mut structure: StoryStructure = serde_json::from_str(STRUCTURE_JSON).unwrap();
        assert!(structure.set_beat_content("대립", "시련", "새 내용"));
        assert_eq!(structure.beat("대립", "시련").unwrap().content, "새 내용");
        assert!(!structure.set_beat_content("대립", "없는 비트", "x"));
    }

    #[test]
    fn test_relationships_accept_text_or_object() {
        let text: Character =
            serde_json::from_str(r#"{ "이름": "루크", "나이": 19, "다른_캐릭터들과의_관계": "삼촌과 산다" }"#)
                .unwrap();
        assert_eq!(text.age, "19");
        assert_eq!(text.relationships, Relationships::Text("삼촌과 산다".to_string()));

        let structured: Character = serde_json::from_str(
            r#"{ "이름": "루크", "다른_캐릭터들과의_관계": { "오웬": "삼촌", "레아": "동료" } }"#,
        )
        .unwrap();
        assert_eq!(structured.relationships.to_text(), "레아: 동료\n오웬: 삼촌");
        assert_eq!(
            structured.normalized().relationships,
            Relationships::Text("레아: 동료\n오웬: 삼촌".to_string())
        );
    }

    #[test]
    fn test_treatment_keeps_beat_order_and_lenient_numbers() {
        let json = r#"{
            "설정": [
                { "장면_번호": 1, "장면_제목": "아침", "장면_내용": "농장" },
                { "장면_번호": "2", "장면_제목": "메시지", "장면_내용": "홀로그램" }
            ],
            "문제 발생": [
                { "장면_번호": 3, "장면_제목": "습격", "장면_내용": "집이 불탄다" }
            ]
        }"#;
        let mut treatment: Treatment = serde_json::from_str(json).unwrap();
        assert_eq!(treatment.beats[0].beat, "설정");
        assert_eq!(treatment.beats[1].beat, "문제 발생");
        assert_eq!(treatment.scenes("설정").unwrap()[1].number, 2);
        assert_eq!(treatment.scene_count(), 3);

        treatment.scene_mut("문제 발생", 0).unwrap().title = "기습".to_string();
        assert_eq!(treatment.scenes("문제 발생").unwrap()[0].title, "기습");
    }

    #[test]
    fn test_framework_lookup() {
        assert_eq!(
            Framework::from_display_name("블레이크 스나이더 15장"),
            Some(Framework::Snider)
        );
        assert_eq!(Framework::from_display_name("unknown"), None);
    }
}
