use crate::core::error::{Result, StoryError};
use crate::core::model::{
    Character, ExtractedStructure, Framework, FrameworkStories, StoryStructure, Treatment,
};
use crate::services::cache::PracticeStore;
use crate::services::generation::{strip_wrapping_quotes, Generator};
use crate::services::prompts::{PromptName, Variables};
use crate::services::revision::{
    character_revision_variables, character_text, revision_variables, LockedBeats,
};
use crate::services::store::{Artifact, RequestToken, StoryStore};
use futures_util::future::try_join3;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fmt;
use std::time::Duration;

/// Prompt that writes a story in the given framework.
pub fn framework_prompt(framework: Framework) -> PromptName {
    match framework {
        Framework::Gulino => PromptName::CreateFromLoglineWGulino,
        Framework::Vogel => PromptName::CreateFromLoglineWVogel,
        Framework::Snider => PromptName::CreateFromLoglineWSnider,
    }
}

fn vars<const N: usize>(pairs: [(&str, String); N]) -> Variables {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn structure_json(structure: &StoryStructure) -> Result<String> {
    Ok(serde_json::to_string_pretty(structure)?)
}

fn require_structure(structure: StoryStructure) -> Result<StoryStructure> {
    if structure.is_well_formed() {
        Ok(structure)
    } else {
        Err(StoryError::MalformedOutput {
            reason: "story structure has no acts or an act without beats".to_string(),
            raw: serde_json::to_string(&structure).unwrap_or_default(),
        })
    }
}

/// Plot points arrive either as a bare array or wrapped in `{"plot_points": [...]}`.
fn parse_plot_points(value: serde_json::Value) -> Result<Vec<String>> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("plot_points") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(StoryError::MalformedOutput {
                    reason: "expected a plot_points array".to_string(),
                    raw: serde_json::Value::Object(map).to_string(),
                })
            }
        },
        other => {
            return Err(StoryError::MalformedOutput {
                reason: "expected a list of plot points".to_string(),
                raw: other.to_string(),
            })
        }
    };
    Ok(items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        })
        .filter(|text| !text.trim().is_empty())
        .collect())
}

/// Drives the wizard: practice round, structure, character and treatment.
pub struct WizardWorkflow {
    generator: Generator,
    store: StoryStore,
    practice: PracticeStore,
    locked: LockedBeats,
}

impl WizardWorkflow {
    pub fn new(generator: Generator, store: StoryStore, practice: PracticeStore) -> Self {
        Self {
            generator,
            store,
            practice,
            locked: LockedBeats::new(),
        }
    }

    pub fn store(&self) -> &StoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StoryStore {
        &mut self.store
    }

    pub fn practice(&self) -> &PracticeStore {
        &self.practice
    }

    pub fn locked(&self) -> &LockedBeats {
        &self.locked
    }

    pub fn locked_mut(&mut self) -> &mut LockedBeats {
        &mut self.locked
    }

    fn settle<T>(&mut self, token: RequestToken, outcome: Result<T>) -> Result<T> {
        if outcome.is_err() {
            self.store.fail_generation(token);
        }
        outcome
    }

    // --- Practice ---

    pub async fn generate_logline(&mut self, genre: &str) -> Result<String> {
        let genre = genre.trim();
        if genre.is_empty() {
            return Err(StoryError::MissingInput("genre".to_string()));
        }
        let text = self
            .generator
            .generate_text(PromptName::CreateLogline, &vars([("genre", genre.to_string())]))
            .await?;
        let logline = strip_wrapping_quotes(&text);
        info!("Generated practice logline ({} chars)", logline.len());
        self.practice.set_logline(logline.clone()).await;
        Ok(logline)
    }

    /// Writes the practice logline in all three frameworks at once. Either
    /// all three stories are kept or none is.
    pub async fn generate_framework_stories(&mut self) -> Result<()> {
        let logline = self.practice.logline().trim().to_string();
        if logline.is_empty() {
            return Err(StoryError::MissingInput("logline".to_string()));
        }
        let variables = &vars([("logline", logline)]);
        let generator = &self.generator;
        let story = move |framework: Framework| async move {
            let structure = generator
                .generate_json::<StoryStructure>(framework_prompt(framework), variables)
                .await?;
            require_structure(structure)
        };

        let (gulino, vogel, snider) = try_join3(
            story(Framework::Gulino),
            story(Framework::Vogel),
            story(Framework::Snider),
        )
        .await
        .map_err(|e| {
            error!("Framework story generation failed, discarding batch: {}", e);
            e
        })?;

        self.practice
            .set_stories(FrameworkStories {
                gulino: Some(gulino),
                vogel: Some(vogel),
                snider: Some(snider),
            })
            .await;
        self.practice.set_extracted_structure(None).await;
        self.practice.set_plot_points(None).await;
        info!("Generated stories for all three frameworks");
        Ok(())
    }

    fn practice_story(&self) -> Result<String> {
        self.practice
            .stories()
            .get(Framework::Gulino)
            .map(StoryStructure::to_outline)
            .ok_or_else(|| StoryError::MissingInput("gulino story".to_string()))
    }

    /// Beginning, middle and end of the gulino practice story.
    pub async fn extract_structure(&mut self) -> Result<ExtractedStructure> {
        let story = self.practice_story()?;
        let extracted: ExtractedStructure = self
            .generator
            .generate_json(PromptName::ExtractStructure, &vars([("story", story)]))
            .await?;
        self.practice
            .set_extracted_structure(Some(extracted.clone()))
            .await;
        Ok(extracted)
    }

    pub async fn extract_plot_points(&mut self) -> Result<Vec<String>> {
        let story = self.practice_story()?;
        let value: serde_json::Value = self
            .generator
            .generate_json(PromptName::ExtractPlotPoint, &vars([("story", story)]))
            .await?;
        let plot_points = parse_plot_points(value)?;
        self.practice.set_plot_points(Some(plot_points.clone())).await;
        Ok(plot_points)
    }

    // --- Structure ---

    pub fn set_logline(&mut self, logline: &str) {
        self.store.set_logline(logline.trim());
    }

    fn logline(&self) -> Result<String> {
        let logline = self.store.logline().trim();
        if logline.is_empty() {
            return Err(StoryError::MissingInput("logline".to_string()));
        }
        Ok(logline.to_string())
    }

    fn structure(&self) -> Result<StoryStructure> {
        self.store
            .structure()
            .cloned()
            .ok_or_else(|| StoryError::MissingInput("story structure".to_string()))
    }

    fn character(&self) -> Result<Character> {
        self.store
            .character()
            .map(Character::normalized)
            .ok_or_else(|| StoryError::MissingInput("character".to_string()))
    }

    /// Applies a generated structure and saves the story. Returns false when
    /// a newer request superseded this one.
    async fn apply_structure(&mut self, token: RequestToken, structure: StoryStructure) -> Result<bool> {
        if !self.store.complete_structure(token, structure) {
            return Ok(false);
        }
        if let Some(structure) = self.store.structure() {
            self.locked.retain_existing(structure);
        }
        self.store.save_story(None, None).await?;
        Ok(true)
    }

    pub async fn generate_structure(&mut self) -> Result<bool> {
        let logline = self.logline()?;
        let token = self.store.begin_generation(Artifact::Structure);
        let outcome = self
            .generator
            .generate_json::<StoryStructure>(
                PromptName::CreateFromLogline,
                &vars([("logline", logline)]),
            )
            .await
            .and_then(require_structure);
        let structure = self.settle(token, outcome)?;
        self.apply_structure(token, structure).await
    }

    /// Rewrites the unlocked beats following `direction`.
    pub async fn revise_structure(&mut self, direction: &str) -> Result<bool> {
        let direction = direction.trim();
        if direction.is_empty() {
            return Err(StoryError::MissingInput("revision direction".to_string()));
        }
        let logline = self.logline()?;
        let current = self.structure()?;
        let variables = revision_variables(&logline, &current, direction, &self.locked);

        let token = self.store.begin_generation(Artifact::Structure);
        let outcome = self
            .generator
            .generate_json::<StoryStructure>(PromptName::ReviseStoryStructure, &variables)
            .await
            .and_then(require_structure);
        let revised = self.settle(token, outcome)?;
        self.apply_structure(token, revised).await
    }

    // --- Character ---

    pub async fn extract_character(&mut self) -> Result<Character> {
        let logline = self.logline()?;
        let structure = self.structure()?;
        let variables = vars([
            ("logline", logline),
            ("structure", structure_json(&structure)?),
        ]);

        let token = self.store.begin_generation(Artifact::Character);
        let outcome = self
            .generator
            .generate_json::<Character>(PromptName::ExtractCharacter, &variables)
            .await
            .map(|c| c.normalized());
        let character = self.settle(token, outcome)?;
        if self.store.complete_character(token, character.clone()) {
            self.store.save_story(None, None).await?;
        }
        Ok(character)
    }

    pub async fn revise_with_character(&mut self) -> Result<bool> {
        let logline = self.logline()?;
        let structure = self.structure()?;
        let character = self.character()?;
        let variables = character_revision_variables(&logline, &structure, &character, &self.locked);

        let token = self.store.begin_generation(Artifact::Structure);
        let outcome = self
            .generator
            .generate_json::<StoryStructure>(PromptName::ReviseStoryWithCharacter, &variables)
            .await
            .and_then(require_structure);
        let revised = self.settle(token, outcome)?;
        self.apply_structure(token, revised).await
    }

    // --- Treatment ---

    /// First-act treatment splitting the setup and problem beats into the
    /// given number of scenes. Saved into the existing session record.
    pub async fn generate_treatment(&mut self, setup_scenes: u32, problem_scenes: u32) -> Result<bool> {
        if setup_scenes == 0 || problem_scenes == 0 {
            return Err(StoryError::MissingInput("scene count".to_string()));
        }
        let logline = self.logline()?;
        let structure = self.structure()?;
        let character = self.character()?;
        let variables = vars([
            ("logline", logline),
            ("structure", structure_json(&structure)?),
            ("character", character_text(&character)),
            ("scene_count_setup", setup_scenes.to_string()),
            ("scene_count_problem", problem_scenes.to_string()),
        ]);

        let token = self.store.begin_generation(Artifact::Treatment);
        let outcome = self
            .generator
            .generate_json::<Treatment>(PromptName::CreateFirstActTreatment, &variables)
            .await;
        let treatment = self.settle(token, outcome)?;
        if treatment.scene_count() == 0 {
            warn!("Treatment came back without scenes");
        }
        if !self.store.complete_treatment(token, treatment) {
            return Ok(false);
        }
        self.store.save_treatment(None).await?;
        Ok(true)
    }

    /// Saves scene edits. Returns false when nothing changed.
    pub async fn save_treatment_edits(&mut self) -> Result<bool> {
        if self.store.treatment().is_none() {
            return Err(StoryError::MissingInput("treatment".to_string()));
        }
        self.store.save_treatment(None).await
    }

    /// Saves whatever is unsaved.
    pub async fn save_all(&mut self) -> Result<()> {
        if self.store.has_structure_changes() || self.store.record_id().is_none() {
            self.store.save_story(None, None).await?;
        }
        if self.store.has_treatment_changes() {
            self.store.save_treatment(None).await?;
        }
        Ok(())
    }

    // --- Interactive driver ---

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let choice = inquire::Select::new("무엇을 할까요?", MenuItem::ALL.to_vec())
                .with_page_size(MenuItem::ALL.len())
                .prompt();
            let item = match choice {
                Ok(item) => item,
                Err(
                    inquire::InquireError::OperationCanceled
                    | inquire::InquireError::OperationInterrupted,
                ) => MenuItem::Quit,
                Err(e) => return Err(e.into()),
            };

            if item == MenuItem::Quit {
                self.confirm_exit().await?;
                println!("다음에 또 만나요!");
                return Ok(());
            }

            if let Err(e) = self.dispatch(item).await {
                if let Some(story_error) = e.downcast_ref::<StoryError>() {
                    error!("{} failed: {}", item, story_error);
                    println!("{}", story_error.user_message());
                } else if let Some(inquire::InquireError::OperationCanceled) =
                    e.downcast_ref::<inquire::InquireError>()
                {
                    continue;
                } else {
                    return Err(e);
                }
            }
        }
    }

    async fn confirm_exit(&mut self) -> anyhow::Result<()> {
        if !self.store.is_dirty() {
            return Ok(());
        }
        let save = inquire::Confirm::new("저장하지 않은 변경이 있습니다. 저장할까요?")
            .with_default(true)
            .prompt()
            .unwrap_or(false);
        if save {
            self.save_all().await?;
            println!("저장했습니다.");
        }
        Ok(())
    }

    async fn dispatch(&mut self, item: MenuItem) -> anyhow::Result<()> {
        match item {
            MenuItem::PracticeLogline => {
                let genre = inquire::Text::new("장르:")
                    .with_placeholder("예: SF, 로맨스, 스릴러")
                    .prompt()?;
                let pb = spinner("로그라인을 만드는 중...");
                let result = self.generate_logline(&genre).await;
                pb.finish_and_clear();
                println!("\n{}\n", result?);
            }
            MenuItem::FrameworkStories => {
                if self.practice.logline().is_empty() {
                    let logline = inquire::Text::new("로그라인:").prompt()?;
                    self.practice.set_logline(logline.trim()).await;
                }
                let pb = spinner("세 가지 구조로 이야기를 쓰는 중...");
                let result = self.generate_framework_stories().await;
                pb.finish_and_clear();
                result?;
                for framework in Framework::ALL {
                    if let Some(story) = self.practice.stories().get(framework) {
                        println!("\n== {} ==\n{}\n", framework.display_name(), framework.description());
                        println!("{}", story.to_outline());
                    }
                }
            }
            MenuItem::ExtractStructure => {
                let pb = spinner("처음, 중간, 끝을 찾는 중...");
                let result = self.extract_structure().await;
                pb.finish_and_clear();
                let extracted = result?;
                println!("\n처음: {}\n중간: {}\n끝: {}\n", extracted.beginning, extracted.middle, extracted.end);
            }
            MenuItem::PlotPoints => {
                let pb = spinner("플롯 포인트를 찾는 중...");
                let result = self.extract_plot_points().await;
                pb.finish_and_clear();
                for (i, point) in result?.iter().enumerate() {
                    println!("{}. {}", i + 1, point);
                }
            }
            MenuItem::Logline => {
                let initial = if self.store.logline().is_empty() {
                    self.practice.logline().to_string()
                } else {
                    self.store.logline().to_string()
                };
                let mut prompt = inquire::Text::new("이야기의 로그라인:");
                if !initial.is_empty() {
                    prompt = prompt.with_initial_value(&initial);
                }
                let logline = prompt.prompt()?;
                self.set_logline(&logline);
            }
            MenuItem::Structure => {
                let pb = spinner("이야기 구조를 만드는 중...");
                let result = self.generate_structure().await;
                pb.finish_and_clear();
                result?;
                self.print_structure();
            }
            MenuItem::Revise => {
                let direction = inquire::Text::new("어떻게 고칠까요?").prompt()?;
                let pb = spinner("구조를 고치는 중...");
                let result = self.revise_structure(&direction).await;
                pb.finish_and_clear();
                result?;
                self.print_structure();
            }
            MenuItem::LockBeats => self.choose_locked_beats()?,
            MenuItem::EditBeat => self.edit_beat()?,
            MenuItem::Character => {
                let pb = spinner("인물을 만드는 중...");
                let result = self.extract_character().await;
                pb.finish_and_clear();
                print_character(&result?);
            }
            MenuItem::ReviseWithCharacter => {
                let pb = spinner("인물에 맞춰 구조를 다듬는 중...");
                let result = self.revise_with_character().await;
                pb.finish_and_clear();
                result?;
                self.print_structure();
            }
            MenuItem::Treatment => {
                let setup = inquire::CustomType::<u32>::new("'설정' 비트의 장면 수:")
                    .with_default(3)
                    .prompt()?;
                let problem = inquire::CustomType::<u32>::new("'문제 발생' 비트의 장면 수:")
                    .with_default(3)
                    .prompt()?;
                let pb = spinner("1막 트리트먼트를 쓰는 중...");
                let result = self.generate_treatment(setup, problem).await;
                pb.finish_and_clear();
                result?;
                self.print_treatment();
            }
            MenuItem::EditScene => {
                self.edit_scene()?;
                if self.save_treatment_edits().await? {
                    println!("저장했습니다.");
                } else {
                    println!("바뀐 내용이 없습니다.");
                }
            }
            MenuItem::Save => {
                self.save_all().await?;
                println!("저장했습니다.");
            }
            MenuItem::Show => {
                println!("\n로그라인: {}\n", self.store.logline());
                self.print_structure();
                if let Some(character) = self.store.character() {
                    print_character(character);
                }
                self.print_treatment();
            }
            MenuItem::Quit => {}
        }
        Ok(())
    }

    fn beat_choices(&self) -> Vec<BeatChoice> {
        self.store
            .structure()
            .map(|s| {
                s.acts
                    .iter()
                    .flat_map(|act| {
                        act.beats.iter().map(move |beat| BeatChoice {
                            act: act.name.clone(),
                            beat: beat.name.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn choose_locked_beats(&mut self) -> anyhow::Result<()> {
        let choices = self.beat_choices();
        if choices.is_empty() {
            println!("먼저 이야기 구조를 만들어 주세요.");
            return Ok(());
        }
        let defaults: Vec<usize> = choices
            .iter()
            .enumerate()
            .filter(|(_, c)| self.locked.is_locked(&c.act, &c.beat))
            .map(|(i, _)| i)
            .collect();
        let selected = inquire::MultiSelect::new("고정할 비트를 고르세요:", choices)
            .with_default(&defaults)
            .prompt()?;
        self.locked.clear();
        for choice in &selected {
            self.locked.lock(&choice.act, &choice.beat);
        }
        println!("{}개의 비트를 고정했습니다.", self.locked.len());
        Ok(())
    }

    fn edit_beat(&mut self) -> anyhow::Result<()> {
        let choices = self.beat_choices();
        if choices.is_empty() {
            println!("먼저 이야기 구조를 만들어 주세요.");
            return Ok(());
        }
        let choice = inquire::Select::new("고칠 비트:", choices).prompt()?;
        let current = self
            .store
            .structure()
            .and_then(|s| s.beat(&choice.act, &choice.beat))
            .map(|b| b.content.clone())
            .unwrap_or_default();

        self.store.begin_edit(Artifact::Structure);
        let content = inquire::Text::new("내용:")
            .with_initial_value(&current)
            .prompt();
        if let Ok(content) = &content {
            self.store.edit_beat(&choice.act, &choice.beat, content.as_str());
        }
        self.store.finish_edit(Artifact::Structure);
        content?;
        Ok(())
    }

    fn edit_scene(&mut self) -> anyhow::Result<()> {
        let Some(treatment) = self.store.treatment() else {
            println!("먼저 트리트먼트를 만들어 주세요.");
            return Ok(());
        };
        let choices: Vec<SceneChoice> = treatment
            .beats
            .iter()
            .flat_map(|b| {
                b.scenes.iter().enumerate().map(move |(index, scene)| SceneChoice {
                    beat: b.beat.clone(),
                    index,
                    label: format!("{} #{} {}", b.beat, scene.number, scene.title),
                    title: scene.title.clone(),
                    content: scene.content.clone(),
                })
            })
            .collect();
        if choices.is_empty() {
            println!("고칠 장면이 없습니다.");
            return Ok(());
        }
        let choice = inquire::Select::new("고칠 장면:", choices).prompt()?;

        self.store.begin_edit(Artifact::Treatment);
        let edited = inquire::Text::new("장면 제목:")
            .with_initial_value(&choice.title)
            .prompt()
            .and_then(|title| {
                inquire::Text::new("장면 내용:")
                    .with_initial_value(&choice.content)
                    .prompt()
                    .map(|content| (title, content))
            });
        if let Ok((title, content)) = &edited {
            self.store.edit_scene(&choice.beat, choice.index, title, content);
        }
        self.store.finish_edit(Artifact::Treatment);
        edited?;
        Ok(())
    }

    fn print_structure(&self) {
        match self.store.structure() {
            Some(structure) => {
                for act in &structure.acts {
                    println!("\n[{}]", act.name);
                    for beat in &act.beats {
                        let pin = if self.locked.is_locked(&act.name, &beat.name) {
                            "🔒 "
                        } else {
                            ""
                        };
                        println!("  {}{}: {}", pin, beat.name, beat.content);
                    }
                }
                println!();
            }
            None => println!("아직 이야기 구조가 없습니다."),
        }
    }

    fn print_treatment(&self) {
        if let Some(treatment) = self.store.treatment() {
            for beat in &treatment.beats {
                println!("\n[{}]", beat.beat);
                for scene in &beat.scenes {
                    println!("  {}. {}\n     {}", scene.number, scene.title, scene.content);
                }
            }
            println!();
        }
    }
}

fn print_character(character: &Character) {
    println!();
    for (label, value) in character.fields() {
        println!("{}: {}", label, value);
    }
    println!();
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    PracticeLogline,
    FrameworkStories,
    ExtractStructure,
    PlotPoints,
    Logline,
    Structure,
    Revise,
    LockBeats,
    EditBeat,
    Character,
    ReviseWithCharacter,
    Treatment,
    EditScene,
    Save,
    Show,
    Quit,
}

impl MenuItem {
    const ALL: [MenuItem; 16] = [
        MenuItem::PracticeLogline,
        MenuItem::FrameworkStories,
        MenuItem::ExtractStructure,
        MenuItem::PlotPoints,
        MenuItem::Logline,
        MenuItem::Structure,
        MenuItem::Revise,
        MenuItem::LockBeats,
        MenuItem::EditBeat,
        MenuItem::Character,
        MenuItem::ReviseWithCharacter,
        MenuItem::Treatment,
        MenuItem::EditScene,
        MenuItem::Save,
        MenuItem::Show,
        MenuItem::Quit,
    ];
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuItem::PracticeLogline => "[1일차] 장르로 로그라인 만들기",
            MenuItem::FrameworkStories => "[1일차] 세 가지 구조로 이야기 쓰기",
            MenuItem::ExtractStructure => "[1일차] 처음, 중간, 끝 찾기",
            MenuItem::PlotPoints => "[1일차] 플롯 포인트 찾기",
            MenuItem::Logline => "[2일차] 로그라인 정하기",
            MenuItem::Structure => "[2일차] 이야기 구조 만들기",
            MenuItem::Revise => "[2일차] 이야기 구조 고치기",
            MenuItem::LockBeats => "[2일차] 비트 고정하기",
            MenuItem::EditBeat => "[2일차] 비트 직접 고치기",
            MenuItem::Character => "[3일차] 인물 만들기",
            MenuItem::ReviseWithCharacter => "[3일차] 인물에 맞춰 구조 다듬기",
            MenuItem::Treatment => "[4일차] 1막 트리트먼트 쓰기",
            MenuItem::EditScene => "[4일차] 장면 고치기",
            MenuItem::Save => "저장",
            MenuItem::Show => "지금까지의 이야기 보기",
            MenuItem::Quit => "끝내기",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
struct BeatChoice {
    act: String,
    beat: String,
}

impl fmt::Display for BeatChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.act, self.beat)
    }
}

#[derive(Debug, Clone)]
struct SceneChoice {
    beat: String,
    index: usize,
    label: String,
    title: String,
    content: String,
}

impl fmt::Display for SceneChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
