//! Named prompt templates and placeholder substitution.
//!
//! Templates live in a YAML document: a `_common` section with the shared
//! base system text, and one entry per [`PromptName`] holding `system` and
//! `user` blocks. Placeholders in `user` look like `{logline}`.

use crate::core::error::{Result, StoryError, TemplatePart};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// Templates shipped with the crate, used when no path is configured.
pub const EMBEDDED_PROMPTS: &str = include_str!("../../prompts.yaml");

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PromptName {
    CreateLogline,
    #[serde(rename = "create_from_logline_w_gulino")]
    CreateFromLoglineWGulino,
    #[serde(rename = "create_from_logline_w_vogel")]
    CreateFromLoglineWVogel,
    #[serde(rename = "create_from_logline_w_snider")]
    CreateFromLoglineWSnider,
    ExtractPlotPoint,
    ExtractStructure,
    CreateFromLogline,
    ReviseStoryStructure,
    ExtractCharacter,
    ReviseStoryWithCharacter,
    CreateFirstActTreatment,
}

impl PromptName {
    pub const ALL: [PromptName; 11] = [
        PromptName::CreateLogline,
        PromptName::CreateFromLoglineWGulino,
        PromptName::CreateFromLoglineWVogel,
        PromptName::CreateFromLoglineWSnider,
        PromptName::ExtractPlotPoint,
        PromptName::ExtractStructure,
        PromptName::CreateFromLogline,
        PromptName::ReviseStoryStructure,
        PromptName::ExtractCharacter,
        PromptName::ReviseStoryWithCharacter,
        PromptName::CreateFirstActTreatment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptName::CreateLogline => "create_logline",
            PromptName::CreateFromLoglineWGulino => "create_from_logline_w_gulino",
            PromptName::CreateFromLoglineWVogel => "create_from_logline_w_vogel",
            PromptName::CreateFromLoglineWSnider => "create_from_logline_w_snider",
            PromptName::ExtractPlotPoint => "extract_plot_point",
            PromptName::ExtractStructure => "extract_structure",
            PromptName::CreateFromLogline => "create_from_logline",
            PromptName::ReviseStoryStructure => "revise_story_structure",
            PromptName::ExtractCharacter => "extract_character",
            PromptName::ReviseStoryWithCharacter => "revise_story_with_character",
            PromptName::CreateFirstActTreatment => "create_first_act_treatment",
        }
    }
}

impl std::fmt::Display for PromptName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptName {
    type Err = StoryError;

    /// Names outside the enumerated set are reported like a template missing
    /// from the registry, with the valid names attached.
    fn from_str(s: &str) -> Result<Self> {
        PromptName::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| StoryError::TemplateNotFound {
                name: s.to_string(),
                available: PromptName::ALL.iter().map(|n| n.as_str().to_string()).collect(),
            })
    }
}

/// Variables supplied at resolution time, keyed by placeholder name.
pub type Variables = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    pub system: String,
    pub user: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct RawTemplate {
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct CommonSection {
    #[serde(default)]
    base_system: Option<String>,
}

/// One parsed template document.
#[derive(Debug, Clone, Default)]
pub struct PromptBook {
    base_system: Option<String>,
    templates: HashMap<String, RawTemplate>,
}

impl PromptBook {
    pub fn parse(yaml: &str) -> Result<Self> {
        let mut entries: HashMap<String, serde_yaml_ng::Value> = serde_yaml_ng::from_str(yaml)
            .map_err(|e| StoryError::TemplateSource(e.to_string()))?;

        let common = match entries.remove("_common") {
            Some(value) => serde_yaml_ng::from_value::<CommonSection>(value)
                .map_err(|e| StoryError::TemplateSource(format!("_common: {}", e)))?,
            None => CommonSection::default(),
        };

        let mut templates = HashMap::with_capacity(entries.len());
        for (name, value) in entries {
            let template = serde_yaml_ng::from_value::<RawTemplate>(value)
                .map_err(|e| StoryError::TemplateSource(format!("{}: {}", name, e)))?;
            templates.insert(name, template);
        }

        Ok(Self {
            base_system: common.base_system,
            templates,
        })
    }

    pub fn base_system(&self) -> Option<&str> {
        self.base_system.as_deref()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }

    /// Looks up a template and checks that both parts carry text.
    pub fn template(&self, name: PromptName) -> Result<(&str, &str)> {
        let raw = self
            .templates
            .get(name.as_str())
            .ok_or_else(|| StoryError::TemplateNotFound {
                name: name.to_string(),
                available: self.names(),
            })?;

        let system = raw.system.as_deref().filter(|s| !s.trim().is_empty());
        let user = raw.user.as_deref().filter(|s| !s.trim().is_empty());
        match (system, user) {
            (Some(system), Some(user)) => Ok((system, user)),
            (None, Some(_)) => Err(malformed(name, TemplatePart::System)),
            (Some(_), None) => Err(malformed(name, TemplatePart::User)),
            (None, None) => Err(malformed(name, TemplatePart::Both)),
        }
    }

    pub fn resolve(&self, name: PromptName, variables: &Variables) -> Result<ResolvedPrompt> {
        let (system, user) = self.template(name)?;
        Ok(ResolvedPrompt {
            system: system.to_string(),
            user: substitute(user, variables),
        })
    }
}

fn malformed(name: PromptName, missing: TemplatePart) -> StoryError {
    StoryError::MalformedTemplate {
        name: name.to_string(),
        missing,
    }
}

/// Replaces every `{key}` whose key is in `variables` with its value.
///
/// Single left-to-right pass: inserted values are never scanned again, so a
/// value containing `{other}` stays literal and key order cannot matter.
/// Placeholders without a matching variable are copied through unchanged.
pub fn substitute(template: &str, variables: &Variables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            variables
                .get(&after[..close])
                .map(|value| (value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone)]
pub enum PromptSource {
    File(PathBuf),
    Inline(String),
}

/// Owned template registry.
///
/// In load-once mode the first successful parse is kept until [`reload`]
/// is called. In live-reload mode the source is parsed on every resolution.
///
/// [`reload`]: PromptRegistry::reload
#[derive(Debug)]
pub struct PromptRegistry {
    source: PromptSource,
    live_reload: bool,
    cache: RwLock<Option<Arc<PromptBook>>>,
}

impl PromptRegistry {
    pub fn new(source: PromptSource, live_reload: bool) -> Self {
        Self {
            source,
            live_reload,
            cache: RwLock::new(None),
        }
    }

    pub fn embedded() -> Self {
        Self::new(PromptSource::Inline(EMBEDDED_PROMPTS.to_string()), false)
    }

    pub fn from_config(config: &crate::core::config::PromptsConfig) -> Self {
        match &config.path {
            Some(path) => Self::new(PromptSource::File(PathBuf::from(path)), config.live_reload),
            None => Self::embedded(),
        }
    }

    fn read_source(&self) -> Result<PromptBook> {
        match &self.source {
            PromptSource::File(path) => {
                debug!("Loading prompt templates from {}", path.display());
                let content = std::fs::read_to_string(path).map_err(|e| {
                    StoryError::TemplateSource(format!("{}: {}", path.display(), e))
                })?;
                PromptBook::parse(&content)
            }
            PromptSource::Inline(content) => PromptBook::parse(content),
        }
    }

    /// Parses the source again and replaces the cached copy.
    pub fn reload(&self) -> Result<Arc<PromptBook>> {
        let book = Arc::new(self.read_source()?);
        let mut cache = self
            .cache
            .write()
            .map_err(|_| StoryError::TemplateSource("template cache poisoned".to_string()))?;
        *cache = Some(book.clone());
        Ok(book)
    }

    pub fn book(&self) -> Result<Arc<PromptBook>> {
        if self.live_reload {
            return self.reload();
        }
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| StoryError::TemplateSource("template cache poisoned".to_string()))?;
            if let Some(book) = cache.as_ref() {
                return Ok(book.clone());
            }
        }
        self.reload()
    }

    pub fn resolve(&self, name: PromptName, variables: &Variables) -> Result<ResolvedPrompt> {
        self.book()?.resolve(name, variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
_common:
  base_system: &base |
    당신은 이야기 작법 코치입니다.

create_logline:
  system: *base
  user: "{genre} 장르의 로그라인을 한 문장으로 써 주세요."

create_from_logline:
  system: *base
  user: "로그라인: {logline}\n다시 한번: {logline}\n모르는 값: {unknown}"

extract_structure:
  system: ""
  user: "{story}"

extract_character:
  system: *base
"#;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitution_is_global_and_leaves_unknown_placeholders() {
        let book = PromptBook::parse(DOC).unwrap();
        let resolved = book
            .resolve(PromptName::CreateFromLogline, &vars(&[("logline", "농부의 여정")]))
            .unwrap();

        assert_eq!(
            resolved.user,
            "로그라인: 농부의 여정\n다시 한번: 농부의 여정\n모르는 값: {unknown}"
        );
        assert_eq!(resolved.system, "당신은 이야기 작법 코치입니다.\n");
        assert_eq!(book.base_system(), Some("당신은 이야기 작법 코치입니다.\n"));
    }

    #[test]
    fn test_every_known_key_is_replaced_for_every_template() {
        let book = PromptBook::parse(EMBEDDED_PROMPTS).unwrap();
        let variables = vars(&[
            ("genre", "SF"),
            ("logline", "한 농부가 은하계를 구하는 여정을 떠난다"),
            ("story", "이야기"),
            ("structure", "{}"),
            ("character", "{}"),
            ("direction", "더 어둡게"),
            ("locked_beats", "(없음)"),
            ("scene_count_setup", "3"),
            ("scene_count_problem", "2"),
        ]);

        for name in PromptName::ALL {
            let resolved = book.resolve(name, &variables).unwrap();
            for key in variables.keys() {
                let token = format!("{{{}}}", key);
                assert!(
                    !resolved.user.contains(&token),
                    "{} still contains {}",
                    name,
                    token
                );
            }
        }
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let out = substitute(
            "{a} and {b}",
            &vars(&[("a", "{b}"), ("b", "{a}")]),
        );
        assert_eq!(out, "{b} and {a}");
    }

    #[test]
    fn test_substitution_edge_cases() {
        let v = vars(&[("name", "X")]);
        assert_eq!(substitute("{{name}}", &v), "{X}");
        assert_eq!(substitute("{Name} {name}", &v), "{Name} X");
        assert_eq!(substitute("open { brace", &v), "open { brace");
        assert_eq!(substitute("trailing {name", &v), "trailing {name");
        assert_eq!(substitute("", &v), "");
    }

    #[test]
    fn test_missing_template_lists_available_names() {
        let book = PromptBook::parse(DOC).unwrap();
        let err = book
            .resolve(PromptName::ReviseStoryStructure, &Variables::new())
            .unwrap_err();
        match err {
            StoryError::TemplateNotFound { name, available } => {
                assert_eq!(name, "revise_story_structure");
                assert_eq!(
                    available,
                    vec![
                        "create_from_logline",
                        "create_logline",
                        "extract_character",
                        "extract_structure"
                    ]
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_template_names_missing_part() {
        let book = PromptBook::parse(DOC).unwrap();
        assert!(matches!(
            book.resolve(PromptName::ExtractStructure, &Variables::new()),
            Err(StoryError::MalformedTemplate { missing: TemplatePart::System, .. })
        ));
        assert!(matches!(
            book.resolve(PromptName::ExtractCharacter, &Variables::new()),
            Err(StoryError::MalformedTemplate { missing: TemplatePart::User, .. })
        ));
    }

    #[test]
    fn test_unknown_name_string() {
        let err = "create_poem".parse::<PromptName>().unwrap_err();
        assert!(matches!(err, StoryError::TemplateNotFound { .. }));
        assert_eq!(
            "create_from_logline_w_vogel".parse::<PromptName>().unwrap(),
            PromptName::CreateFromLoglineWVogel
        );
    }

    #[test]
    fn test_load_once_vs_live_reload() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("prompts.yaml");
        std::fs::write(&path, "create_logline:\n  system: s\n  user: first {genre}\n")?;

        let cached = PromptRegistry::new(PromptSource::File(path.clone()), false);
        let live = PromptRegistry::new(PromptSource::File(path.clone()), true);
        let v = vars(&[("genre", "SF")]);

        assert_eq!(cached.resolve(PromptName::CreateLogline, &v)?.user, "first SF");
        assert_eq!(live.resolve(PromptName::CreateLogline, &v)?.user, "first SF");

        std::fs::write(&path, "create_logline:\n  system: s\n  user: second {genre}\n")?;

        assert_eq!(cached.resolve(PromptName::CreateLogline, &v)?.user, "first SF");
        assert_eq!(live.resolve(PromptName::CreateLogline, &v)?.user, "second SF");

        cached.reload()?;
        assert_eq!(cached.resolve(PromptName::CreateLogline, &v)?.user, "second SF");
        Ok(())
    }

    #[test]
    fn test_unreadable_source_is_a_template_error() {
        let registry =
            PromptRegistry::new(PromptSource::File(PathBuf::from("/nonexistent/prompts.yaml")), false);
        assert!(matches!(
            registry.resolve(PromptName::CreateLogline, &Variables::new()),
            Err(StoryError::TemplateSource(_))
        ));
    }
}
