//! Generation dispatcher: resolve a named prompt, call the completion
//! service, and shape the answer as text or JSON.

use crate::core::error::{Result, StoryError};
use crate::services::llm::{LlmClient, ResponseFormat};
use crate::services::prompts::{PromptName, PromptRegistry, Variables};
use log::{debug, error};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Completion result in the requested shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    Text(String),
    Json(serde_json::Value),
}

/// Stateless; every call is independent and calls may run concurrently.
#[derive(Debug, Clone)]
pub struct Generator {
    prompts: Arc<PromptRegistry>,
    llm: Arc<dyn LlmClient>,
}

impl Generator {
    pub fn new(prompts: Arc<PromptRegistry>, llm: Arc<dyn LlmClient>) -> Self {
        Self { prompts, llm }
    }

    pub fn prompts(&self) -> &PromptRegistry {
        &self.prompts
    }

    /// Resolves the prompt and returns the trimmed completion.
    async fn complete(
        &self,
        name: PromptName,
        variables: &Variables,
        format: ResponseFormat,
    ) -> Result<String> {
        let prompt = self.prompts.resolve(name, variables)?;
        debug!("Dispatching {} ({:?}, {} chars)", name, format, prompt.user.len());

        let completion = self.llm.chat(&prompt.system, &prompt.user, format).await?;
        Ok(completion.trim().to_string())
    }

    pub async fn generate(
        &self,
        name: PromptName,
        variables: &Variables,
        format: ResponseFormat,
    ) -> Result<Generated> {
        let content = self.complete(name, variables, format).await?;
        match format {
            ResponseFormat::Text => Ok(Generated::Text(content)),
            ResponseFormat::Json => parse_json(name, &content).map(Generated::Json),
        }
    }

    pub async fn generate_text(&self, name: PromptName, variables: &Variables) -> Result<String> {
        self.complete(name, variables, ResponseFormat::Text).await
    }

    /// JSON generation decoded straight from the completion text into `T`,
    /// so object keys reach `T` in the order the model wrote them. A shape
    /// mismatch is a malformed-output failure like any other parse failure.
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        name: PromptName,
        variables: &Variables,
    ) -> Result<T> {
        let content = self.complete(name, variables, ResponseFormat::Json).await?;
        parse_json(name, &content)
    }

    /// Endpoint-style entry point: never panics, always yields a status and body.
    /// A missing credential never reaches here: `create_llm` refuses to build
    /// a client without one and reports it with status 500.
    pub async fn handle(&self, request: GenerationRequest) -> GenerationReply {
        match self.handle_inner(request).await {
            Ok(result) => GenerationReply {
                status: 200,
                body: GenerationBody::Result(result),
            },
            Err(err) => {
                error!("Error generating content: {}", err);
                let message = match &err {
                    StoryError::MissingPromptName => err.to_string(),
                    StoryError::MalformedOutput { .. } => {
                        "Failed to parse JSON response from the model".to_string()
                    }
                    _ => "Failed to generate content".to_string(),
                };
                GenerationReply {
                    status: err.status_code(),
                    body: GenerationBody::Error(message),
                }
            }
        }
    }

    async fn handle_inner(&self, request: GenerationRequest) -> Result<serde_json::Value> {
        let name = request
            .prompt_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(StoryError::MissingPromptName)?
            .parse::<PromptName>()?;

        match self
            .generate(name, &request.variables, request.response_format)
            .await?
        {
            Generated::Text(text) => Ok(serde_json::Value::String(text)),
            Generated::Json(value) => Ok(value),
        }
    }
}

fn parse_json<T: DeserializeOwned>(name: PromptName, content: &str) -> Result<T> {
    let cleaned = strip_code_blocks(content);
    serde_json::from_str(&cleaned).map_err(|e| {
        error!("Failed to parse JSON response for {}: {}", name, e);
        error!("Raw content: {}", content);
        StoryError::MalformedOutput {
            reason: e.to_string(),
            raw: content.to_string(),
        }
    })
}

/// Removes one surrounding markdown code fence, if present.
pub fn strip_code_blocks(text: &str) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Language tag: the alphanumerics right after the opening fence.
    let tag_len = inner
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(inner.len());
    match inner[tag_len..].trim() {
        "" => inner.trim().to_string(),
        body => body.to_string(),
    }
}

/// Removes one pair of quotes wrapping a generated logline.
pub fn strip_wrapping_quotes(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix(['"', '\'', '“'])
        .unwrap_or(trimmed);
    let trimmed = trimmed
        .strip_suffix(['"', '\'', '”'])
        .unwrap_or(trimmed);
    trimmed.trim().to_string()
}

// --- Endpoint contract ---

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_variables")]
    pub variables: Variables,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Variables arrive as JSON; scalars are stringified and null becomes empty.
fn lenient_variables<'de, D>(deserializer: D) -> std::result::Result<Variables, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(de::Error::custom(format!(
                        "variable {} must be a scalar, got {}",
                        key, other
                    )))
                }
            };
            Ok((key, text))
        })
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBody {
    Result(serde_json::Value),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReply {
    pub status: u16,
    pub body: GenerationBody,
}

impl GenerationReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::model::StoryStructure;
    use crate::services::prompts::PromptSource;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies from a fixed script keyed by a substring of the user prompt.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedLlm {
        pub replies: Vec<(String, std::result::Result<String, String>)>,
        pub calls: Mutex<Vec<(String, ResponseFormat)>>,
    }

    impl ScriptedLlm {
        pub fn reply(mut self, needle: &str, text: &str) -> Self {
            self.replies.push((needle.to_string(), Ok(text.to_string())));
            self
        }

        pub fn fail(mut self, needle: &str, status: &str) -> Self {
            self.replies.push((needle.to_string(), Err(status.to_string())));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn prompts(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, _system: &str, user: &str, format: ResponseFormat) -> Result<String> {
            self.calls.lock().unwrap().push((user.to_string(), format));
            for (needle, reply) in &self.replies {
                if user.contains(needle.as_str()) {
                    return reply.clone().map_err(StoryError::Service);
                }
            }
            Err(StoryError::Service("no scripted reply".to_string()))
        }
    }

    pub(crate) const TEST_PROMPTS: &str = r#"
create_logline:
  system: coach
  user: "LOGLINE genre={genre}"
create_from_logline:
  system: coach
  user: "STRUCTURE logline={logline}"
extract_structure:
  system: coach
  user: "EXTRACT {story}"
"#;

    fn generator(llm: ScriptedLlm) -> (Generator, Arc<ScriptedLlm>) {
        let llm = Arc::new(llm);
        let registry = PromptRegistry::new(PromptSource::Inline(TEST_PROMPTS.to_string()), false);
        (Generator::new(Arc::new(registry), llm.clone()), llm)
    }

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_text_is_trimmed_only() {
        let (gen, llm) = generator(ScriptedLlm::default().reply("LOGLINE", "  \"농부의 여정\"\n"));
        let text = gen
            .generate_text(PromptName::CreateLogline, &vars(&[("genre", "SF")]))
            .await
            .unwrap();
        assert_eq!(text, "\"농부의 여정\"");
        assert_eq!(llm.prompts(), vec!["LOGLINE genre=SF".to_string()]);
    }

    #[tokio::test]
    async fn test_json_parse_failure_is_malformed_output() {
        let (gen, _) = generator(
            ScriptedLlm::default().reply("STRUCTURE", "물론이죠! 이야기는 다음과 같습니다."),
        );
        let err = gen
            .generate(PromptName::CreateFromLogline, &vars(&[("logline", "x")]), ResponseFormat::Json)
            .await
            .unwrap_err();
        match err {
            StoryError::MalformedOutput { raw, .. } => {
                assert_eq!(raw, "물론이죠! 이야기는 다음과 같습니다.")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_json_in_code_fence_is_accepted() {
        let (gen, llm) = generator(
            ScriptedLlm::default().reply("EXTRACT", "```json\n{\"처음\": \"a\", \"중간\": \"b\", \"끝\": \"c\"}\n```"),
        );
        let value = gen
            .generate(PromptName::ExtractStructure, &vars(&[("story", "s")]), ResponseFormat::Json)
            .await
            .unwrap();
        assert_eq!(value, Generated::Json(serde_json::json!({"처음": "a", "중간": "b", "끝": "c"})));
        assert_eq!(llm.calls.lock().unwrap()[0].1, ResponseFormat::Json);
    }

    #[tokio::test]
    async fn test_json_keeps_model_key_order() {
        let (gen, _) = generator(ScriptedLlm::default().reply(
            "STRUCTURE",
            r#"```json
{"막": {
  "일상 세계": [{"이름": "소개", "내용": "농부의 하루"}],
  "특별한 세계": [{"이름": "시련", "내용": "용과 마주친다"}, {"이름": "대결", "내용": "용을 쓰러뜨린다"}],
  "귀환": [{"이름": "귀향", "내용": "마을로 돌아온다"}]
}}
```"#,
        ));
        let structure: StoryStructure = gen
            .generate_json(PromptName::CreateFromLogline, &vars(&[("logline", "x")]))
            .await
            .unwrap();
        let acts: Vec<&str> = structure.acts.iter().map(|act| act.name.as_str()).collect();
        assert_eq!(acts, vec!["일상 세계", "특별한 세계", "귀환"]);
        let beats: Vec<&str> = structure.acts[1].beats.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(beats, vec!["시련", "대결"]);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_service_error() {
        let (gen, _) = generator(ScriptedLlm::default().fail("LOGLINE", "OpenAI API error: 503"));
        let err = gen
            .generate_text(PromptName::CreateLogline, &vars(&[("genre", "SF")]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::Service(ref s) if s.contains("503")));
    }

    #[tokio::test]
    async fn test_template_missing_never_calls_service() {
        let (gen, llm) = generator(ScriptedLlm::default());
        let err = gen
            .generate_text(PromptName::ExtractCharacter, &Variables::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::TemplateNotFound { .. }));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_handle_statuses() {
        let (gen, _) = generator(
            ScriptedLlm::default()
                .reply("STRUCTURE", "not json")
                .reply("LOGLINE", "로그라인"),
        );

        let missing: GenerationRequest = serde_json::from_str(r#"{"variables": {}}"#).unwrap();
        let reply = gen.handle(missing).await;
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body, GenerationBody::Error("promptName is required".to_string()));

        let bad_json: GenerationRequest = serde_json::from_str(
            r#"{"promptName": "create_from_logline", "variables": {"logline": "x"}, "responseFormat": "json"}"#,
        )
        .unwrap();
        let reply = gen.handle(bad_json).await;
        assert_eq!(reply.status, 500);
        assert!(!reply.is_success());

        let unknown: GenerationRequest =
            serde_json::from_str(r#"{"promptName": "write_poem"}"#).unwrap();
        assert_eq!(gen.handle(unknown).await.status, 500);

        let ok: GenerationRequest =
            serde_json::from_str(r#"{"promptName": "create_logline", "variables": {"genre": "SF"}}"#)
                .unwrap();
        let reply = gen.handle(ok).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, GenerationBody::Result(serde_json::json!("로그라인")));
    }

    #[test]
    fn test_request_variables_accept_scalars() {
        let request: GenerationRequest = serde_json::from_str(
            r#"{"promptName": "create_first_act_treatment", "variables": {"scene_count_setup": 3, "flag": true, "none": null, "logline": "x"}}"#,
        )
        .unwrap();
        assert_eq!(request.variables["scene_count_setup"], "3");
        assert_eq!(request.variables["flag"], "true");
        assert_eq!(request.variables["none"], "");
        assert_eq!(request.response_format, ResponseFormat::Text);

        let nested = serde_json::from_str::<GenerationRequest>(
            r#"{"promptName": "x", "variables": {"a": {"b": 1}}}"#,
        );
        assert!(nested.is_err());
    }

    #[test]
    fn test_reply_body_shape() {
        let body = serde_json::to_value(GenerationBody::Error("boom".to_string())).unwrap();
        assert_eq!(body, serde_json::json!({"error": "boom"}));
        let body = serde_json::to_value(GenerationBody::Result(serde_json::json!("ok"))).unwrap();
        assert_eq!(body, serde_json::json!({"result": "ok"}));
    }

    #[test]
    fn test_code_fence_language_tag() {
        assert_eq!(strip_code_blocks("{\"처음\": \"a\"}"), "{\"처음\": \"a\"}");
        assert_eq!(strip_code_blocks("```json\n[\"용\"]\n```"), "[\"용\"]");
        assert_eq!(strip_code_blocks("\n```JSON \n {} \n```\n"), "{}");
        assert_eq!(strip_code_blocks("```{\n\"a\":1}\n```"), "{\n\"a\":1}");
        assert_eq!(strip_code_blocks("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_blocks("```[1, 2]```"), "[1, 2]");
        assert_eq!(strip_code_blocks("```true```"), "true");
    }

    #[test]
    fn test_strip_wrapping_quotes() {
        assert_eq!(strip_wrapping_quotes("\"농부의 여정\""), "농부의 여정");
        assert_eq!(strip_wrapping_quotes("'농부의 여정'"), "농부의 여정");
        assert_eq!(strip_wrapping_quotes("농부의 \"여정\" 이야기"), "농부의 \"여정\" 이야기");
    }
}
