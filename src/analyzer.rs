//! Skills scoring through the GigaChat API.
//!
//! The model is asked to judge how well a vacancy's skill list fits its
//! title and to answer with a JSON object. Replies routinely wrap that
//! object in prose or a fenced code block, so extraction tries a ```json
//! fence first and falls back to the first balanced `{...}` span.

use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::GigaChatSettings;
use crate::db::{self, ScoreUpdate};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SkillsAnalysis {
    pub match_score: Option<i64>,
    pub is_relevant: Option<bool>,
    #[serde(default)]
    pub missing_skills: Option<Vec<String>>,
    #[serde(default)]
    pub redundant_skills: Option<Vec<String>>,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
}

impl From<SkillsAnalysis> for ScoreUpdate {
    fn from(a: SkillsAnalysis) -> Self {
        ScoreUpdate {
            match_score: a.match_score,
            is_relevant: a.is_relevant,
            missing_skills: a.missing_skills,
            redundant_skills: a.redundant_skills,
            analysis: a.analysis,
            recommendations: a.recommendations,
        }
    }
}

pub struct GigaChatClient {
    client: reqwest::Client,
    settings: GigaChatSettings,
}

impl GigaChatClient {
    pub fn new(settings: GigaChatSettings) -> Result<Self> {
        if settings.auth.is_empty() {
            anyhow::bail!("gigachat.auth is not configured (HABR_GIGACHAT__AUTH)");
        }
        let mut builder = reqwest::Client::builder();
        if let Some(path) = &settings.cert_path {
            let pem = std::fs::read(path)
                .with_context(|| format!("Failed to read certificate {}", path))?;
            builder = builder.add_root_certificate(
                reqwest::Certificate::from_pem(&pem).context("Invalid PEM certificate")?,
            );
        }
        Ok(GigaChatClient {
            client: builder.build()?,
            settings,
        })
    }

    /// Exchange the Basic credentials for a bearer token.
    pub async fn get_token(&self) -> Result<String> {
        let rq_uid = uuid::Uuid::new_v4().to_string();
        let body: serde_json::Value = self
            .client
            .post(&self.settings.auth_url)
            .header("RqUID", rq_uid)
            .header("Authorization", format!("Basic {}", self.settings.auth))
            .header("Accept", "application/json")
            .form(&[("scope", self.settings.scope.as_str())])
            .send()
            .await?
            .error_for_status()
            .context("OAuth request rejected")?
            .json()
            .await?;

        body.get("access_token")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("No access_token in OAuth reply"))
    }

    /// Ask the model to score one vacancy's skills against its title.
    pub async fn validate_skills(
        &self,
        token: &str,
        title: &str,
        skills: &str,
    ) -> Result<SkillsAnalysis> {
        let payload = serde_json::json!({
            "model": self.settings.model,
            "messages": [{ "role": "user", "content": build_prompt(title, skills) }],
        });

        let url = format!("{}/api/v1/chat/completions", self.settings.base_url);
        let reply: serde_json::Value = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?
            .error_for_status()
            .context("Chat completion rejected")?
            .json()
            .await?;

        let content = reply["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("No message content in reply"))?;

        parse_reply(content)
    }
}

fn build_prompt(title: &str, skills: &str) -> String {
    format!(
        "Проанализируй следующую вакансию и список навыков.\n\
         Задача: определить, насколько список навыков соответствует должности.\n\n\
         Должность: {title}\n\n\
         Список навыков из описания вакансии:\n{skills}\n\n\
         Проанализируй и ответь в формате JSON:\n\
         {{\n\
             \"match_score\": число от 0 до 100 (процент соответствия),\n\
             \"is_relevant\": true/false (соответствует ли должности),\n\
             \"missing_skills\": [\"список важных навыков, которых не хватает\"],\n\
             \"redundant_skills\": [\"список навыков, не относящихся к должности\"],\n\
             \"analysis\": \"краткий анализ соответствия (1-2 предложения)\",\n\
             \"recommendations\": [\"рекомендации по улучшению описания навыков\"]\n\
         }}\n\n\
         Важные критерии:\n\
         1. Технические навыки должны соответствовать должности\n\
         2. Soft skills должны быть релевантны\n\
         3. Уровень навыков (junior/middle/senior) должен соответствовать позиции\n\
         4. Учитывай современные требования к подобным позициям\n"
    )
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap())
}

/// Parse the model's free-form reply into a `SkillsAnalysis`.
pub fn parse_reply(content: &str) -> Result<SkillsAnalysis> {
    let json_text = extract_json(content)
        .ok_or_else(|| anyhow!("No JSON found in reply: {}", truncate(content, 200)))?;
    serde_json::from_str(json_text)
        .with_context(|| format!("Unparsable JSON in reply: {}", truncate(json_text, 200)))
}

fn extract_json(content: &str) -> Option<&str> {
    if let Some(caps) = fence_re().captures(content) {
        return Some(caps.get(1).unwrap().as_str());
    }
    balanced_object(content)
}

/// First balanced `{...}` span, respecting string literals and escapes.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_auth_error(e: &anyhow::Error) -> bool {
    let msg = format!("{:#}", e);
    msg.contains("401") || msg.contains("Unauthorized")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

/// Score every unscored vacancy, skipping items whose request or reply fails.
/// Returns the number of vacancies actually scored.
pub async fn analyze_unscored(
    conn: &Connection,
    client: &GigaChatClient,
    limit: Option<usize>,
) -> Result<usize> {
    let queue = db::fetch_unscored(conn, limit)?;
    if queue.is_empty() {
        info!("Nothing to analyze");
        return Ok(0);
    }

    let mut token = client.get_token().await?;

    let pb = ProgressBar::new(queue.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let mut scored = 0usize;
    for item in &queue {
        let title = item.title.as_deref().unwrap_or("");
        let skills = item.skills.as_deref().unwrap_or("");

        let mut result = client.validate_skills(&token, title, skills).await;

        // Tokens expire after ~30 minutes; a long run outlives the first one.
        // On an auth rejection, refresh once and retry the same item.
        if let Err(e) = &result {
            if is_auth_error(e) {
                warn!("Token expired, refreshing");
                token = client.get_token().await?;
                result = client.validate_skills(&token, title, skills).await;
            }
        }

        match result {
            Ok(analysis) => {
                if db::apply_score(conn, item.id, &analysis.into())? {
                    scored += 1;
                } else {
                    warn!("Vacancy {} disappeared before scoring", item.id);
                }
            }
            Err(e) => {
                warn!("Vacancy {} skipped: {}", item.id, e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Scored {} of {} vacancies", scored, queue.len());
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "match_score": 85,
        "is_relevant": true,
        "missing_skills": ["Docker"],
        "redundant_skills": [],
        "analysis": "Навыки в целом соответствуют должности.",
        "recommendations": ["Добавить DevOps-инструменты"]
    }"#;

    #[test]
    fn parses_fenced_reply() {
        let content = format!("Вот результат анализа:\n```json\n{}\n```\nУдачи!", PAYLOAD);
        let a = parse_reply(&content).unwrap();
        assert_eq!(a.match_score, Some(85));
        assert_eq!(a.is_relevant, Some(true));
        assert_eq!(a.missing_skills, Some(vec!["Docker".to_string()]));
        assert_eq!(a.redundant_skills, Some(vec![]));
    }

    #[test]
    fn parses_prose_embedded_object() {
        let content = format!("Анализ готов. {} Надеюсь, это поможет.", PAYLOAD);
        let a = parse_reply(&content).unwrap();
        assert_eq!(a.match_score, Some(85));
        assert_eq!(
            a.recommendations,
            Some(vec!["Добавить DevOps-инструменты".to_string()])
        );
    }

    #[test]
    fn fence_takes_priority_over_bare_braces() {
        let content = format!(
            "{{\"match_score\": 1}} мусор\n```json\n{}\n```",
            PAYLOAD
        );
        let a = parse_reply(&content).unwrap();
        assert_eq!(a.match_score, Some(85));
    }

    #[test]
    fn balanced_scan_handles_nested_and_string_braces() {
        let text = r#"до JSON {"analysis": "скобка } в строке", "match_score": 10} после"#;
        let a = parse_reply(text).unwrap();
        assert_eq!(a.match_score, Some(10));
        assert_eq!(a.analysis.as_deref(), Some("скобка } в строке"));
    }

    #[test]
    fn missing_fields_default_to_none() {
        let a = parse_reply(r#"{"match_score": 40}"#).unwrap();
        assert_eq!(a.match_score, Some(40));
        assert_eq!(a.is_relevant, None);
        assert_eq!(a.missing_skills, None);
    }

    #[test]
    fn auth_errors_are_recognized_for_token_refresh() {
        // reqwest's error_for_status message carries the status line, and
        // context wrapping must not hide it.
        let e = anyhow::anyhow!("HTTP status client error (401 Unauthorized) for url (...)")
            .context("Chat completion rejected");
        assert!(is_auth_error(&e));

        let e = anyhow::anyhow!("HTTP status server error (503 Service Unavailable)");
        assert!(!is_auth_error(&e));
        assert!(!is_auth_error(&anyhow::anyhow!("connection reset by peer")));
    }

    #[test]
    fn reply_without_json_is_an_error() {
        assert!(parse_reply("Не могу проанализировать эту вакансию.").is_err());
    }

    #[test]
    fn unbalanced_object_is_an_error() {
        assert!(parse_reply(r#"{"match_score": 85"#).is_err());
    }
}
