//! The tag generator (C7): builds the LLM prompt for a single video, and
//! parses/filters/sorts/truncates its response into an ordered tag list.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::clients::LlmClient;
use crate::errors::PipelineResult;
use crate::models::{Dependency, ScoredTag, Tag, TagStrategy, VideoRef};
use crate::resilience::ResilienceEnvelope;

/// Normalizes a comma-separated blocklist string into a set of trimmed,
/// lower-cased, non-empty tokens. An absent or empty string disables
/// filtering entirely (no prompt injection, no post filter).
pub fn parse_blocklist(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub struct TagGenerator {
    llm: Arc<dyn LlmClient>,
    resilience: Arc<ResilienceEnvelope>,
    blocklist: HashSet<String>,
}

impl TagGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, resilience: Arc<ResilienceEnvelope>, blocklist_raw: &str) -> Self {
        Self {
            llm,
            resilience,
            blocklist: parse_blocklist(blocklist_raw),
        }
    }

    pub async fn generate(
        &self,
        video: &VideoRef,
        vocabulary: &[Tag],
        strategy: &TagStrategy,
    ) -> PipelineResult<Vec<ScoredTag>> {
        let prompt = build_prompt(video, vocabulary, strategy, &self.blocklist);

        let response = self
            .resilience
            .guard(Dependency::Llm, "generate_tags", || {
                let llm = self.llm.clone();
                let prompt = prompt.clone();
                async move { llm.complete(&prompt).await }
            })
            .await?;

        let payload = extract_payload(&response);
        let parsed = match parse_tags(&payload) {
            Ok(tags) => tags,
            Err(_) => {
                // Parse failure is not an error: the video gets zero tags
                // and is still inserted.
                Vec::new()
            }
        };

        Ok(self.apply_filters(parsed, strategy))
    }

    fn apply_filters(&self, tags: Vec<ScoredTag>, strategy: &TagStrategy) -> Vec<ScoredTag> {
        let filtered = filter_blocklist(tags, &self.blocklist);
        let above_floor: Vec<ScoredTag> = filtered
            .into_iter()
            .filter(|t| t.confidence >= strategy.confidence_floor)
            .collect();
        let mut sorted = above_floor;
        sorted.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(strategy.max_tags as usize);
        sorted
    }
}

fn build_prompt(
    video: &VideoRef,
    vocabulary: &[Tag],
    strategy: &TagStrategy,
    blocklist: &HashSet<String>,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Video title: {}\n", video.title));
    if let Some(description) = &video.description {
        prompt.push_str(&format!("Video description: {description}\n"));
    }
    if !vocabulary.is_empty() {
        let names: Vec<&str> = vocabulary.iter().map(|t| t.name.as_str()).collect();
        prompt.push_str(&format!(
            "Existing tag vocabulary (prefer reusing these, marking preexisting=true when you do): {}\n",
            names.join(", ")
        ));
    }
    prompt.push_str(&format!(
        "Return at most {} tags with confidence >= {}.\n",
        strategy.max_tags, strategy.confidence_floor
    ));
    if let Some(custom) = &strategy.custom_instructions {
        prompt.push_str(&format!("Additional instructions: {custom}\n"));
    }
    prompt.push_str("Tags must be lower-case and hyphenated, e.g. 'spring-boot'.\n");
    if !blocklist.is_empty() {
        let mut names: Vec<&str> = blocklist.iter().map(String::as_str).collect();
        names.sort_unstable();
        prompt.push_str(&format!("Do not suggest any of: {}\n", names.join(", ")));
    }
    prompt.push_str(
        "Respond with a JSON array of objects {name, confidence, preexisting}, optionally inside a fenced code block.",
    );
    prompt
}

/// Extracts the inner body of a fenced code block (with or without a
/// language tag); otherwise returns the whole trimmed response.
fn extract_payload(response: &str) -> String {
    let trimmed = response.trim();
    if trimmed.len() >= 6 && trimmed.starts_with("```") && trimmed.ends_with("```") {
        let inner = &trimmed[3..trimmed.len() - 3];
        if let Some(newline) = inner.find('\n') {
            let first_line = &inner[..newline];
            if !first_line.is_empty() && first_line.chars().all(|c| c.is_alphanumeric()) {
                return inner[newline + 1..].trim().to_string();
            }
        }
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

#[derive(Debug, serde::Deserialize)]
struct RawScoredTag {
    name: String,
    confidence: f64,
    #[serde(default)]
    preexisting: bool,
}

fn parse_tags(payload: &str) -> Result<Vec<ScoredTag>, serde_json::Error> {
    let raw: Vec<RawScoredTag> = serde_json::from_str(payload)?;
    Ok(raw
        .into_iter()
        .map(|r| ScoredTag {
            name: r.name,
            confidence: r.confidence,
            preexisting: r.preexisting,
        })
        .collect())
}

fn filter_blocklist(tags: Vec<ScoredTag>, blocklist: &HashSet<String>) -> Vec<ScoredTag> {
    if blocklist.is_empty() {
        return tags;
    }
    tags.into_iter()
        .filter(|t| !blocklist.contains(&t.name.to_lowercase()))
        .collect()
}
