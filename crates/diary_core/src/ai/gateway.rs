//! AI enrichment gateway.
//!
//! # Responsibility
//! - Route prompts to the configured provider tier (primary first).
//! - Optionally enrich a prompt with links from a bounded materials search.
//! - Classify every failure into [`EnrichmentFailure`].
//!
//! # Invariants
//! - Nothing is raised past this boundary: callers receive text or a
//!   classified failure value.
//! - The secondary tier is used only when no primary tier is configured.
//! - Only a quota failure of the secondary tier becomes
//!   `ProviderExhausted`; every other failure is a `ProviderError`.
//! - Every provider call is bounded by the configured timeout.

use super::gemini::{GeminiConfig, GeminiProvider};
use super::http::build_client;
use super::openai::{OpenAiConfig, OpenAiProvider};
use super::provider::{Prompt, ProviderFailure, ProviderFailureKind, TextProvider};
use super::search::{search_materials, DuckDuckGoSearch, SearchConfig, SearchHit, SearchProvider};
use crate::model::task::Difficulty;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const MAX_DIAGNOSTIC_CHARS: usize = 100;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a study helper for school students. Answer in the language of the question.";
const MATERIALS_SYSTEM_PROMPT: &str = "You are an expert in finding educational content.";
const TUTOR_SYSTEM_PROMPT: &str = "You are an experienced tutor.";
const CLASSIFY_SYSTEM_PROMPT: &str = "Reply with exactly one word: easy, normal or hard.";
const TOPIC_SYSTEM_PROMPT: &str = "Reply with the topic only.";

/// Plan returned when step decomposition is unavailable.
pub const STEPS_FALLBACK: &str = "1. Read the assignment carefully.\n\
2. Collect the material you need.\n\
3. Do the work in small parts.\n\
4. Check the result before handing it in.";

/// Remediation shown when the secondary tier ran out of credits.
pub const QUOTA_HINT: &str = "The secondary AI provider has run out of credits. \
Set GEMINI_API_KEY to enable the primary provider.";

/// Words that mark a request for reference material.
const MATERIAL_CUES: &[&str] = &[
    "link",
    "links",
    "material",
    "materials",
    "video",
    "videos",
    "read",
    "study",
    "ссылки",
    "материалы",
    "видео",
    "почитать",
    "изучить",
];

/// Provider selection and tuning.
///
/// An absent or blank key disables that tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gemini API key.
    pub primary_provider_key: Option<String>,
    /// OpenAI API key.
    pub secondary_provider_key: Option<String>,
    /// Model used by the primary tier.
    pub model_name: String,
    pub secondary_model_name: String,
    pub request_timeout_secs: u64,
    pub primary_base_url: Option<String>,
    pub secondary_base_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            primary_provider_key: None,
            secondary_provider_key: None,
            model_name: "gemini-1.5-flash".to_string(),
            secondary_model_name: "gpt-4.1-mini".to_string(),
            request_timeout_secs: 30,
            primary_base_url: None,
            secondary_base_url: None,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Classified failure of a gateway call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrichmentFailure {
    /// The secondary tier rejected the call for quota or billing reasons.
    #[error("provider exhausted: {hint}")]
    ProviderExhausted { hint: String },
    /// Any other failure, with a truncated diagnostic.
    #[error("provider error: {message}")]
    ProviderError { message: String },
}

impl EnrichmentFailure {
    fn provider_error(message: impl AsRef<str>) -> Self {
        Self::ProviderError {
            message: truncate_chars(message.as_ref(), MAX_DIAGNOSTIC_CHARS),
        }
    }

    /// Text suitable for showing to the participant.
    pub fn user_message(&self) -> String {
        match self {
            Self::ProviderExhausted { hint } => format!("❌ {hint}"),
            Self::ProviderError { message } => format!("❌ AI error: {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Primary,
    Secondary,
}

impl Tier {
    fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Tiered text generation with optional materials search.
pub struct EnrichmentGateway {
    primary: Option<Arc<dyn TextProvider>>,
    secondary: Option<Arc<dyn TextProvider>>,
    search: Option<Arc<dyn SearchProvider>>,
    search_config: SearchConfig,
    call_timeout: Duration,
}

impl EnrichmentGateway {
    pub fn new(
        primary: Option<Arc<dyn TextProvider>>,
        secondary: Option<Arc<dyn TextProvider>>,
    ) -> Self {
        Self {
            primary,
            secondary,
            search: None,
            search_config: SearchConfig::default(),
            call_timeout: GatewayConfig::default().request_timeout(),
        }
    }

    /// Builds the Gemini/OpenAI tiers and the DuckDuckGo search from
    /// configuration.
    ///
    /// # Errors
    /// Returns the HTTP client builder error when TLS setup fails.
    pub fn from_config(
        config: &GatewayConfig,
        search_config: &SearchConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_client(config.request_timeout())?;

        let primary = non_blank(config.primary_provider_key.as_deref()).map(|key| {
            let mut gemini = GeminiConfig::new(key, &config.model_name);
            if let Some(url) = &config.primary_base_url {
                gemini = gemini.with_base_url(url);
            }
            Arc::new(GeminiProvider::new(gemini, client.clone())) as Arc<dyn TextProvider>
        });
        let secondary = non_blank(config.secondary_provider_key.as_deref()).map(|key| {
            let mut openai = OpenAiConfig::new(key, &config.secondary_model_name);
            if let Some(url) = &config.secondary_base_url {
                openai = openai.with_base_url(url);
            }
            Arc::new(OpenAiProvider::new(openai, client.clone())) as Arc<dyn TextProvider>
        });

        let mut gateway = Self::new(primary, secondary).with_timeout(config.request_timeout());
        if search_config.enabled {
            let search_client = build_client(search_config.timeout())?;
            gateway = gateway.with_search(
                Arc::new(DuckDuckGoSearch::new(search_client)),
                search_config.clone(),
            );
        }
        info!(
            "event=gateway_init module=ai status=ok primary={} secondary={} search={}",
            gateway.primary.is_some(),
            gateway.secondary.is_some(),
            gateway.search.is_some()
        );
        Ok(gateway)
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>, config: SearchConfig) -> Self {
        self.search = Some(search);
        self.search_config = config;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Whether any provider tier is configured.
    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    /// Answers `query`, optionally enriched with found study materials.
    ///
    /// Materials mode is entered when `want_materials` is set or the query
    /// itself asks for links, videos or reading.
    pub async fn respond(
        &self,
        query: &str,
        system_prompt: &str,
        want_materials: bool,
    ) -> Result<String, EnrichmentFailure> {
        let context = if want_materials || wants_materials(query) {
            let topic = self.extract_topic(query).await;
            let hits = self.find_links(&topic).await;
            materials_context(&hits)
        } else {
            String::new()
        };

        self.dispatch(&Prompt::new(system_prompt, format!("{query}{context}")))
            .await
    }

    /// Asks for a one-word difficulty. Never fails: provider failures and
    /// unrecognized answers yield `Normal`.
    pub async fn classify_difficulty(&self, subject: &str, description: &str) -> Difficulty {
        let query = format!(
            "Rate the difficulty of this homework with one word (easy, normal, hard): {subject} - {description}"
        );
        match self.respond(&query, CLASSIFY_SYSTEM_PROMPT, false).await {
            Ok(answer) => Difficulty::from_classification(&answer),
            Err(failure) => {
                warn!("event=classify_difficulty module=ai status=fallback error={failure}");
                Difficulty::Normal
            }
        }
    }

    /// Splits a task into steps, falling back to [`STEPS_FALLBACK`].
    pub async fn decompose_steps(&self, text: &str) -> String {
        let query = format!("Split this task into 3-5 short concrete steps: {text}");
        match self.respond(&query, TUTOR_SYSTEM_PROMPT, false).await {
            Ok(steps) => steps,
            Err(failure) => {
                warn!("event=decompose_steps module=ai status=fallback error={failure}");
                STEPS_FALLBACK.to_string()
            }
        }
    }

    /// Finds reference material (videos and articles) for a task.
    pub async fn find_materials(&self, task_text: &str) -> Result<String, EnrichmentFailure> {
        let query = format!(
            "Find real links to materials (VK videos and articles) on this topic: {task_text}. Do not invent links!"
        );
        self.respond(&query, MATERIALS_SYSTEM_PROMPT, true).await
    }

    /// Produces a detailed plan for completing a task.
    pub async fn plan_steps(&self, task_text: &str) -> Result<String, EnrichmentFailure> {
        let query =
            format!("Break the completion of this task into concrete steps: {task_text}. Use emoji.");
        self.respond(&query, TUTOR_SYSTEM_PROMPT, false).await
    }

    async fn extract_topic(&self, query: &str) -> String {
        let prompt = Prompt::new(
            TOPIC_SYSTEM_PROMPT,
            format!("Extract only the topic (2-3 words) from this request: {query}"),
        );
        match self.dispatch(&prompt).await {
            Ok(topic) if !topic.trim().is_empty() => topic.trim().to_string(),
            Ok(_) => query.to_string(),
            Err(failure) => {
                warn!("event=extract_topic module=ai status=fallback error={failure}");
                query.to_string()
            }
        }
    }

    async fn find_links(&self, topic: &str) -> Vec<SearchHit> {
        match &self.search {
            Some(search) => search_materials(search.as_ref(), topic, &self.search_config).await,
            None => Vec::new(),
        }
    }

    async fn dispatch(&self, prompt: &Prompt) -> Result<String, EnrichmentFailure> {
        let (provider, tier) = match (&self.primary, &self.secondary) {
            (Some(primary), _) => (primary, Tier::Primary),
            (None, Some(secondary)) => (secondary, Tier::Secondary),
            (None, None) => {
                warn!("event=ai_dispatch module=ai status=error reason=no_provider");
                return Err(EnrichmentFailure::provider_error(
                    "no AI provider is configured",
                ));
            }
        };

        let outcome = tokio::time::timeout(self.call_timeout, provider.generate(prompt))
            .await
            .unwrap_or_else(|_| {
                Err(ProviderFailure::new(
                    provider.name(),
                    ProviderFailureKind::Timeout,
                    format!("timed out after {}s", self.call_timeout.as_secs_f32()),
                ))
            });

        match outcome {
            Ok(text) => {
                info!(
                    "event=ai_dispatch module=ai status=ok provider={} tier={}",
                    provider.name(),
                    tier.as_str()
                );
                Ok(text)
            }
            Err(failure) => {
                warn!(
                    "event=ai_dispatch module=ai status=error provider={} tier={} kind={:?}",
                    failure.provider,
                    tier.as_str(),
                    failure.kind
                );
                Err(classify_failure(tier, failure))
            }
        }
    }
}

fn classify_failure(tier: Tier, failure: ProviderFailure) -> EnrichmentFailure {
    match (tier, failure.kind) {
        (Tier::Secondary, ProviderFailureKind::QuotaExhausted) => {
            EnrichmentFailure::ProviderExhausted {
                hint: QUOTA_HINT.to_string(),
            }
        }
        _ => EnrichmentFailure::provider_error(failure.to_string()),
    }
}

/// Lexical detection of a materials request.
pub fn wants_materials(query: &str) -> bool {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| MATERIAL_CUES.contains(&word))
}

fn materials_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "\n\n(No real links were found; give general guidance only.)".to_string();
    }
    let links = hits
        .iter()
        .map(|hit| format!("- [{}]({})", hit.title, hit.link))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\nReal links found:\n{links}\n\nUse them in the answer.")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
