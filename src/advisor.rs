//! Career-advice passthrough to an external text-generation service.
//!
//! Calls are single-turn on the service side. [`Conversation`] keeps the
//! history locally and resends all of it with every question. Service
//! failures never reach the caller: [`Advisor`] answers with a fixed fallback
//! message instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AdvisorConfig;
use crate::models::{ChatMessage, ChatRole};

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful academic and career advisor for \
mathematics and computer science students in China. You are knowledgeable about 'Baoyan' \
(postgraduate recommendation), entrance exams (Kaoyan), and job markets. Be encouraging, \
concise, and practical.";

pub const EMPTY_REPLY_FALLBACK: &str = "Sorry, I couldn't generate a response at this time.";
pub const ERROR_FALLBACK: &str = "An error occurred while contacting the AI advisor.";

pub const GREETING: &str = "你好！我是你的智能升学顾问。关于保研、考研学校选择或联系导师邮件的撰写，\
有什么可以帮你的吗？(Hi! I am your AI career advisor. How can I help you with grad school applications?)";

#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("advisor API key is not configured")]
    MissingApiKey,

    #[error("network error: {0}")]
    Network(String),

    #[error("advisor service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unreadable advisor response: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceRequest {
    pub system_instruction: String,
    pub history: Vec<ChatMessage>,
}

/// Carries one request to the generation service and returns its raw text.
#[async_trait]
pub trait AdvisoryTransport: Send + Sync {
    async fn generate(&self, request: &AdviceRequest) -> Result<String, AdvisoryError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.iter().map(|part| part.text.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Gemini `generateContent` over HTTPS.
pub struct GeminiTransport {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiTransport {
    pub fn new(config: &AdvisorConfig) -> Result<Self, AdvisoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdvisoryError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        })
    }

    fn body<'a>(request: &'a AdviceRequest) -> GenerateContentBody<'a> {
        GenerateContentBody {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &request.system_instruction,
                }],
            },
            contents: request
                .history
                .iter()
                .map(|message| Content {
                    role: Some(match message.role {
                        ChatRole::User => "user",
                        ChatRole::Model => "model",
                    }),
                    parts: vec![Part {
                        text: &message.text,
                    }],
                })
                .collect(),
        }
    }
}

#[async_trait]
impl AdvisoryTransport for GeminiTransport {
    async fn generate(&self, request: &AdviceRequest) -> Result<String, AdvisoryError> {
        let api_key = self.api_key.as_deref().ok_or(AdvisoryError::MissingApiKey)?;
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);

        tracing::debug!(model = %self.model, turns = request.history.len(), "requesting advice");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::body(request))
            .send()
            .await
            .map_err(|e| AdvisoryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisoryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AdvisoryError::Parse(e.to_string()))?;
        Ok(parsed.text())
    }
}

/// Front door for advice; always produces displayable text.
#[derive(Clone)]
pub struct Advisor {
    transport: Arc<dyn AdvisoryTransport>,
}

impl Advisor {
    pub fn new(transport: Arc<dyn AdvisoryTransport>) -> Self {
        Self { transport }
    }

    pub fn from_config(config: &AdvisorConfig) -> Result<Self, AdvisoryError> {
        Ok(Self::new(Arc::new(GeminiTransport::new(config)?)))
    }

    pub async fn get_advice(&self, prompt: &str) -> String {
        let history = vec![ChatMessage {
            role: ChatRole::User,
            text: prompt.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }];
        self.reply(history).await
    }

    async fn reply(&self, history: Vec<ChatMessage>) -> String {
        let request = AdviceRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            history,
        };

        match self.transport.generate(&request).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY_FALLBACK.to_string(),
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "advisor request failed");
                ERROR_FALLBACK.to_string()
            }
        }
    }
}

/// Locally held chat transcript, opened with the advisor's greeting.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage {
                role: ChatRole::Model,
                text: GREETING.to_string(),
                timestamp: Utc::now().timestamp_millis(),
            }],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Sends the whole transcript plus `text`; blank input is ignored.
    pub async fn ask(&mut self, advisor: &Advisor, text: &str) -> Option<&ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }

        self.messages.push(ChatMessage {
            role: ChatRole::User,
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        });

        // The greeting is local only; the service sees the user's turns onwards.
        let history = self
            .messages
            .iter()
            .skip_while(|message| message.role == ChatRole::Model)
            .cloned()
            .collect();
        let reply = advisor.reply(history).await;

        self.messages.push(ChatMessage {
            role: ChatRole::Model,
            text: reply,
            timestamp: Utc::now().timestamp_millis(),
        });
        self.messages.last()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
