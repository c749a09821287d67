//! Model value object representing an LLM model

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Available LLM models (Value Object)
///
/// Models are addressed by their OpenRouter-style identifier
/// (`provider/model-name`). An agent is nothing more than a named remote
/// text-generation capability; all conversational state lives in the
/// channel transcript, never in the model itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Model {
    // OpenAI models
    Gpt4o,
    Gpt4oMini,
    Gpt41,
    // Anthropic models
    ClaudeSonnet4,
    ClaudeOpus41,
    ClaudeHaiku35,
    // Google models
    Gemini25Pro,
    Gemini25Flash,
    // Open-weight models
    Llama4Maverick,
    DeepseekV3,
    Qwen3,
    // Custom
    Custom(String),
}

impl Model {
    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        match self {
            Model::Gpt4o => "openai/gpt-4o",
            Model::Gpt4oMini => "openai/gpt-4o-mini",
            Model::Gpt41 => "openai/gpt-4.1",
            Model::ClaudeSonnet4 => "anthropic/claude-sonnet-4",
            Model::ClaudeOpus41 => "anthropic/claude-opus-4.1",
            Model::ClaudeHaiku35 => "anthropic/claude-3.5-haiku",
            Model::Gemini25Pro => "google/gemini-2.5-pro",
            Model::Gemini25Flash => "google/gemini-2.5-flash",
            Model::Llama4Maverick => "meta-llama/llama-4-maverick",
            Model::DeepseekV3 => "deepseek/deepseek-chat-v3-0324",
            Model::Qwen3 => "qwen/qwen3-235b-a22b",
            Model::Custom(s) => s,
        }
    }

    /// Default moderator for a consensus channel
    pub fn default_moderator() -> Model {
        Model::ClaudeSonnet4
    }

    /// Default participant set for a consensus channel
    pub fn default_participants() -> Vec<Model> {
        vec![Model::Gpt4o, Model::Gemini25Pro, Model::DeepseekV3]
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "openai/gpt-4o" => Model::Gpt4o,
            "openai/gpt-4o-mini" => Model::Gpt4oMini,
            "openai/gpt-4.1" => Model::Gpt41,
            "anthropic/claude-sonnet-4" => Model::ClaudeSonnet4,
            "anthropic/claude-opus-4.1" => Model::ClaudeOpus41,
            "anthropic/claude-3.5-haiku" => Model::ClaudeHaiku35,
            "google/gemini-2.5-pro" => Model::Gemini25Pro,
            "google/gemini-2.5-flash" => Model::Gemini25Flash,
            "meta-llama/llama-4-maverick" => Model::Llama4Maverick,
            "deepseek/deepseek-chat-v3-0324" => Model::DeepseekV3,
            "qwen/qwen3-235b-a22b" => Model::Qwen3,
            other => Model::Custom(other.to_string()),
        })
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().expect("model parsing is infallible"))
    }
}
