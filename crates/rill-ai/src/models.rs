//! Model catalogue offered by the front end, with a public lookup API.

use serde::{Deserialize, Serialize};

/// A selectable model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier sent upstream (e.g., "openai/gpt-4o")
    pub id: String,
    /// Human-readable name
    pub name: String,
}

impl ModelInfo {
    /// Vendor prefix of the id ("openai" for "openai/gpt-4o")
    pub fn vendor(&self) -> &str {
        self.id.split_once('/').map(|(v, _)| v).unwrap_or("custom")
    }
}

struct ModelEntry {
    id: &'static str,
    name: &'static str,
}

const MODEL_ENTRIES: &[ModelEntry] = &[
    ModelEntry { id: "openai/gpt-oss-120b", name: "GPT-OSS 120B" },
    ModelEntry { id: "openai/gpt-4o", name: "GPT-4o" },
    ModelEntry { id: "openai/gpt-4-turbo", name: "GPT-4 Turbo" },
    ModelEntry { id: "openai/gpt-3.5-turbo", name: "GPT-3.5 Turbo" },
    ModelEntry { id: "anthropic/claude-3.5-sonnet", name: "Claude 3.5 Sonnet" },
    ModelEntry { id: "anthropic/claude-3-opus", name: "Claude 3 Opus" },
    ModelEntry { id: "google/gemini-pro-1.5", name: "Gemini Pro 1.5" },
    ModelEntry { id: "meta-llama/llama-3.1-70b-instruct", name: "Llama 3.1 70B Instruct" },
];

/// Id of the model used when none is configured
pub const DEFAULT_MODEL_ID: &str = "openai/gpt-oss-120b";

impl ModelEntry {
    fn to_model(&self) -> ModelInfo {
        ModelInfo {
            id: self.id.to_string(),
            name: self.name.to_string(),
        }
    }
}

/// Get all catalogued models, default first.
pub fn get_all_models() -> Vec<ModelInfo> {
    MODEL_ENTRIES.iter().map(|e| e.to_model()).collect()
}

/// Look up a model by exact id.
pub fn get_model_by_id(id: &str) -> Option<ModelInfo> {
    MODEL_ENTRIES
        .iter()
        .find(|e| e.id == id)
        .map(|e| e.to_model())
}

/// Find a model by exact id, then by case-insensitive substring of id or name.
pub fn find_model(query: &str) -> Option<ModelInfo> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    if let Some(model) = get_model_by_id(query) {
        return Some(model);
    }

    let needle = query.to_lowercase();
    MODEL_ENTRIES
        .iter()
        .find(|e| e.id.to_lowercase().contains(&needle) || e.name.to_lowercase().contains(&needle))
        .map(|e| e.to_model())
}
