//! Static model catalog.
//!
//! The catalog is compiled into the application. A descriptor never changes
//! at runtime and is never persisted; whether a model is available is decided
//! solely by the presence of its file in the models directory.

use serde::{Deserialize, Serialize};

/// Label used when no model is selected.
pub const NO_MODEL_SELECTED: &str = "Select Model";

/// A catalog entry describing a downloadable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Stable identifier, unique within the catalog.
    pub id: String,
    pub display_name: String,
    pub description: String,
    /// Approximate download size for display ("800 MB").
    pub size_label: String,
    /// File name inside the models directory, unique within the catalog.
    pub filename: String,
    pub source_url: String,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        size_label: impl Into<String>,
        filename: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: description.into(),
            size_label: size_label.into(),
            filename: filename.into(),
            source_url: source_url.into(),
        }
    }
}

/// The set of models the application knows how to fetch and load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Build a catalog from explicit descriptors.
    pub const fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    /// The catalog shipped with the application.
    pub fn builtin() -> Self {
        Self::new(vec![
            ModelDescriptor::new(
                "gemma-270m",
                "Gemma 3 270M",
                "Ultra-lightweight, fast instruction model.",
                "270 MB",
                "gemma-3-270m-it-Q4_K_M.gguf",
                "https://huggingface.co/unsloth/gemma-3-270m-it-GGUF/resolve/main/gemma-3-270m-it-Q4_K_M.gguf?download=true",
            ),
            ModelDescriptor::new(
                "gemma-1b",
                "Gemma 3 1B",
                "Balanced performance and speed.",
                "800 MB",
                "gemma-3-1b-it-Q4_K_M.gguf",
                "https://huggingface.co/unsloth/gemma-3-1b-it-GGUF/resolve/main/gemma-3-1b-it-Q4_K_M.gguf?download=true",
            ),
            ModelDescriptor::new(
                "llama-3.2-1b",
                "Llama 3.2 1B",
                "Meta's latest efficient small model.",
                "808 MB",
                "Llama-3.2-1B-Instruct-Q4_K_M.gguf",
                "https://huggingface.co/unsloth/Llama-3.2-1B-Instruct-GGUF/resolve/main/Llama-3.2-1B-Instruct-Q4_K_M.gguf?download=true",
            ),
            ModelDescriptor::new(
                "Llama-3.2-3B",
                "Llama 3.2 3B",
                "Meta's latest efficient small model.",
                "2.02 GB",
                "Llama-3.2-3B-Instruct-Q4_K_M.gguf",
                "https://huggingface.co/unsloth/Llama-3.2-3B-Instruct-GGUF/resolve/main/Llama-3.2-3B-Instruct-Q4_K_M.gguf?download=true",
            ),
        ])
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Look up a descriptor by id.
    pub fn find(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Name to show for an optional model id.
    ///
    /// Unknown ids are shown as-is so stale session references stay readable.
    pub fn display_name_for<'a>(&'a self, id: Option<&'a str>) -> &'a str {
        match id {
            None => NO_MODEL_SELECTED,
            Some(id) => self.find(id).map_or(id, |m| m.display_name.as_str()),
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
