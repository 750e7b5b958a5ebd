//! Model Catalog
//!
//! Known chat models with display names, and the per-turn selection a surface
//! edits before sending.

use std::fmt;

use thiserror::Error;

use crate::dispatcher::MAX_MODELS_PER_TURN;
use crate::messages::ModelId;

/// One entry in the catalog
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelEntry {
    /// Identifier sent to the endpoint
    pub id: ModelId,
    /// Human-readable name
    pub display_name: String,
    /// Whether the model streams reasoning text
    pub reasoning: bool,
}

impl ModelEntry {
    fn new(id: &str, display_name: &str, reasoning: bool) -> Self {
        Self {
            id: ModelId::from(id),
            display_name: display_name.to_string(),
            reasoning,
        }
    }
}

/// List of models a surface can offer
#[derive(Clone, Debug)]
pub struct ModelCatalog {
    entries: Vec<ModelEntry>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            entries: vec![
                ModelEntry::new("gpt-4o", "GPT-4o", false),
                ModelEntry::new("gpt-4.5-preview", "GPT-4.5 Preview", false),
                ModelEntry::new("claude-sonnet-4-20250514", "Claude Sonnet 4", false),
                ModelEntry::new(
                    "claude-sonnet-4-20250514-thinking",
                    "Claude Sonnet 4 (Thinking)",
                    true,
                ),
                ModelEntry::new("gemini-2.5-pro", "Gemini 2.5 Pro", true),
                ModelEntry::new("deepseek-v3", "DeepSeek V3", false),
                ModelEntry::new("deepseek-r1", "DeepSeek R1", true),
            ],
        }
    }
}

impl ModelCatalog {
    /// The built-in catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    pub fn register(&mut self, entry: ModelEntry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// All entries in display order
    #[must_use]
    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    /// Look up an entry
    #[must_use]
    pub fn get(&self, id: &ModelId) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Display name for `id`, falling back to the raw identifier
    #[must_use]
    pub fn display_name<'a>(&'a self, id: &'a ModelId) -> &'a str {
        self.get(id).map_or(id.as_str(), |e| e.display_name.as_str())
    }
}

/// Why a selection change was refused
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// The selection already holds the maximum
    #[error("at most {max} models can be selected")]
    LimitReached {
        /// The limit
        max: usize,
    },

    /// Deselecting would leave nothing selected
    #[error("at least one model must stay selected")]
    LastModel,
}

/// Ordered set of models the next turn is sent to
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelSelection {
    models: Vec<ModelId>,
}

impl ModelSelection {
    /// Selection holding `models`, deduplicated and capped at the limit
    #[must_use]
    pub fn new(models: impl IntoIterator<Item = ModelId>) -> Self {
        let mut selection = Self::default();
        for model in models {
            if selection.models.len() == MAX_MODELS_PER_TURN {
                break;
            }
            if !selection.contains(&model) {
                selection.models.push(model);
            }
        }
        selection
    }

    /// Selected models in selection order
    #[must_use]
    pub fn models(&self) -> &[ModelId] {
        &self.models
    }

    /// Whether `model` is selected
    #[must_use]
    pub fn contains(&self, model: &ModelId) -> bool {
        self.models.contains(model)
    }

    /// Number of selected models
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether nothing is selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Select or deselect `model`; returns whether it is now selected
    ///
    /// # Errors
    ///
    /// Fails when selecting beyond the limit or deselecting the last model.
    pub fn toggle(&mut self, model: ModelId) -> Result<bool, SelectionError> {
        if let Some(pos) = self.models.iter().position(|m| m == &model) {
            if self.models.len() == 1 {
                return Err(SelectionError::LastModel);
            }
            self.models.remove(pos);
            return Ok(false);
        }

        if self.models.len() >= MAX_MODELS_PER_TURN {
            return Err(SelectionError::LimitReached {
                max: MAX_MODELS_PER_TURN,
            });
        }
        self.models.push(model);
        Ok(true)
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.models.iter().map(ModelId::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_display_names() {
        let catalog = ModelCatalog::new();
        assert_eq!(catalog.entries().len(), 7);
        assert_eq!(catalog.display_name(&ModelId::from("deepseek-r1")), "DeepSeek R1");
        assert_eq!(
            catalog.display_name(&ModelId::from("claude-sonnet-4-20250514-thinking")),
            "Claude Sonnet 4 (Thinking)"
        );

        let unknown = ModelId::from("local-llama");
        assert_eq!(catalog.display_name(&unknown), "local-llama");
    }

    #[test]
    fn test_register_replaces() {
        let mut catalog = ModelCatalog::new();
        catalog.register(ModelEntry::new("gpt-4o", "Omni", false));
        catalog.register(ModelEntry::new("qwq", "QwQ", true));

        assert_eq!(catalog.display_name(&ModelId::from("gpt-4o")), "Omni");
        assert_eq!(catalog.entries().len(), 8);
        assert!(catalog.get(&ModelId::from("qwq")).unwrap().reasoning);
    }

    #[test]
    fn test_selection_limit() {
        let mut selection = ModelSelection::new([ModelId::from("a")]);
        assert_eq!(selection.toggle(ModelId::from("b")), Ok(true));
        assert_eq!(selection.toggle(ModelId::from("c")), Ok(true));
        assert_eq!(
            selection.toggle(ModelId::from("d")),
            Err(SelectionError::LimitReached { max: 3 })
        );
        assert_eq!(selection.to_string(), "a, b, c");
    }

    #[test]
    fn test_selection_toggle_off_and_last() {
        let mut selection = ModelSelection::new([ModelId::from("a"), ModelId::from("b")]);
        assert_eq!(selection.toggle(ModelId::from("a")), Ok(false));
        assert_eq!(
            selection.toggle(ModelId::from("b")),
            Err(SelectionError::LastModel)
        );
        assert_eq!(selection.models(), &[ModelId::from("b")]);
    }

    #[test]
    fn test_selection_new_dedups_and_caps() {
        let selection = ModelSelection::new(
            ["a", "a", "b", "c", "d"].into_iter().map(ModelId::from),
        );
        assert_eq!(selection.len(), 3);
        assert!(!selection.contains(&ModelId::from("d")));
    }
}
