//! Prebuilt content packs shipped with the deployment and held in memory.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackItem {
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Citation that must appear verbatim when the item grounds a caption.
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Pack {
    #[allow(dead_code)]
    name: String,
    items: Vec<PackItem>,
}

#[derive(Debug, Clone, Default)]
pub struct PrebuiltPacks {
    items: Vec<PackItem>,
}

impl PrebuiltPacks {
    pub fn new(items: Vec<PackItem>) -> Self {
        Self { items }
    }

    /// Loads a JSON array of `{ "name", "items": [...] }` packs.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading prebuilt packs from {}", path.display()))?;
        let packs: Vec<Pack> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing prebuilt packs in {}", path.display()))?;
        let items: Vec<PackItem> = packs.into_iter().flat_map(|p| p.items).collect();
        info!("Loaded {} prebuilt pack items", items.len());
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First item whose tag equals the normalized topic, or whose text contains it.
    pub fn find(&self, topic: &str) -> Option<&PackItem> {
        let needle = normalize(topic);
        if needle.is_empty() {
            return None;
        }
        self.items.iter().find(|item| {
            item.tags.iter().any(|t| normalize(t) == needle)
                || item.text.to_lowercase().contains(&needle)
        })
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
