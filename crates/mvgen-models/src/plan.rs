//! Song plan items and title bookkeeping.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::lyrics::sanitize_title;

/// Raw plan entry as returned by the planning model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// One planned song. Immutable once written to the plan file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SongPlanItem {
    /// 1-based position in the album
    pub index: u32,
    pub title: String,
    pub description: String,
}

impl SongPlanItem {
    /// Generic placeholder used when planning fails.
    pub fn placeholder(index: u32, concept: &str) -> Self {
        Self {
            index,
            title: format!("Song {}", index),
            description: concept.to_string(),
        }
    }

    /// Build a plan of `total` placeholders.
    pub fn placeholders(total: u32, concept: &str) -> Vec<Self> {
        (1..=total).map(|i| Self::placeholder(i, concept)).collect()
    }

    /// Normalize model output into exactly `total` items: extra entries are
    /// dropped, missing ones and blank titles become placeholders.
    pub fn from_entries(entries: Vec<PlanEntry>, total: u32, concept: &str) -> Vec<Self> {
        let mut items: Vec<Self> = entries
            .into_iter()
            .take(total as usize)
            .enumerate()
            .map(|(i, entry)| {
                let index = i as u32 + 1;
                let title = entry.title.trim();
                if title.is_empty() {
                    Self::placeholder(index, concept)
                } else {
                    Self {
                        index,
                        title: title.to_string(),
                        description: entry.description.trim().to_string(),
                    }
                }
            })
            .collect();

        for index in (items.len() as u32 + 1)..=total {
            items.push(Self::placeholder(index, concept));
        }
        items
    }
}

/// Tracks titles already used in a run and resolves collisions with
/// `" (2)"`, `" (3)"`, ... suffixes.
///
/// Collisions are detected on the sanitized, lowercased title so two titles
/// that would map to the same artifact file name are treated as equal.
#[derive(Debug, Default, Clone)]
pub struct TitleRegistry {
    used: HashSet<String>,
}

impl TitleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(title: &str) -> String {
        sanitize_title(title).to_lowercase()
    }

    /// Claim a title, returning it unchanged or with a numeric suffix.
    pub fn claim(&mut self, title: &str) -> String {
        let title = title.trim();
        if self.used.insert(Self::key(title)) {
            return title.to_string();
        }

        let mut n = 2;
        loop {
            let candidate = format!("{} ({})", title, n);
            if self.used.insert(Self::key(&candidate)) {
                return candidate;
            }
            n += 1;
        }
    }
}
