//! In-memory catalog serving all three lookup ports.
//!
//! The catalog is a JSON document with `proposals`, `references` and
//! `personnel` arrays, usually kept at `.bidforge/catalog.json`.

use super::{
    PersonnelDirectory, Person, ProposalHistory, ProposalSummary, ReferenceLibrary,
    ReferenceSummary,
};
use crate::errors::LookupError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogProposal {
    #[serde(flatten)]
    pub summary: ProposalSummary,
    #[serde(default)]
    pub key_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogReference {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPerson {
    #[serde(flatten)]
    pub person: Person,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// On-disk catalog document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub proposals: Vec<CatalogProposal>,
    #[serde(default)]
    pub references: Vec<CatalogReference>,
    #[serde(default)]
    pub personnel: Vec<CatalogPerson>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog: {}", path.display()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    catalog: Catalog,
}

impl InMemoryCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Load from `path`, or start empty when the file does not exist.
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if path.exists() {
            Ok(Self::new(Catalog::load(path)?))
        } else {
            Ok(Self::default())
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

/// Lowercased query words of at least two characters.
fn keywords(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 2)
        .collect()
}

fn hits(words: &[String], haystack: &str) -> usize {
    let haystack = haystack.to_lowercase();
    words.iter().filter(|w| haystack.contains(w.as_str())).count()
}

/// Sort by descending score, keeping catalog order among ties.
fn ranked<T: Clone>(mut scored: Vec<(usize, T)>) -> Vec<T> {
    scored.retain(|(score, _)| *score > 0);
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, item)| item).collect()
}

#[async_trait]
impl ProposalHistory for InMemoryCatalog {
    async fn search_similar(&self, query: &str) -> Result<Vec<ProposalSummary>, LookupError> {
        let words = keywords(query);
        if words.is_empty() {
            return Ok(Vec::new());
        }
        let scored = self
            .catalog
            .proposals
            .iter()
            .map(|p| {
                let score = hits(&words, &p.summary.title)
                    + hits(&words, &p.summary.client)
                    + p.key_messages.iter().map(|m| hits(&words, m)).sum::<usize>();
                (score, p.summary.clone())
            })
            .collect();
        Ok(ranked(scored))
    }
}

#[async_trait]
impl ReferenceLibrary for InMemoryCatalog {
    async fn search_references(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ReferenceSummary>, LookupError> {
        let words = keywords(query);
        if words.is_empty() {
            return Ok(Vec::new());
        }
        // title 3, topic 2, body 1
        let scored = self
            .catalog
            .references
            .iter()
            .map(|r| {
                let score = 3 * hits(&words, &r.title)
                    + 2 * r.topics.iter().map(|t| hits(&words, t)).sum::<usize>()
                    + hits(&words, &r.content);
                let summary = ReferenceSummary {
                    title: r.title.clone(),
                    topics: r.topics.clone(),
                };
                (score, summary)
            })
            .collect();
        Ok(ranked(scored).into_iter().take(top_k).collect())
    }
}

#[async_trait]
impl PersonnelDirectory for InMemoryCatalog {
    async fn allocate_team(
        &self,
        skills: &[String],
        size: usize,
    ) -> Result<Vec<Person>, LookupError> {
        let skills: Vec<String> = skills.iter().map(|s| s.to_lowercase()).collect();
        let scored = self
            .catalog
            .personnel
            .iter()
            .filter(|p| p.available)
            .map(|p| {
                let score = skills
                    .iter()
                    .filter(|skill| {
                        p.person
                            .expertise
                            .iter()
                            .any(|e| e.to_lowercase().contains(skill.as_str()))
                    })
                    .count();
                (score, p.person.clone())
            })
            .collect();
        Ok(ranked(scored).into_iter().take(size).collect())
    }
}
