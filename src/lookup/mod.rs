//! Read-only lookup ports for reference material.
//!
//! Phases consult past proposals, a reference library and a personnel
//! directory through these traits. Implementations are injected into the
//! engine; failures never abort a phase and degrade to empty results via the
//! `*_or_empty` helpers on [`Lookups`].

pub mod catalog;

pub use catalog::{Catalog, InMemoryCatalog};

use crate::errors::LookupError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// A past proposal similar to the current RFP.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub title: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub year: u16,
    /// Outcome of the bid, e.g. "won" or "lost".
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSummary {
    pub title: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub expertise: Vec<String>,
}

#[async_trait]
pub trait ProposalHistory: Send + Sync {
    async fn search_similar(&self, query: &str) -> Result<Vec<ProposalSummary>, LookupError>;
}

#[async_trait]
pub trait ReferenceLibrary: Send + Sync {
    async fn search_references(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ReferenceSummary>, LookupError>;
}

#[async_trait]
pub trait PersonnelDirectory: Send + Sync {
    async fn allocate_team(&self, skills: &[String], size: usize)
    -> Result<Vec<Person>, LookupError>;
}

/// The injected bundle of lookup collaborators.
#[derive(Clone)]
pub struct Lookups {
    pub proposals: Arc<dyn ProposalHistory>,
    pub references: Arc<dyn ReferenceLibrary>,
    pub personnel: Arc<dyn PersonnelDirectory>,
}

impl Lookups {
    /// Serve all three ports from one catalog.
    pub fn from_catalog(catalog: Arc<InMemoryCatalog>) -> Self {
        Self {
            proposals: catalog.clone(),
            references: catalog.clone(),
            personnel: catalog,
        }
    }

    /// Lookups backed by an empty catalog.
    pub fn empty() -> Self {
        Self::from_catalog(Arc::new(InMemoryCatalog::default()))
    }

    pub async fn similar_or_empty(&self, query: &str) -> Vec<ProposalSummary> {
        match self.proposals.search_similar(query).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, query, "proposal history lookup failed, continuing without it");
                Vec::new()
            }
        }
    }

    pub async fn references_or_empty(&self, query: &str, top_k: usize) -> Vec<ReferenceSummary> {
        match self.references.search_references(query, top_k).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, query, "reference lookup failed, continuing without it");
                Vec::new()
            }
        }
    }

    pub async fn team_or_empty(&self, skills: &[String], size: usize) -> Vec<Person> {
        match self.personnel.allocate_team(skills, size).await {
            Ok(team) => team,
            Err(e) => {
                warn!(error = %e, ?skills, "personnel lookup failed, continuing without it");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenBackend;

    #[async_trait]
    impl ProposalHistory for BrokenBackend {
        async fn search_similar(&self, _query: &str) -> Result<Vec<ProposalSummary>, LookupError> {
            Err(LookupError::Unavailable("connection refused".into()))
        }
    }

    #[async_trait]
    impl ReferenceLibrary for BrokenBackend {
        async fn search_references(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> Result<Vec<ReferenceSummary>, LookupError> {
            Err(LookupError::Unavailable("timeout".into()))
        }
    }

    #[async_trait]
    impl PersonnelDirectory for BrokenBackend {
        async fn allocate_team(
            &self,
            _skills: &[String],
            _size: usize,
        ) -> Result<Vec<Person>, LookupError> {
            Err(LookupError::InvalidQuery("empty skill list".into()))
        }
    }

    #[tokio::test]
    async fn test_failures_degrade_to_empty_results() {
        let broken = Arc::new(BrokenBackend);
        let lookups = Lookups {
            proposals: broken.clone(),
            references: broken.clone(),
            personnel: broken,
        };

        assert!(lookups.similar_or_empty("cloud").await.is_empty());
        assert!(lookups.references_or_empty("cloud", 2).await.is_empty());
        assert!(
            lookups
                .team_or_empty(&["AWS".to_string()], 5)
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_empty_lookups_return_nothing() {
        let lookups = Lookups::empty();
        assert!(lookups.similar_or_empty("anything").await.is_empty());
    }
}
