//! Phase artifacts and the write-once provenance chain.

pub mod schema;
pub mod tokens;

pub use schema::{
    AnalysisArtifact, ImplementArtifact, PlanArtifact, ResearchArtifact, SectionSummary,
};
pub use tokens::{estimate_json_tokens, estimate_tokens};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-derived artifact identifier, `artifact-<slot>-<hash prefix>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bounded, schema-validated summary handed from one phase to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseArtifact {
    Research(ResearchArtifact),
    Analysis(AnalysisArtifact),
    Plan(PlanArtifact),
    Implement(ImplementArtifact),
}

impl PhaseArtifact {
    /// Position in the chain, 1-4.
    pub fn slot(&self) -> usize {
        match self {
            Self::Research(_) => 1,
            Self::Analysis(_) => 2,
            Self::Plan(_) => 3,
            Self::Implement(_) => 4,
        }
    }

    pub fn id(&self) -> &ArtifactId {
        match self {
            Self::Research(a) => &a.id,
            Self::Analysis(a) => &a.id,
            Self::Plan(a) => &a.id,
            Self::Implement(a) => &a.id,
        }
    }

    pub fn predecessor(&self) -> Option<&ArtifactId> {
        match self {
            Self::Research(a) => a.predecessor.as_ref(),
            Self::Analysis(a) => a.predecessor.as_ref(),
            Self::Plan(a) => a.predecessor.as_ref(),
            Self::Implement(a) => a.predecessor.as_ref(),
        }
    }

    fn id_mut(&mut self) -> &mut ArtifactId {
        match self {
            Self::Research(a) => &mut a.id,
            Self::Analysis(a) => &mut a.id,
            Self::Plan(a) => &mut a.id,
            Self::Implement(a) => &mut a.id,
        }
    }

    /// Derive and assign the content id. Deterministic for equal content.
    pub fn seal(&mut self) {
        *self.id_mut() = ArtifactId::default();
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
        *self.id_mut() = ArtifactId(format!("artifact-{}-{}", self.slot(), hex));
    }

    pub fn estimated_tokens(&self) -> usize {
        estimate_json_tokens(self)
    }

    /// Schema violations, including the token budget.
    pub fn violations(&self, token_budget: usize) -> Vec<String> {
        let mut v = match self {
            Self::Research(a) => a.violations(),
            Self::Analysis(a) => a.violations(),
            Self::Plan(a) => a.violations(),
            Self::Implement(a) => a.violations(),
        };
        if !self.id().as_str().starts_with(&format!("artifact-{}-", self.slot())) {
            v.push(format!("artifact id '{}' is not sealed", self.id()));
        }
        let tokens = self.estimated_tokens();
        if tokens > token_budget {
            v.push(format!(
                "artifact {} is ~{} tokens (budget {})",
                self.slot(),
                tokens,
                token_budget
            ));
        }
        v
    }

    /// Drop one list entry to shrink the artifact. Returns false when nothing is left to drop.
    pub(crate) fn drop_one(&mut self) -> bool {
        match self {
            Self::Research(a) => a.drop_one(),
            Self::Analysis(a) => a.drop_one(),
            Self::Plan(a) => a.drop_one(),
            Self::Implement(a) => a.drop_one(),
        }
    }

    /// Drop an entry from the lists the next phase relies on. Only used once
    /// secondary lists are empty and text has been shortened.
    pub(crate) fn drop_core(&mut self) -> bool {
        match self {
            Self::Research(_) => false,
            Self::Analysis(a) => a.drop_core(),
            Self::Plan(a) => a.drop_core(),
            Self::Implement(a) => a.drop_core(),
        }
    }

    /// Cut every free-text field and list entry to at most `max_chars`.
    pub(crate) fn shorten_text(&mut self, max_chars: usize) {
        match self {
            Self::Research(a) => a.shorten_text(max_chars),
            Self::Analysis(a) => a.shorten_text(max_chars),
            Self::Plan(a) => a.shorten_text(max_chars),
            Self::Implement(a) => a.shorten_text(max_chars),
        }
    }
}

/// Append-only chain of committed artifacts. Slot *k* is written exactly once
/// and must reference slot *k-1*.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactChain(Vec<PhaseArtifact>);

impl ArtifactChain {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Artifact at `slot` (1-based).
    pub fn get(&self, slot: usize) -> Option<&PhaseArtifact> {
        slot.checked_sub(1).and_then(|i| self.0.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhaseArtifact> {
        self.0.iter()
    }

    pub fn plan(&self) -> Option<&PlanArtifact> {
        match self.get(3) {
            Some(PhaseArtifact::Plan(a)) => Some(a),
            _ => None,
        }
    }

    pub fn implement(&self) -> Option<&ImplementArtifact> {
        match self.get(4) {
            Some(PhaseArtifact::Implement(a)) => Some(a),
            _ => None,
        }
    }

    /// Append the next artifact, enforcing order and provenance.
    pub fn commit(&mut self, artifact: PhaseArtifact) -> Result<(), String> {
        let expected_slot = self.0.len() + 1;
        if artifact.slot() != expected_slot {
            return Err(format!(
                "artifact {} committed out of order (next slot is {})",
                artifact.slot(),
                expected_slot
            ));
        }
        let expected_predecessor = self.0.last().map(|a| a.id());
        if artifact.predecessor() != expected_predecessor {
            return Err(format!(
                "artifact {} references {:?}, expected {:?}",
                artifact.slot(),
                artifact.predecessor().map(|p| p.as_str()),
                expected_predecessor.map(|p| p.as_str())
            ));
        }
        self.0.push(artifact);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed(mut artifact: PhaseArtifact) -> PhaseArtifact {
        artifact.seal();
        artifact
    }

    fn research() -> PhaseArtifact {
        sealed(PhaseArtifact::Research(ResearchArtifact {
            rfp_title: "차세대 시스템 구축".into(),
            ..Default::default()
        }))
    }

    #[test]
    fn test_seal_is_deterministic() {
        let a = research();
        let b = research();
        assert_eq!(a.id(), b.id());
        assert!(a.id().as_str().starts_with("artifact-1-"));
    }

    #[test]
    fn test_seal_changes_with_content() {
        let other = sealed(PhaseArtifact::Research(ResearchArtifact {
            rfp_title: "different".into(),
            ..Default::default()
        }));
        assert_ne!(research().id(), other.id());
    }

    #[test]
    fn test_commit_enforces_provenance() {
        let mut chain = ArtifactChain::default();
        let first = research();
        let first_id = first.id().clone();
        chain.commit(first).unwrap();

        let orphan = sealed(PhaseArtifact::Analysis(AnalysisArtifact {
            predecessor: Some(ArtifactId("artifact-1-000000000000".into())),
            ..Default::default()
        }));
        assert!(chain.commit(orphan).is_err());

        let linked = sealed(PhaseArtifact::Analysis(AnalysisArtifact {
            predecessor: Some(first_id.clone()),
            ..Default::default()
        }));
        chain.commit(linked).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.get(2).unwrap().predecessor(), Some(&first_id));
    }

    #[test]
    fn test_commit_is_write_once() {
        let mut chain = ArtifactChain::default();
        chain.commit(research()).unwrap();
        let err = chain.commit(research()).unwrap_err();
        assert!(err.contains("out of order"));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_violations_flag_unsealed_and_over_budget() {
        let unsealed = PhaseArtifact::Research(ResearchArtifact::default());
        let violations = unsealed.violations(8_000);
        assert!(violations.iter().any(|v| v.contains("not sealed")));

        let sealed_artifact = research();
        assert!(sealed_artifact.violations(8_000).is_empty());
        assert!(
            sealed_artifact
                .violations(1)
                .iter()
                .any(|v| v.contains("budget"))
        );
    }

    #[test]
    fn test_chain_serializes_as_tagged_list() {
        let mut chain = ArtifactChain::default();
        chain.commit(research()).unwrap();
        let json = serde_json::to_value(&chain).unwrap();
        assert_eq!(json[0]["kind"], "research");
        let back: ArtifactChain = serde_json::from_value(json).unwrap();
        assert_eq!(back, chain);
    }
}
