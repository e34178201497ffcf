//! Persona management for agents
//!
//! Loads modular persona definitions from TOML files. A persona fixes an
//! agent's temperament: how the scorer weighs its terms, how much the agent
//! likes each action, which domains it explores, and how it prompts the
//! reasoner.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use hive_core::ActionKind;

use crate::ScoreWeights;

/// Affinity bounds kept by self-modification
const AFFINITY_RANGE: std::ops::RangeInclusive<f64> = 0.05..=1.5;

/// Errors loading a persona
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("failed to read persona file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid persona TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A persona definition loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub persona: PersonaMetadata,
    #[serde(default)]
    pub weights: ScoreWeights,
    /// Per-action affinity keyed by action name
    #[serde(default)]
    pub affinity: BTreeMap<String, f64>,
    #[serde(default)]
    pub expertise: ExpertiseConfig,
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpertiseConfig {
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub system: String,
}

/// Registry of all loaded personas
#[derive(Debug, Default)]
pub struct PersonaRegistry {
    personas: HashMap<String, Persona>,
}

impl PersonaRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all personas from the embedded definitions
    pub fn load_embedded() -> Self {
        let mut registry = Self::new();

        let embedded = [
            include_str!("../personas/explorer.toml"),
            include_str!("../personas/analyst.toml"),
            include_str!("../personas/connector.toml"),
        ];

        for toml_str in embedded {
            if let Ok(persona) = toml::from_str::<Persona>(toml_str) {
                if persona.persona.enabled {
                    registry.register(persona);
                }
            }
        }

        registry
    }

    /// Load personas from a directory
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let mut registry = Self::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "toml") {
                if let Ok(persona) = Persona::from_file(&path) {
                    if persona.persona.enabled {
                        registry.register(persona);
                    }
                }
            }
        }

        Ok(registry)
    }

    /// Register a persona
    pub fn register(&mut self, persona: Persona) {
        self.personas.insert(persona.persona.id.clone(), persona);
    }

    /// Get a persona by ID
    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.get(id)
    }

    /// List all persona IDs, sorted
    pub fn list_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.personas.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Count of loaded personas
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Persona {
    /// Parse a single persona file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PersonaError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Get the system prompt
    pub fn system_prompt(&self) -> &str {
        &self.prompt.system
    }

    /// Affinity for an action (0.0 when unspecified)
    pub fn affinity(&self, kind: ActionKind) -> f64 {
        self.affinity.get(kind.as_str()).copied().unwrap_or(0.0)
    }

    /// Domain to work on at `tick`, rotating through the expertise list
    pub fn domain_for_tick(&self, tick: u64) -> &str {
        if self.expertise.domains.is_empty() {
            return "general";
        }
        let idx = (tick % self.expertise.domains.len() as u64) as usize;
        &self.expertise.domains[idx]
    }

    /// Check if this persona covers a domain
    pub fn covers_domain(&self, domain: &str) -> bool {
        self.expertise.domains.iter().any(|d| d == domain)
    }

    /// Self-modification: move affinity towards actions that paid off.
    ///
    /// `outcomes` holds (action, productive) pairs. Each productive action
    /// gains `step`, each unproductive one loses half of it. Returns how
    /// many affinities changed.
    pub fn adapt(&mut self, outcomes: &[(ActionKind, bool)], step: f64) -> usize {
        let mut changed = 0;
        for (kind, productive) in outcomes {
            let delta = if *productive { step } else { -step / 2.0 };
            let entry = self
                .affinity
                .entry(kind.as_str().to_string())
                .or_insert(0.5);
            let next = (*entry + delta).clamp(*AFFINITY_RANGE.start(), *AFFINITY_RANGE.end());
            if (next - *entry).abs() > f64::EPSILON {
                *entry = next;
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_embedded_personas() {
        let registry = PersonaRegistry::load_embedded();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.list_ids(), vec!["analyst", "connector", "explorer"]);

        let explorer = registry.get("explorer").unwrap();
        assert_eq!(explorer.affinity(ActionKind::Explore), 1.0);
        assert!(explorer.system_prompt().contains("CONFIDENCE"));
        assert!(explorer.covers_domain("climate"));
    }

    #[test]
    fn test_domain_rotation() {
        let registry = PersonaRegistry::load_embedded();
        let analyst = registry.get("analyst").unwrap();
        assert_eq!(analyst.domain_for_tick(0), "genomics");
        assert_eq!(analyst.domain_for_tick(4), "epidemiology");
    }

    #[test]
    fn test_minimal_persona_uses_defaults() {
        let persona: Persona = toml::from_str(
            r#"
            [persona]
            id = "bare"
            name = "Bare"

            [prompt]
            system = "be brief"
            "#,
        )
        .unwrap();

        assert!(!persona.persona.enabled);
        assert_eq!(persona.weights, ScoreWeights::default());
        assert_eq!(persona.affinity(ActionKind::Scan), 0.0);
        assert_eq!(persona.domain_for_tick(3), "general");
    }

    #[test]
    fn test_adapt_moves_and_clamps() {
        let registry = PersonaRegistry::load_embedded();
        let mut persona = registry.get("explorer").unwrap().clone();

        let changed = persona.adapt(
            &[(ActionKind::Analyze, true), (ActionKind::Scan, false)],
            0.1,
        );
        assert_eq!(changed, 2);
        assert!((persona.affinity(ActionKind::Analyze) - 0.6).abs() < 1e-9);
        assert!((persona.affinity(ActionKind::Scan) - 0.15).abs() < 1e-9);

        for _ in 0..50 {
            persona.adapt(&[(ActionKind::Explore, true)], 0.1);
        }
        assert_eq!(persona.affinity(ActionKind::Explore), 1.5);
    }
}
