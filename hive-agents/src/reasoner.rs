//! LLM-backed reasoning and synthesis
//!
//! Wraps an [`LlmBackend`] into the [`Reasoner`] and [`Synthesizer`]
//! collaborator interfaces. The persona's system prompt asks the model to
//! end with a `CONFIDENCE: x` line, which is parsed out of the artifact.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use hive_core::TransitionReport;

use crate::{AgentError, Reasoner, SharedBackend, Synthesizer, ThinkContext, Thought};

/// Confidence assumed when the model does not state one
const DEFAULT_CONFIDENCE: f64 = 0.4;

/// Evidence lines forwarded per call
const MAX_EVIDENCE: usize = 12;

static CONFIDENCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*\**confidence\**\s*[:=]\s*([01](?:\.\d+)?|\.\d+)\s*$")
        .expect("valid confidence regex")
});

/// System prompt for transition synthesis
const SYNTHESIS_SYSTEM_PROMPT: &str = r#"
You summarise the state of a research swarm at the moment it synchronized.
You are given the findings that were circulating, grouped by domain.

Write a short markdown digest:
## Converged Findings
- the findings several agents agree on
## Open Threads
- promising findings with little support
Keep it under 250 words.
"#;

/// Split a model answer into artifact text and stated confidence
pub fn parse_confidence(answer: &str) -> (String, Option<f64>) {
    let confidence = CONFIDENCE_LINE
        .captures_iter(answer)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|c| c.clamp(0.0, 1.0));

    let artifact = CONFIDENCE_LINE.replace_all(answer, "").trim().to_string();
    (artifact, confidence)
}

/// Reasoner that prompts an LLM with a persona's system prompt
pub struct LlmReasoner {
    backend: SharedBackend,
    system_prompt: String,
}

impl LlmReasoner {
    pub fn new(backend: SharedBackend, system_prompt: &str) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.to_string(),
        }
    }

    fn render(context: &ThinkContext) -> String {
        let mut input = format!("Domain: {}\nTask: {}\n\n", context.domain, context.task);
        if !context.evidence.is_empty() {
            input.push_str("Evidence:\n");
            for line in context.evidence.iter().take(MAX_EVIDENCE) {
                input.push_str(&format!("- {}\n", line));
            }
        }
        input
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn think(&self, context: &ThinkContext) -> Result<Thought, AgentError> {
        if context.max_tokens == 0 {
            return Err(AgentError::Unavailable("generation budget exhausted"));
        }

        let completion = self
            .backend
            .generate(&self.system_prompt, &Self::render(context), context.max_tokens)
            .await
            .map_err(|e| AgentError::Llm(e.to_string()))?;

        let (artifact, confidence) = parse_confidence(&completion.text);
        if artifact.is_empty() {
            return Err(AgentError::Parse("empty reasoning artifact".to_string()));
        }

        debug!(
            "{} reasoned about {} using {} tokens",
            self.backend.model_name(),
            context.domain,
            completion.tokens
        );

        Ok(Thought {
            artifact,
            confidence: confidence.unwrap_or(DEFAULT_CONFIDENCE),
            tokens_consumed: completion.tokens,
        })
    }
}

/// Synthesizer that digests a transition report with an LLM
pub struct LlmSynthesizer {
    backend: SharedBackend,
    max_tokens: u32,
}

impl LlmSynthesizer {
    pub fn new(backend: SharedBackend, max_tokens: u32) -> Self {
        Self { backend, max_tokens }
    }

    fn render(report: &TransitionReport) -> String {
        let mut input = format!(
            "Agent {} declared a transition at tick {} (density {:.3}, {} synchronized signals).\n\n",
            report.agent_id, report.tick, report.density, report.synced_signals
        );
        for (domain, count) in &report.domains {
            input.push_str(&format!("### {} ({} signals)\n", domain, count));
            for signal in report.signals.iter().filter(|s| &s.domain == domain).take(8) {
                input.push_str(&format!(
                    "- [{:.2}] {}\n",
                    signal.confidence,
                    truncate(&signal.content, 400)
                ));
            }
            input.push('\n');
        }
        input
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(&self, report: &TransitionReport) -> Result<String, AgentError> {
        let completion = self
            .backend
            .generate(SYNTHESIS_SYSTEM_PROMPT, &Self::render(report), self.max_tokens)
            .await
            .map_err(|e| AgentError::Llm(e.to_string()))?;
        Ok(completion.text)
    }
}

/// Truncate on a char boundary
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Completion, LlmBackend, LlmError};
    use chrono::Utc;
    use hive_core::Pheromone;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    /// Backend returning a canned answer and recording prompts
    struct CannedBackend {
        answer: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn generate(
            &self,
            _system: &str,
            user: &str,
            _max_tokens: u32,
        ) -> Result<Completion, LlmError> {
            self.prompts.lock().unwrap().push(user.to_string());
            match &self.answer {
                Ok(text) => Ok(Completion { text: text.clone(), tokens: 900 }),
                Err(()) => Err(LlmError::RateLimited),
            }
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn backend(answer: Result<&str, ()>) -> Arc<CannedBackend> {
        Arc::new(CannedBackend {
            answer: answer.map(|s| s.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn context(max_tokens: u32) -> ThinkContext {
        ThinkContext {
            agent_id: "a".to_string(),
            domain: "climate".to_string(),
            task: "find the anomaly".to_string(),
            evidence: vec!["sst +1.2C".to_string()],
            max_tokens,
        }
    }

    #[test]
    fn test_parse_confidence_variants() {
        let (artifact, c) = parse_confidence("Sea ice is thinning.\nCONFIDENCE: 0.82");
        assert_eq!(artifact, "Sea ice is thinning.");
        assert_eq!(c, Some(0.82));

        let (_, c) = parse_confidence("x\n**Confidence**: 1");
        assert_eq!(c, Some(1.0));

        let (artifact, c) = parse_confidence("no score here");
        assert_eq!(artifact, "no score here");
        assert_eq!(c, None);
    }

    #[tokio::test]
    async fn test_think_parses_and_counts_tokens() {
        let backend = backend(Ok("Warm anomaly off Peru.\nCONFIDENCE: 0.75"));
        let reasoner = LlmReasoner::new(backend.clone(), "be precise");

        let thought = reasoner.think(&context(512)).await.unwrap();
        assert_eq!(thought.artifact, "Warm anomaly off Peru.");
        assert_eq!(thought.confidence, 0.75);
        assert_eq!(thought.tokens_consumed, 900);
        assert!(backend.prompts.lock().unwrap()[0].contains("- sst +1.2C"));
    }

    #[tokio::test]
    async fn test_think_defaults_confidence() {
        let reasoner = LlmReasoner::new(backend(Ok("plain answer")), "p");
        let thought = reasoner.think(&context(512)).await.unwrap();
        assert_eq!(thought.confidence, DEFAULT_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_think_failures() {
        let failing = LlmReasoner::new(backend(Err(())), "p");
        assert!(matches!(failing.think(&context(512)).await, Err(AgentError::Llm(_))));

        let empty = LlmReasoner::new(backend(Ok("CONFIDENCE: 0.9")), "p");
        assert!(matches!(empty.think(&context(512)).await, Err(AgentError::Parse(_))));

        let broke = LlmReasoner::new(backend(Ok("x")), "p");
        assert!(matches!(broke.think(&context(0)).await, Err(AgentError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_synthesis_groups_by_domain() {
        let backend = backend(Ok("## Converged Findings\n- ok"));
        let synthesizer = LlmSynthesizer::new(backend.clone(), 800);

        let signals = vec![
            Pheromone::builder("ocean", "salinity").origin("b").confidence(0.8).build(),
            Pheromone::builder("ice", "thinning").origin("c").build(),
        ];
        let mut domains = BTreeMap::new();
        domains.insert("ice".to_string(), 1);
        domains.insert("ocean".to_string(), 1);

        let report = TransitionReport {
            agent_id: "a".to_string(),
            tick: 30,
            declared_at: Utc::now(),
            density: 0.64,
            synced_signals: 5,
            signals,
            domains,
            synced_peers: vec!["b".to_string()],
            energy: 0.7,
            cycle_emissions: 2,
        };

        let digest = synthesizer.synthesize(&report).await.unwrap();
        assert!(digest.contains("Converged"));
        let prompt = backend.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("### ocean (1 signals)"));
        assert!(prompt.contains("[0.80] salinity"));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 5), "hi");
    }
}
