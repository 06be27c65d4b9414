//! Implement/reject decisions taken after a comparison.

use anyhow::Context;
use dialoguer::Confirm;
use std::str::FromStr;
use std::sync::Arc;

use crate::bench::report::SuiteSummary;

/// Decides whether the candidate should be kept.
///
/// `decide` may block; async callers go through [`decide_blocking`].
pub trait DecisionProvider: Send + Sync {
    fn decide(&self, summary: &SuiteSummary) -> anyhow::Result<bool>;
}

/// Run `provider` on the blocking pool so a terminal prompt never stalls a
/// runtime worker
pub async fn decide_blocking(
    provider: Arc<dyn DecisionProvider>,
    summary: SuiteSummary,
) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || provider.decide(&summary))
        .await
        .context("Decision task did not complete")?
}

/// Asks on the terminal. Blocks the calling thread until answered.
#[derive(Debug, Default, Clone)]
pub struct ConsoleDecision;

impl DecisionProvider for ConsoleDecision {
    fn decide(&self, summary: &SuiteSummary) -> anyhow::Result<bool> {
        println!("Impact: {}", summary.impact_summary());
        Confirm::new()
            .with_prompt("Should this feature be implemented?")
            .default(false)
            .interact()
            .context("Failed to read decision")
    }
}

/// Always answers the same way, for non-interactive runs
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub bool);

impl DecisionProvider for FixedDecision {
    fn decide(&self, _summary: &SuiteSummary) -> anyhow::Result<bool> {
        Ok(self.0)
    }
}

/// How the decision is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionMode {
    Yes,
    No,
    #[default]
    Prompt,
}

impl DecisionMode {
    pub fn provider(self) -> Arc<dyn DecisionProvider> {
        match self {
            DecisionMode::Yes => Arc::new(FixedDecision(true)),
            DecisionMode::No => Arc::new(FixedDecision(false)),
            DecisionMode::Prompt => Arc::new(ConsoleDecision),
        }
    }
}

impl FromStr for DecisionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "implement" => Ok(DecisionMode::Yes),
            "no" | "n" | "reject" => Ok(DecisionMode::No),
            "prompt" | "ask" => Ok(DecisionMode::Prompt),
            other => Err(format!(
                "unknown decision mode '{}' (expected yes, no or prompt)",
                other
            )),
        }
    }
}
