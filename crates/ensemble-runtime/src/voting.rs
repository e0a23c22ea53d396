//! Majority voting over model outcomes.
//!
//! The reduction is pure: the same multiset of outcomes always yields the same
//! [`VotingResult`], whatever order the outcomes arrived in.

use std::collections::BTreeMap;

use tracing::debug;

use crate::types::{ClassLabel, ModelOutcome, VotingResult};

/// Voting policy with a seeded class domain.
///
/// Seeded classes always appear in `votes`, at zero when nobody voted for
/// them. Labels outside the seed are counted as they arrive.
#[derive(Debug, Clone)]
pub struct VotingEngine {
    classes: Vec<ClassLabel>,
}

impl Default for VotingEngine {
    fn default() -> Self {
        Self::binary()
    }
}

impl VotingEngine {
    pub fn new(classes: Vec<ClassLabel>) -> Self {
        Self { classes }
    }

    /// The `{0, 1}` domain.
    pub fn binary() -> Self {
        Self::new(vec![ClassLabel::Int(0), ClassLabel::Int(1)])
    }

    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    /// Reduce outcomes to a decision.
    pub fn vote(&self, outcomes: &[ModelOutcome]) -> VotingResult {
        let mut votes: BTreeMap<ClassLabel, usize> =
            self.classes.iter().cloned().map(|c| (c, 0)).collect();
        let mut confidences: BTreeMap<ClassLabel, Vec<f64>> = BTreeMap::new();

        let mut total_votes = 0;
        for outcome in outcomes {
            let Some(label) = outcome.prediction() else {
                continue;
            };
            *votes.entry(label.clone()).or_insert(0) += 1;
            confidences.entry(label).or_default().push(outcome.confidence());
            total_votes += 1;
        }

        if total_votes == 0 {
            debug!("No successful model responses available for voting");
            return VotingResult {
                votes,
                total_votes: 0,
                total_models: outcomes.len(),
                decision: None,
                confidence: 0.0,
                message: "No models returned valid predictions".to_string(),
            };
        }

        let max = votes.values().copied().max().unwrap_or(0);
        let mut leaders = votes.iter().filter(|(_, n)| **n == max).map(|(c, _)| c);
        let winner = match (leaders.next(), leaders.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        };

        let result = match winner {
            Some(class) => {
                let confidence = confidences.get(&class).map(|c| mean(c)).unwrap_or(0.0);
                VotingResult {
                    message: format!("Class {} won by {} votes", class, max),
                    votes,
                    total_votes,
                    total_models: outcomes.len(),
                    decision: Some(class),
                    confidence,
                }
            }
            None => VotingResult {
                votes,
                total_votes,
                total_models: outcomes.len(),
                decision: None,
                confidence: 0.0,
                message: "Tie in voting, unable to make prediction".to_string(),
            },
        };

        debug!("Voting result: {}", result.message);
        result
    }
}

/// Vote with the default binary domain.
pub fn vote(outcomes: &[ModelOutcome]) -> VotingResult {
    VotingEngine::default().vote(outcomes)
}

/// Mean summed in ascending order so the float result is permutation-stable.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.iter().sum::<f64>() / sorted.len() as f64
}
