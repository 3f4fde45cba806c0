mod config;
mod rules;

pub use config::MatchingConfig;

use serde::Serialize;

use super::domain::{ContractorProfile, Lead};

/// Pure ranking engine: lead + candidate pool in, ranked capped matches out.
/// The lifecycle manager owns the side effects of applying a ranking.
pub struct MatchingEngine {
    config: MatchingConfig,
}

/// Ephemeral match record; only the contractor ids and reasons outlive the
/// matching run (as lead fields and notifications respectively).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractorMatch {
    pub contractor: ContractorProfile,
    pub score: f32,
    pub match_reasons: Vec<String>,
}

impl MatchingEngine {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Score every candidate, keep those at or above the cutoff that carry at
    /// least one reason, sort by score descending (ties broken by contractor
    /// id for determinism), and truncate to the configured cap.
    pub fn rank(&self, lead: &Lead, pool: &[ContractorProfile]) -> Vec<ContractorMatch> {
        let mut matches: Vec<ContractorMatch> = pool
            .iter()
            .filter_map(|contractor| {
                let (score, match_reasons) = rules::score_contractor(lead, contractor, &self.config);
                let included = score >= self.config.minimum_score && !match_reasons.is_empty();
                included.then(|| ContractorMatch {
                    contractor: contractor.clone(),
                    score,
                    match_reasons,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.contractor.id.cmp(&b.contractor.id))
        });
        matches.truncate(self.config.max_matches);
        matches
    }
}
