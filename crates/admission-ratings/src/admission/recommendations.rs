//! Priority reranking and probability-band filtering of recommended directions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::ApplicantSnapshot;

/// One of the applicant's current enrollments with its predicted probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionChoice {
    pub direction: String,
    pub priority: u8,
    pub probability: f64,
}

impl From<&ApplicantSnapshot> for DirectionChoice {
    fn from(snapshot: &ApplicantSnapshot) -> Self {
        Self {
            direction: snapshot.direction.clone(),
            priority: snapshot.priority,
            probability: snapshot.probability,
        }
    }
}

/// Direction suggested by the recommendation source, before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedDirection {
    pub direction_id: i64,
    pub direction: String,
}

/// Recommended direction scored for this applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub direction_id: i64,
    pub direction: String,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationStatus {
    Better,
    Same,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecommendation {
    pub direction_id: i64,
    pub direction: String,
    pub probability: f64,
    pub status: RecommendationStatus,
}

impl LabeledRecommendation {
    fn new(candidate: RecommendationCandidate, status: RecommendationStatus) -> Self {
        Self {
            direction_id: candidate.direction_id,
            direction: candidate.direction,
            probability: candidate.probability,
            status,
        }
    }
}

/// Order choices by descending probability and renumber priorities from 1.
///
/// Equal probabilities keep their incoming relative order.
pub fn rerank(choices: Vec<DirectionChoice>) -> Vec<DirectionChoice> {
    let mut choices = choices;
    choices.sort_by(|left, right| right.probability.total_cmp(&left.probability));

    for (index, choice) in choices.iter_mut().enumerate() {
        choice.priority = u8::try_from(index + 1).unwrap_or(u8::MAX);
    }
    choices
}

/// Keep candidates at least as likely as the applicant's weakest current choice.
///
/// Candidates at or above the strongest current probability are `Better`, those inside
/// the band are `Same`, and directions the applicant already holds are dropped. With no
/// current choices there is no band, so every candidate is returned as `Same`.
pub fn filter_recommendations(
    candidates: Vec<RecommendationCandidate>,
    current_choices: &[DirectionChoice],
) -> Vec<LabeledRecommendation> {
    let enrolled: HashSet<&str> = current_choices
        .iter()
        .map(|choice| choice.direction.as_str())
        .collect();
    let candidates = candidates
        .into_iter()
        .filter(|candidate| !enrolled.contains(candidate.direction.as_str()));

    let Some((min_probability, max_probability)) = probability_band(current_choices) else {
        debug!("no current choices; returning recommendations unfiltered");
        return candidates
            .map(|candidate| LabeledRecommendation::new(candidate, RecommendationStatus::Same))
            .collect();
    };

    candidates
        .filter_map(|candidate| {
            let probability = candidate.probability;
            if probability >= max_probability {
                Some(LabeledRecommendation::new(
                    candidate,
                    RecommendationStatus::Better,
                ))
            } else if probability >= min_probability {
                Some(LabeledRecommendation::new(
                    candidate,
                    RecommendationStatus::Same,
                ))
            } else {
                None
            }
        })
        .collect()
}

fn probability_band(choices: &[DirectionChoice]) -> Option<(f64, f64)> {
    let mut probabilities = choices.iter().map(|choice| choice.probability);
    let first = probabilities.next()?;
    Some(probabilities.fold((first, first), |(min, max), probability| {
        (min.min(probability), max.max(probability))
    }))
}
