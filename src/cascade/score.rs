use super::policy::{AnimalKeywords, KeywordMatch};
use crate::detect::LabelScore;

/// Summed probability of the top-`top_k` labels that contain an animal keyword.
///
/// Predictions are ranked by probability (descending, stable for ties) before
/// truncation, so the input order does not matter. Non-finite probabilities
/// are dropped before ranking and never count towards the score.
pub fn classifier_score(predictions: &[LabelScore], keywords: &AnimalKeywords, top_k: usize) -> f32 {
    let mut ranked: Vec<&LabelScore> = predictions
        .iter()
        .filter(|p| p.probability.is_finite())
        .collect();
    ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    ranked
        .into_iter()
        .take(top_k)
        .filter(|p| keywords.matches(&p.label, KeywordMatch::Substring))
        .map(|p| p.probability)
        .sum()
}
