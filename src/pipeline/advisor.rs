use super::recommender::price_score;
use crate::models::{Advice, Listing, Recommendation};
use tracing::info;

pub const DEFAULT_TOP_N: usize = 3;
const NO_ANALYSIS: &str = "No analysis available.";
const HEURISTIC_NOTE: &str =
    "Scores are heuristic. For deeper insight enable LLM analysis (LLM_ENABLED=true).";

/// Condenses ranked listings into the top `top_n` picks.
///
/// A listing without a score sorts by its negated price score,
/// `-(1 / (price_norm + 1e-6))`, which is always negative and ranks cheaper
/// unscored listings lower.
pub fn summarize(listings: &[Listing], top_n: usize) -> Advice {
    if listings.is_empty() {
        return Advice::Empty {
            message: NO_ANALYSIS.into(),
        };
    }

    let sort_key = |listing: &Listing| {
        listing
            .score
            .unwrap_or_else(|| -price_score(listing.price_norm))
    };
    let mut ordered: Vec<&Listing> = listings.iter().collect();
    ordered.sort_by(|a, b| sort_key(b).total_cmp(&sort_key(a)));

    let top_recommendations = ordered
        .into_iter()
        .take(top_n)
        .map(|listing| Recommendation {
            id: listing.id.clone(),
            title: listing.title.clone(),
            score: listing.score,
        })
        .collect();

    info!(target = "owlow.advisor", count = listings.len(), "advisor produced summary");
    Advice::Summary {
        count: listings.len(),
        top_recommendations,
        note: HEURISTIC_NOTE.into(),
    }
}
