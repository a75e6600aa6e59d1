use crate::models::Listing;
use tracing::info;

pub const PRICE_EPSILON: f64 = 1e-6;

/// Cosine similarity in f64. Zero-norm, empty, or mismatched-length inputs
/// score exactly 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

/// Cheaper is better; a listing without `price_norm` is treated as 1.0.
pub fn price_score(price_norm: Option<f64>) -> f64 {
    1.0 / (price_norm.unwrap_or(1.0) + PRICE_EPSILON)
}

/// Scores every listing and sorts descending, keeping input order on ties.
///
/// The first listing decides the mode for the whole batch: if it carries an
/// embedding, everything is scored by similarity to that vector (listings
/// without one are compared as the reference itself); otherwise by price.
pub fn recommend(listings: Vec<Listing>) -> Vec<Listing> {
    let Some(first) = listings.first() else {
        return listings;
    };

    let mut ranked: Vec<Listing> = match first.embedding.clone() {
        Some(reference) => listings
            .into_iter()
            .map(|listing| {
                let vector = listing.embedding.as_deref().unwrap_or(&reference);
                let score = cosine_similarity(vector, &reference);
                Listing {
                    score: Some(score),
                    ..listing
                }
            })
            .collect(),
        None => listings
            .into_iter()
            .map(|listing| Listing {
                score: Some(price_score(listing.price_norm)),
                ..listing
            })
            .collect(),
    };

    // `sort_by` is stable.
    ranked.sort_by(|a, b| {
        let a = a.score.unwrap_or(f64::NEG_INFINITY);
        let b = b.score.unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });
    info!(target = "owlow.recommender", count = ranked.len(), "ranked listings");
    ranked
}
