use super::PipelineError;
use crate::models::Listing;
use tracing::info;

const PRICE_SCALE: f64 = 100_000.0;

/// Trims, strips everything but ASCII letters, digits, whitespace and `.,-`,
/// then lowercases.
pub fn clean_text(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '.' | ',' | '-'))
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Adds `clean_description` and `price_norm` to every listing. A missing or
/// non-numeric price fails the whole batch.
pub fn transform(listings: Vec<Listing>) -> Result<Vec<Listing>, PipelineError> {
    let processed = listings
        .into_iter()
        .enumerate()
        .map(|(position, listing)| -> Result<Listing, PipelineError> {
            let price = listing
                .price
                .as_ref()
                .ok_or_else(|| price_error(&listing, position, "missing"))?
                .as_f64()
                .ok_or_else(|| price_error(&listing, position, "not numeric"))?;
            Ok(Listing {
                clean_description: Some(clean_text(&listing.description)),
                price_norm: Some(price / PRICE_SCALE),
                ..listing
            })
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;
    info!(target = "owlow.preprocessor", count = processed.len(), "preprocessed listings");
    Ok(processed)
}

fn price_error(listing: &Listing, position: usize, reason: &str) -> PipelineError {
    let label = listing
        .id
        .as_ref()
        .map(|id| format!("id {id}"))
        .unwrap_or_else(|| format!("position {position}"));
    PipelineError::internal("preprocess", format!("listing {label}: price is {reason}"))
}
