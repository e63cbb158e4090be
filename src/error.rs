use thiserror::Error;

/// Failures of the sitemap-to-tree conversion as a whole.
///
/// Individual unparsable URLs are not errors; they end up in
/// [`crate::tree::BuildReport::skipped`].
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("no <loc> entries found in sitemap")]
    NoUrls,

    #[error("no data: none of the sitemap URLs could be parsed ({skipped} skipped)")]
    NoData { skipped: usize },

    #[error("invalid sitemap data module: {0}")]
    Artifact(String),
}
