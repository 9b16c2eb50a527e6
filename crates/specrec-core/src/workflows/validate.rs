//! `specrec validate`: check that a document is a usable OpenAPI 3 spec.

use crate::openapi::{SpecDocument, ValidatedSpec};

/// Load a spec from a file or URL and validate it
pub async fn validate(location: &str) -> crate::Result<ValidatedSpec> {
    let spec = SpecDocument::from_file_or_url(location).await?;
    let validated = spec.validate()?;
    log::info!("Validation complete.");
    Ok(validated)
}
