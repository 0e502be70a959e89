//! Document normalization
//!
//! Raw document + schema name in, [`NormalizedDocument`] or the full list
//! of [`FieldViolation`]s out.

mod document;
mod enrich;
mod errors;
#[allow(clippy::module_inception)]
mod normalizer;

pub use document::NormalizedDocument;
pub use errors::{FieldViolation, NormalizeError, NormalizeResult};
pub use normalizer::DocumentNormalizer;
