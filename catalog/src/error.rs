//! Error types for the catalog.

use shopkeep_runtime::StoreError;
use thiserror::Error;

/// Errors from the products and cart services
///
/// Stores never surface these directly. They settle into the store's `error`
/// field as their display text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// The request never got a response
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The backend answered with a non-2xx status
    #[error("Backend error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// The response body could not be decoded
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),
}

impl RepositoryError {
    /// Backend reported the resource does not exist
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// A product draft that cannot be submitted
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DraftError {
    /// Name is empty or whitespace
    #[error("Product name is required")]
    BlankName,

    /// Price is negative, NaN or infinite
    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    /// No image was uploaded
    #[error("Please upload an image")]
    MissingImage,
}

/// Errors returned by [`crate::session::CatalogSession`]
#[derive(Debug, Error)]
pub enum SessionError {
    /// The request settled as rejected; the message is also in the store's `error`
    #[error("{0}")]
    Rejected(String),

    /// A settlement matched that the flow did not expect
    #[error("Unexpected settlement {0}")]
    UnexpectedSettlement(&'static str),

    /// The store did not accept the action or nothing settled in time
    #[error(transparent)]
    Store(#[from] StoreError),
}
