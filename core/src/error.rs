//! Error types for the Deta Base client.
//!
//! # Design
//! Status codes are not errors. Apart from `query`, whose body must decode
//! into a typed page, the service's own error payloads (duplicate key on
//! insert, missing key on update) come back to the caller as ordinary JSON.
//! Only failures to move bytes or to (de)serialize them land here.

/// Errors returned by `Base` operations and `Transport` implementations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("transport failed: {0}")]
    Transport(String),

    /// A `query` response had a non-success status and a body that is not a
    /// query page.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// `DetaBuilder::build` was called without a transport while the default
    /// `ureq` transport is compiled out.
    #[error("no transport configured")]
    MissingTransport,
}
