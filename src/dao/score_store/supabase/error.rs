//! Error types shared by the Supabase storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`SupabaseDaoError`] failures.
pub type SupabaseResult<T> = Result<T, SupabaseDaoError>;

/// Failures that can occur while talking to PostgREST.
#[derive(Debug, Error)]
pub enum SupabaseDaoError {
    /// Required environment variable is missing.
    #[error("missing Supabase environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Supabase client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send Supabase request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// PostgREST answered with an unexpected status code.
    #[error("unexpected Supabase response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into the expected rows.
    #[error("failed to decode Supabase response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A write asked for its representation but no row came back.
    #[error("Supabase returned no row for `{path}`")]
    EmptyRepresentation { path: String },
    /// A change cursor could not be rendered as a filter value.
    #[error("failed to format change cursor")]
    FormatCursor {
        #[source]
        source: time::error::Format,
    },
}
