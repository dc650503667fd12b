use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config '{}': {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Config must be a JSON object")]
    NotAnObject,

    #[error("Unknown key in the JSON input file: {0}")]
    UnknownKey(String),

    #[error("Config key '{0}' should not be null")]
    MissingRequiredField(&'static str),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Incomplete NFS volume, missing: {}", .missing.join(", "))]
    PartialVolume { missing: Vec<&'static str> },

    #[error("Unable to create a request from a null container")]
    NullContainer,

    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Failed to sign request: {0}")]
    Sign(String),

    #[error("Malformed ECI response: {source}: {body}")]
    MalformedResponse {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed ({status}) {code}: {message} (RequestId={request_id})")]
    Remote {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },
}
