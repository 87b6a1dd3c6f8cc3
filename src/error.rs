use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("missing field `{0}` in broker response")]
    MissingField(&'static str),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("not authenticated: call authenticate() first")]
    NotAuthenticated,

    #[error("terms of use for licence `{0}` were not accepted by the broker")]
    TermsNotAccepted(String),

    /// The broker reported a terminal status other than `completed`.
    #[error("{what} {id} ended with status `{status}`")]
    BrokerFailure {
        what: &'static str,
        id: String,
        status: String,
    },

    /// The poll budget (attempts or wall-clock) ran out before completion.
    #[error(
        "timed out waiting for {what} {id}: still `{last_status}` after {attempts} attempts ({waited:?})"
    )]
    PollTimeout {
        what: &'static str,
        id: String,
        last_status: String,
        attempts: u32,
        waited: Duration,
    },
}
