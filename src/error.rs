//! Errors this crate can emit.
use crate::client::{HttpResponse, TransportError};
use crate::transfer::ByteRange;

use http::StatusCode;
use std::fmt::{self, Display, Formatter};

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = ::std::result::Result<T, E>;

const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
const GIB: f64 = 1073741824.0;

/// The value returned in this crate when an error occurs.
///
/// Any failure aborts the upload it came from. Errors that were caused by an
/// unexpected HTTP response keep that response around for diagnostics, see
/// [`response`](Error::response).
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(pub(crate) ErrorRepr);

impl Error {
    /// The category of the error, which identifies the step of the upload
    /// that failed.
    pub fn kind(&self) -> ErrorKind {
        match &self.0 {
            ErrorRepr::TicketRejected { .. } => ErrorKind::TicketCreation,
            ErrorRepr::MalformedTicket { .. } => ErrorKind::MalformedTicket,
            ErrorRepr::TransferRejected { .. } => ErrorKind::TransferRejected,
            ErrorRepr::ProgressCheck { .. } | ErrorRepr::Stalled { .. } => ErrorKind::ProgressCheck,
            ErrorRepr::Finalize { .. } => ErrorKind::Finalization,
            ErrorRepr::Source(_) => ErrorKind::SourceUnreadable,
            ErrorRepr::QuotaExceeded { .. } | ErrorRepr::QuotaLookup { .. } => ErrorKind::Quota,
            ErrorRepr::Attachment { .. } => ErrorKind::Attachment,
            ErrorRepr::Transport { stage, .. } => stage.kind(),
            ErrorRepr::Header(_) | ErrorRepr::Json(_) => ErrorKind::Config,
        }
    }

    /// The HTTP response that triggered this error, if there was one.
    pub fn response(&self) -> Option<&HttpResponse> {
        match &self.0 {
            ErrorRepr::TicketRejected { response, .. }
            | ErrorRepr::MalformedTicket { response, .. }
            | ErrorRepr::TransferRejected { response, .. }
            | ErrorRepr::ProgressCheck { response, .. }
            | ErrorRepr::Finalize { response, .. }
            | ErrorRepr::QuotaExceeded { response, .. }
            | ErrorRepr::QuotaLookup { response, .. }
            | ErrorRepr::Attachment { response, .. } => Some(response),
            ErrorRepr::Stalled { .. }
            | ErrorRepr::Source(_)
            | ErrorRepr::Transport { .. }
            | ErrorRepr::Header(_)
            | ErrorRepr::Json(_) => None,
        }
    }

    /// The status code of the response that triggered this error.
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|resp| resp.status)
    }

    /// The message the server reported with the failed response.
    ///
    /// This is the `error` (or `Description`) field of a JSON body, falling
    /// back to the plain body text.
    pub fn server_message(&self) -> Option<String> {
        self.response().map(server_message)
    }

    /// Whether the underlying cause was a request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            &self.0,
            ErrorRepr::Transport {
                source: TransportError::Timeout,
                ..
            }
        )
    }
}

impl From<ErrorRepr> for Error {
    fn from(value: ErrorRepr) -> Self {
        Self(value)
    }
}

/// The category of the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The request for an upload ticket was not accepted.
    TicketCreation,
    /// The ticket response did not have the upload or completion URL.
    MalformedTicket,
    /// A chunk of the upload was rejected.
    TransferRejected,
    /// The server-confirmed offset could not be determined.
    ProgressCheck,
    /// The completion request failed.
    Finalization,
    /// The local source could not be read.
    SourceUnreadable,
    /// The remote quota is too small for the upload, or could not be read.
    Quota,
    /// Creating or uploading a picture or text track failed.
    Attachment,
    /// A request could not be built from the configuration.
    Config,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::TicketCreation => write!(f, "ticket creation"),
            Self::MalformedTicket => write!(f, "malformed ticket"),
            Self::TransferRejected => write!(f, "transfer rejected"),
            Self::ProgressCheck => write!(f, "progress check"),
            Self::Finalization => write!(f, "finalization"),
            Self::SourceUnreadable => write!(f, "source unreadable"),
            Self::Quota => write!(f, "quota"),
            Self::Attachment => write!(f, "attachment"),
            Self::Config => write!(f, "config"),
        }
    }
}

/// The step of an upload that issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Quota,
    Ticket,
    Transfer,
    Progress,
    Finalize,
    Attachment,
}

impl Stage {
    fn kind(self) -> ErrorKind {
        match self {
            Self::Quota => ErrorKind::Quota,
            Self::Ticket => ErrorKind::TicketCreation,
            Self::Transfer => ErrorKind::TransferRejected,
            Self::Progress => ErrorKind::ProgressCheck,
            Self::Finalize => ErrorKind::Finalization,
            Self::Attachment => ErrorKind::Attachment,
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quota => write!(f, "quota lookup"),
            Self::Ticket => write!(f, "ticket"),
            Self::Transfer => write!(f, "transfer"),
            Self::Progress => write!(f, "progress check"),
            Self::Finalize => write!(f, "finalize"),
            Self::Attachment => write!(f, "attachment"),
        }
    }
}

/// Internal error type that we are free to change at will.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ErrorRepr {
    #[error("creating upload ticket failed: expected {expected}, got {}", response.status)]
    TicketRejected {
        expected: StatusCode,
        response: HttpResponse,
    },
    #[error("upload ticket response missing required field: {field}")]
    MalformedTicket {
        field: &'static str,
        response: HttpResponse,
    },
    #[error("upload of {range} rejected with status {}", response.status)]
    TransferRejected {
        range: ByteRange,
        response: HttpResponse,
    },
    #[error("progress check failed: {reason}")]
    ProgressCheck {
        reason: &'static str,
        response: HttpResponse,
    },
    #[error("upload stalled at offset {offset}: no progress in {rounds} consecutive rounds")]
    Stalled { rounds: u32, offset: u64 },
    #[error("finalizing upload failed: {reason} (status {})", response.status)]
    Finalize {
        reason: &'static str,
        response: HttpResponse,
    },
    #[error("source unreadable: {0}")]
    Source(#[from] std::io::Error),
    #[error("upload of {size} bytes exceeds quota. Free space quota: {:.1}Gb", *free as f64 / GIB)]
    QuotaExceeded {
        size: u64,
        free: u64,
        response: HttpResponse,
    },
    #[error("reading upload quota failed: {reason}")]
    QuotaLookup {
        reason: &'static str,
        response: HttpResponse,
    },
    #[error("{what} failed: {reason} (status {})", response.status)]
    Attachment {
        what: &'static str,
        reason: &'static str,
        response: HttpResponse,
    },
    #[error("{stage} request failed: {source}")]
    Transport {
        stage: Stage,
        source: TransportError,
    },
    #[error("invalid header value: {0}")]
    Header(#[from] http::header::InvalidHeaderValue),
    #[error("could not encode request body: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorRepr {
    pub(crate) fn from_transport(stage: Stage) -> impl FnOnce(TransportError) -> Self {
        move |source| Self::Transport { stage, source }
    }
}

/// Extract a human-readable message from an error response.
pub(crate) fn server_message(response: &HttpResponse) -> String {
    let json = serde_json::from_slice::<serde_json::Value>(&response.body).ok();
    let message = json
        .as_ref()
        .and_then(|v| v.get("error").or_else(|| v.get("Description")))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| String::from_utf8_lossy(&response.body).into_owned());

    if response.status != StatusCode::TOO_MANY_REQUESTS {
        return message;
    }
    match response.header_str(RATE_LIMIT_RESET) {
        Some(reset) => format!("{message}\n limit will reset on: {reset}"),
        None => message,
    }
}
