#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

//! # Description
//!
//! A client for resumable uploads of large files, such as videos, to a
//! media-hosting service over HTTP.
//!
//! An upload reserves a ticket with the service, sends the file in chunks to
//! the ticket's upload link and finally completes the ticket, which creates
//! the resource. After every chunk the server is asked how many bytes it
//! actually has and the next chunk starts there, so an interrupted or timed
//! out transfer picks up where the server left off instead of starting over.
//!
//! # Examples
//!
//! ```rust,no_run
//! # async fn f() -> resumable_upload::error::Result<()> {
//! use resumable_upload::{ByteSize, ReqwestClient, UploadBuilder};
//! use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};
//! use serde_json::json;
//!
//! let mut headers = HeaderMap::new();
//! headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer a-token"));
//! let client = ReqwestClient::new(reqwest::Client::new(), "https://api.example.com")
//!     .with_default_headers(headers);
//!
//! let uploader = UploadBuilder::new(client)
//!     .chunk_size(ByteSize::mib(64))
//!     .build();
//!
//! let metadata = json!({"name": "Holiday"}).as_object().cloned();
//!
//! /// Report progress and keep going.
//! let hook = |offset: u64| {
//!     println!("server has {offset} bytes");
//!     false
//! };
//! let outcome = uploader
//!     .upload_with_progress("holiday.mp4", metadata, hook)
//!     .await?;
//! if let Some(done) = outcome.completed() {
//!     println!("created {} with id {}", done.location, done.id);
//! }
//! #     Ok(())
//! # }
//! ```
use self::config::UploadConfig;

use http::StatusCode;
use std::borrow::Cow;
use std::time::Duration;

pub use bytesize::ByteSize;

#[macro_use]
mod trace;

mod client;
pub use client::{
    HttpRequest, HttpResponse, ReqwestClient, SendRequest, TransportError, TransportResult,
    UploadClient,
};

pub mod attachment;
pub mod config;
pub mod error;
pub mod plan;
pub mod source;
#[doc(inline)]
pub use source::UploadSource;

pub mod ticket;
#[doc(inline)]
pub use ticket::{Metadata, UploadTicket};

pub mod transfer;
#[doc(inline)]
pub use transfer::{NoProgress, OnProgress, TransferState};

mod finalize;
pub use finalize::CompletedUpload;

mod quota;

mod upload;
pub use upload::{AbortedUpload, UploadOutcome, Uploader};

pub mod uri;
#[doc(inline)]
pub use uri::{ResourceId, ResourceUri};

/// Configures and builds an [`Uploader`].
#[derive(Debug)]
pub struct UploadBuilder {
    client: UploadClient,
    config: UploadConfig,
}

impl UploadBuilder {
    /// Create a `UploadBuilder` from a [`SendRequest`] client.
    pub fn new<C>(client: C) -> Self
    where
        C: SendRequest + 'static,
    {
        Self {
            client: UploadClient::new(client),
            config: UploadConfig::default(),
        }
    }

    /// Set the proposed size of a chunk.
    ///
    /// Large files may use larger chunks, see [`plan::plan_chunk_size`].
    pub fn chunk_size(self, size: ByteSize) -> Self {
        let config = UploadConfig {
            chunk_size: size,
            ..self.config
        };
        Self { config, ..self }
    }

    /// Set the endpoint that issues tickets for new uploads.
    pub fn upload_endpoint<T: Into<Cow<'static, str>>>(self, endpoint: T) -> Self {
        let config = UploadConfig {
            upload_endpoint: endpoint.into(),
            ..self.config
        };
        Self { config, ..self }
    }

    /// Set the timeout of every request other than chunk transfers.
    pub fn request_timeout(self, timeout: Option<Duration>) -> Self {
        let config = UploadConfig {
            request_timeout: timeout,
            ..self.config
        };
        Self { config, ..self }
    }

    /// Set the timeout of a chunk transfer.
    ///
    /// A chunk that times out is not an error, the upload continues from
    /// whatever the server received.
    pub fn transfer_timeout(self, timeout: Option<Duration>) -> Self {
        let config = UploadConfig {
            transfer_timeout: timeout,
            ..self.config
        };
        Self { config, ..self }
    }

    /// Check the remote free space before starting an upload.
    pub fn check_quota(self, check: bool) -> Self {
        let config = UploadConfig {
            check_quota: check,
            ..self.config
        };
        Self { config, ..self }
    }

    /// Ask the service to transcode new uploads up to 1080p.
    pub fn upgrade_to_1080(self, upgrade: bool) -> Self {
        let config = UploadConfig {
            upgrade_to_1080: upgrade,
            ..self.config
        };
        Self { config, ..self }
    }

    /// Set the status expected from the ticket request of a new upload.
    pub fn ticket_status(self, status: StatusCode) -> Self {
        let config = UploadConfig {
            ticket_status: status,
            ..self.config
        };
        Self { config, ..self }
    }

    /// Set the status expected from the ticket request of a replacement.
    pub fn replace_status(self, status: StatusCode) -> Self {
        let config = UploadConfig {
            replace_status: status,
            ..self.config
        };
        Self { config, ..self }
    }

    /// Set the status expected from the completion request.
    pub fn finalize_status(self, status: StatusCode) -> Self {
        let config = UploadConfig {
            finalize_status: status,
            ..self.config
        };
        Self { config, ..self }
    }

    /// Set how many consecutive rounds without progress are tolerated.
    ///
    /// `None`, the default, never gives up.
    pub fn stall_limit(self, limit: Option<u32>) -> Self {
        let config = UploadConfig {
            stall_limit: limit,
            ..self.config
        };
        Self { config, ..self }
    }

    /// Use a complete configuration.
    pub fn with_config(self, config: UploadConfig) -> Self {
        Self { config, ..self }
    }

    /// Build an [`Uploader`] from this configuration.
    pub fn build(self) -> Uploader {
        Uploader::new(self.client, self.config)
    }
}
