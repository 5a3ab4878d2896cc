//! The chunked transfer of an upload's bytes.
//!
//! A transfer alternates between sending a chunk to the ticket's upload link
//! and asking the server how many bytes it has durably received. The next
//! chunk always starts at the offset the server confirmed, so anything lost
//! in transit is sent again, and a request that times out is not fatal: the
//! transfer checks progress and resumes from wherever the server got to.
//!
//! ```text
//! AwaitingTransfer -> Transferring -> CheckingProgress -> Transferring
//!                                                      -> Complete
//!                                                      -> Aborted
//! ```
use crate::client::{HttpRequest, HttpResponse, SendRequest as _, TransportError, UploadClient};
use crate::config::UploadConfig;
use crate::error::{ErrorRepr, Result, Stage};
use crate::source::OpenSource;

use http::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderValue, RANGE};
use http::{Method, StatusCode};
use std::fmt::{self, Display, Formatter};
use std::ops::ControlFlow;

/// `Content-Range` of a progress check.
const QUERY_RANGE: &str = "bytes */*";

/// A window `[start, end)` of an upload of `total` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte of the window.
    pub start: u64,
    /// One past the last byte of the window.
    pub end: u64,
    /// Size of the whole upload.
    pub total: u64,
}

impl ByteRange {
    /// Create a new `ByteRange`.
    pub fn new(start: u64, end: u64, total: u64) -> Self {
        Self { start, end, total }
    }

    /// The number of bytes in the window.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Formats as the value of the `Content-Range` header of a chunk.
///
/// The end is exclusive, which is how the service reports offsets back.
impl Display for ByteRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "bytes: {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Progress of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    total_size: u64,
    confirmed_offset: u64,
    chunk_size: u64,
}

impl TransferState {
    /// A transfer of `total_size` bytes that has not started.
    pub fn new(total_size: u64, chunk_size: u64) -> Self {
        Self {
            total_size,
            confirmed_offset: 0,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Size in bytes of the whole upload.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// The number of bytes the server confirmed it has received.
    pub fn confirmed_offset(&self) -> u64 {
        self.confirmed_offset
    }

    /// Size in bytes of a chunk.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Whether the server has all of the bytes.
    pub fn is_complete(&self) -> bool {
        self.confirmed_offset >= self.total_size
    }

    /// The window of the next chunk, starting at the confirmed offset.
    ///
    /// The last chunk of an upload may be shorter than the chunk size.
    pub fn next_range(&self) -> ByteRange {
        let start = self.confirmed_offset;
        let end = start.saturating_add(self.chunk_size).min(self.total_size);
        ByteRange::new(start, end, self.total_size)
    }

    /// Record an offset reported by the server.
    ///
    /// Returns whether the offset moved forward.
    fn confirm(&mut self, offset: u64) -> std::result::Result<bool, &'static str> {
        if offset > self.total_size {
            return Err("confirmed offset is beyond the end of the upload");
        }
        if offset < self.confirmed_offset {
            return Err("confirmed offset moved backwards");
        }
        let progressed = offset > self.confirmed_offset;
        self.confirmed_offset = offset;
        Ok(progressed)
    }
}

/// States of the transfer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferPhase {
    /// Nothing has been sent yet.
    AwaitingTransfer,
    /// A chunk is to be sent.
    Transferring,
    /// The server is to be asked for the confirmed offset.
    CheckingProgress,
    /// The server has every byte.
    Complete,
    /// The progress hook stopped the transfer.
    Aborted,
}

/// Observes the progress of a transfer and may stop it.
///
/// Called once per round after the server confirmed an offset. Returning
/// `ControlFlow::Break` ends the transfer without sending anything more and
/// without finalizing the upload, leaving it on the server to be resumed.
///
/// This is implemented for closures `FnMut(u64) -> bool`, which receive the
/// confirmed offset and return `true` to stop.
pub trait OnProgress: Send {
    /// Called with the state after each progress check.
    fn on_progress(&mut self, state: &TransferState) -> ControlFlow<()>;
}

impl<F> OnProgress for F
where
    F: FnMut(u64) -> bool + Send,
{
    fn on_progress(&mut self, state: &TransferState) -> ControlFlow<()> {
        if self(state.confirmed_offset()) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// An [`OnProgress`] that never stops the transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl OnProgress for NoProgress {
    fn on_progress(&mut self, _: &TransferState) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// How a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferOutcome {
    /// Every byte was confirmed.
    Complete(TransferState),
    /// The progress hook stopped the transfer.
    Aborted(TransferState),
}

/// Drives the transfer of one upload.
pub(crate) struct TransferLoop<'a, H> {
    client: &'a UploadClient,
    config: &'a UploadConfig,
    upload_link: &'a str,
    content_type: HeaderValue,
    source: OpenSource,
    state: TransferState,
    phase: TransferPhase,
    hook: H,
    stalled: u32,
}

impl<'a, H: OnProgress> TransferLoop<'a, H> {
    pub(crate) fn new(
        client: &'a UploadClient,
        config: &'a UploadConfig,
        upload_link: &'a str,
        content_type: HeaderValue,
        source: OpenSource,
        state: TransferState,
        hook: H,
    ) -> Self {
        Self {
            client,
            config,
            upload_link,
            content_type,
            source,
            state,
            phase: TransferPhase::AwaitingTransfer,
            hook,
            stalled: 0,
        }
    }

    /// Start from a progress check instead of sending the first chunk.
    ///
    /// This is how an upload that was stopped earlier is picked up again.
    pub(crate) fn resuming(self) -> Self {
        Self {
            phase: TransferPhase::CheckingProgress,
            ..self
        }
    }

    /// Run the state machine until the transfer completes, is stopped, or
    /// fails.
    ///
    /// The source is dropped, closing any file, when this returns.
    pub(crate) async fn run(mut self) -> Result<TransferOutcome> {
        loop {
            self.phase = match self.phase {
                TransferPhase::AwaitingTransfer if self.state.is_complete() => {
                    TransferPhase::Complete
                }
                TransferPhase::AwaitingTransfer => TransferPhase::Transferring,
                TransferPhase::Transferring => {
                    self.send_chunk().await?;
                    TransferPhase::CheckingProgress
                }
                TransferPhase::CheckingProgress => self.check_progress().await?,
                TransferPhase::Complete => {
                    debug!(size = self.state.total_size, "transfer complete");
                    return Ok(TransferOutcome::Complete(self.state));
                }
                TransferPhase::Aborted => {
                    debug!(offset = self.state.confirmed_offset, "transfer aborted");
                    return Ok(TransferOutcome::Aborted(self.state));
                }
            };
        }
    }

    async fn send_chunk(&mut self) -> Result<()> {
        let range = self.state.next_range();
        let body = self
            .source
            .read_range(&range)
            .await
            .map_err(ErrorRepr::from)?;
        let content_range = HeaderValue::try_from(range.to_string()).map_err(ErrorRepr::from)?;

        let req = HttpRequest::new(Method::PUT, self.upload_link)
            .header(CONTENT_LENGTH, HeaderValue::from(range.len()))
            .header(CONTENT_RANGE, content_range)
            .header(CONTENT_TYPE, self.content_type.clone())
            .body(body)
            .timeout(self.config.transfer_timeout);

        trace!(%range, "sending chunk");
        match self.client.send_request(req).await {
            Ok(resp) if is_transfer_success(resp.status) => Ok(()),
            Ok(response) => Err(ErrorRepr::TransferRejected { range, response }.into()),
            Err(TransportError::Timeout) => {
                warn!(%range, "chunk transfer timed out, checking progress");
                Ok(())
            }
            Err(e) => Err(ErrorRepr::from_transport(Stage::Transfer)(e).into()),
        }
    }

    async fn check_progress(&mut self) -> Result<TransferPhase> {
        let (offset, response) = self.query_offset().await?;
        let progressed = self
            .state
            .confirm(offset)
            .map_err(|reason| ErrorRepr::ProgressCheck { reason, response })?;
        if progressed {
            self.stalled = 0;
        } else {
            self.stalled += 1;
        }
        trace!(
            offset,
            total = self.state.total_size,
            stalled = self.stalled,
            "confirmed offset"
        );

        // With every byte confirmed there is nothing left to stop.
        let flow = self.hook.on_progress(&self.state);
        if self.state.is_complete() {
            return Ok(TransferPhase::Complete);
        }
        if flow.is_break() {
            return Ok(TransferPhase::Aborted);
        }
        if let Some(limit) = self.config.stall_limit {
            if self.stalled >= limit {
                return Err(ErrorRepr::Stalled {
                    rounds: self.stalled,
                    offset,
                }
                .into());
            }
        }
        Ok(TransferPhase::Transferring)
    }

    /// Ask the server how many bytes it has, returning the offset with the
    /// response that reported it.
    async fn query_offset(&self) -> Result<(u64, HttpResponse)> {
        let req = HttpRequest::new(Method::PUT, self.upload_link)
            .header(CONTENT_RANGE, HeaderValue::from_static(QUERY_RANGE))
            .timeout(self.config.request_timeout);

        let response = self
            .client
            .send_request(req)
            .await
            .map_err(ErrorRepr::from_transport(Stage::Progress))?;
        if response.status != StatusCode::PERMANENT_REDIRECT && !response.status.is_success() {
            return Err(ErrorRepr::ProgressCheck {
                reason: "unexpected status",
                response,
            }
            .into());
        }
        let Some(offset) = response
            .header_str(RANGE.as_str())
            .and_then(parse_range_end)
        else {
            return Err(ErrorRepr::ProgressCheck {
                reason: "missing or malformed Range header",
                response,
            }
            .into());
        };
        Ok((offset, response))
    }
}

fn is_transfer_success(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::PERMANENT_REDIRECT
}

/// Parse the confirmed offset out of a `Range` header value like
/// `bytes 0-1000`, which is the integer after the last `-`.
pub(crate) fn parse_range_end(value: &str) -> Option<u64> {
    let (_, end) = value.rsplit_once('-')?;
    end.trim().parse().ok()
}
