use crate::attachment::{self, Picture, PictureTarget, TextTrack, TextTrackRequest};
use crate::client::UploadClient;
use crate::config::UploadConfig;
use crate::error::{ErrorRepr, Result};
use crate::finalize::{self, CompletedUpload};
use crate::plan::plan_chunk_size;
use crate::quota;
use crate::source::UploadSource;
use crate::ticket::{self, Metadata, TicketMode, UploadTicket};
use crate::transfer::{NoProgress, OnProgress, TransferLoop, TransferOutcome, TransferState};
use crate::uri::{ResourceId, ResourceUri};

use http::header::HeaderValue;

/// Runs uploads against the service.
///
/// Build one with [`UploadBuilder`](crate::UploadBuilder). An `Uploader` can
/// be shared and run any number of uploads, each of which is sequential.
#[derive(Debug, Clone)]
pub struct Uploader {
    client: UploadClient,
    config: UploadConfig,
}

impl Uploader {
    pub(crate) fn new(client: UploadClient, config: UploadConfig) -> Self {
        Self { client, config }
    }

    /// The configuration uploads are run with.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Upload `source` as a new resource.
    ///
    /// `metadata` is sent along with the ticket request, for instance to set
    /// the name of the resource.
    pub async fn upload<S>(&self, source: S, metadata: Option<Metadata>) -> Result<UploadOutcome>
    where
        S: Into<UploadSource>,
    {
        self.upload_with_progress(source, metadata, NoProgress).await
    }

    /// Upload `source` as a new resource, reporting progress to `hook`.
    ///
    /// The hook can stop the upload, in which case the outcome holds the
    /// ticket to [`resume`](Uploader::resume) it with.
    pub async fn upload_with_progress<S, H>(
        &self,
        source: S,
        metadata: Option<Metadata>,
        hook: H,
    ) -> Result<UploadOutcome>
    where
        S: Into<UploadSource>,
        H: OnProgress,
    {
        self.run(TicketMode::Upload, source.into(), metadata, hook)
            .await
    }

    /// Replace the file of the existing resource at `uri`.
    pub async fn replace<T, S>(
        &self,
        uri: T,
        source: S,
        metadata: Option<Metadata>,
    ) -> Result<UploadOutcome>
    where
        T: Into<ResourceUri>,
        S: Into<UploadSource>,
    {
        self.replace_with_progress(uri, source, metadata, NoProgress)
            .await
    }

    /// Replace the file of the existing resource at `uri`, reporting progress
    /// to `hook`.
    pub async fn replace_with_progress<T, S, H>(
        &self,
        uri: T,
        source: S,
        metadata: Option<Metadata>,
        hook: H,
    ) -> Result<UploadOutcome>
    where
        T: Into<ResourceUri>,
        S: Into<UploadSource>,
        H: OnProgress,
    {
        let mode = TicketMode::Replace(uri.into());
        self.run(mode, source.into(), metadata, hook).await
    }

    /// Continue an upload that was stopped by its progress hook.
    ///
    /// `source` must hold the same bytes as the source of the original upload.
    /// The transfer starts by asking the server how much it already has.
    pub async fn resume<S, H>(&self, ticket: UploadTicket, source: S, hook: H) -> Result<UploadOutcome>
    where
        S: Into<UploadSource>,
        H: OnProgress,
    {
        let mut source = source.into();
        let size = source.measure_size().await?;
        debug!(upload_link = %ticket.upload_link(), size, "resuming upload");
        self.transfer(ticket, source, size, hook, true).await
    }

    /// Upload a picture for a resource and optionally make it the active one.
    pub async fn upload_picture<T, S>(&self, target: T, source: S, activate: bool) -> Result<Picture>
    where
        T: Into<PictureTarget>,
        S: Into<UploadSource>,
    {
        attachment::upload_picture(
            &self.client,
            &self.config,
            target.into(),
            source.into(),
            activate,
        )
        .await
    }

    /// Upload a text track, such as captions, for the video at `video`.
    pub async fn upload_texttrack<S>(
        &self,
        video: &ResourceUri,
        request: TextTrackRequest,
        source: S,
    ) -> Result<TextTrack>
    where
        S: Into<UploadSource>,
    {
        attachment::upload_texttrack(
            &self.client,
            &self.config,
            video,
            request,
            source.into(),
        )
        .await
    }

    async fn run<H: OnProgress>(
        &self,
        mode: TicketMode,
        mut source: UploadSource,
        metadata: Option<Metadata>,
        hook: H,
    ) -> Result<UploadOutcome> {
        // No ticket for a source that cannot be read.
        let size = source.measure_size().await?;
        if self.config.check_quota {
            quota::ensure_quota(&self.client, &self.config, size).await?;
        }
        let ticket =
            ticket::create_ticket(&self.client, &self.config, &mode, metadata.unwrap_or_default())
                .await?;
        self.transfer(ticket, source, size, hook, false).await
    }

    async fn transfer<H: OnProgress>(
        &self,
        ticket: UploadTicket,
        source: UploadSource,
        size: u64,
        hook: H,
        resume: bool,
    ) -> Result<UploadOutcome> {
        let chunk_size = plan_chunk_size(self.config.proposed_chunk_size(), size);
        let content_type = HeaderValue::try_from(source.content_type()).map_err(ErrorRepr::from)?;
        let state = TransferState::new(size, chunk_size);
        trace!(size, chunk_size, "planned transfer");

        let open = source.open().await?;
        let transfer = TransferLoop::new(
            &self.client,
            &self.config,
            ticket.upload_link(),
            content_type,
            open,
            state,
            hook,
        );
        let transfer = if resume { transfer.resuming() } else { transfer };

        match transfer.run().await? {
            TransferOutcome::Complete(_) => {
                let completed = finalize::finalize(&self.client, &self.config, &ticket).await?;
                Ok(UploadOutcome::Completed(completed))
            }
            TransferOutcome::Aborted(state) => {
                Ok(UploadOutcome::Aborted(AbortedUpload { ticket, state }))
            }
        }
    }
}

/// How an upload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The upload was finalized into a resource.
    Completed(CompletedUpload),
    /// The progress hook stopped the upload before it finished.
    Aborted(AbortedUpload),
}

impl UploadOutcome {
    /// The completed upload, if the upload was not stopped.
    pub fn completed(&self) -> Option<&CompletedUpload> {
        match self {
            Self::Completed(completed) => Some(completed),
            Self::Aborted(_) => None,
        }
    }

    /// The identifier of the created resource, if the upload was not stopped.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        self.completed().map(|completed| &completed.id)
    }

    /// Whether the progress hook stopped the upload.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// An upload that was stopped before it was finalized.
///
/// The ticket is still valid on the server, see [`Uploader::resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedUpload {
    /// Ticket of the unfinished upload.
    pub ticket: UploadTicket,
    /// Progress at the time the upload was stopped.
    pub state: TransferState,
}
