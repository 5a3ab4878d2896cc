use super::{parse_body, put_source, send_expecting};
use crate::client::{HttpRequest, UploadClient};
use crate::config::UploadConfig;
use crate::error::Result;
use crate::source::UploadSource;
use crate::uri::ResourceUri;

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

/// Name of a text track whose source has no file name.
const UNNAMED_TRACK: &str = "untitled";

/// Describes a text track to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextTrackRequest {
    /// Kind of track, e.g. `captions` or `subtitles`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Language tag of the track, e.g. `en`.
    pub language: String,
    /// Display name of the track. Defaults to the file name of the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TextTrackRequest {
    /// Create a new `TextTrackRequest`.
    pub fn new<K: Into<String>, L: Into<String>>(kind: K, language: L) -> Self {
        Self {
            kind: kind.into(),
            language: language.into(),
            name: None,
        }
    }

    /// Set the display name of the track.
    pub fn with_name<T: Into<String>>(self, name: T) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }
}

/// A text track created by an upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextTrack {
    /// URI of the text track resource.
    pub uri: ResourceUri,
    /// The link the track file was sent to.
    pub link: String,
}

pub(crate) async fn upload_texttrack(
    client: &UploadClient,
    config: &UploadConfig,
    video: &ResourceUri,
    mut request: TextTrackRequest,
    source: UploadSource,
) -> Result<TextTrack> {
    if request.name.is_none() {
        let name = source.file_name().unwrap_or(UNNAMED_TRACK);
        request.name = Some(name.to_string());
    }

    let req = HttpRequest::new(Method::POST, video.join("texttracks").to_string())
        .json(&request)?
        .timeout(config.request_timeout);
    let created = send_expecting(client, req, &[StatusCode::CREATED], "creating text track").await?;
    let track: TextTrack = parse_body(created, "creating text track")?;
    debug!(uri = %track.uri, "created text track");

    put_source(client, config, &track.link, source, "uploading text track").await?;
    Ok(track)
}
