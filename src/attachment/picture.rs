use super::{parse_body, put_source, send_expecting};
use crate::client::{HttpRequest, UploadClient};
use crate::config::UploadConfig;
use crate::error::{ErrorRepr, Result};
use crate::source::UploadSource;
use crate::uri::ResourceUri;

use http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

/// JSON pointer to the pictures connection in a resource's metadata.
const PICTURES_CONNECTION: &str = "/metadata/connections/pictures/uri";

/// Which resource a picture is uploaded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PictureTarget {
    /// The resource itself, e.g. `/videos/12345`. Its pictures connection is
    /// looked up first.
    Resource(ResourceUri),
    /// The pictures connection of the resource, e.g. `/videos/12345/pictures`.
    Connection(ResourceUri),
}

impl From<ResourceUri> for PictureTarget {
    fn from(value: ResourceUri) -> Self {
        Self::Resource(value)
    }
}

/// A picture created by an upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Picture {
    /// URI of the picture resource.
    pub uri: ResourceUri,
    /// The link the picture file was sent to.
    pub link: String,
    /// Whether the picture is the active picture of its resource.
    #[serde(default)]
    pub active: bool,
}

pub(crate) async fn upload_picture(
    client: &UploadClient,
    config: &UploadConfig,
    target: PictureTarget,
    source: UploadSource,
    activate: bool,
) -> Result<Picture> {
    let pictures = match target {
        PictureTarget::Connection(uri) => uri,
        PictureTarget::Resource(uri) => pictures_connection(client, config, &uri).await?,
    };

    let req = HttpRequest::new(Method::POST, pictures.to_string()).timeout(config.request_timeout);
    let created = send_expecting(client, req, &[StatusCode::CREATED], "creating picture").await?;
    let mut picture: Picture = parse_body(created, "creating picture")?;
    debug!(uri = %picture.uri, "created picture");

    put_source(client, config, &picture.link, source, "uploading picture").await?;

    if activate {
        let req = HttpRequest::new(Method::PATCH, picture.uri.to_string())
            .json(&json!({"active": true}))?
            .timeout(config.request_timeout);
        send_expecting(
            client,
            req,
            &[StatusCode::OK, StatusCode::NO_CONTENT],
            "activating picture",
        )
        .await?;
        picture.active = true;
    }
    Ok(picture)
}

/// Look up the URI of the pictures connection of a resource.
async fn pictures_connection(
    client: &UploadClient,
    config: &UploadConfig,
    uri: &ResourceUri,
) -> Result<ResourceUri> {
    let req = HttpRequest::new(Method::GET, uri.to_string()).timeout(config.request_timeout);
    let response = send_expecting(client, req, &[StatusCode::OK], "loading picture target").await?;

    let connection = response
        .json::<Value>()
        .ok()
        .and_then(|v| v.pointer(PICTURES_CONNECTION).and_then(Value::as_str).map(ResourceUri::from));
    match connection {
        Some(uri) => Ok(uri),
        None => Err(ErrorRepr::Attachment {
            what: "loading picture target",
            reason: "resource has no pictures connection",
            response,
        }
        .into()),
    }
}
