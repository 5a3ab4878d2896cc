//! Files attached to an existing resource: pictures and text tracks.
//!
//! Attachments are small enough to be sent in a single request, so unlike
//! videos they have no ticket or range protocol. Each kind creates its
//! attachment resource, which comes with a link, then sends the whole file to
//! that link.
use crate::client::{HttpRequest, HttpResponse, SendRequest as _, UploadClient};
use crate::config::UploadConfig;
use crate::error::{ErrorRepr, Result, Stage};
use crate::source::UploadSource;
use crate::transfer::ByteRange;

use http::header::{CONTENT_LENGTH, HeaderValue};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;

mod picture;
pub use picture::{Picture, PictureTarget};
pub(crate) use picture::upload_picture;

mod texttrack;
pub use texttrack::{TextTrack, TextTrackRequest};
pub(crate) use texttrack::upload_texttrack;

/// Send a request on behalf of an attachment and check its status.
async fn send_expecting(
    client: &UploadClient,
    req: HttpRequest,
    expected: &[StatusCode],
    what: &'static str,
) -> Result<HttpResponse> {
    let response = client
        .send_request(req)
        .await
        .map_err(ErrorRepr::from_transport(Stage::Attachment))?;
    if !expected.contains(&response.status) {
        return Err(ErrorRepr::Attachment {
            what,
            reason: "unexpected status",
            response,
        }
        .into());
    }
    Ok(response)
}

/// Deserialize the body of an attachment response.
fn parse_body<T: DeserializeOwned>(response: HttpResponse, what: &'static str) -> Result<T> {
    match response.json::<T>() {
        Ok(value) => Ok(value),
        Err(_) => Err(ErrorRepr::Attachment {
            what,
            reason: "malformed response body",
            response,
        }
        .into()),
    }
}

/// `PUT` the whole of `source` to `link`.
async fn put_source(
    client: &UploadClient,
    config: &UploadConfig,
    link: &str,
    mut source: UploadSource,
    what: &'static str,
) -> Result<()> {
    let size = source.measure_size().await?;
    let mut open = source.open().await?;
    let body = open
        .read_range(&ByteRange::new(0, size, size))
        .await
        .map_err(ErrorRepr::from)?;
    drop(open);

    let req = HttpRequest::new(Method::PUT, link)
        .header(CONTENT_LENGTH, HeaderValue::from(size))
        .body(body)
        .timeout(config.transfer_timeout);
    send_expecting(client, req, &[StatusCode::OK], what).await?;
    trace!(link, size, "sent attachment");
    Ok(())
}
