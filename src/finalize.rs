//! Completing an upload.
use crate::client::{HttpRequest, HttpResponse, SendRequest as _, UploadClient};
use crate::config::UploadConfig;
use crate::error::{ErrorRepr, Result, Stage};
use crate::ticket::UploadTicket;
use crate::uri::{ResourceId, ResourceUri};

use http::Method;
use http::header::LOCATION;

/// The value for a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    /// Where the created resource lives.
    pub location: ResourceUri,
    /// The identifier of the created resource.
    pub id: ResourceId,
}

impl CompletedUpload {
    /// Create a new value from the resource location and identifier.
    pub fn new(location: ResourceUri, id: ResourceId) -> Self {
        Self { location, id }
    }

    fn try_from_response(response: HttpResponse) -> Result<Self, ErrorRepr> {
        let Some(location) = response.header_str(LOCATION.as_str()).map(ResourceUri::from) else {
            return Err(ErrorRepr::Finalize {
                reason: "missing Location header",
                response,
            });
        };
        let Some(id) = location.id() else {
            return Err(ErrorRepr::Finalize {
                reason: "Location header has no resource identifier",
                response,
            });
        };
        Ok(Self::new(location, id))
    }
}

/// Turn a fully transferred ticket into a permanent resource.
pub(crate) async fn finalize(
    client: &UploadClient,
    config: &UploadConfig,
    ticket: &UploadTicket,
) -> Result<CompletedUpload> {
    let req = HttpRequest::new(Method::DELETE, ticket.complete_uri())
        .timeout(config.request_timeout);

    let response = client
        .send_request(req)
        .await
        .map_err(ErrorRepr::from_transport(Stage::Finalize))?;
    if response.status != config.finalize_status {
        return Err(ErrorRepr::Finalize {
            reason: "unexpected status",
            response,
        }
        .into());
    }

    let completed = CompletedUpload::try_from_response(response)?;
    debug!(location = %completed.location, id = %completed.id, "finalized upload");
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, StatusCode};

    fn created(location: Option<&'static str>) -> HttpResponse {
        let mut headers = HeaderMap::new();
        if let Some(location) = location {
            headers.insert(LOCATION, HeaderValue::from_static(location));
        }
        HttpResponse::new(StatusCode::CREATED, headers, Bytes::new())
    }

    #[test]
    fn identifier_is_last_location_segment() {
        let done = CompletedUpload::try_from_response(created(Some("/videos/76543"))).unwrap();
        assert_eq!(&*done.location, "/videos/76543");
        assert_eq!(&*done.id, "76543");
    }

    #[test]
    fn missing_location_is_an_error() {
        let err = CompletedUpload::try_from_response(created(None)).unwrap_err();
        assert!(matches!(
            err,
            ErrorRepr::Finalize {
                reason: "missing Location header",
                ..
            }
        ));
    }
}
