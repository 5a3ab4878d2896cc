//! Upload tickets.
//!
//! A ticket reserves an upload slot on the service. It carries the link the
//! bytes are sent to and the URI that completes the upload once they are all
//! there.
use crate::client::{HttpRequest, HttpResponse, SendRequest as _, UploadClient};
use crate::config::UploadConfig;
use crate::error::{ErrorRepr, Result, Stage};
use crate::uri::ResourceUri;

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Additional fields sent with the ticket request, such as the name or
/// description of the new resource.
pub type Metadata = serde_json::Map<String, Value>;

/// Upload type that selects the range-based protocol.
const UPLOAD_TYPE: &str = "streaming";

/// What a ticket is requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketMode {
    /// Create a new resource.
    Upload,
    /// Replace the file of an existing resource.
    Replace(ResourceUri),
}

impl TicketMode {
    fn request(&self, config: &UploadConfig) -> (Method, String, StatusCode) {
        match self {
            Self::Upload => (
                Method::POST,
                config.upload_endpoint.to_string(),
                config.ticket_status,
            ),
            Self::Replace(uri) => (
                Method::PUT,
                uri.join("files").to_string(),
                config.replace_status,
            ),
        }
    }
}

/// A server-issued handle for an upload in progress.
///
/// Tickets are plain data and can be serialized, so that an upload stopped
/// by its progress hook can be resumed later, even by another process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    upload_link: String,
    complete_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ticket_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource_uri: Option<ResourceUri>,
}

impl UploadTicket {
    /// Create a new `UploadTicket` from the minimum required.
    pub fn new<T: Into<String>, U: Into<String>>(upload_link: T, complete_uri: U) -> Self {
        Self {
            upload_link: upload_link.into(),
            complete_uri: complete_uri.into(),
            ticket_id: None,
            resource_uri: None,
        }
    }

    /// The link chunks are sent to.
    pub fn upload_link(&self) -> &str {
        &self.upload_link
    }

    /// The URI of the completion request.
    pub fn complete_uri(&self) -> &str {
        &self.complete_uri
    }

    /// The identifier the service assigned to the ticket, if it reported one.
    pub fn ticket_id(&self) -> Option<&str> {
        self.ticket_id.as_deref()
    }

    /// The resource this upload belongs to, if known.
    pub fn resource_uri(&self) -> Option<&ResourceUri> {
        self.resource_uri.as_ref()
    }

    /// Returns this ticket with the resource URI set.
    pub fn with_resource_uri<T: Into<ResourceUri>>(self, uri: T) -> Self {
        Self {
            resource_uri: Some(uri.into()),
            ..self
        }
    }

    pub(crate) fn try_from_response(response: HttpResponse) -> Result<Self, ErrorRepr> {
        let Ok(body) = response.json::<TicketResponse>() else {
            return Err(ErrorRepr::MalformedTicket {
                field: "body",
                response,
            });
        };
        let Some(upload_link) = body.upload_link.or(body.upload_link_secure) else {
            return Err(ErrorRepr::MalformedTicket {
                field: "upload_link",
                response,
            });
        };
        let Some(complete_uri) = body.complete_uri else {
            return Err(ErrorRepr::MalformedTicket {
                field: "complete_uri",
                response,
            });
        };

        Ok(Self {
            upload_link,
            complete_uri,
            ticket_id: body.ticket_id,
            resource_uri: body.uri.map(ResourceUri::from),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
    upload_link: Option<String>,
    upload_link_secure: Option<String>,
    complete_uri: Option<String>,
    ticket_id: Option<String>,
    uri: Option<String>,
}

/// Request a ticket from the service.
pub(crate) async fn create_ticket(
    client: &UploadClient,
    config: &UploadConfig,
    mode: &TicketMode,
    metadata: Metadata,
) -> Result<UploadTicket> {
    let (method, url, expected) = mode.request(config);
    let body = ticket_body(config.upgrade_to_1080, metadata);
    let req = HttpRequest::new(method, url)
        .json(&body)?
        .timeout(config.request_timeout);

    let response = client
        .send_request(req)
        .await
        .map_err(ErrorRepr::from_transport(Stage::Ticket))?;
    if response.status != expected {
        return Err(ErrorRepr::TicketRejected { expected, response }.into());
    }

    let mut ticket = UploadTicket::try_from_response(response)?;
    if let (TicketMode::Replace(uri), None) = (mode, &ticket.resource_uri) {
        ticket.resource_uri = Some(uri.clone());
    }
    debug!(
        ticket_id = ?ticket.ticket_id,
        upload_link = %ticket.upload_link,
        "created upload ticket"
    );
    Ok(ticket)
}

fn ticket_body(upgrade_to_1080: bool, metadata: Metadata) -> Value {
    let mut body = metadata;
    body.insert("type".into(), UPLOAD_TYPE.into());
    body.insert(
        "upgrade_to_1080".into(),
        if upgrade_to_1080 { "true" } else { "false" }.into(),
    );
    Value::Object(body)
}
