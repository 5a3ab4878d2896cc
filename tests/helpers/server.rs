use bytes::Bytes;
use http::header::{CONTENT_RANGE, LOCATION, RANGE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use resumable_upload::{HttpRequest, HttpResponse, SendRequest, TransportError, TransportResult};
use serde_json::{Value, json};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

pub const UPLOAD_LINK: &str = "https://upload.test/upload?ticket_id=t-1";
pub const COMPLETE_URI: &str = "/users/1/uploads/t-1";
pub const LOCATION_URI: &str = "/videos/76543";
pub const VIDEO_URI: &str = "/videos/42";
pub const PICTURES_URI: &str = "/videos/42/pictures";
pub const PICTURE_URI: &str = "/videos/42/pictures/7";
pub const PICTURE_LINK: &str = "https://upload.test/pictures/7";
pub const TEXTTRACK_URI: &str = "/texttracks/9";
pub const TEXTTRACK_LINK: &str = "https://upload.test/texttracks/9";

/// A request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Bytes,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_progress_check(&self) -> bool {
        self.method == Method::PUT
            && self.url == UPLOAD_LINK
            && self.header(CONTENT_RANGE.as_str()) == Some("bytes */*")
    }

    pub fn is_chunk(&self) -> bool {
        self.method == Method::PUT && self.url == UPLOAD_LINK && !self.is_progress_check()
    }

    pub fn is_ticket(&self) -> bool {
        (self.method == Method::POST && self.url == "/me/videos")
            || (self.method == Method::PUT && self.url.ends_with("/files"))
    }

    pub fn is_finalize(&self) -> bool {
        self.method == Method::DELETE && self.url == COMPLETE_URI
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

/// Everything about the fake service that a test can script or inspect.
#[derive(Debug)]
pub struct ServerState {
    /// Every request received, in order.
    pub requests: Vec<Recorded>,
    /// The bytes of the upload the server has kept.
    pub received: Vec<u8>,
    /// Bodies sent to attachment links.
    pub attachments: Vec<(String, Bytes)>,
    pub ticket_status: StatusCode,
    pub ticket_body: Value,
    pub replace_status: StatusCode,
    pub chunk_status: StatusCode,
    pub finalize_status: StatusCode,
    pub location: Option<&'static str>,
    /// Indices of chunk requests that time out, counting from zero.
    pub timeouts: HashSet<usize>,
    /// Chunks that time out keep nothing instead of half their bytes.
    pub drop_timed_out: bool,
    /// Indices of progress checks that time out, counting from zero.
    pub progress_timeouts: HashSet<usize>,
    pub ticket_timeout: bool,
    pub finalize_timeout: bool,
    /// Keep at most this many bytes of each chunk.
    pub accept_limit: Option<usize>,
    /// Offsets reported by progress checks ahead of the real one.
    pub reported_offsets: VecDeque<u64>,
    /// Progress checks answer without a `Range` header.
    pub omit_range: bool,
    pub quota_free: u64,
    pub has_pictures_connection: bool,
    pub picture_status: StatusCode,
    chunks_seen: usize,
    checks_seen: usize,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            requests: Vec::new(),
            received: Vec::new(),
            attachments: Vec::new(),
            ticket_status: StatusCode::CREATED,
            ticket_body: json!({
                "upload_link": UPLOAD_LINK,
                "complete_uri": COMPLETE_URI,
                "ticket_id": "t-1",
            }),
            replace_status: StatusCode::OK,
            chunk_status: StatusCode::OK,
            finalize_status: StatusCode::CREATED,
            location: Some(LOCATION_URI),
            timeouts: HashSet::new(),
            drop_timed_out: false,
            progress_timeouts: HashSet::new(),
            ticket_timeout: false,
            finalize_timeout: false,
            accept_limit: None,
            reported_offsets: VecDeque::new(),
            omit_range: false,
            quota_free: u64::MAX,
            has_pictures_connection: true,
            picture_status: StatusCode::CREATED,
            chunks_seen: 0,
            checks_seen: 0,
        }
    }
}

impl ServerState {
    pub fn chunks(&self) -> Vec<&Recorded> {
        self.requests.iter().filter(|r| r.is_chunk()).collect()
    }

    pub fn progress_checks(&self) -> usize {
        self.requests.iter().filter(|r| r.is_progress_check()).count()
    }

    pub fn tickets(&self) -> usize {
        self.requests.iter().filter(|r| r.is_ticket()).count()
    }

    pub fn finalized(&self) -> bool {
        self.requests.iter().any(Recorded::is_finalize)
    }
}

/// An in-memory stand-in for the upload service.
#[derive(Debug, Clone, Default)]
pub struct MockServer(Arc<Mutex<ServerState>>);

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: FnOnce(&mut ServerState)>(self, f: F) -> Self {
        f(&mut self.state());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.0.lock().unwrap()
    }

    fn respond(&self, req: &HttpRequest) -> TransportResult<HttpResponse> {
        let mut state = self.state();
        state.requests.push(Recorded {
            method: req.method.clone(),
            url: req.url.clone(),
            headers: req.headers.clone(),
            query: req.query.clone(),
            body: req.body.clone(),
        });

        let url = req.url.as_str();
        match (&req.method, url) {
            (&Method::GET, "/me") => {
                let body = json!({"upload_quota": {"space": {"free": state.quota_free}}});
                Ok(json_response(StatusCode::OK, &body))
            }
            (&Method::POST, "/me/videos") if state.ticket_timeout => Err(TransportError::Timeout),
            (&Method::POST, "/me/videos") => {
                Ok(json_response(state.ticket_status, &state.ticket_body))
            }
            (&Method::PUT, u) if u.ends_with("/files") => {
                let mut body = state.ticket_body.clone();
                body["uri"] = json!(u.trim_end_matches("/files"));
                Ok(json_response(state.replace_status, &body))
            }
            (&Method::PUT, UPLOAD_LINK) => {
                if req.headers.get(CONTENT_RANGE) == Some(&HeaderValue::from_static("bytes */*")) {
                    progress_response(&mut state)
                } else {
                    receive_chunk(&mut state, req)
                }
            }
            (&Method::DELETE, COMPLETE_URI) if state.finalize_timeout => {
                Err(TransportError::Timeout)
            }
            (&Method::DELETE, COMPLETE_URI) => {
                let mut headers = HeaderMap::new();
                if let Some(location) = state.location {
                    headers.insert(LOCATION, HeaderValue::from_static(location));
                }
                Ok(HttpResponse::new(state.finalize_status, headers, Bytes::new()))
            }
            (&Method::GET, VIDEO_URI) => {
                let body = if state.has_pictures_connection {
                    json!({"uri": VIDEO_URI, "metadata": {"connections": {"pictures": {"uri": PICTURES_URI}}}})
                } else {
                    json!({"uri": VIDEO_URI, "metadata": {"connections": {}}})
                };
                Ok(json_response(StatusCode::OK, &body))
            }
            (&Method::POST, PICTURES_URI) => {
                let body = json!({"uri": PICTURE_URI, "link": PICTURE_LINK, "active": false});
                Ok(json_response(state.picture_status, &body))
            }
            (&Method::PATCH, PICTURE_URI) => Ok(json_response(
                StatusCode::OK,
                &json!({"uri": PICTURE_URI, "active": true}),
            )),
            (&Method::POST, "/videos/42/texttracks") => {
                let body = json!({"uri": TEXTTRACK_URI, "link": TEXTTRACK_LINK});
                Ok(json_response(StatusCode::CREATED, &body))
            }
            (&Method::PUT, PICTURE_LINK | TEXTTRACK_LINK) => {
                state.attachments.push((url.to_string(), req.body.clone()));
                Ok(HttpResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new()))
            }
            _ => Ok(json_response(
                StatusCode::NOT_FOUND,
                &json!({"error": format!("no route for {} {url}", req.method)}),
            )),
        }
    }
}

impl SendRequest for MockServer {
    async fn send_request(&self, req: HttpRequest) -> TransportResult<HttpResponse> {
        self.respond(&req)
    }
}

fn json_response(status: StatusCode, body: &Value) -> HttpResponse {
    let body = Bytes::from(serde_json::to_vec(body).unwrap());
    HttpResponse::new(status, HeaderMap::new(), body)
}

fn progress_response(state: &mut ServerState) -> TransportResult<HttpResponse> {
    let index = state.checks_seen;
    state.checks_seen += 1;
    if state.progress_timeouts.contains(&index) {
        return Err(TransportError::Timeout);
    }

    let offset = state
        .reported_offsets
        .pop_front()
        .unwrap_or(state.received.len() as u64);
    let mut headers = HeaderMap::new();
    if !state.omit_range {
        let range = HeaderValue::try_from(format!("bytes 0-{offset}")).unwrap();
        headers.insert(RANGE, range);
    }
    Ok(HttpResponse::new(
        StatusCode::PERMANENT_REDIRECT,
        headers,
        Bytes::new(),
    ))
}

/// Keeps the chunk if it starts where the stored bytes end.
fn receive_chunk(state: &mut ServerState, req: &HttpRequest) -> TransportResult<HttpResponse> {
    let index = state.chunks_seen;
    state.chunks_seen += 1;

    let start = req
        .headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes: "))
        .and_then(|v| v.split_once('-'))
        .and_then(|(start, _)| start.parse::<usize>().ok())
        .unwrap();

    let mut keep = req.body.len();
    if let Some(limit) = state.accept_limit {
        keep = keep.min(limit);
    }
    if state.timeouts.contains(&index) {
        // Part of the chunk made it before the connection went quiet.
        keep = if state.drop_timed_out { 0 } else { keep / 2 };
    }
    if start == state.received.len() {
        state.received.extend_from_slice(&req.body[..keep]);
    }

    if state.timeouts.contains(&index) {
        return Err(TransportError::Timeout);
    }
    Ok(HttpResponse::new(state.chunk_status, HeaderMap::new(), Bytes::new()))
}
