use super::SendRequest;
use super::message::{HttpRequest, HttpResponse, TransportResult};

use futures::future::BoxFuture;

/// Object-safe `SendRequest`.
pub(crate) trait BoxedSendRequest: Send + Sync + 'static {
    fn send(&self, req: HttpRequest) -> BoxFuture<'_, TransportResult<HttpResponse>>;
}

/// Implements `BoxedSendRequest` for the public `SendRequest`.
pub(super) struct SendRequestInner<T>(T);

impl<T: SendRequest> SendRequestInner<T> {
    pub(super) fn new(inner: T) -> Self {
        Self(inner)
    }
}

impl<T: SendRequest + 'static> BoxedSendRequest for SendRequestInner<T> {
    fn send(&self, req: HttpRequest) -> BoxFuture<'_, TransportResult<HttpResponse>> {
        Box::pin(self.0.send_request(req))
    }
}
