//! The HTTP transport used to deliver publish requests.
//!
//! [`Transport`] abstracts over the HTTP client so that connection pooling,
//! TLS, timeouts and retries stay the concern of the client it wraps. It is
//! implemented for [`reqwest::Client`].

use std::error::Error;
use std::future::Future;

use reqwest::header::HeaderMap;
use url::Url;

/// A fully built publish request: `POST` to the hub URL, with the
/// `Authorization` and `Content-Type` headers set, and the form encoded update
/// as body.
#[derive(Clone, Debug)]
pub struct PublishRequest {
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) body: String,
}

/// An HTTP client able to deliver a [`PublishRequest`] to the Mercure hub.
///
/// Both operations are suspension points of a publish. Implementations must
/// support overlapping in-flight requests through `&self`.
pub trait Transport: Send + Sync {
    /// The response handle returned once the hub has answered.
    type Response: Send;
    /// The error type returned by the transport.
    type Error: Error + Send + Sync + 'static;

    /// Sends the request to the hub.
    fn send(
        &self,
        request: PublishRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;

    /// Reads the full response body as text.
    fn read_body(
        &self,
        response: Self::Response,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

impl PublishRequest {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_parts(self) -> (Url, HeaderMap, String) {
        (self.url, self.headers, self.body)
    }
}

/// Hub responses with a non-success status are reported as errors.
impl Transport for reqwest::Client {
    type Error = reqwest::Error;
    type Response = reqwest::Response;

    async fn send(&self, request: PublishRequest) -> Result<Self::Response, Self::Error> {
        let (url, headers, body) = request.into_parts();

        self.post(url)
            .headers(headers)
            .body(body)
            .send()
            .await?
            .error_for_status()
    }

    async fn read_body(&self, response: Self::Response) -> Result<String, Self::Error> {
        response.text().await
    }
}
