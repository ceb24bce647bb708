use std::error::Error;
use std::fmt;
use std::str::FromStr;

use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, warn};
use url::Url;

use crate::jwt::{self, TokenProvider};
use crate::transport::{PublishRequest, Transport};
use crate::update::{self, RevisionId, Update};

/// A client for publishing updates to the Mercure hub.
///
/// The hub URL, token provider and transport are fixed for the lifetime of
/// the client. Each publish builds its own request, so a single client can be
/// shared by concurrent publishes.
#[derive(Clone)]
pub struct Client<P, T = reqwest::Client> {
    transport: T,
    hub_url: HubUrl,
    token_provider: P,
}

/// The [URL] of the Mercure hub that publish requests are sent to.
///
/// The hub conventionally lives at the "well-known" path
/// `/.well-known/mercure`, but any absolute URL is accepted.
///
/// [URL]: https://url.spec.whatwg.org/
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct HubUrl(Url);

/// An error which can be returned when parsing a [`HubUrl`].
#[derive(Debug)]
#[non_exhaustive]
pub struct ParseHubUrlError {
    inner: url::ParseError,
}

/// An error returned from [`Client::publish_update`] and [`Client::prepare`].
#[derive(Debug)]
#[non_exhaustive]
pub struct PublishUpdateError {
    kind: PublishUpdateErrorKind,
    inner: Box<dyn Error + Send + Sync + 'static>,
}

/// The various types of errors that can cause [`Client::publish_update`] to
/// fail.
#[derive(Debug)]
#[non_exhaustive]
pub enum PublishUpdateErrorKind {
    /// The token supplied by the token provider is not a compact JWS. Nothing
    /// was sent to the Mercure hub.
    InvalidToken,
    /// Failed to send publish request to Mercure hub.
    SendRequest,
    /// Failed to read publish response from Mercure hub.
    ReadResponse,
}

impl<P> Client<P>
where
    P: TokenProvider,
{
    /// Constructs a new `Client` using a default [`reqwest::Client`].
    ///
    /// # Example
    ///
    /// ```
    /// # use std::error::Error;
    /// #
    /// use mercure_publisher::{HubUrl, Update};
    ///
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// let hub_url: HubUrl = "https://localhost/.well-known/mercure".parse()?;
    /// let token_provider = |_update: Option<&Update>| std::env::var("MERCURE_JWT").unwrap_or_default();
    ///
    /// let client = mercure_publisher::Client::new(hub_url, token_provider);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(hub_url: HubUrl, token_provider: P) -> Self {
        Self::with_transport(reqwest::Client::new(), hub_url, token_provider)
    }
}

impl<P, T> Client<P, T>
where
    P: TokenProvider,
    T: Transport,
{
    /// Constructs a new `Client` delivering requests through `transport`.
    pub fn with_transport(transport: T, hub_url: HubUrl, token_provider: P) -> Self {
        Self {
            transport,
            hub_url,
            token_provider,
        }
    }

    pub fn hub_url(&self) -> &HubUrl {
        &self.hub_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds the publish request for `update` without sending it.
    ///
    /// The token provider is called exactly once and its token is validated
    /// before being put in the `Authorization` header.
    pub fn prepare(&self, update: &Update) -> Result<PublishRequest, PublishUpdateError> {
        let token = self.token_provider.token(Some(update));
        jwt::validate(&token).map_err(|err| {
            warn!(hub_url = %self.hub_url, "refusing to publish with an invalid JWT");
            PublishUpdateError {
                kind: PublishUpdateErrorKind::InvalidToken,
                inner: err.into(),
            }
        })?;

        let mut authorization = HeaderValue::try_from(format!("Bearer {token}"))
            .expect("validated `token` should only contain visible ASCII");
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let body = update::encode(update);
        debug!(
            hub_url = %self.hub_url,
            topic = update.topic().canonical(),
            topics = update.topic().len(),
            private = update.is_private(),
            body_len = body.len(),
            "built publish request"
        );

        Ok(PublishRequest {
            url: self.hub_url.0.clone(),
            headers,
            body,
        })
    }

    /// Publishes an update to the Mercure hub, returning the revision id the
    /// hub assigned to it.
    ///
    /// [The Mercure Protocol, Section 5](https://datatracker.ietf.org/doc/html/draft-dunglas-mercure#section-5)
    ///
    /// An invalid token fails before the transport is used. Transport failures
    /// are returned as is and never retried. Dropping the returned future
    /// drops the in-flight transport request.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use std::error::Error;
    /// #
    /// use mercure_publisher::{PublishUpdatePrivacy, Topic, Update};
    /// # use mercure_publisher::HubUrl;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn Error>> {
    /// # let hub_url: HubUrl = "https://localhost/.well-known/mercure".parse()?;
    /// # let token_provider = |_update: Option<&Update>| std::env::var("MERCURE_JWT").unwrap_or_default();
    /// # let client = mercure_publisher::Client::new(hub_url, token_provider);
    /// #
    /// let topic = Topic::new("https://example.com/books/1", vec![]);
    /// let data = r#"{"isbn":"9780735218789"}"#;
    /// let update = Update::new(topic, data).with_privacy(PublishUpdatePrivacy::Private);
    ///
    /// let revision_id = client.publish_update(&update).await?;
    /// println!("published {revision_id}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn publish_update(&self, update: &Update) -> Result<RevisionId, PublishUpdateError> {
        let request = self.prepare(update)?;

        let res = self.transport.send(request).await.map_err(|err| {
            warn!(hub_url = %self.hub_url, error = %err, "failed to send publish request");
            PublishUpdateError {
                kind: PublishUpdateErrorKind::SendRequest,
                inner: err.into(),
            }
        })?;

        let body = self.transport.read_body(res).await.map_err(|err| {
            warn!(hub_url = %self.hub_url, error = %err, "failed to read publish response");
            PublishUpdateError {
                kind: PublishUpdateErrorKind::ReadResponse,
                inner: err.into(),
            }
        })?;
        debug!(hub_url = %self.hub_url, revision_id = %body, "published update");

        Ok(RevisionId::from(body))
    }
}

impl<P, T> fmt::Debug for Client<P, T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport)
            .field("hub_url", &self.hub_url)
            .finish_non_exhaustive()
    }
}

impl From<Url> for HubUrl {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl FromStr for HubUrl {
    type Err = ParseHubUrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = s.parse().map_err(|err| Self::Err { inner: err })?;

        Ok(Self(url))
    }
}

impl HubUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for HubUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{url}", url = self.0)
    }
}

impl fmt::Display for ParseHubUrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse hub URL: {err}", err = self.inner)
    }
}

impl Error for ParseHubUrlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.inner)
    }
}

impl fmt::Display for PublishUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err = &self.inner;
        match self.kind {
            PublishUpdateErrorKind::InvalidToken => {
                write!(f, "refusing to publish with an invalid JWT: {err}")
            },
            PublishUpdateErrorKind::SendRequest => {
                write!(f, "failed to send request to Mercure hub: {err}")
            },
            PublishUpdateErrorKind::ReadResponse => {
                write!(f, "failed to read response from Mercure hub: {err}")
            },
        }
    }
}

impl Error for PublishUpdateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.inner)
    }
}

impl PublishUpdateError {
    /// Returns the corresponding [`PublishUpdateErrorKind`] for this error.
    #[must_use]
    pub const fn kind(&self) -> &PublishUpdateErrorKind {
        &self.kind
    }

    /// Returns `true` if the error was raised by the transport, either while
    /// sending the request or while reading the response.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            PublishUpdateErrorKind::SendRequest | PublishUpdateErrorKind::ReadResponse
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::{Context as _, Result};

    use super::*;
    use crate::topic::Topic;
    use crate::update::PublishUpdatePrivacy;

    const JWT: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
                       eyJtZXJjdXJlIjp7InN1YnNjcmliZSI6WyJmb28iLCJiYXIiXSwicHVibGlzaCI6WyJmb28iXX19.\
                       LRLvirgONK13JgacQ_VbcjySbVhkSmHy3IznH3tA9PM";

    #[derive(Debug)]
    struct StubError;

    impl fmt::Display for StubError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection refused")
        }
    }

    impl Error for StubError {}

    /// Answers every request with a fixed body and records what it was sent.
    #[derive(Default)]
    struct StubTransport {
        sent: std::sync::Mutex<Vec<PublishRequest>>,
        reads: AtomicUsize,
        fail_send: bool,
        fail_read: bool,
    }

    impl StubTransport {
        fn sent(&self) -> Vec<PublishRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        type Error = StubError;
        type Response = &'static str;

        async fn send(&self, request: PublishRequest) -> Result<Self::Response, Self::Error> {
            self.sent.lock().unwrap().push(request);
            if self.fail_send {
                return Err(StubError);
            }
            Ok("id")
        }

        async fn read_body(&self, response: Self::Response) -> Result<String, Self::Error> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_read {
                return Err(StubError);
            }
            Ok(response.to_owned())
        }
    }

    fn hub_url() -> Result<HubUrl> {
        Ok("https://example.com/hub".parse()?)
    }

    #[tokio::test]
    async fn it_publishes_update() -> Result<()> {
        let client = Client::with_transport(
            StubTransport::default(),
            hub_url()?,
            |_: Option<&Update>| JWT.to_owned(),
        );
        let update = Update::new("https://example.com", "data");

        let revision_id = client.publish_update(&update).await?;
        assert_eq!(revision_id.as_str(), "id");

        let sent = client.transport().sent();
        assert_eq!(sent.len(), 1);
        let request = &sent[0];
        assert_eq!(request.url().as_str(), "https://example.com/hub");
        assert_eq!(
            request.headers()[header::AUTHORIZATION],
            format!("Bearer {JWT}").as_str()
        );
        assert!(request.headers()[header::AUTHORIZATION].is_sensitive());
        assert_eq!(
            request.headers()[header::CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(request.body(), "topic=https%3A%2F%2Fexample.com&data=data");
        assert_eq!(client.transport().reads.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_invalid_token_before_sending() -> Result<()> {
        let client = Client::with_transport(
            StubTransport::default(),
            hub_url()?,
            |_: Option<&Update>| "invalid".to_owned(),
        );
        let update = Update::new("https://example.com", "data");

        let err = client
            .publish_update(&update)
            .await
            .err()
            .context("publish should fail")?;
        assert!(matches!(err.kind(), PublishUpdateErrorKind::InvalidToken));
        assert!(!err.is_transport());
        assert!(client.transport().sent().is_empty());
        assert_eq!(client.transport().reads.load(Ordering::SeqCst), 0);

        let err = client.prepare(&update).err().context("prepare should fail")?;
        assert!(matches!(err.kind(), PublishUpdateErrorKind::InvalidToken));
        Ok(())
    }

    #[tokio::test]
    async fn it_calls_token_provider_once_with_update() -> Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let token_provider = {
            let calls = Arc::clone(&calls);
            move |update: Option<&Update>| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(
                    update.map(|update| update.topic().canonical()),
                    Some("https://example.com/books/1")
                );
                JWT.to_owned()
            }
        };
        let client = Client::with_transport(StubTransport::default(), hub_url()?, token_provider);

        client
            .publish_update(&Update::new("https://example.com/books/1", "{}"))
            .await?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_transport_failures() -> Result<()> {
        let client = Client::with_transport(
            StubTransport {
                fail_send: true,
                ..Default::default()
            },
            hub_url()?,
            |_: Option<&Update>| JWT.to_owned(),
        );

        let err = client
            .publish_update(&Update::new("https://example.com", "data"))
            .await
            .err()
            .context("publish should fail")?;
        assert!(matches!(err.kind(), PublishUpdateErrorKind::SendRequest));
        assert!(err.is_transport());
        assert_eq!(
            err.to_string(),
            "failed to send request to Mercure hub: connection refused"
        );
        assert!(err.source().is_some_and(|source| source.is::<StubError>()));
        assert_eq!(client.transport().sent().len(), 1);
        assert_eq!(client.transport().reads.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_response_read_failures() -> Result<()> {
        let client = Client::with_transport(
            StubTransport {
                fail_read: true,
                ..Default::default()
            },
            hub_url()?,
            |_: Option<&Update>| JWT.to_owned(),
        );

        let err = client
            .publish_update(&Update::new("https://example.com", "data"))
            .await
            .err()
            .context("publish should fail")?;
        assert!(matches!(err.kind(), PublishUpdateErrorKind::ReadResponse));
        assert!(err.is_transport());
        assert_eq!(
            err.to_string(),
            "failed to read response from Mercure hub: connection refused"
        );
        assert!(err.source().is_some_and(|source| source.is::<StubError>()));
        assert_eq!(client.transport().sent().len(), 1);
        assert_eq!(client.transport().reads.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn it_publishes_concurrently() -> Result<()> {
        let client = Client::with_transport(
            StubTransport::default(),
            hub_url()?,
            |_: Option<&Update>| JWT.to_owned(),
        );
        let first = Update::new("a", "1");
        let second = Update::new("b", "2").with_privacy(PublishUpdatePrivacy::Private);

        let (first, second) = tokio::join!(
            client.publish_update(&first),
            client.publish_update(&second)
        );
        assert_eq!(first?.as_str(), "id");
        assert_eq!(second?.as_str(), "id");

        let mut bodies: Vec<String> = client
            .transport()
            .sent()
            .into_iter()
            .map(|request| request.body().to_owned())
            .collect();
        bodies.sort();
        assert_eq!(bodies, ["topic=a&data=1", "topic=b&data=2&private=on"]);
        Ok(())
    }

    #[tokio::test]
    async fn it_sends_request_over_http() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/.well-known/mercure")
            .match_header("authorization", format!("Bearer {JWT}").as_str())
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(
                "topic=https%3A%2F%2Fexample.com%2Fbooks%2F1&topic=urn%3Aisbn%3A9780735218789&\
                 data=%7B%22title%22%3A%22Atomic+Habits%22%7D&private=on&type=book&retry=1000",
            )
            .with_status(200)
            .with_body("urn:uuid:e1ee88e2-532a-4d6f-ba70-f0f8bd584022")
            .create_async()
            .await;

        let hub_url: HubUrl = format!("{url}/.well-known/mercure", url = server.url()).parse()?;
        let client = Client::new(hub_url, |_: Option<&Update>| JWT.to_owned());
        let update = Update::new(
            Topic::new("https://example.com/books/1", vec![
                "urn:isbn:9780735218789".to_owned(),
            ]),
            r#"{"title":"Atomic Habits"}"#,
        )
        .with_privacy(PublishUpdatePrivacy::Private)
        .with_type("book")
        .with_retry(1000);

        let revision_id = client.publish_update(&update).await?;
        assert_eq!(
            revision_id.as_str(),
            "urn:uuid:e1ee88e2-532a-4d6f-ba70-f0f8bd584022"
        );
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn it_fails_on_unsuccessful_status() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/.well-known/mercure")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let hub_url: HubUrl = format!("{url}/.well-known/mercure", url = server.url()).parse()?;
        let client = Client::new(hub_url, |_: Option<&Update>| JWT.to_owned());

        let err = client
            .publish_update(&Update::new("https://example.com/books/1", ""))
            .await
            .err()
            .context("publish should fail")?;
        assert!(matches!(err.kind(), PublishUpdateErrorKind::SendRequest));
        mock.assert_async().await;
        Ok(())
    }

    #[test]
    fn it_builds_authorization_header_for_any_valid_token() -> Result<()> {
        let token = "ABCDEFGHIJKLMNOPQRSTUVWXYZ.abcdefghijklmnopqrstuvwxyz.0123456789-_";
        let client = Client::with_transport(
            StubTransport::default(),
            hub_url()?,
            move |_: Option<&Update>| token.to_owned(),
        );

        let request = client.prepare(&Update::new("https://example.com", "data"))?;
        assert_eq!(
            request.headers()[header::AUTHORIZATION],
            format!("Bearer {token}").as_str()
        );
        Ok(())
    }

    #[test]
    fn it_rejects_unparseable_hub_url() {
        assert!("not a url".parse::<HubUrl>().is_err());
    }
}
