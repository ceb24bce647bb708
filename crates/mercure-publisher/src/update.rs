use std::fmt;

use serde::Serialize;

use crate::topic::Topic;

/// An update to be published to the Mercure hub.
///
/// [The Mercure Protocol, Section 5](https://datatracker.ietf.org/doc/html/draft-dunglas-mercure#section-5)
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Update {
    topic: Topic,
    data: String,
    privacy: PublishUpdatePrivacy,
    id: Option<RevisionId>,
    event_type: Option<String>,
    retry: Option<u64>,
}

/// The privacy setting to use when publishing an update.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub enum PublishUpdatePrivacy {
    #[default]
    #[serde(skip_serializing)]
    Public,
    /// [The Mercure Protocol, Section 5](https://datatracker.ietf.org/doc/html/draft-dunglas-mercure#section-5)
    ///
    /// > the update MUST NOT be dispatched to subscribers not authorized to
    /// > receive it.
    #[serde(rename = "on")]
    Private,
}

/// [The Mercure Protocol, Section 5](https://datatracker.ietf.org/doc/html/draft-dunglas-mercure#section-5)
///
/// > the topic's revision identifier: it will be used as the SSE's id property.
/// > The provided id MUST NOT start with the # character. The provided id
/// > SHOULD be a valid IRI. If omitted, the hub MUST generate a valid IRI
/// > [[RFC3987]]. An UUID [[RFC4122]] or a DID MAY be used. Alternatively the
/// > hub MAY generate a relative URI composed of a fragment (starting with #).
/// > This is convenient to return an offset or a sequence that is unique for
/// > this hub. Even if provided, the hub MAY ignore the id provided by the
/// > client and generate its own id.
///
/// [RFC3987]: https://datatracker.ietf.org/doc/html/rfc3987
/// [RFC4122]: https://datatracker.ietf.org/doc/html/rfc4122
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
#[serde(transparent)]
pub struct RevisionId(String);

/// The POST parameters of a publish request, in the order the hub documents
/// them.
#[derive(Debug, Serialize)]
struct PublishUpdateParams<'a> {
    topic: &'a Topic,
    data: &'a str,
    #[serde(rename = "private")]
    #[serde(skip_serializing_if = "PublishUpdatePrivacy::is_public")]
    privacy: PublishUpdatePrivacy,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a RevisionId>,
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    event_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry: Option<u64>,
}

impl Update {
    /// Constructs a new public `Update` without id, type or retry.
    pub fn new(topic: impl Into<Topic>, data: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            data: data.into(),
            privacy: PublishUpdatePrivacy::Public,
            id: None,
            event_type: None,
            retry: None,
        }
    }

    #[must_use]
    pub fn with_privacy(mut self, privacy: PublishUpdatePrivacy) -> Self {
        self.privacy = privacy;
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<RevisionId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the SSE `event` type subscribers will receive.
    #[must_use]
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the reconnection time, in milliseconds, hinted to subscribers.
    #[must_use]
    pub fn with_retry(mut self, retry: u64) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn privacy(&self) -> PublishUpdatePrivacy {
        self.privacy
    }

    pub fn is_private(&self) -> bool {
        self.privacy == PublishUpdatePrivacy::Private
    }

    pub fn id(&self) -> Option<&RevisionId> {
        self.id.as_ref()
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn retry(&self) -> Option<u64> {
        self.retry
    }

    fn params(&self) -> PublishUpdateParams<'_> {
        PublishUpdateParams {
            topic: &self.topic,
            data: &self.data,
            privacy: self.privacy,
            id: self.id.as_ref(),
            event_type: self.event_type.as_deref(),
            retry: self.retry,
        }
    }
}

/// Encodes an update as the `application/x-www-form-urlencoded` body of a
/// publish request.
///
/// Fields are emitted in the order `topic`, `data`, `private`, `id`, `type`,
/// `retry`. `topic` is repeated once per topic identifier, `private` is only
/// present (as `on`) for private updates, and unset optional fields are left
/// out. `data` is always present, even when empty.
///
/// # Example
///
/// ```
/// use mercure_publisher::{PublishUpdatePrivacy, Topic, Update};
///
/// let update = Update::new(
///     Topic::new("https://example.com/books/1", vec!["urn:isbn:1".to_owned()]),
///     "hello world",
/// )
/// .with_privacy(PublishUpdatePrivacy::Private);
///
/// assert_eq!(
///     mercure_publisher::update::encode(&update),
///     "topic=https%3A%2F%2Fexample.com%2Fbooks%2F1&topic=urn%3Aisbn%3A1&data=hello+world&private=on"
/// );
/// ```
pub fn encode(update: &Update) -> String {
    serde_html_form::to_string(update.params())
        .expect("publish parameters should only contain strings, sequences and integers")
}

impl PublishUpdatePrivacy {
    /// `#[serde(skip_serializing_if = "...")]` only accepts a path.
    ///
    /// <https://github.com/serde-rs/serde/blob/v1.0.219/serde_derive/src/internals/attr.rs#L988>
    fn is_public(&self) -> bool {
        *self == Self::Public
    }
}

impl RevisionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RevisionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RevisionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<RevisionId> for String {
    fn from(id: RevisionId) -> Self {
        id.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{rev}", rev = self.0)
    }
}
