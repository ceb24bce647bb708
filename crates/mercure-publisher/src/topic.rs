use std::error::Error;
use std::fmt;
use std::iter::{self, Chain, FusedIterator};

use serde::Serialize;
use url::Url;

/// [The Mercure Protocol, Section 5](https://datatracker.ietf.org/doc/html/draft-dunglas-mercure#section-5)
///
/// > The identifiers of the updated topic. It is RECOMMENDED to use an IRI as
/// > identifier. If this name is present several times, the first occurrence is
/// > considered to be the canonical IRI of the topic, and other ones are
/// > considered to be alternate IRIs. The hub MUST dispatch this update to
/// > subscribers that are subscribed to both canonical or alternate IRIs.
///
/// A `Topic` always holds at least one identifier.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Topic {
    canonical: String,
    alternates: Vec<String>,
}

/// The error type returned when a conversion from an empty [`Vec`] to
/// [`Topic`] is attempted.
#[derive(Debug)]
pub struct EmptyTopicError;

#[derive(Clone, Debug)]
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a>(Chain<iter::Once<&'a String>, std::slice::Iter<'a, String>>);

impl Topic {
    /// Constructs a new `Topic`.
    pub fn new(canonical: impl Into<String>, alternates: Vec<String>) -> Self {
        Self {
            canonical: canonical.into(),
            alternates,
        }
    }

    /// Returns an iterator over the topic identifier(s).
    ///
    /// The iterator yields the canonical identifier, followed by alternate
    /// identifiers (if any), in the order they were supplied.
    pub fn iter(&self) -> Iter<'_> {
        Iter(iter::once(&self.canonical).chain(self.alternates.iter()))
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn alternates(&self) -> &[String] {
        &self.alternates
    }

    /// Returns the number of topic identifiers, which is never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.iter().len()
    }
}

impl From<&str> for Topic {
    fn from(canonical: &str) -> Self {
        Self::new(canonical, Vec::new())
    }
}

impl From<String> for Topic {
    fn from(canonical: String) -> Self {
        Self::new(canonical, Vec::new())
    }
}

impl From<Url> for Topic {
    fn from(canonical_url: Url) -> Self {
        Self::new(String::from(canonical_url), Vec::new())
    }
}

impl TryFrom<Vec<String>> for Topic {
    type Error = EmptyTopicError;

    fn try_from(topics: Vec<String>) -> Result<Self, Self::Error> {
        let mut topics = topics.into_iter();
        let canonical = topics.next().ok_or(EmptyTopicError)?;

        Ok(Self::new(canonical, topics.collect()))
    }
}

impl<'a> IntoIterator for &'a Topic {
    type IntoIter = Iter<'a>;
    type Item = &'a String;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Serializes as a sequence, so that `application/x-www-form-urlencoded`
/// encoding repeats the `topic` key once per identifier.
impl Serialize for Topic {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self)
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a String;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl FusedIterator for Iter<'_> {}

impl ExactSizeIterator for Iter<'_> {}

impl fmt::Display for EmptyTopicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an update must target at least one topic")
    }
}

impl Error for EmptyTopicError {}
