use std::error::Error;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::update::Update;

/// The shape of a [JWS Compact Serialization]: three dot-separated segments of
/// base64url characters, where the last one (the signature) may be empty.
///
/// Ported from the JWS pattern of the Microsoft IdentityModel extensions.
///
/// [JWS Compact Serialization]: https://datatracker.ietf.org/doc/html/rfc7515#section-3.1
static JWS_COMPACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$")
        .expect("JWS compact pattern should be a valid regex")
});

/// Supplies the publisher [JWT] sent to the Mercure hub.
///
/// [The Mercure Protocol, Section 6.1](https://datatracker.ietf.org/doc/html/draft-dunglas-mercure#section-6.1)
///
/// > To be allowed to publish an update, the JWS presented by the publisher
/// > MUST contain a claim called "mercure", and this claim MUST contain a
/// > "publish" key.
///
/// The provider is called once per publish, with the update being published,
/// and the returned token is used as is. Any
/// `Fn(Option<&Update>) -> String + Send + Sync` closure is a provider.
///
/// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
pub trait TokenProvider: Send + Sync {
    fn token(&self, update: Option<&Update>) -> String;
}

/// The error type returned from [`validate`] when a token is not shaped like a
/// compact JWS.
#[derive(Debug)]
#[non_exhaustive]
pub struct InvalidTokenError;

impl<F> TokenProvider for F
where
    F: Fn(Option<&Update>) -> String + Send + Sync,
{
    fn token(&self, update: Option<&Update>) -> String {
        self(update)
    }
}

/// Checks that `token` is syntactically a compact JWS.
///
/// Only the shape is checked. The signature is never verified, which is the
/// hub's job.
///
/// # Example
///
/// ```
/// use mercure_publisher::jwt;
///
/// assert!(jwt::validate("eyJhbGciOiJIUzI1NiJ9.eyJtZXJjdXJlIjp7fX0.sig").is_ok());
/// assert!(jwt::validate("eyJhbGciOiJub25lIn0.eyJtZXJjdXJlIjp7fX0.").is_ok());
/// assert!(jwt::validate("not-a-jwt").is_err());
/// ```
pub fn validate(token: &str) -> Result<(), InvalidTokenError> {
    if !JWS_COMPACT.is_match(token) {
        return Err(InvalidTokenError);
    }

    Ok(())
}

impl fmt::Display for InvalidTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the provided JWT is not valid")
    }
}

impl Error for InvalidTokenError {}
