//! An asynchronous publisher for the [Mercure protocol].
//!
//! An [`Update`] is encoded as `application/x-www-form-urlencoded`, the
//! publisher JWT supplied by a [`TokenProvider`] is checked for shape and sent
//! as a bearer token, and the request is delivered through a [`Transport`]
//! (by default a [`reqwest::Client`]).
//!
//! [Mercure protocol]: https://datatracker.ietf.org/doc/html/draft-dunglas-mercure

pub use self::client::{Client, HubUrl, PublishUpdateError, PublishUpdateErrorKind};
pub use self::jwt::TokenProvider;
pub use self::topic::Topic;
pub use self::transport::{PublishRequest, Transport};
pub use self::update::{PublishUpdatePrivacy, RevisionId, Update};

pub mod client;
pub mod jwt;
pub mod topic;
pub mod transport;
pub mod update;
