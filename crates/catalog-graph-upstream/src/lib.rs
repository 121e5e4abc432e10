//! Catalog Graph Upstream: everything read from outside the graph
//!
//! - [`TokenProvider`]: bearer token from a [`SecretStore`], bypassed in local mode
//! - [`CatalogClient`]: collection / ACL reads, scrolled collection search and
//!   numbered ACL listing
//! - scroll release ([`CatalogClient::clear_scroll_session`]) after bulk reads
//!
//! Fetch failures are recovered to `None` here. Only [`TokenError`] is meant
//! to reach the entry point.

pub mod catalog;
pub mod config;
pub mod records;
pub mod scroll;
pub mod token;


pub use catalog::{CatalogClient, UpstreamFetchError};
pub use config::{parse_var, ConfigError, UpstreamConfig, SERVICE_NAME};
pub use records::{
    AclPage, AclRecord, CatalogItemIdentity, CollectionIdentifier, CollectionMeta, CollectionPage,
    CollectionRecord, CollectionUmm, Doi, GroupPermission, InstrumentRef, PlatformRef, ProjectRef,
    RelatedUrl,
};
pub use scroll::ScrollReleaseError;
#[cfg(feature = "aws")]
pub use token::SsmSecretStore;
pub use token::{
    Credential, EnvSecretStore, SecretStore, SecretStoreError, StaticSecretStore, TokenError,
    TokenProvider,
};
