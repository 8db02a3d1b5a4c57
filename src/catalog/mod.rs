//! Catalog access and metadata resolution
//!
//! This module provides candidate sampling over the catalog, the metadata
//! provider seam with its OMDb and static implementations, and the resolver
//! that turns a sampled title into a displayable item.

pub mod omdb;
pub mod provider;
pub mod resolver;
pub mod sampler;

pub use omdb::{OmdbMetadataProvider, DEFAULT_OMDB_BASE_URL};
pub use provider::{FailureMode, MetadataLookup, MetadataProvider, StaticMetadataProvider};
pub use resolver::MetadataResolver;
pub use sampler::{CatalogSampler, InMemoryCatalog};
