//! Catalog lookups and comparison resolution.
//!
//! Comparison titles written by a generator are matched to canonical catalog
//! identities; anything that cannot be matched is dropped rather than stored.

pub mod catalog;
pub mod resolver;
pub mod tmdb;

pub use catalog::{create_catalog, MetadataCatalog, NoopCatalog};
pub use resolver::EntityResolver;
pub use tmdb::TmdbCatalog;
