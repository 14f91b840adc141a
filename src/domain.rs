//! Domain module - catalog entries and monograph tracking types
//!
//! Pure data types shared by the application and infrastructure layers.
//! Nothing in here performs I/O.
//!
//! Each module is its own file in the domain/ directory; public exports
//! are collected here for convenience.

pub mod monograph;
pub mod product;
pub mod repositories;
pub mod summary;
pub mod value_objects;

pub use monograph::{
    CacheValidators, DiscoveryOutcome, DiscoveryResult, MonographChange, MonographUpdate,
    RevalidationOutcome, RevalidationReport,
};
pub use product::{CatalogEntry, CatalogProduct};
pub use repositories::CatalogStore;
pub use summary::RunSummary;
pub use value_objects::{ProductIdentifier, SourceCode};
