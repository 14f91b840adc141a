//! Application layer module
//!
//! Use cases that orchestrate discovery, revalidation and ingestion over the
//! infrastructure adapters.

pub mod discovery;
pub mod identifier_mapper;
pub mod ingestion;
pub mod revalidation;
pub mod sync_service;

pub use discovery::{DiscoveryOrchestrator, DiscoveryRecord};
pub use identifier_mapper::IdentifierMapper;
pub use ingestion::{CatalogBuilder, IngestionService, IngestionSummary};
pub use revalidation::{RevalidationCheck, RevalidationRunner, RevalidationTarget};
pub use sync_service::MonographSyncService;
