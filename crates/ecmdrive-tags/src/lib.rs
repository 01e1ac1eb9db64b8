//! Tag storage with two interchangeable backends and a live migration
//!
//! Tags live either as relation documents (`Tag` label documents linked to
//! target documents through `Tagging` relation documents) or inline on the
//! tagged document (`NXTag` facet, `nxtag:tags` property). Both backends
//! implement the [`TagStore`] contract; the [`TagService`] facade picks one
//! per call from the current migration status, routing through the
//! [`BridgeTagStore`] while the [`TagsMigrator`] converts relation data to
//! facets in the background.

mod bridge;
mod facet;
mod migrator;
mod relation;
mod service;
mod store;

pub use bridge::BridgeTagStore;
pub use facet::{FacetedTagStore, NXTAG_FACET, TAGS_PROPERTY};
pub use migrator::{TagsMigrator, MIGRATION_BATCH_SIZE};
pub use relation::{RelationTagStore, TAGGING_DOC_TYPE, TAG_DOC_TYPE};
pub use service::{MigrationStatusHandle, TagService};
pub use store::TagStore;
