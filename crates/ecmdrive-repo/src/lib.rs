//! Embedded document repository runtime
//!
//! In-memory adapters backing the repository and directory ports:
//! [`MemoryRepository`] (documents, ACLs, lifecycle, audit event emission)
//! and [`MemoryGroupDirectory`] (group membership graph). The services and
//! the integration tests run against these, standing in for the full
//! repository server.

mod directory;
mod repository;

pub use directory::MemoryGroupDirectory;
pub use repository::MemoryRepository;
