//! Domain types and DTOs
//!
//! Requests and their classification vocabulary, the reference data the
//! pipeline reads, and the knowledge base and audit trail records.

pub mod dashboard;
pub mod interactions;
pub mod knowledge;
pub mod maintenance;
pub mod solutions;
pub mod tenants;
pub mod vendors;

// Re-export commonly used types
pub use maintenance::{Category, Classification, Priority, RequestStatus};
pub use solutions::SolutionRecord;
