//! Warehouse rows for CRM objects: entity types, field dictionaries, the merged
//! property document and the repository that reads and writes them.

pub mod dictionary;
pub mod document;
pub mod models;
pub mod pg_repository;
pub mod repositories;
