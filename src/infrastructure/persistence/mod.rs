mod in_memory_dedup_repository;
mod postgres_dedup_repository;

pub use in_memory_dedup_repository::{InMemoryDedupRepository, InMemoryDedupTransaction};
pub use postgres_dedup_repository::{PostgresDedupRepository, PostgresDedupTransaction};
