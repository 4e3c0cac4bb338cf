pub mod app_config;
pub mod database;
pub mod memory;
pub mod redis_repo;

pub use database::PgDocumentStore;
pub use memory::{MemoryDocumentStore, MemoryLocalCache};
pub use redis_repo::RedisLocalCache;
