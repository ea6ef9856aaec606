//! Key-value backends for the read caches and the search index.

mod redis_store;

pub use redis_store::{RedisOptions, RedisStore};
