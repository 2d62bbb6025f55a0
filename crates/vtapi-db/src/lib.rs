//! Redis-backed persistence for transcoding jobs.
//!
//! This crate provides:
//! - Atomic job creation guarded by optimistic `WATCH` transactions
//! - Point lookups and deletions of job records
//! - Time-ordered listings that tolerate stale or foreign index entries
//! - A bounded connection pool with sentinel master discovery

pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod record;
pub mod repository;
pub mod sentinel;


pub use config::RedisConfig;
pub use error::{DbError, DbResult};
pub use pool::{PooledConnection, RedisPool};
pub use record::{job_key, JOBS_SET_KEY};
pub use repository::{JobRepository, RedisRepository};
