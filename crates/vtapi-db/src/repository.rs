//! Redis-backed job repository.
//!
//! Each job lives in two structures:
//! - a hash record at `job:<id>` (see [`crate::record`])
//! - a member of the `jobs` sorted set, scored by creation time
//!
//! Writes go through `WATCH`/`MULTI`/`EXEC` so a racing writer on the same
//! key aborts cleanly instead of leaving half a job behind. Listings walk the
//! sorted set and skip members with no decodable record.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use vtapi_models::{Job, JobFilter, JobId};

use crate::config::RedisConfig;
use crate::error::{DbError, DbResult};
use crate::metrics::{record_index_skip, record_operation, status_label};
use crate::pool::{PooledConnection, RedisPool};
use crate::record::{index_score, job_from_fields, job_key, job_to_fields, JOBS_SET_KEY};
use crate::sentinel::resolve_master;

/// Storage operations for transcoding jobs.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a new job, stamping its creation time.
    async fn create_job(&self, job: &mut Job) -> DbResult<()>;

    /// Load a job by ID.
    async fn get_job(&self, id: &JobId) -> DbResult<Job>;

    /// Remove a job and its index entry.
    async fn delete_job(&self, job: &Job) -> DbResult<()>;

    /// List jobs oldest-first, narrowed by `filter`.
    async fn list_jobs(&self, filter: &JobFilter) -> DbResult<Vec<Job>>;
}

/// Job repository backed by Redis hashes and a sorted-set index.
#[derive(Clone)]
pub struct RedisRepository {
    pool: RedisPool,
}

impl RedisRepository {
    /// Connect to Redis (directly or through sentinels) and verify it answers.
    pub async fn new(config: RedisConfig) -> DbResult<Self> {
        let timeout = config.effective_pool_timeout();

        let info = if config.uses_sentinel() {
            let master = resolve_master(&config, timeout).await?;
            config.connection_info_for(&master)?
        } else {
            config.connection_info()?
        };
        let addr = info.addr.to_string();

        let client = redis::Client::open(info)
            .map_err(|e| DbError::configuration(format!("invalid redis config: {}", e)))?;
        let pool = RedisPool::new(client, config.effective_pool_size(), timeout);

        let repo = Self { pool };
        repo.ping().await.map_err(|e| {
            DbError::configuration(format!("redis at {} is unreachable: {}", addr, e))
        })?;

        info!(
            addr = %addr,
            pool_size = repo.pool.max_connections(),
            "Connected job repository"
        );
        Ok(repo)
    }

    /// Round-trip a `PING` through the pool.
    pub async fn ping(&self) -> DbResult<()> {
        let mut conn = self.pool.get().await?;
        let result = redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map(|_| ())
            .map_err(DbError::from);
        conn.check(result)
    }

    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    /// Persist `job` with its current creation time.
    ///
    /// The hash record and the index entry are committed in one transaction
    /// guarded by `WATCH job:<id>`; if the key changes before `EXEC` the write
    /// is dropped and `TransactionConflict` returned.
    pub(crate) async fn save_job(&self, job: &Job) -> DbResult<()> {
        job.validate()?;
        let fields = job_to_fields(job)?;
        let score = job
            .creation_time
            .as_ref()
            .map(index_score)
            .unwrap_or_default();
        let key = job_key(&job.id);

        let mut conn = self.pool.get().await?;
        let result = Self::commit_job(&mut conn, &key, job.id.as_str(), &fields, score).await;
        conn.check(result)
    }

    async fn commit_job(
        conn: &mut PooledConnection,
        key: &str,
        id: &str,
        fields: &[(&'static str, String)],
        score: f64,
    ) -> DbResult<()> {
        conn.begin_watch();
        redis::cmd("WATCH")
            .arg(key)
            .query_async::<()>(&mut **conn)
            .await?;

        let committed: Option<()> = redis::pipe()
            .atomic()
            .hset_multiple(key, fields)
            .ignore()
            .zadd(JOBS_SET_KEY, id, score)
            .ignore()
            .query_async(&mut **conn)
            .await?;
        conn.end_watch();

        match committed {
            Some(()) => Ok(()),
            None => {
                warn!(key = %key, "Job write aborted by concurrent modification");
                Err(DbError::TransactionConflict(key.to_string()))
            }
        }
    }

    async fn load_job(conn: &mut MultiplexedConnection, id: &JobId) -> DbResult<Job> {
        let key = job_key(id);
        let hash: HashMap<String, String> = conn.hgetall(&key).await?;
        if hash.is_empty() {
            return Err(DbError::JobNotFound);
        }
        job_from_fields(id, &hash)
    }

    async fn remove_job(conn: &mut MultiplexedConnection, id: &JobId) -> DbResult<()> {
        let key = job_key(id);
        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return Err(DbError::JobNotFound);
        }

        // Nil from EXEC means a watch left on this connection aborted it.
        let removed: Option<()> = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .zrem(JOBS_SET_KEY, id.as_str())
            .ignore()
            .query_async(&mut *conn)
            .await?;

        match removed {
            Some(()) => Ok(()),
            None => {
                warn!(key = %key, "Job delete aborted by concurrent modification");
                Err(DbError::TransactionConflict(key))
            }
        }
    }

    async fn scan_jobs(conn: &mut MultiplexedConnection, filter: &JobFilter) -> DbResult<Vec<Job>> {
        let ids: Vec<String> = conn.zrange(JOBS_SET_KEY, 0, -1).await?;
        let mut jobs = Vec::new();

        for id in ids {
            if filter.is_full(jobs.len()) {
                break;
            }
            let id = JobId::from(id);
            let job = match Self::load_job(conn, &id).await {
                Ok(job) => job,
                Err(e @ DbError::BackendUnavailable(_)) => return Err(e),
                Err(e) => {
                    debug!(
                        job_id = %id,
                        error = %e,
                        "Skipping index entry without a valid job"
                    );
                    record_index_skip();
                    continue;
                }
            };
            if filter.matches(&job) {
                jobs.push(job);
            }
        }

        Ok(jobs)
    }
}

fn observe<T>(operation: &'static str, started: Instant, result: DbResult<T>) -> DbResult<T> {
    record_operation(operation, status_label(&result), started.elapsed().as_secs_f64());
    result
}

#[async_trait]
impl JobRepository for RedisRepository {
    async fn create_job(&self, job: &mut Job) -> DbResult<()> {
        let started = Instant::now();
        if let Err(e) = job.validate() {
            return observe("create_job", started, Err(e.into()));
        }

        job.creation_time = Some(Utc::now());
        let result = self.save_job(job).await;
        if result.is_ok() {
            info!(job_id = %job.id, provider = %job.provider_name, "Created job");
        }
        observe("create_job", started, result)
    }

    async fn get_job(&self, id: &JobId) -> DbResult<Job> {
        let started = Instant::now();
        let result = async {
            let mut conn = self.pool.get().await?;
            let result = Self::load_job(&mut conn, id).await;
            conn.check(result)
        }
        .await;
        debug!(job_id = %id, status = status_label(&result), "Fetched job");
        observe("get_job", started, result)
    }

    async fn delete_job(&self, job: &Job) -> DbResult<()> {
        let started = Instant::now();
        let result = async {
            let mut conn = self.pool.get().await?;
            let result = Self::remove_job(&mut conn, &job.id).await;
            conn.check(result)
        }
        .await;
        if result.is_ok() {
            info!(job_id = %job.id, "Deleted job");
        }
        observe("delete_job", started, result)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> DbResult<Vec<Job>> {
        let started = Instant::now();
        let result = async {
            let mut conn = self.pool.get().await?;
            let result = Self::scan_jobs(&mut conn, filter).await;
            conn.check(result)
        }
        .await;
        if let Ok(ref jobs) = result {
            debug!(
                count = jobs.len(),
                since = ?filter.since,
                limit = filter.limit,
                "Listed jobs"
            );
        }
        observe("list_jobs", started, result)
    }
}
