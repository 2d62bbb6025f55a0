//! Master discovery through Redis Sentinel.

use std::time::Duration;

use redis::AsyncConnectionConfig;
use tracing::{debug, info, warn};

use crate::config::RedisConfig;
use crate::error::{DbError, DbResult};

/// Ask each configured sentinel, in order, for the current master address.
///
/// The first sentinel that answers wins. Fails with `Configuration` when no
/// master name is configured or no sentinel knows the master.
pub async fn resolve_master(config: &RedisConfig, timeout: Duration) -> DbResult<String> {
    let master_name = config
        .sentinel_master_name
        .as_deref()
        .ok_or_else(|| DbError::configuration("sentinel master name is required"))?;

    for sentinel in &config.sentinel_addrs {
        match query_sentinel(sentinel, master_name, timeout).await {
            Ok(Some(addr)) => {
                info!(
                    sentinel = %sentinel,
                    master = %master_name,
                    addr = %addr,
                    "Resolved redis master"
                );
                return Ok(addr);
            }
            Ok(None) => {
                debug!(
                    sentinel = %sentinel,
                    master = %master_name,
                    "Sentinel does not know master"
                );
            }
            Err(e) => {
                warn!(sentinel = %sentinel, error = %e, "Sentinel query failed");
            }
        }
    }

    Err(DbError::configuration(format!(
        "no sentinel in {:?} could resolve master {:?}",
        config.sentinel_addrs, master_name
    )))
}

async fn query_sentinel(
    sentinel: &str,
    master_name: &str,
    timeout: Duration,
) -> DbResult<Option<String>> {
    // Sentinels are queried without the data node's credentials or database.
    let info = RedisConfig::default().connection_info_for(sentinel)?;
    let client = redis::Client::open(info)?;

    let config = AsyncConnectionConfig::new()
        .set_connection_timeout(timeout)
        .set_response_timeout(timeout);
    let mut conn = client
        .get_multiplexed_async_connection_with_config(&config)
        .await?;

    let reply: Option<(String, String)> = redis::cmd("SENTINEL")
        .arg("get-master-addr-by-name")
        .arg(master_name)
        .query_async(&mut conn)
        .await?;

    Ok(reply.map(|(host, port)| format_addr(&host, &port)))
}

fn format_addr(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
