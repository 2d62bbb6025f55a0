//! Flattened hash encoding of jobs.
//!
//! A job is stored as a Redis hash at `job:<id>`. Nested values are flattened
//! into prefixed scalar fields so records stay readable by every producer that
//! shares the keyspace:
//!
//! | field                              | value                              |
//! |------------------------------------|------------------------------------|
//! | `providerName`                     | string                             |
//! | `providerJobID`                    | string                             |
//! | `streamingparams_segmentDuration`  | decimal                            |
//! | `streamingparams_protocol`         | string                             |
//! | `creationTime`                     | RFC 3339, nanosecond fraction, UTC |

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use vtapi_models::{Job, JobId, JobValidationError, StreamingParams};

use crate::error::{DbError, DbResult};

/// Sorted set indexing every job ID by creation time.
pub const JOBS_SET_KEY: &str = "jobs";

const JOB_KEY_PREFIX: &str = "job:";

/// Hash field names.
pub mod fields {
    pub const PROVIDER_NAME: &str = "providerName";
    pub const PROVIDER_JOB_ID: &str = "providerJobID";
    pub const SEGMENT_DURATION: &str = "streamingparams_segmentDuration";
    pub const PROTOCOL: &str = "streamingparams_protocol";
    pub const CREATION_TIME: &str = "creationTime";
}

/// Redis key of a job's hash record.
pub fn job_key(id: &JobId) -> String {
    format!("{}{}", JOB_KEY_PREFIX, id)
}

/// Format a timestamp with a fixed nine-digit fraction.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse an RFC 3339 timestamp of any fraction length into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| ts.with_timezone(&Utc))
}

/// Sorted-set score for a creation time: nanoseconds since the Unix epoch.
pub fn index_score(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 * 1e9 + f64::from(ts.timestamp_subsec_nanos())
}

/// Flatten a job into hash fields.
pub fn job_to_fields(job: &Job) -> DbResult<Vec<(&'static str, String)>> {
    let creation_time = job
        .creation_time
        .as_ref()
        .ok_or(JobValidationError::MissingCreationTime)?;

    Ok(vec![
        (fields::PROVIDER_NAME, job.provider_name.clone()),
        (fields::PROVIDER_JOB_ID, job.provider_job_id.clone()),
        (
            fields::SEGMENT_DURATION,
            job.streaming_params.segment_duration.to_string(),
        ),
        (fields::PROTOCOL, job.streaming_params.protocol.clone()),
        (fields::CREATION_TIME, format_timestamp(creation_time)),
    ])
}

/// Rebuild a job from its hash fields.
///
/// Missing string fields decode as empty. A missing or malformed creation
/// time, or a malformed segment duration, makes the record corrupt.
pub fn job_from_fields(id: &JobId, hash: &HashMap<String, String>) -> DbResult<Job> {
    let key = job_key(id);
    let text = |name: &str| hash.get(name).cloned().unwrap_or_default();

    let segment_duration = match hash.get(fields::SEGMENT_DURATION).map(|s| s.trim()) {
        None | Some("") => 0,
        Some(raw) => raw.parse::<u32>().map_err(|e| {
            DbError::corrupt_record(
                &key,
                format!("invalid {} {:?}: {}", fields::SEGMENT_DURATION, raw, e),
            )
        })?,
    };

    let raw_time = hash
        .get(fields::CREATION_TIME)
        .ok_or_else(|| {
            DbError::corrupt_record(&key, format!("missing {}", fields::CREATION_TIME))
        })?;
    let creation_time = parse_timestamp(raw_time).map_err(|e| {
        DbError::corrupt_record(
            &key,
            format!("invalid {} {:?}: {}", fields::CREATION_TIME, raw_time, e),
        )
    })?;

    Ok(Job {
        id: id.clone(),
        provider_name: text(fields::PROVIDER_NAME),
        provider_job_id: text(fields::PROVIDER_JOB_ID),
        streaming_params: StreamingParams {
            segment_duration,
            protocol: text(fields::PROTOCOL),
        },
        creation_time: Some(creation_time),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_job_key_format() {
        assert_eq!(job_key(&JobId::from("myjob")), "job:myjob");
    }

    #[test]
    fn test_job_to_fields() {
        let created = Utc.with_ymd_and_hms(2016, 7, 1, 12, 30, 5).unwrap()
            + chrono::Duration::nanoseconds(120_000_000);
        let job = Job::new("job1")
            .with_provider("encoding.com", "")
            .with_streaming_params(StreamingParams::new(10, "hls"))
            .with_creation_time(created);

        let got: HashMap<&str, String> = job_to_fields(&job).unwrap().into_iter().collect();

        assert_eq!(got.len(), 5);
        assert_eq!(got["providerName"], "encoding.com");
        assert_eq!(got["providerJobID"], "");
        assert_eq!(got["streamingparams_segmentDuration"], "10");
        assert_eq!(got["streamingparams_protocol"], "hls");
        assert_eq!(got["creationTime"], "2016-07-01T12:30:05.120000000Z");
    }

    #[test]
    fn test_job_to_fields_requires_creation_time() {
        let err = job_to_fields(&Job::new("job1")).unwrap_err();
        assert!(matches!(err, DbError::InvalidJob(_)));
    }

    #[test]
    fn test_job_from_fields_preserves_nanoseconds() {
        let created = Utc.timestamp_opt(1_467_376_205, 123_456_789).unwrap();
        let job = Job::new("job-1")
            .with_provider("encodingcom", "1")
            .with_streaming_params(StreamingParams::new(6, "dash"))
            .with_creation_time(created);
        let hash: HashMap<String, String> = job_to_fields(&job)
            .unwrap()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        assert_eq!(job_from_fields(&job.id, &hash).unwrap(), job);
    }

    #[test]
    fn test_job_from_fields_accepts_trimmed_fractions() {
        let hash = stored(&[
            ("providerName", "elastictranscoder"),
            ("creationTime", "2016-07-01T12:30:05.12+02:00"),
        ]);
        let job = job_from_fields(&JobId::from("abc"), &hash).unwrap();

        assert_eq!(job.provider_name, "elastictranscoder");
        assert_eq!(job.provider_job_id, "");
        assert_eq!(job.streaming_params, StreamingParams::default());
        assert_eq!(
            job.creation_time,
            Some(Utc.timestamp_opt(1_467_369_005, 120_000_000).unwrap())
        );
    }

    #[test]
    fn test_job_from_fields_rejects_bad_timestamp() {
        let hash = stored(&[("providerName", "encodingcom"), ("creationTime", "yesterday")]);
        let err = job_from_fields(&JobId::from("bad"), &hash).unwrap_err();
        match err {
            DbError::CorruptRecord { key, reason } => {
                assert_eq!(key, "job:bad");
                assert!(reason.contains("creationTime"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_job_from_fields_rejects_missing_timestamp() {
        let hash = stored(&[("providerName", "encodingcom")]);
        assert!(matches!(
            job_from_fields(&JobId::from("x"), &hash),
            Err(DbError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_job_from_fields_rejects_bad_segment_duration() {
        let hash = stored(&[
            ("streamingparams_segmentDuration", "-4"),
            ("creationTime", "2016-07-01T12:30:05Z"),
        ]);
        assert!(matches!(
            job_from_fields(&JobId::from("x"), &hash),
            Err(DbError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_index_score_orders_by_time() {
        let a = Utc.timestamp_opt(1_467_376_205, 0).unwrap();
        let b = a + chrono::Duration::minutes(20);
        let c = a + chrono::Duration::seconds(1);
        assert!(index_score(&a) < index_score(&c));
        assert!(index_score(&c) < index_score(&b));
        assert_eq!(index_score(&a), 1_467_376_205e9);
    }
}
