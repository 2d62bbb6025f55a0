//! Transcoding job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Adaptive streaming output parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamingParams {
    /// Segment length in seconds
    #[serde(default)]
    pub segment_duration: u32,
    /// Streaming protocol name (e.g. "hls", "dash")
    #[serde(default)]
    pub protocol: String,
}

impl StreamingParams {
    pub fn new(segment_duration: u32, protocol: impl Into<String>) -> Self {
        Self {
            segment_duration,
            protocol: protocol.into(),
        }
    }
}

/// A transcoding request bound to an external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID, supplied by the caller
    #[serde(rename = "jobId")]
    pub id: JobId,

    /// Provider that handles the job (e.g. "encoding.com")
    #[serde(default)]
    pub provider_name: String,

    /// Identifier assigned by the provider, empty until submitted
    #[serde(default)]
    pub provider_job_id: String,

    /// Streaming output parameters
    #[serde(default)]
    pub streaming_params: StreamingParams,

    /// Set by the repository when the job is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a job with the given ID and no provider binding.
    pub fn new(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            provider_name: String::new(),
            provider_job_id: String::new(),
            streaming_params: StreamingParams::default(),
            creation_time: None,
        }
    }

    /// Bind the job to a provider.
    pub fn with_provider(
        mut self,
        provider_name: impl Into<String>,
        provider_job_id: impl Into<String>,
    ) -> Self {
        self.provider_name = provider_name.into();
        self.provider_job_id = provider_job_id.into();
        self
    }

    pub fn with_streaming_params(mut self, params: StreamingParams) -> Self {
        self.streaming_params = params;
        self
    }

    pub fn with_creation_time(mut self, creation_time: DateTime<Utc>) -> Self {
        self.creation_time = Some(creation_time);
        self
    }

    /// Check the fields required before the job can be persisted.
    pub fn validate(&self) -> Result<(), JobValidationError> {
        if self.id.is_empty() {
            return Err(JobValidationError::MissingId);
        }
        Ok(())
    }
}

/// Reasons a job cannot be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobValidationError {
    #[error("job id is required")]
    MissingId,

    #[error("job creation time is required")]
    MissingCreationTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builder() {
        let job = Job::new("job1")
            .with_provider("encoding.com", "")
            .with_streaming_params(StreamingParams::new(10, "hls"));

        assert_eq!(job.id.as_str(), "job1");
        assert_eq!(job.provider_name, "encoding.com");
        assert!(job.provider_job_id.is_empty());
        assert_eq!(job.streaming_params.segment_duration, 10);
        assert_eq!(job.streaming_params.protocol, "hls");
        assert!(job.creation_time.is_none());
    }

    #[test]
    fn test_validate_requires_id() {
        let job = Job::new("").with_provider("elastictranscoder", "abc-123");
        let err = job.validate().unwrap_err();
        assert_eq!(err, JobValidationError::MissingId);
        assert_eq!(err.to_string(), "job id is required");

        assert!(Job::new("myjob").validate().is_ok());
    }

    #[test]
    fn test_job_json_names() {
        let job = Job::new("job-1")
            .with_provider("encodingcom", "1")
            .with_streaming_params(StreamingParams::new(6, "dash"));
        let json = serde_json::to_value(&job).unwrap();

        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["providerName"], "encodingcom");
        assert_eq!(json["providerJobId"], "1");
        assert_eq!(json["streamingParams"]["segmentDuration"], 6);
        assert_eq!(json["streamingParams"]["protocol"], "dash");
        assert!(json.get("creationTime").is_none());
    }
}
