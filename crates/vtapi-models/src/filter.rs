//! Job listing filters.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::Job;

/// Constraints narrowing a job listing.
///
/// Listings are always ordered oldest-first; `limit` counts jobs that passed
/// the `since` check, not index entries scanned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobFilter {
    /// Only jobs created strictly after this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of jobs to return (0 = unbounded)
    #[serde(default)]
    pub limit: usize,
}

impl JobFilter {
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether `job` passes the time constraint.
    ///
    /// A job without a creation time never passes a `since` bound.
    pub fn matches(&self, job: &Job) -> bool {
        match self.since {
            Some(since) => job.creation_time.is_some_and(|created| created > since),
            None => true,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.limit == 0
    }

    /// True once `collected` jobs satisfy the limit.
    pub fn is_full(&self, collected: usize) -> bool {
        !self.is_unbounded() && collected >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_default_filter_matches_everything() {
        let filter = JobFilter::default();
        assert!(filter.is_unbounded());
        assert!(filter.matches(&Job::new("job-1")));
        assert!(!filter.is_full(1_000));
    }

    #[test]
    fn test_since_is_exclusive() {
        let now = Utc::now();
        let filter = JobFilter::default().since(now);

        assert!(!filter.matches(&Job::new("a").with_creation_time(now)));
        assert!(!filter.matches(&Job::new("b").with_creation_time(now - Duration::seconds(1))));
        assert!(filter.matches(&Job::new("c").with_creation_time(now + Duration::nanoseconds(1))));
        assert!(!filter.matches(&Job::new("d")));
    }

    #[test]
    fn test_limit() {
        let filter = JobFilter::default().limit(2);
        assert!(!filter.is_unbounded());
        assert!(!filter.is_full(1));
        assert!(filter.is_full(2));
    }
}
