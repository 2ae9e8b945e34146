use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Closed set of job kinds carried on the queue. The wire format is the
/// integer value, fixed by the consumer contract; the snake-case names exist
/// for logs and spans only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    Health,
    Details,
    Ratings,
    Reviews,
    Uploader,
    AiKeywords,
    AiDescription,
    AiDetails,
}

impl JobType {
    /// Ratings/reviews are carried in the wire enum but have no dispatch
    /// action yet. They are acked with a skipped outcome, never retried.
    pub fn is_reserved(&self) -> bool {
        matches!(self, JobType::Ratings | JobType::Reviews)
    }
}

impl From<JobType> for u8 {
    fn from(job_type: JobType) -> Self {
        match job_type {
            JobType::Health => 0,
            JobType::Details => 1,
            JobType::Ratings => 2,
            JobType::Reviews => 3,
            JobType::Uploader => 4,
            JobType::AiKeywords => 5,
            JobType::AiDescription => 6,
            JobType::AiDetails => 7,
        }
    }
}

impl TryFrom<u8> for JobType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(JobType::Health),
            1 => Ok(JobType::Details),
            2 => Ok(JobType::Ratings),
            3 => Ok(JobType::Reviews),
            4 => Ok(JobType::Uploader),
            5 => Ok(JobType::AiKeywords),
            6 => Ok(JobType::AiDescription),
            7 => Ok(JobType::AiDetails),
            _ => Err(anyhow::anyhow!("Invalid job type value: {}", value)),
        }
    }
}

impl Serialize for JobType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*self))
    }
}

impl<'de> Deserialize<'de> for JobType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        JobType::try_from(value).map_err(de::Error::custom)
    }
}

impl Display for JobType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobType::Health => write!(f, "health"),
            JobType::Details => write!(f, "details"),
            JobType::Ratings => write!(f, "ratings"),
            JobType::Reviews => write!(f, "reviews"),
            JobType::Uploader => write!(f, "uploader"),
            JobType::AiKeywords => write!(f, "ai_keywords"),
            JobType::AiDescription => write!(f, "ai_description"),
            JobType::AiDetails => write!(f, "ai_details"),
        }
    }
}

impl FromStr for JobType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "health" => Ok(JobType::Health),
            "details" => Ok(JobType::Details),
            "ratings" => Ok(JobType::Ratings),
            "reviews" => Ok(JobType::Reviews),
            "uploader" => Ok(JobType::Uploader),
            "ai_keywords" => Ok(JobType::AiKeywords),
            "ai_description" => Ok(JobType::AiDescription),
            "ai_details" => Ok(JobType::AiDetails),
            _ => Err(anyhow::anyhow!("Invalid job type: {}", s)),
        }
    }
}

/// One queue message: `{"id": <record id>, "type": <integer>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    #[serde(rename = "type")]
    pub job_type: JobType,
}

impl Job {
    pub fn new(id: i64, job_type: JobType) -> Self {
        Self { id, job_type }
    }

    pub fn details(id: i64) -> Self {
        Self::new(id, JobType::Details)
    }

    /// The queue health probe. The id is a fixed sentinel; the handler
    /// ignores it.
    pub fn health() -> Self {
        Self::new(1, JobType::Health)
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} job for record {}", self.job_type, self.id)
    }
}

/// Why a job finished without doing the work it was dispatched for. These are
/// informational outcomes, logged and acked, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    RecordMissing,
    DetailsMissing,
    IncompleteDetails,
    AlreadyDescribed,
    AlreadyTagged,
    Unsupported,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SkipReason::RecordMissing => write!(f, "record_missing"),
            SkipReason::DetailsMissing => write!(f, "details_missing"),
            SkipReason::IncompleteDetails => write!(f, "incomplete_details"),
            SkipReason::AlreadyDescribed => write!(f, "already_described"),
            SkipReason::AlreadyTagged => write!(f, "already_tagged"),
            SkipReason::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Closed result of one dispatched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The action ran to completion.
    Completed,
    /// A precondition was not met; nothing was changed.
    Skipped(SkipReason),
    /// The source file was malformed; the record was blacklisted and the
    /// delivery must still be acked.
    Blacklisted,
}

impl Display for JobOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobOutcome::Completed => write!(f, "completed"),
            JobOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            JobOutcome::Blacklisted => write!(f, "blacklisted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_exact_bytes() {
        let job = Job::details(42);
        assert_eq!(serde_json::to_string(&job).unwrap(), r#"{"id":42,"type":1}"#);

        let parsed: Job = serde_json::from_str(r#"{"id":42,"type":1}"#).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn test_all_type_values_round_trip() {
        for value in 0u8..=7 {
            let job_type = JobType::try_from(value).unwrap();
            assert_eq!(u8::from(job_type), value);

            let json = serde_json::to_string(&Job::new(9, job_type)).unwrap();
            let parsed: Job = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed.job_type, job_type);
        }
    }

    #[test]
    fn test_unknown_type_value_rejected() {
        assert!(JobType::try_from(8).is_err());
        assert!(serde_json::from_str::<Job>(r#"{"id":1,"type":8}"#).is_err());
        assert!(serde_json::from_str::<Job>(r#"{"id":1,"type":"details"}"#).is_err());
    }

    #[test]
    fn test_health_probe_sentinel() {
        let job = Job::health();
        assert_eq!(serde_json::to_string(&job).unwrap(), r#"{"id":1,"type":0}"#);
    }

    #[test]
    fn test_display_and_from_str() {
        assert_eq!(JobType::AiDescription.to_string(), "ai_description");
        assert_eq!(
            "ai_description".parse::<JobType>().unwrap(),
            JobType::AiDescription
        );
        assert!("ai_reviews".parse::<JobType>().is_err());
    }

    #[test]
    fn test_reserved_types() {
        assert!(JobType::Ratings.is_reserved());
        assert!(JobType::Reviews.is_reserved());
        assert!(!JobType::Details.is_reserved());
        assert!(!JobType::Health.is_reserved());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(JobOutcome::Completed.to_string(), "completed");
        assert_eq!(
            JobOutcome::Skipped(SkipReason::AlreadyTagged).to_string(),
            "skipped: already_tagged"
        );
        assert_eq!(JobOutcome::Blacklisted.to_string(), "blacklisted");
    }
}
