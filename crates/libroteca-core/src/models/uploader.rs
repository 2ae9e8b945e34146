use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Which platform an uploader identity belongs to. Identities from different
/// platforms never collide because the platform ids are disjoint namespaces,
/// but the column keeps attribution explicit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UploaderSource {
    Discord,
    Github,
}

impl Display for UploaderSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploaderSource::Discord => write!(f, "discord"),
            UploaderSource::Github => write!(f, "github"),
        }
    }
}

impl FromStr for UploaderSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discord" => Ok(UploaderSource::Discord),
            "github" => Ok(UploaderSource::Github),
            _ => Err(anyhow::anyhow!("Invalid uploader source: {}", s)),
        }
    }
}

/// A stored uploader row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Uploader {
    pub uploader_id: String,
    pub name: String,
    pub avatar: String,
    pub source: UploaderSource,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new uploader. Saved with insert-or-ignore semantics
/// keyed on `uploader_id`, so redelivered batches are harmless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUploader {
    pub uploader_id: String,
    pub name: String,
    pub avatar: String,
    pub source: UploaderSource,
}

impl NewUploader {
    /// Best-effort placeholder for an identity whose profile could not be
    /// resolved (deleted or banned account). Ingestion must not abort on
    /// these; a later avatar refresh heals the row if the profile reappears.
    pub fn placeholder(uploader_id: &str, source: UploaderSource) -> Self {
        Self {
            uploader_id: uploader_id.to_string(),
            name: uploader_id.to_string(),
            avatar: String::new(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploader_source_display() {
        assert_eq!(UploaderSource::Discord.to_string(), "discord");
        assert_eq!(UploaderSource::Github.to_string(), "github");
    }

    #[test]
    fn test_uploader_source_from_str() {
        assert_eq!(
            "discord".parse::<UploaderSource>().unwrap(),
            UploaderSource::Discord
        );
        assert_eq!(
            "github".parse::<UploaderSource>().unwrap(),
            UploaderSource::Github
        );
        assert!("gitlab".parse::<UploaderSource>().is_err());
    }

    #[test]
    fn test_uploader_source_serde_round_trip() {
        let json = serde_json::to_string(&UploaderSource::Discord).unwrap();
        assert_eq!(json, "\"discord\"");
        let parsed: UploaderSource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, UploaderSource::Discord);
    }

    #[test]
    fn test_placeholder_uses_identity_as_name() {
        let placeholder = NewUploader::placeholder("1234567890", UploaderSource::Discord);
        assert_eq!(placeholder.name, "1234567890");
        assert_eq!(placeholder.avatar, "");
        assert_eq!(placeholder.source, UploaderSource::Discord);
    }
}
