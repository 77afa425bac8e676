use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only facts about the post a voteorder targets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetadata {
    pub author: String,
    pub permlink: String,
    pub created: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl PostMetadata {
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }
}
