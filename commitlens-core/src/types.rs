//! Domain types shared by every stage of the analysis pipeline.
//!
//! Field names follow the JSON contract served to the UI: commit-level
//! data is snake_case, the period aggregate is camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Returns a truncated SHA for display (first 7 characters).
pub fn short_sha(sha: &str) -> &str {
    &sha[..7.min(sha.len())]
}

/// Identity and metadata of one commit, as returned by the commit listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    pub author: String,
    /// Author timestamp, falling back to the committer timestamp.
    pub date: Option<DateTime<Utc>>,
    pub message: String,
}

impl CommitRef {
    pub fn short_sha(&self) -> &str {
        short_sha(&self.sha)
    }

    /// First line of the commit message.
    pub fn title(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// One file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    /// Empty when the hosting API omitted the patch (binary or oversized).
    pub patch: String,
}

/// Closed classification of what a commit does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Feat,
    Fix,
    Refactor,
    Docs,
    Chore,
    Test,
    Build,
    Ci,
    Perf,
    Style,
    Other,
}

impl ChangeType {
    pub const ALL: [ChangeType; 11] = [
        ChangeType::Feat,
        ChangeType::Fix,
        ChangeType::Refactor,
        ChangeType::Docs,
        ChangeType::Chore,
        ChangeType::Test,
        ChangeType::Build,
        ChangeType::Ci,
        ChangeType::Perf,
        ChangeType::Style,
        ChangeType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Refactor => "refactor",
            Self::Docs => "docs",
            Self::Chore => "chore",
            Self::Test => "test",
            Self::Build => "build",
            Self::Ci => "ci",
            Self::Perf => "perf",
            Self::Style => "style",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured model classification of one commit.
///
/// Matches the JSON schema the summarizer prompt asks for. Every field is
/// required; anything else is treated as malformed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub summary: String,
    pub change_type: ChangeType,
    pub areas: Vec<String>,
    pub risk: Risk,
    pub test_impact: String,
    pub notable_files: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
}

/// A collected commit with its diff data and model summary attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedCommit {
    #[serde(flatten)]
    pub commit: CommitRef,
    pub files: Vec<FileChange>,
    pub stats: CommitStats,
    pub ai: CommitSummary,
}

/// Period-level fold over all enriched commits of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub count: usize,
    pub files: usize,
    pub additions: u64,
    pub deletions: u64,
    pub type_counts: BTreeMap<ChangeType, usize>,
    pub risk_counts: BTreeMap<Risk, usize>,
    pub top_areas: Vec<String>,
}

/// The terminal artifact of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub repo: String,
    pub since: String,
    pub until: String,
    pub rollup: String,
    pub commits: Vec<EnrichedCommit>,
    pub aggregate: Aggregate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sha_truncates_to_seven() {
        assert_eq!(short_sha("0123456789abcdef"), "0123456");
        assert_eq!(short_sha("abc"), "abc");
    }

    #[test]
    fn test_commit_title_is_first_line() {
        let commit = CommitRef {
            sha: "deadbeef".to_string(),
            author: "Ada".to_string(),
            date: None,
            message: "feat: add parser\n\nLonger body".to_string(),
        };
        assert_eq!(commit.title(), "feat: add parser");
    }

    #[test]
    fn test_change_type_serializes_lowercase() {
        for change_type in ChangeType::ALL {
            let json = serde_json::to_string(&change_type).unwrap();
            assert_eq!(json, format!("\"{}\"", change_type.as_str()));
        }
    }

    #[test]
    fn test_unknown_change_type_is_rejected() {
        assert!(serde_json::from_str::<ChangeType>("\"feature\"").is_err());
    }

    #[test]
    fn test_aggregate_uses_camel_case_keys() {
        let mut aggregate = Aggregate::default();
        aggregate.type_counts.insert(ChangeType::Feat, 2);
        aggregate.risk_counts.insert(Risk::High, 1);
        let value = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(value["typeCounts"]["feat"], 2);
        assert_eq!(value["riskCounts"]["high"], 1);
        assert!(value["topAreas"].as_array().unwrap().is_empty());
    }
}
