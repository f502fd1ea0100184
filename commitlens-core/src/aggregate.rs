use std::collections::HashMap;

use crate::enricher::EnrichmentTotals;
use crate::types::{Aggregate, EnrichedCommit};

/// Number of area tags kept in `top_areas`.
pub const TOP_AREAS_LIMIT: usize = 10;

impl Aggregate {
    /// Fold enriched commits into period-level counts and rankings.
    pub fn from_commits(commits: &[EnrichedCommit]) -> Self {
        let mut totals = EnrichmentTotals::default();
        for enriched in commits {
            totals.add(enriched);
        }
        Self::from_enrichment(commits, totals)
    }

    /// Like `from_commits`, with size totals already accumulated during
    /// enrichment.
    pub fn from_enrichment(commits: &[EnrichedCommit], totals: EnrichmentTotals) -> Self {
        let mut aggregate = Aggregate {
            count: commits.len(),
            files: totals.files,
            additions: totals.additions,
            deletions: totals.deletions,
            ..Aggregate::default()
        };
        // (tag, count) in first-seen order
        let mut area_counts: Vec<(String, usize)> = Vec::new();
        let mut area_index: HashMap<String, usize> = HashMap::new();

        for enriched in commits {
            *aggregate
                .type_counts
                .entry(enriched.ai.change_type)
                .or_insert(0) += 1;
            *aggregate.risk_counts.entry(enriched.ai.risk).or_insert(0) += 1;

            for area in &enriched.ai.areas {
                match area_index.get(area) {
                    Some(&index) => area_counts[index].1 += 1,
                    None => {
                        area_index.insert(area.clone(), area_counts.len());
                        area_counts.push((area.clone(), 1));
                    }
                }
            }
        }

        // Stable sort keeps first-seen order among equal counts
        area_counts.sort_by(|a, b| b.1.cmp(&a.1));
        aggregate.top_areas = area_counts
            .into_iter()
            .take(TOP_AREAS_LIMIT)
            .map(|(area, _)| area)
            .collect();

        aggregate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeType, CommitRef, CommitStats, CommitSummary, Risk};
    use crate::test_utils::file_change;

    fn enriched(
        sha: &str,
        change_type: ChangeType,
        risk: Risk,
        areas: &[&str],
        stats: (u64, u64),
        file_count: usize,
    ) -> EnrichedCommit {
        EnrichedCommit {
            commit: CommitRef {
                sha: sha.to_string(),
                author: "Ada".to_string(),
                date: None,
                message: format!("commit {}", sha),
            },
            files: (0..file_count)
                .map(|i| file_change(&format!("f{}.rs", i), 1, 0, ""))
                .collect(),
            stats: CommitStats {
                additions: stats.0,
                deletions: stats.1,
            },
            ai: CommitSummary {
                summary: "s".to_string(),
                change_type,
                areas: areas.iter().map(|a| a.to_string()).collect(),
                risk,
                test_impact: "N/A".to_string(),
                notable_files: vec![],
            },
        }
    }

    #[test]
    fn test_type_and_risk_counts() {
        let commits = vec![
            enriched("a", ChangeType::Feat, Risk::Low, &[], (1, 0), 1),
            enriched("b", ChangeType::Fix, Risk::Low, &[], (2, 1), 2),
            enriched("c", ChangeType::Feat, Risk::High, &[], (3, 2), 3),
        ];

        let aggregate = Aggregate::from_commits(&commits);
        assert_eq!(aggregate.count, 3);
        assert_eq!(aggregate.files, 6);
        assert_eq!(aggregate.additions, 6);
        assert_eq!(aggregate.deletions, 3);
        assert_eq!(
            aggregate.type_counts.into_iter().collect::<Vec<_>>(),
            vec![(ChangeType::Feat, 2), (ChangeType::Fix, 1)]
        );
        assert_eq!(
            aggregate.risk_counts.into_iter().collect::<Vec<_>>(),
            vec![(Risk::Low, 2), (Risk::High, 1)]
        );
    }

    #[test]
    fn test_sizes_come_from_enrichment_totals() {
        let commits = vec![
            enriched("a", ChangeType::Feat, Risk::Low, &["api"], (1, 0), 1),
            enriched("b", ChangeType::Fix, Risk::Low, &["api"], (2, 1), 2),
        ];
        let totals = EnrichmentTotals {
            files: 40,
            additions: 500,
            deletions: 70,
        };

        let aggregate = Aggregate::from_enrichment(&commits, totals);
        assert_eq!(aggregate.count, 2);
        assert_eq!(aggregate.files, 40);
        assert_eq!(aggregate.additions, 500);
        assert_eq!(aggregate.deletions, 70);
        assert_eq!(aggregate.top_areas, vec!["api"]);
    }

    #[test]
    fn test_top_areas_by_frequency() {
        let commits = vec![
            enriched("a", ChangeType::Feat, Risk::Low, &["a", "b"], (0, 0), 0),
            enriched("b", ChangeType::Feat, Risk::Low, &["a", "c"], (0, 0), 0),
            enriched("c", ChangeType::Feat, Risk::Low, &["b", "a"], (0, 0), 0),
        ];

        assert_eq!(Aggregate::from_commits(&commits).top_areas, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_top_areas_ties_keep_first_seen_order() {
        let commits = vec![
            enriched("a", ChangeType::Feat, Risk::Low, &["z", "y"], (0, 0), 0),
            enriched("b", ChangeType::Feat, Risk::Low, &["x", "y", "z"], (0, 0), 0),
        ];

        assert_eq!(Aggregate::from_commits(&commits).top_areas, vec!["z", "y", "x"]);
    }

    #[test]
    fn test_top_areas_truncated_to_limit() {
        let areas: Vec<String> = (0..15).map(|i| format!("area{}", i)).collect();
        let area_refs: Vec<&str> = areas.iter().map(String::as_str).collect();
        let commits = vec![enriched("a", ChangeType::Chore, Risk::Low, &area_refs, (0, 0), 0)];

        let top = Aggregate::from_commits(&commits).top_areas;
        assert_eq!(top.len(), TOP_AREAS_LIMIT);
        assert_eq!(top[0], "area0");
        assert_eq!(top[9], "area9");
    }

    #[test]
    fn test_empty_input_gives_empty_aggregate() {
        assert_eq!(Aggregate::from_commits(&[]), Aggregate::default());
    }

    #[test]
    fn test_aggregate_json_shape() {
        let commits = vec![
            enriched("a", ChangeType::Feat, Risk::Low, &["api"], (10, 2), 2),
            enriched("b", ChangeType::Fix, Risk::High, &["api", "db"], (1, 1), 1),
        ];

        let json = serde_json::to_string_pretty(&Aggregate::from_commits(&commits)).unwrap();
        insta::assert_snapshot!(json, @r###"
        {
          "count": 2,
          "files": 3,
          "additions": 11,
          "deletions": 3,
          "typeCounts": {
            "feat": 1,
            "fix": 1
          },
          "riskCounts": {
            "low": 1,
            "high": 1
          },
          "topAreas": [
            "api",
            "db"
          ]
        }
        "###);
    }
}
