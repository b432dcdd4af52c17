//! City by skill demand matrix

use crate::config::TrendConfig;
use crate::posting::Snapshot;
use serde::Serialize;
use std::collections::BTreeMap;

/// One city row: per-skill mention counts plus `total_jobs`, the city's
/// skill-mention total across the selected columns. A posting counts once
/// per distinct skill it carries, so the cells sum to `total_jobs` and no
/// cell exceeds it.
#[derive(Debug, Clone, Serialize)]
pub struct CityRow {
    pub city: String,
    pub total_jobs: u32,
    pub counts: BTreeMap<String, u32>,
    pub dominant_skill: Option<DominantSkill>,
}

/// The most demanded skill in a city and its share of the city's skill
/// mentions.
#[derive(Debug, Clone, Serialize)]
pub struct DominantSkill {
    pub skill: String,
    pub count: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Heatmap {
    /// Column order: overall top skills, most frequent first.
    pub skills: Vec<String>,
    pub rows: Vec<CityRow>,
    pub total_postings: usize,
    pub generated_from_version: u64,
}

pub struct HeatmapBuilder {
    config: TrendConfig,
}

impl HeatmapBuilder {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Build the matrix over the overall top-N skills. Cities whose
    /// postings carry none of the selected skills are omitted entirely,
    /// never emitted as zero rows.
    pub fn build(&self, snapshot: &Snapshot, top_skills: usize) -> Heatmap {
        let top_skills = top_skills.clamp(1, self.config.max_heatmap_skills);

        let mut skill_totals: BTreeMap<&str, u32> = BTreeMap::new();
        for posting in &snapshot.postings {
            for skill in &posting.skills {
                *skill_totals.entry(skill).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(&str, u32)> = skill_totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let columns: Vec<String> = ranked
            .into_iter()
            .take(top_skills)
            .map(|(s, _)| s.to_string())
            .collect();

        let mut cells: BTreeMap<(&str, &str), u32> = BTreeMap::new();
        for posting in &snapshot.postings {
            for skill in &posting.skills {
                if columns.iter().any(|c| c == skill) {
                    *cells.entry((&posting.city, skill)).or_insert(0) += 1;
                }
            }
        }

        // Per-city skill-mention totals; cities with no mentions get no row
        let mut city_totals: BTreeMap<&str, u32> = BTreeMap::new();
        for ((city, _), count) in &cells {
            *city_totals.entry(*city).or_insert(0) += *count;
        }

        let rows = city_totals
            .into_iter()
            .map(|(city, total_jobs)| {
                let counts: BTreeMap<String, u32> = columns
                    .iter()
                    .map(|skill| {
                        let count = cells.get(&(city, skill.as_str())).copied().unwrap_or(0);
                        (skill.clone(), count)
                    })
                    .collect();
                let dominant_skill = dominant(&counts, total_jobs);
                CityRow {
                    city: city.to_string(),
                    total_jobs,
                    counts,
                    dominant_skill,
                }
            })
            .collect();

        Heatmap {
            skills: columns,
            rows,
            total_postings: snapshot.postings.len(),
            generated_from_version: snapshot.version,
        }
    }
}

fn dominant(counts: &BTreeMap<String, u32>, total_jobs: u32) -> Option<DominantSkill> {
    let (skill, count) = counts
        .iter()
        .filter(|(_, count)| **count > 0)
        // Ties break toward the alphabetically first skill
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))?;

    let percentage = if total_jobs > 0 {
        (f64::from(*count) / f64::from(total_jobs) * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Some(DominantSkill {
        skill: skill.clone(),
        count: *count,
        percentage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::posting::{Posting, PostingKey};

    fn posting(title: &str, city: &str, skills: &[&str]) -> Posting {
        let key = PostingKey::new(title, "ACME", city);
        Posting {
            id: key.to_id(),
            title: title.to_string(),
            company: "ACME".to_string(),
            location: String::new(),
            city: city.to_string(),
            role: String::new(),
            url: String::new(),
            date_posted: None,
            description: None,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            embedding: None,
        }
    }

    fn builder() -> HeatmapBuilder {
        HeatmapBuilder::new(Config::default().trends)
    }

    #[test]
    fn test_counts_and_dominant_skill() {
        let snapshot = Snapshot {
            postings: vec![
                posting("Dev 1", "Casablanca", &["Python", "SQL"]),
                posting("Dev 2", "Casablanca", &["Python"]),
                posting("Dev 3", "Casablanca", &["React"]),
                posting("Dev 4", "Rabat", &["React"]),
            ],
            version: 7,
        };

        let heatmap = builder().build(&snapshot, 10);
        assert_eq!(heatmap.total_postings, 4);
        assert_eq!(heatmap.generated_from_version, 7);

        let casa = heatmap
            .rows
            .iter()
            .find(|r| r.city == "Casablanca")
            .unwrap();
        // 4 skill mentions across Casablanca's 3 postings
        assert_eq!(casa.total_jobs, 4);
        assert_eq!(casa.counts["Python"], 2);
        assert_eq!(casa.counts["SQL"], 1);
        assert_eq!(casa.counts["React"], 1);

        let dominant = casa.dominant_skill.as_ref().unwrap();
        assert_eq!(dominant.skill, "Python");
        assert_eq!(dominant.count, 2);
        assert!((dominant.percentage - 50.0).abs() < 0.05);
    }

    #[test]
    fn test_row_counts_sum_within_city_total() {
        // Multi-skill postings must not push a row's sum past its total
        let snapshot = Snapshot {
            postings: vec![
                posting("Dev 1", "Tanger", &["Python", "SQL"]),
                posting("Dev 2", "Tanger", &["Python"]),
            ],
            version: 1,
        };

        let heatmap = builder().build(&snapshot, 5);
        for row in &heatmap.rows {
            let row_sum: u32 = row.counts.values().sum();
            assert!(
                row_sum <= row.total_jobs,
                "row sum {} > total_jobs {}",
                row_sum,
                row.total_jobs
            );
            for count in row.counts.values() {
                assert!(*count <= row.total_jobs);
            }
        }
        assert_eq!(heatmap.rows[0].total_jobs, 3);
    }

    #[test]
    fn test_cities_without_postings_are_absent() {
        let snapshot = Snapshot {
            postings: vec![posting("Dev 1", "Rabat", &["Python"])],
            version: 1,
        };

        let heatmap = builder().build(&snapshot, 10);
        assert_eq!(heatmap.rows.len(), 1);
        assert_eq!(heatmap.rows[0].city, "Rabat");
    }

    #[test]
    fn test_skill_columns_are_capped_by_frequency() {
        let snapshot = Snapshot {
            postings: vec![
                posting("Dev 1", "Rabat", &["Python", "SQL"]),
                posting("Dev 2", "Rabat", &["Python", "Docker"]),
                posting("Dev 3", "Rabat", &["Python"]),
            ],
            version: 1,
        };

        let heatmap = builder().build(&snapshot, 2);
        assert_eq!(heatmap.skills.len(), 2);
        assert_eq!(heatmap.skills[0], "Python");
    }

    #[test]
    fn test_cities_with_no_tagged_skills_are_omitted() {
        let snapshot = Snapshot {
            postings: vec![posting("Clerk", "Rabat", &[]), posting("Dev", "Tanger", &["SQL"])],
            version: 1,
        };

        let heatmap = builder().build(&snapshot, 10);
        assert!(heatmap.rows.iter().all(|r| r.city != "Rabat"));
        let tanger = heatmap.rows.iter().find(|r| r.city == "Tanger").unwrap();
        assert_eq!(tanger.total_jobs, 1);
        assert_eq!(tanger.dominant_skill.as_ref().unwrap().skill, "SQL");
    }
}
