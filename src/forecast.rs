//! Trend forecasting: monthly skill series, OLS regression, classification

use crate::config::TrendConfig;
use crate::posting::Snapshot;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// Calendar month bucket, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Growing,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendStrength {
    Strong,
    Moderate,
    Stable,
}

/// One month of a skill's gap-free time series.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub count: u32,
}

/// Per-skill forecast outcome. Skills with fewer than two observed months
/// report `InsufficientData` instead of a fabricated projection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SkillForecast {
    InsufficientData {
        skill: String,
        months_observed: usize,
    },
    Success(ForecastResult),
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    pub skill: String,
    pub trend: Trend,
    pub trend_strength: TrendStrength,
    pub slope: f64,
    pub current_month_count: u32,
    pub recent_average: f64,
    pub predicted_next_month: u32,
    /// Percentage change of the prediction versus the latest observed
    /// month; `None` when the latest count is zero (undefined, not 0%)
    pub predicted_change_pct: Option<f64>,
    pub months: Vec<MonthlyPoint>,
}

/// Month-rows history table for charting a handful of tracked skills.
#[derive(Debug, Clone, Serialize)]
pub struct SkillHistory {
    pub skills: Vec<String>,
    pub rows: Vec<HistoryRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub month: String,
    pub counts: BTreeMap<String, u32>,
}

pub struct Forecaster {
    config: TrendConfig,
}

impl Forecaster {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Forecast a named skill, or the top-N skills by total frequency when
    /// no skill is given. Skills that cannot be forecast are reported as
    /// `InsufficientData`; they never abort the batch.
    pub fn forecast(
        &self,
        snapshot: &Snapshot,
        skill: Option<&str>,
        top_n: usize,
    ) -> Vec<SkillForecast> {
        let by_skill = monthly_skill_counts(snapshot);
        let top_n = top_n.clamp(1, self.config.max_top_skills);

        let targets: Vec<String> = match skill {
            Some(name) => vec![name.to_string()],
            None => {
                let mut totals: Vec<(String, u32)> = by_skill
                    .iter()
                    .map(|(skill, months)| (skill.clone(), months.values().sum()))
                    .collect();
                totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                totals.into_iter().take(top_n).map(|(s, _)| s).collect()
            }
        };

        // Series run to the newest month anywhere in the snapshot, so a
        // skill that stopped appearing shows trailing zeros and declines
        let global_last = by_skill
            .values()
            .flat_map(|months| months.keys().last().copied())
            .max();

        targets
            .iter()
            .map(|name| match (by_skill.get(name), global_last) {
                (Some(months), Some(last)) => self.forecast_series(name, months, last),
                _ => SkillForecast::InsufficientData {
                    skill: name.clone(),
                    months_observed: 0,
                },
            })
            .collect()
    }

    fn forecast_series(
        &self,
        skill: &str,
        observed: &BTreeMap<Month, u32>,
        last: Month,
    ) -> SkillForecast {
        if observed.len() < 2 {
            debug!("Skill {} has {} month(s) of data; skipping", skill, observed.len());
            return SkillForecast::InsufficientData {
                skill: skill.to_string(),
                months_observed: observed.len(),
            };
        }

        let series = fill_gaps(observed, last);
        let counts: Vec<f64> = series.iter().map(|(_, c)| f64::from(*c)).collect();
        let x: Vec<f64> = (0..counts.len()).map(|i| i as f64).collect();
        let (slope, _intercept) = linear_regression(&x, &counts);

        let (trend, trend_strength) = self.classify(slope);

        let window = self.config.moving_average_window.max(1);
        let tail = &counts[counts.len().saturating_sub(window)..];
        let recent_average = tail.iter().sum::<f64>() / tail.len() as f64;

        let latest = *counts.last().unwrap_or(&0.0);
        let predicted_next_month = predict_next(recent_average, slope, latest);

        let predicted_change_pct = if latest > 0.0 {
            Some(
                ((f64::from(predicted_next_month) - latest) / latest * 100.0 * 10.0).round()
                    / 10.0,
            )
        } else {
            None
        };

        SkillForecast::Success(ForecastResult {
            skill: skill.to_string(),
            trend,
            trend_strength,
            slope: (slope * 100.0).round() / 100.0,
            current_month_count: latest as u32,
            recent_average: (recent_average * 10.0).round() / 10.0,
            predicted_next_month,
            predicted_change_pct,
            months: series
                .iter()
                .map(|(month, count)| MonthlyPoint {
                    month: month.label(),
                    count: *count,
                })
                .collect(),
        })
    }

    fn classify(&self, slope: f64) -> (Trend, TrendStrength) {
        let stable = self.config.stable_band;
        let strong = self.config.strong_band;

        if slope > strong {
            (Trend::Growing, TrendStrength::Strong)
        } else if slope > stable {
            (Trend::Growing, TrendStrength::Moderate)
        } else if slope < -strong {
            (Trend::Declining, TrendStrength::Strong)
        } else if slope < -stable {
            (Trend::Declining, TrendStrength::Moderate)
        } else {
            (Trend::Stable, TrendStrength::Stable)
        }
    }

    /// Total mentions per skill, most frequent first.
    pub fn top_skills(&self, snapshot: &Snapshot, n: usize) -> Vec<(String, u32)> {
        let mut totals: BTreeMap<String, u32> = BTreeMap::new();
        for posting in &snapshot.postings {
            for skill in &posting.skills {
                *totals.entry(skill.clone()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(String, u32)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Posting count per city.
    pub fn city_distribution(&self, snapshot: &Snapshot) -> Vec<(String, u32)> {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for posting in &snapshot.postings {
            *counts.entry(posting.city.clone()).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }

    /// Month-by-month counts for a named skill or the overall top-N.
    pub fn history(&self, snapshot: &Snapshot, skill: Option<&str>, top: usize) -> SkillHistory {
        let tracked: Vec<String> = match skill {
            Some(name) => vec![name.to_string()],
            None => self
                .top_skills(snapshot, top.clamp(1, self.config.max_top_skills))
                .into_iter()
                .map(|(s, _)| s)
                .collect(),
        };

        let by_skill = monthly_skill_counts(snapshot);
        let mut months: Vec<Month> = by_skill
            .iter()
            .filter(|(skill, _)| tracked.contains(skill))
            .flat_map(|(_, m)| m.keys().copied())
            .collect();
        months.sort();
        months.dedup();

        let rows = months
            .into_iter()
            .map(|month| HistoryRow {
                month: month.label(),
                counts: tracked
                    .iter()
                    .map(|skill| {
                        let count = by_skill
                            .get(skill)
                            .and_then(|m| m.get(&month))
                            .copied()
                            .unwrap_or(0);
                        (skill.clone(), count)
                    })
                    .collect(),
            })
            .collect();

        SkillHistory {
            skills: tracked,
            rows,
        }
    }
}

/// Count postings per (skill, calendar month). Postings without a date or
/// without skills are skipped.
pub fn monthly_skill_counts(snapshot: &Snapshot) -> BTreeMap<String, BTreeMap<Month, u32>> {
    let mut by_skill: BTreeMap<String, BTreeMap<Month, u32>> = BTreeMap::new();

    for posting in &snapshot.postings {
        let Some(date) = posting.date_posted else {
            continue;
        };
        if posting.skills.is_empty() {
            continue;
        }
        let month = Month {
            year: chrono::Datelike::year(&date),
            month: chrono::Datelike::month(&date),
        };
        for skill in &posting.skills {
            *by_skill
                .entry(skill.clone())
                .or_default()
                .entry(month)
                .or_insert(0) += 1;
        }
    }

    by_skill
}

/// Expand an observed month map into a chronological series ending at
/// `last`, with zero counts for the gaps.
fn fill_gaps(observed: &BTreeMap<Month, u32>, last: Month) -> Vec<(Month, u32)> {
    let Some(first) = observed.keys().next().copied() else {
        return Vec::new();
    };
    let last = last.max(observed.keys().last().copied().unwrap_or(last));

    let mut series = Vec::new();
    let mut current = first;
    loop {
        series.push((current, observed.get(&current).copied().unwrap_or(0)));
        if current == last {
            break;
        }
        current = current.next();
    }
    series
}

/// Ordinary least squares fit of y = slope * x + intercept.
fn linear_regression(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len();
    if n < 2 {
        return (0.0, y.first().copied().unwrap_or(0.0));
    }

    let x_mean = x.iter().sum::<f64>() / n as f64;
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let numerator: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean))
        .sum();
    let denominator: f64 = x.iter().map(|xi| (xi - x_mean).powi(2)).sum();

    if denominator == 0.0 {
        return (0.0, y_mean);
    }
    let slope = numerator / denominator;
    (slope, y_mean - slope * x_mean)
}

/// Projection anchored on the moving average and shifted by the slope,
/// clamped so the prediction never moves against the slope sign relative
/// to the latest observed count.
fn predict_next(moving_average: f64, slope: f64, latest: f64) -> u32 {
    let raw = (moving_average + slope).max(0.0).round();
    let clamped = if slope > 0.0 {
        raw.max(latest)
    } else if slope < 0.0 {
        raw.min(latest)
    } else {
        raw
    };
    clamped.max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::posting::{Posting, PostingKey};
    use chrono::NaiveDate;

    fn posting_on(skill: &str, year: i32, month: u32, seq: u32) -> Posting {
        let title = format!("{} Job {}-{}-{}", skill, year, month, seq);
        let key = PostingKey::new(&title, "ACME", "Casablanca");
        Posting {
            id: key.to_id(),
            title,
            company: "ACME".to_string(),
            location: String::new(),
            city: "Casablanca".to_string(),
            role: String::new(),
            url: String::new(),
            date_posted: NaiveDate::from_ymd_opt(year, month, 15),
            description: None,
            skills: vec![skill.to_string()],
            embedding: None,
        }
    }

    fn snapshot_with_series(skill: &str, counts: &[u32]) -> Snapshot {
        let mut postings = Vec::new();
        for (i, count) in counts.iter().enumerate() {
            for seq in 0..*count {
                postings.push(posting_on(skill, 2025, 1 + i as u32, seq));
            }
        }
        Snapshot {
            postings,
            version: 1,
        }
    }

    fn forecaster() -> Forecaster {
        Forecaster::new(Config::default().trends)
    }

    #[test]
    fn test_growing_series_classified_strong() {
        let snapshot = snapshot_with_series("SQL", &[20, 34, 60]);
        let results = forecaster().forecast(&snapshot, Some("SQL"), 10);
        assert_eq!(results.len(), 1);

        let SkillForecast::Success(result) = &results[0] else {
            panic!("expected a successful forecast");
        };
        assert!(result.slope > 0.0);
        assert_eq!(result.trend, Trend::Growing);
        assert_eq!(result.trend_strength, TrendStrength::Strong);
        // Growing slope never predicts below the latest observed count
        assert!(result.predicted_next_month >= result.current_month_count);
    }

    #[test]
    fn test_declining_series() {
        let snapshot = snapshot_with_series("SQL", &[60, 34, 20]);
        let results = forecaster().forecast(&snapshot, Some("SQL"), 10);

        let SkillForecast::Success(result) = &results[0] else {
            panic!("expected a successful forecast");
        };
        assert!(result.slope < 0.0);
        assert_eq!(result.trend, Trend::Declining);
        assert!(result.predicted_next_month <= result.current_month_count);
    }

    #[test]
    fn test_stable_series() {
        let snapshot = snapshot_with_series("SQL", &[10, 10, 11]);
        let results = forecaster().forecast(&snapshot, Some("SQL"), 10);

        let SkillForecast::Success(result) = &results[0] else {
            panic!("expected a successful forecast");
        };
        assert_eq!(result.trend, Trend::Stable);
        assert_eq!(result.trend_strength, TrendStrength::Stable);
    }

    #[test]
    fn test_single_month_is_insufficient() {
        let snapshot = snapshot_with_series("SQL", &[40]);
        let results = forecaster().forecast(&snapshot, Some("SQL"), 10);
        assert!(matches!(
            results[0],
            SkillForecast::InsufficientData {
                months_observed: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_skill_is_insufficient_not_a_crash() {
        let snapshot = snapshot_with_series("SQL", &[20, 30]);
        let results = forecaster().forecast(&snapshot, Some("COBOL"), 10);
        assert!(matches!(
            results[0],
            SkillForecast::InsufficientData {
                months_observed: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_gap_months_are_filled_with_zero() {
        let mut postings = vec![posting_on("SQL", 2025, 1, 0)];
        postings.push(posting_on("SQL", 2025, 4, 0));
        let snapshot = Snapshot {
            postings,
            version: 1,
        };

        let results = forecaster().forecast(&snapshot, Some("SQL"), 10);
        let SkillForecast::Success(result) = &results[0] else {
            panic!("expected a successful forecast");
        };
        let labels: Vec<&str> = result.months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(labels, vec!["2025-01", "2025-02", "2025-03", "2025-04"]);
        assert_eq!(result.months[1].count, 0);
        assert_eq!(result.months[2].count, 0);
    }

    #[test]
    fn test_vanished_skill_ends_on_zero_with_undefined_pct_change() {
        // SQL stops appearing after February while Python keeps the
        // snapshot's month range open through April
        let mut postings = Vec::new();
        for seq in 0..6 {
            postings.push(posting_on("SQL", 2025, 1, seq));
        }
        for seq in 0..4 {
            postings.push(posting_on("SQL", 2025, 2, seq));
        }
        for month in 1..=4 {
            postings.push(posting_on("Python", 2025, month, 100));
        }
        let snapshot = Snapshot {
            postings,
            version: 1,
        };

        let results = forecaster().forecast(&snapshot, Some("SQL"), 10);
        let SkillForecast::Success(result) = &results[0] else {
            panic!("expected a successful forecast");
        };
        assert_eq!(result.months.len(), 4);
        assert_eq!(result.current_month_count, 0);
        assert!(result.predicted_change_pct.is_none());
        assert_eq!(result.trend, Trend::Declining);
    }

    #[test]
    fn test_top_skills_ordering() {
        let mut postings = Vec::new();
        for i in 0..5 {
            postings.push(posting_on("Python", 2025, 1, i));
        }
        for i in 0..2 {
            postings.push(posting_on("SQL", 2025, 1, i));
        }
        let snapshot = Snapshot {
            postings,
            version: 1,
        };

        let top = forecaster().top_skills(&snapshot, 10);
        assert_eq!(top[0], ("Python".to_string(), 5));
        assert_eq!(top[1], ("SQL".to_string(), 2));
    }

    #[test]
    fn test_city_distribution_counts_every_posting() {
        let mut postings = Vec::new();
        for seq in 0..3 {
            postings.push(posting_on("Python", 2025, 1, seq));
        }
        postings.push({
            let mut p = posting_on("SQL", 2025, 1, 50);
            p.city = "Rabat".to_string();
            p
        });
        // Untagged postings still count toward their city
        postings.push({
            let mut p = posting_on("SQL", 2025, 1, 51);
            p.city = "Rabat".to_string();
            p.skills = Vec::new();
            p
        });
        let snapshot = Snapshot {
            postings,
            version: 1,
        };

        let distribution = forecaster().city_distribution(&snapshot);
        assert_eq!(
            distribution,
            vec![("Casablanca".to_string(), 3), ("Rabat".to_string(), 2)]
        );
    }

    #[test]
    fn test_history_rows_cover_tracked_skills() {
        let mut postings = vec![posting_on("Python", 2025, 1, 0)];
        postings.push(posting_on("SQL", 2025, 2, 0));
        let snapshot = Snapshot {
            postings,
            version: 1,
        };

        let history = forecaster().history(&snapshot, None, 5);
        assert!(history.skills.contains(&"Python".to_string()));
        assert!(history.skills.contains(&"SQL".to_string()));
        for row in &history.rows {
            for skill in &history.skills {
                assert!(row.counts.contains_key(skill));
            }
        }
    }

    #[test]
    fn test_regression_slope() {
        let (slope, intercept) = linear_regression(&[0.0, 1.0, 2.0], &[20.0, 34.0, 60.0]);
        assert!((slope - 20.0).abs() < 1e-9);
        assert!((intercept - 18.0).abs() < 1e-9);
    }
}
