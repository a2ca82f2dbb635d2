use chrono::{DateTime, Utc};
use shared::{Assessment, AverageRisk, DashboardStats, RiskClass, TrendPoint};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Dashboard aggregates over `records`, which must be ordered newest first.
pub fn summarize(records: &[Assessment]) -> DashboardStats {
    summarize_at(records, Utc::now())
}

pub fn summarize_at(records: &[Assessment], now: DateTime<Utc>) -> DashboardStats {
    let total = records.len();
    let Some(latest) = records.first() else {
        return DashboardStats {
            total: 0,
            avg_risk: AverageRisk::NotAvailable,
            last_checkup: "Never".to_string(),
        };
    };

    let high = records
        .iter()
        .filter(|a| a.prediction == RiskClass::High)
        .count();
    // strictly greater: an even split reads as Low
    let avg_risk = if high as f64 / total as f64 > 0.5 {
        AverageRisk::High
    } else {
        AverageRisk::Low
    };

    let diff_days = (now - latest.created_at)
        .num_seconds()
        .div_euclid(SECONDS_PER_DAY)
        .max(0);
    let last_checkup = if diff_days == 0 {
        "Today".to_string()
    } else {
        format!("{} days ago", diff_days)
    };

    DashboardStats {
        total,
        avg_risk,
        last_checkup,
    }
}

/// Risk over time, oldest first, whatever order `records` arrive in.
pub fn trend(records: &[Assessment]) -> Vec<TrendPoint> {
    let mut ordered: Vec<&Assessment> = records.iter().collect();
    ordered.sort_by_key(|a| a.created_at);
    ordered
        .into_iter()
        .map(|a| TrendPoint {
            date: trend_label(a.created_at),
            risk: (a.probability * 100.0).round() as u32,
        })
        .collect()
}

/// Short calendar label for chart axes, e.g. `Oct 19`.
pub fn trend_label(at: DateTime<Utc>) -> String {
    at.format("%b %-d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use shared::{ClinicalInput, UserId};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap()
    }

    fn assessment(created_at: DateTime<Utc>, prediction: RiskClass, probability: f64) -> Assessment {
        Assessment {
            id: Uuid::new_v4(),
            created_at,
            user_id: UserId(Uuid::nil()),
            input: ClinicalInput {
                age: 50,
                sex: 1,
                cp: 0,
                trestbps: 120,
                chol: 200,
                fbs: 0,
                restecg: 0,
                thalach: 150,
                exang: 0,
                oldpeak: 0.0,
                slope: 1,
                ca: 0,
                thal: 2,
            },
            prediction,
            probability,
        }
    }

    fn with_predictions(classes: &[RiskClass]) -> Vec<Assessment> {
        classes
            .iter()
            .enumerate()
            .map(|(i, c)| assessment(now() - Duration::hours(i as i64), *c, 0.5))
            .collect()
    }

    #[test]
    fn empty_history_has_placeholders() {
        let stats = summarize_at(&[], now());
        assert_eq!(
            stats,
            DashboardStats {
                total: 0,
                avg_risk: AverageRisk::NotAvailable,
                last_checkup: "Never".into(),
            }
        );
    }

    #[test]
    fn majority_high_is_high() {
        use RiskClass::*;
        let stats = summarize_at(&with_predictions(&[High, Low, High]), now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.avg_risk, AverageRisk::High);
    }

    #[test]
    fn even_split_is_low() {
        use RiskClass::*;
        let stats = summarize_at(&with_predictions(&[High, Low, High, Low]), now());
        assert_eq!(stats.total, 4);
        assert_eq!(stats.avg_risk, AverageRisk::Low);
    }

    #[test]
    fn last_checkup_counts_whole_days_from_newest_record() {
        let records = vec![
            assessment(now() - Duration::hours(23), RiskClass::Low, 0.2),
            assessment(now() - Duration::days(9), RiskClass::Low, 0.2),
        ];
        assert_eq!(summarize_at(&records, now()).last_checkup, "Today");

        let records = vec![assessment(
            now() - Duration::days(3) - Duration::hours(5),
            RiskClass::Low,
            0.2,
        )];
        assert_eq!(summarize_at(&records, now()).last_checkup, "3 days ago");
    }

    #[test]
    fn future_timestamp_reads_as_today() {
        let records = vec![assessment(now() + Duration::minutes(10), RiskClass::High, 0.9)];
        assert_eq!(summarize_at(&records, now()).last_checkup, "Today");
    }

    #[test]
    fn single_point_trend_rounds_probability() {
        let points = trend(&[assessment(now(), RiskClass::Low, 0.42)]);
        assert_eq!(
            points,
            vec![TrendPoint {
                date: "Oct 19".into(),
                risk: 42
            }]
        );
    }

    #[test]
    fn trend_is_chronological_from_newest_first_input() {
        let records = vec![
            assessment(now(), RiskClass::High, 0.876),
            assessment(now() - Duration::days(40), RiskClass::Low, 0.118),
        ];
        let points = trend(&records);
        assert_eq!(points[0].date, "Sep 9");
        assert_eq!(points[0].risk, 12);
        assert_eq!(points[1].date, "Oct 19");
        assert_eq!(points[1].risk, 88);
    }

    #[test]
    fn empty_trend_is_empty() {
        assert!(trend(&[]).is_empty());
    }
}
