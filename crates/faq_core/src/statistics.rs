//! crates/faq_core/src/statistics.rs
//!
//! Usage statistics over one user's FAQs. Every function takes the already
//! owner-scoped activity rows plus an explicit time reference, so results are
//! deterministic and independent of the store.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::domain::{FaqActivity, FaqId, Tone};

pub const MONTHLY_WINDOW_DAYS: i64 = 180;
pub const DAILY_WINDOW_DAYS: u32 = 7;

/// A count of FAQs created within one calendar bucket (a day, or the first
/// day of a month).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendBucket {
    pub bucket: NaiveDate,
    pub count: u64,
}

/// How many FAQs were generated with a given tone. `None` means the tone was
/// never recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneCount {
    pub tone: Option<Tone>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaqStatistics {
    pub total_faqs: u64,
    pub total_questions: u64,
    pub avg_questions_per_faq: f64,
    pub last_faq_created: Option<FaqId>,
    pub monthly_trends: Vec<TrendBucket>,
    pub daily_trends: Vec<TrendBucket>,
    pub tones: Vec<ToneCount>,
}

/// Counts FAQs per calendar month for those created at or after `since`.
/// Only months with activity are returned, oldest first.
pub fn monthly_counts(activity: &[FaqActivity], since: DateTime<Utc>) -> Vec<TrendBucket> {
    let mut months: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for item in activity.iter().filter(|a| a.created_at >= since) {
        let day = item.created_at.date_naive();
        if let Some(first) = day.with_day(1) {
            *months.entry(first).or_default() += 1;
        }
    }
    months
        .into_iter()
        .map(|(bucket, count)| TrendBucket { bucket, count })
        .collect()
}

/// Counts FAQs per day for the `days` days ending at `today`, oldest first.
/// Days without activity are present with a zero count.
pub fn daily_counts(activity: &[FaqActivity], today: NaiveDate, days: u32) -> Vec<TrendBucket> {
    let mut per_day: HashMap<NaiveDate, u64> = HashMap::new();
    for item in activity {
        *per_day.entry(item.created_at.date_naive()).or_default() += 1;
    }
    (0..i64::from(days))
        .rev()
        .map(|offset| {
            let bucket = today - Duration::days(offset);
            TrendBucket {
                bucket,
                count: per_day.get(&bucket).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Counts FAQs per tone, most used first. Ties keep a stable tone order.
pub fn tone_distribution(activity: &[FaqActivity]) -> Vec<ToneCount> {
    let mut counts: Vec<ToneCount> = Vec::new();
    for item in activity {
        match counts.iter_mut().find(|c| c.tone == item.tone) {
            Some(entry) => entry.count += 1,
            None => counts.push(ToneCount {
                tone: item.tone,
                count: 1,
            }),
        }
    }
    counts.sort_by_key(|c| {
        let order = c
            .tone
            .and_then(|t| Tone::ALL.iter().position(|x| *x == t))
            .unwrap_or(Tone::ALL.len());
        (std::cmp::Reverse(c.count), order)
    });
    counts
}

pub fn summarize(activity: &[FaqActivity], now: DateTime<Utc>) -> FaqStatistics {
    let total_faqs = activity.len() as u64;
    let total_questions: u64 = activity.iter().map(|a| a.question_count).sum();
    let avg_questions_per_faq = if total_faqs > 0 {
        (total_questions as f64 / total_faqs as f64 * 10.0).round() / 10.0
    } else {
        0.0
    };
    let last_faq_created = activity
        .iter()
        .max_by_key(|a| (a.created_at, a.faq_id))
        .map(|a| a.faq_id);

    FaqStatistics {
        total_faqs,
        total_questions,
        avg_questions_per_faq,
        last_faq_created,
        monthly_trends: monthly_counts(activity, now - Duration::days(MONTHLY_WINDOW_DAYS)),
        daily_trends: daily_counts(activity, now.date_naive(), DAILY_WINDOW_DAYS),
        tones: tone_distribution(activity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().unwrap()
    }

    fn activity(id: FaqId, tone: Option<Tone>, questions: u64, created_at: DateTime<Utc>) -> FaqActivity {
        FaqActivity {
            faq_id: id,
            tone,
            question_count: questions,
            created_at,
        }
    }

    #[test]
    fn empty_collection_yields_zeroed_statistics() {
        let stats = summarize(&[], at(2026, 3, 10));
        assert_eq!(stats.total_faqs, 0);
        assert_eq!(stats.avg_questions_per_faq, 0.0);
        assert_eq!(stats.last_faq_created, None);
        assert!(stats.monthly_trends.is_empty());
        assert_eq!(stats.daily_trends.len(), DAILY_WINDOW_DAYS as usize);
        assert!(stats.daily_trends.iter().all(|b| b.count == 0));
        assert!(stats.tones.is_empty());
    }

    #[test]
    fn monthly_counts_group_by_month_inside_the_window() {
        let rows = vec![
            activity(1, None, 1, at(2025, 1, 5)),
            activity(2, None, 1, at(2026, 1, 2)),
            activity(3, None, 1, at(2026, 1, 28)),
            activity(4, None, 1, at(2026, 3, 1)),
        ];
        let buckets = monthly_counts(&rows, at(2025, 9, 11));
        assert_eq!(
            buckets,
            vec![
                TrendBucket { bucket: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), count: 2 },
                TrendBucket { bucket: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), count: 1 },
            ]
        );
    }

    #[test]
    fn daily_counts_are_zero_filled_oldest_first() {
        let rows = vec![
            activity(1, None, 1, at(2026, 3, 10)),
            activity(2, None, 1, at(2026, 3, 10)),
            activity(3, None, 1, at(2026, 3, 7)),
            activity(4, None, 1, at(2026, 3, 1)),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let buckets = daily_counts(&rows, today, 7);
        let counts: Vec<u64> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![0, 0, 0, 1, 0, 0, 2]);
        assert_eq!(buckets[0].bucket, NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
        assert_eq!(buckets[6].bucket, today);
    }

    #[test]
    fn tone_distribution_is_sorted_by_count() {
        let now = at(2026, 3, 10);
        let rows = vec![
            activity(1, Some(Tone::Casual), 1, now),
            activity(2, Some(Tone::Formal), 1, now),
            activity(3, Some(Tone::Casual), 1, now),
            activity(4, None, 1, now),
            activity(5, Some(Tone::Formal), 1, now),
            activity(6, Some(Tone::Casual), 1, now),
        ];
        assert_eq!(
            tone_distribution(&rows),
            vec![
                ToneCount { tone: Some(Tone::Casual), count: 3 },
                ToneCount { tone: Some(Tone::Formal), count: 2 },
                ToneCount { tone: None, count: 1 },
            ]
        );
    }

    #[test]
    fn summary_averages_and_finds_the_newest_faq() {
        let rows = vec![
            activity(1, Some(Tone::Neutral), 2, at(2026, 3, 1)),
            activity(7, Some(Tone::Neutral), 3, at(2026, 3, 9)),
            activity(4, Some(Tone::Neutral), 2, at(2026, 3, 5)),
        ];
        let stats = summarize(&rows, at(2026, 3, 10));
        assert_eq!(stats.total_faqs, 3);
        assert_eq!(stats.total_questions, 7);
        assert_eq!(stats.avg_questions_per_faq, 2.3);
        assert_eq!(stats.last_faq_created, Some(7));
    }
}
