//! Weekly customer patronage series

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::Transaction;

/// How invoice dates are assigned to weekly buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WeekBucketing {
    /// ISO year and week; weeks without purchases inside the span count as zero
    #[default]
    Calendar,
    /// ISO week number only, folding every year onto the same 1..=53 axis
    WeekOfYear,
}

/// Identifies one weekly bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekLabel {
    /// ISO year, absent when years are folded together
    pub year: Option<i32>,
    /// ISO week number (1..=53)
    pub week: u32,
}

impl WeekLabel {
    pub fn calendar(year: i32, week: u32) -> Self {
        Self {
            year: Some(year),
            week,
        }
    }

    pub fn week_of_year(week: u32) -> Self {
        Self { year: None, week }
    }

    /// The bucket immediately after this one
    pub fn next(&self) -> Self {
        match self.year {
            Some(year) => {
                let next = NaiveDate::from_isoywd_opt(year, self.week, Weekday::Mon)
                    .map(|monday| monday + Duration::weeks(1))
                    .map(|monday| monday.iso_week());
                match next {
                    Some(iso) => Self::calendar(iso.year(), iso.week()),
                    None => Self::calendar(year + 1, 1),
                }
            }
            None => {
                let last = if self.week >= 53 { 53 } else { 52 };
                Self::week_of_year(if self.week >= last { 1 } else { self.week + 1 })
            }
        }
    }
}

impl fmt::Display for WeekLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{}-W{:02}", year, self.week),
            None => write!(f, "W{:02}", self.week),
        }
    }
}

/// Distinct customers per week, in chronological bucket order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPatronage {
    pub labels: Vec<WeekLabel>,
    pub customers: Vec<f64>,
}

impl WeeklyPatronage {
    pub fn values(&self) -> &[f64] {
        &self.customers
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    /// Labels for the `steps` weeks following the last observed week
    pub fn future_labels(&self, steps: usize) -> Vec<WeekLabel> {
        let Some(mut current) = self.labels.last().copied() else {
            return Vec::new();
        };
        (0..steps)
            .map(|_| {
                current = current.next();
                current
            })
            .collect()
    }

    /// Split values into training weeks and the trailing `holdout` weeks
    pub fn split(&self, holdout: usize) -> (&[f64], &[f64]) {
        let cut = self.customers.len().saturating_sub(holdout);
        self.customers.split_at(cut)
    }
}

/// Count distinct customers per weekly bucket
pub fn weekly_unique_customers(
    transactions: &[Transaction],
    bucketing: WeekBucketing,
) -> WeeklyPatronage {
    let mut buckets: BTreeMap<WeekLabel, HashSet<i64>> = BTreeMap::new();
    for transaction in transactions {
        let iso = transaction.invoice_date.date().iso_week();
        let label = match bucketing {
            WeekBucketing::Calendar => WeekLabel::calendar(iso.year(), iso.week()),
            WeekBucketing::WeekOfYear => WeekLabel::week_of_year(iso.week()),
        };
        buckets
            .entry(label)
            .or_default()
            .insert(transaction.customer_id);
    }

    let (Some(first), Some(last)) = (
        buckets.keys().next().copied(),
        buckets.keys().next_back().copied(),
    ) else {
        return WeeklyPatronage {
            labels: Vec::new(),
            customers: Vec::new(),
        };
    };

    let labels: Vec<WeekLabel> = match bucketing {
        WeekBucketing::Calendar => {
            let mut labels = vec![first];
            let mut current = first;
            while current < last {
                current = current.next();
                labels.push(current);
            }
            labels
        }
        WeekBucketing::WeekOfYear => buckets.keys().copied().collect(),
    };

    let customers: Vec<f64> = labels
        .iter()
        .map(|label| buckets.get(label).map_or(0.0, |set| set.len() as f64))
        .collect();

    debug!(
        weeks = labels.len(),
        first = %first,
        last = %last,
        "aggregated weekly patronage"
    );

    WeeklyPatronage { labels, customers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn transaction(customer_id: i64, date: &str) -> Transaction {
        Transaction {
            customer_id,
            invoice_date: NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    #[test]
    fn test_counts_distinct_customers() {
        let transactions = vec![
            transaction(1, "2011-01-03 09:00:00"),
            transaction(1, "2011-01-04 10:00:00"),
            transaction(2, "2011-01-05 11:00:00"),
            transaction(3, "2011-01-10 09:00:00"),
        ];

        let series = weekly_unique_customers(&transactions, WeekBucketing::Calendar);
        assert_eq!(
            series.labels,
            vec![WeekLabel::calendar(2011, 1), WeekLabel::calendar(2011, 2)]
        );
        assert_eq!(series.customers, vec![2.0, 1.0]);
    }

    #[test]
    fn test_calendar_fills_gaps_across_year_end() {
        let transactions = vec![
            transaction(1, "2010-12-20 09:00:00"), // 2010-W51
            transaction(2, "2011-01-10 09:00:00"), // 2011-W02
        ];

        let series = weekly_unique_customers(&transactions, WeekBucketing::Calendar);
        let labels: Vec<String> = series.labels.iter().map(|l| l.to_string()).collect();
        assert_eq!(labels, vec!["2010-W51", "2010-W52", "2011-W01", "2011-W02"]);
        assert_eq!(series.customers, vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_week_of_year_folds_years() {
        let transactions = vec![
            transaction(1, "2010-12-06 09:00:00"), // W49 of 2010
            transaction(2, "2011-12-05 09:00:00"), // W49 of 2011
            transaction(3, "2011-01-03 09:00:00"), // W01
        ];

        let series = weekly_unique_customers(&transactions, WeekBucketing::WeekOfYear);
        assert_eq!(
            series.labels,
            vec![WeekLabel::week_of_year(1), WeekLabel::week_of_year(49)]
        );
        assert_eq!(series.customers, vec![1.0, 2.0]);
    }

    #[test]
    fn test_empty_transactions() {
        let series = weekly_unique_customers(&[], WeekBucketing::Calendar);
        assert!(series.is_empty());
        assert!(series.future_labels(3).is_empty());
    }

    #[test]
    fn test_next_label() {
        assert_eq!(
            WeekLabel::calendar(2010, 52).next(),
            WeekLabel::calendar(2011, 1)
        );
        // 2015 has 53 ISO weeks
        assert_eq!(
            WeekLabel::calendar(2015, 52).next(),
            WeekLabel::calendar(2015, 53)
        );
        assert_eq!(WeekLabel::week_of_year(52).next(), WeekLabel::week_of_year(1));
        assert_eq!(WeekLabel::week_of_year(53).next(), WeekLabel::week_of_year(1));
        assert_eq!(WeekLabel::week_of_year(7).next(), WeekLabel::week_of_year(8));
    }

    #[test]
    fn test_split_and_future_labels() {
        let series = WeeklyPatronage {
            labels: (1..=6).map(|w| WeekLabel::calendar(2011, w)).collect(),
            customers: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        };

        let (train, test) = series.split(4);
        assert_eq!(train, &[1.0, 2.0]);
        assert_eq!(test, &[3.0, 4.0, 5.0, 6.0]);

        let future = series.future_labels(2);
        assert_eq!(
            future,
            vec![WeekLabel::calendar(2011, 7), WeekLabel::calendar(2011, 8)]
        );
    }
}
