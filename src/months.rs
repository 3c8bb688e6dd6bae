//! Grouping images by the month they were last modified.

use crate::scanner;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid month {0:?}, expected YYYY-MM")]
pub struct ParseMonthError(String);

impl YearMonth {
    pub fn from_time(time: SystemTime) -> Self {
        let local: DateTime<Local> = time.into();
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    /// Human label such as `2024 March`.
    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%Y %B").to_string())
            .unwrap_or_else(|| self.to_string())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ParseMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMonthError(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = month.parse().map_err(|_| err())?;
        if !(1..=12).contains(&month) {
            return Err(err());
        }
        Ok(Self { year, month })
    }
}

pub fn month_of(path: &Path) -> Option<YearMonth> {
    scanner::modified(path).map(YearMonth::from_time)
}

/// Number of images per month, oldest month first. Paths without a readable
/// modification time are left out.
pub fn month_counts(paths: &[PathBuf]) -> Vec<(YearMonth, usize)> {
    let mut counts: BTreeMap<YearMonth, usize> = BTreeMap::new();
    for month in paths.iter().filter_map(|p| month_of(p)) {
        *counts.entry(month).or_default() += 1;
    }
    counts.into_iter().collect()
}

pub fn filter_by_month(paths: &[PathBuf], month: YearMonth) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|p| month_of(p) == Some(month))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use filetime::{FileTime, set_file_mtime};
    use std::fs;
    use tempfile::TempDir;

    fn local_secs(year: i32, month: u32, day: u32) -> i64 {
        Local
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .unwrap()
            .timestamp()
    }

    #[test]
    fn test_parse_and_display() {
        let ym: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(ym, YearMonth { year: 2024, month: 3 });
        assert_eq!(ym.to_string(), "2024-03");
        assert_eq!(ym.label(), "2024 March");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("March".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_counts_and_filter() {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for (name, (y, m, d)) in [
            ("a.jpg", (2023, 12, 5)),
            ("b.jpg", (2024, 1, 10)),
            ("c.jpg", (2023, 12, 20)),
        ] {
            let path = dir.path().join(name);
            fs::write(&path, name).unwrap();
            set_file_mtime(&path, FileTime::from_unix_time(local_secs(y, m, d), 0)).unwrap();
            paths.push(path);
        }
        paths.push(dir.path().join("missing.jpg"));

        let december = YearMonth { year: 2023, month: 12 };
        let january = YearMonth { year: 2024, month: 1 };
        assert_eq!(month_counts(&paths), vec![(december, 2), (january, 1)]);
        assert_eq!(
            filter_by_month(&paths, december),
            vec![paths[0].clone(), paths[2].clone()]
        );
    }
}
