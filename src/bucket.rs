//! Year/month buckets derived from file timestamps.
//!
//! A bucket is the `YYYY/MM` directory a file is sorted into. The year and
//! month come from the file's timestamp in the local time zone.
//!
//! # Examples
//!
//! ```
//! use folderchronicle::bucket::Bucket;
//! use std::path::Path;
//!
//! let bucket = Bucket::new(2021, 3).unwrap();
//! assert_eq!(bucket.to_string(), "2021/03");
//! assert_eq!(bucket.dir_in(Path::new("/downloads")), Path::new("/downloads/2021/03"));
//! ```

use chrono::{DateTime, Datelike, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A (year, month) pair that maps to the `root/YYYY/MM` directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket {
    year: i32,
    month: u32,
}

impl Bucket {
    /// Creates a bucket, returning `None` when `year` is not in `0..=9999` or
    /// `month` is not in `1..=12`.
    ///
    /// Years are limited to four digits so that every bucket directory is
    /// recognized by [`is_bucket_dir`] on later runs.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        ((0..=9999).contains(&year) && (1..=12).contains(&month)).then_some(Self { year, month })
    }

    /// Buckets a local date-time, or `None` if its year has more than four digits.
    pub fn from_datetime(datetime: &DateTime<Local>) -> Option<Self> {
        Self::new(datetime.year(), datetime.month())
    }

    /// Buckets a file system timestamp, interpreted in the local time zone.
    ///
    /// Returns `None` for timestamps the calendar cannot represent or whose
    /// year falls outside `0..=9999`.
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let (secs, nanos) = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => (i64::try_from(after.as_secs()).ok()?, after.subsec_nanos()),
            Err(before) => {
                let before = before.duration();
                let secs = i64::try_from(before.as_secs()).ok()?;
                match before.subsec_nanos() {
                    0 => (-secs, 0),
                    nanos => (-secs - 1, 1_000_000_000 - nanos),
                }
            }
        };
        let datetime = Local.timestamp_opt(secs, nanos).single()?;
        Self::from_datetime(&datetime)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The year directory name, zero-padded to four digits.
    pub fn year_dir(&self) -> String {
        format!("{:04}", self.year)
    }

    /// The month directory name, zero-padded to two digits.
    pub fn month_dir(&self) -> String {
        format!("{:02}", self.month)
    }

    /// The bucket path relative to the organized root (`YYYY/MM`).
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.year_dir()).join(self.month_dir())
    }

    /// The bucket directory under `root`.
    pub fn dir_in(&self, root: &Path) -> PathBuf {
        root.join(self.relative_path())
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year_dir(), self.month_dir())
    }
}

/// Which file timestamp decides the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// Last modification time.
    #[default]
    Modified,
    /// Creation (birth) time, where the platform exposes it.
    Created,
}

impl TimestampSource {
    /// Reads the selected timestamp from file metadata.
    ///
    /// Fails when the platform or file system does not record it.
    pub fn read(&self, metadata: &Metadata) -> io::Result<SystemTime> {
        match self {
            TimestampSource::Modified => metadata.modified(),
            TimestampSource::Created => metadata.created(),
        }
    }

    /// Human-readable name used in failure reasons.
    pub fn label(&self) -> &'static str {
        match self {
            TimestampSource::Modified => "modification time",
            TimestampSource::Created => "creation time",
        }
    }
}

/// Returns true if `name` looks like a year directory (four ASCII digits).
pub fn is_year_dir_name(name: &str) -> bool {
    name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Returns true if `name` looks like a month directory (`01` to `12`).
pub fn is_month_dir_name(name: &str) -> bool {
    name.len() == 2
        && name.bytes().all(|b| b.is_ascii_digit())
        && matches!(name.parse::<u32>(), Ok(1..=12))
}

/// Returns true if `relative` (a path relative to the organized root) is a
/// bucket directory produced by a previous run, i.e. exactly `YYYY/MM`.
pub fn is_bucket_dir(relative: &Path) -> bool {
    let mut components = relative.components();
    match (components.next(), components.next(), components.next()) {
        (Some(Component::Normal(year)), Some(Component::Normal(month)), None) => {
            os_str_matches(year, is_year_dir_name) && os_str_matches(month, is_month_dir_name)
        }
        _ => false,
    }
}

fn os_str_matches(name: &OsStr, predicate: fn(&str) -> bool) -> bool {
    name.to_str().is_some_and(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_rejects_invalid_month() {
        assert!(Bucket::new(2020, 0).is_none());
        assert!(Bucket::new(2020, 13).is_none());
        assert!(Bucket::new(2020, 12).is_some());
    }

    #[test]
    fn test_new_rejects_years_beyond_four_digits() {
        assert!(Bucket::new(10000, 1).is_none());
        assert!(Bucket::new(-1, 1).is_none());
        assert!(Bucket::new(0, 1).is_some());
        assert!(Bucket::new(9999, 12).is_some());
    }

    #[test]
    fn test_dir_names_are_zero_padded() {
        let bucket = Bucket::new(987, 7).unwrap();
        assert_eq!(bucket.year_dir(), "0987");
        assert_eq!(bucket.month_dir(), "07");
        assert_eq!(bucket.to_string(), "0987/07");
    }

    #[test]
    fn test_relative_path() {
        let bucket = Bucket::new(2019, 11).unwrap();
        assert_eq!(bucket.relative_path(), Path::new("2019").join("11"));
    }

    #[test]
    fn test_from_system_time_uses_local_calendar() {
        let local = Local
            .with_ymd_and_hms(2020, 7, 22, 12, 0, 0)
            .single()
            .expect("valid local time");
        let bucket = Bucket::from_system_time(SystemTime::from(local));
        assert_eq!(bucket, Bucket::new(2020, 7));
    }

    #[test]
    fn test_from_system_time_before_epoch() {
        let local = Local
            .with_ymd_and_hms(1965, 6, 15, 12, 0, 0)
            .single()
            .expect("valid local time");
        let time = SystemTime::from(local);

        assert_eq!(Bucket::from_system_time(time), Bucket::new(1965, 6));
        assert_eq!(
            Bucket::from_system_time(time - Duration::from_millis(500)),
            Bucket::new(1965, 6)
        );
    }

    #[test]
    fn test_from_system_time_out_of_range() {
        // Beyond chrono's calendar.
        let far = UNIX_EPOCH + Duration::from_secs(1 << 62);
        assert_eq!(Bucket::from_system_time(far), None);

        // Year 36812: representable, but not a four-digit bucket.
        let five_digit_year = UNIX_EPOCH + Duration::from_secs(1 << 40);
        assert_eq!(Bucket::from_system_time(five_digit_year), None);
    }

    #[test]
    fn test_is_bucket_dir() {
        assert!(is_bucket_dir(Path::new("2021/03")));
        assert!(is_bucket_dir(Path::new("1999/12")));

        assert!(!is_bucket_dir(Path::new("2021")));
        assert!(!is_bucket_dir(Path::new("2021/03/extra")));
        assert!(!is_bucket_dir(Path::new("2021/13")));
        assert!(!is_bucket_dir(Path::new("2021/00")));
        assert!(!is_bucket_dir(Path::new("2021/3")));
        assert!(!is_bucket_dir(Path::new("21/03")));
        assert!(!is_bucket_dir(Path::new("photos/03")));
        assert!(!is_bucket_dir(Path::new("/2021/03")));
    }

    #[test]
    fn test_year_and_month_names() {
        assert!(is_year_dir_name("2024"));
        assert!(!is_year_dir_name("20a4"));
        assert!(!is_year_dir_name("202"));
        assert!(is_month_dir_name("01"));
        assert!(!is_month_dir_name("1"));
        assert!(!is_month_dir_name("99"));
    }

    #[test]
    fn test_timestamp_source_labels() {
        assert_eq!(TimestampSource::default(), TimestampSource::Modified);
        assert_eq!(TimestampSource::Created.label(), "creation time");
    }
}
