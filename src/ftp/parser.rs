//! LIST / MLSD response parsing.
//!
//! The strategy is chosen once per listing, not per line:
//! - **MLSD** (RFC 3659) when the server advertises it — fact-based and
//!   machine-readable.
//! - **LIST** otherwise — no fixed grammar; the payload format is
//!   auto-detected by trial-parsing the first line's first two tokens
//!   as a Windows-style date. On success every line is read as
//!   Windows/IIS format, otherwise as Unix `ls -l` format.
//!
//! Individual lines that fail to parse are skipped rather than failing
//! the whole listing.

use crate::ftp::types::FtpEntry;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Which grammar a listing payload uses. Callers that know the server
/// supports MLSD never touch the LIST heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Mlsd,
    List,
}

/// Parse a full listing payload into typed entries.
pub fn parse_listing(kind: ListingKind, raw: &str) -> Vec<FtpEntry> {
    match kind {
        ListingKind::Mlsd => parse_mlsd_listing(raw),
        ListingKind::List => parse_list_listing(raw),
    }
}

// ─── MLSD (RFC 3659) ─────────────────────────────────────────────────

fn parse_mlsd_listing(raw: &str) -> Vec<FtpEntry> {
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(parse_mlsd_line)
        .collect()
}

/// Parse one MLSD fact line: `fact1=v1;fact2=v2;filename`.
///
/// The filename is everything after the *last* `;`. Fact keys are
/// case-insensitive; unknown facts are skipped. A line without a
/// recognized `type` of `dir`/`file` yields no entry.
fn parse_mlsd_line(line: &str) -> Option<FtpEntry> {
    let sep = line.rfind(';')?;
    let name = line[sep + 1..].trim();
    if name.is_empty() {
        return None;
    }

    let mut is_dir: Option<bool> = None;
    let mut size = 0u64;
    let mut modified: Option<DateTime<Utc>> = None;

    for fact in line[..sep].split(';') {
        let Some((key, value)) = fact.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "type" => match value.trim().to_ascii_lowercase().as_str() {
                "dir" => is_dir = Some(true),
                "file" => is_dir = Some(false),
                _ => {}
            },
            "size" => size = value.trim().parse().unwrap_or(0),
            "modify" => modified = parse_mlsd_time(value.trim()),
            _ => {}
        }
    }

    let is_dir = is_dir?;
    Some(FtpEntry {
        name: name.to_string(),
        size: if is_dir { 0 } else { size },
        modified,
        is_dir,
    })
}

/// MLSD timestamp: `yyyyMMddHHmmss[.fraction]`, UTC.
fn parse_mlsd_time(s: &str) -> Option<DateTime<Utc>> {
    let base = if s.len() >= 14 { &s[..14] } else { s };
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

// ─── LIST ────────────────────────────────────────────────────────────

fn parse_list_listing(raw: &str) -> Vec<FtpEntry> {
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let windows = lines
        .first()
        .map_or(false, |first| detect_windows_line(first));

    lines
        .iter()
        .filter_map(|line| {
            if windows {
                parse_windows_line(line)
            } else {
                parse_unix_line(line)
            }
        })
        .collect()
}

/// Format detection: the payload is Windows-style when the first two
/// whitespace tokens of its first line parse as a Windows date-time.
fn detect_windows_line(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(date), Some(time)) => parse_windows_date(date, time).is_some(),
        _ => false,
    }
}

/// Windows / IIS style line:
/// ```text
/// 01-02-24  03:04PM       1024 report.txt
/// 01-02-24  03:04PM      <DIR> My Documents
/// ```
fn parse_windows_line(line: &str) -> Option<FtpEntry> {
    let re = Regex::new(
        r"(?x)
        ^(\d{1,2}-\d{1,2}-\d{2})\s+          # date
        (\d{1,2}:\d{2}(?:[AaPp][Mm])?)\s+    # time, optional AM/PM
        (<DIR>|<dir>|\d+)\s+                 # size or <DIR>
        (.+)$                                # filename
        ",
    )
    .ok()?;
    let caps = re.captures(line)?;

    let modified = parse_windows_date(&caps[1], &caps[2])?;
    let size_or_dir = &caps[3];
    let name = caps[4].to_string();

    let (is_dir, size) = if size_or_dir.eq_ignore_ascii_case("<dir>") {
        (true, 0)
    } else {
        (false, size_or_dir.parse::<u64>().unwrap_or(0))
    };

    Some(FtpEntry {
        name,
        size,
        modified: Some(modified),
        is_dir,
    })
}

/// Try the two Windows date-time shapes: `M-d-yy h:mmtt` and
/// `MM-dd-yy HH:mm`.
fn parse_windows_date(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{} {}", date, time);
    for format in ["%m-%d-%y %I:%M%p", "%m-%d-%y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&combined, format) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}

/// Unix `ls -l` style line:
/// ```text
/// drwxr-xr-x   2 user group     0 Jan  2 2024  sub
/// -rw-r--r--   1 user group  2048 Jan  2 03:04 report.txt
/// ```
/// A directory is an entry whose attributes token starts with `d`;
/// `.` and `..` are excluded.
fn parse_unix_line(line: &str) -> Option<FtpEntry> {
    let re = Regex::new(
        r"(?x)
        ^([a-z-][rwxsStT-]{9})\s+       # attributes
        \S+\s+                          # link count
        \S+\s+                          # owner
        \S+\s+                          # group
        (\d+)\s+                        # size
        (\w{3})\s+(\d{1,2})\s+([\d:]+)\s+  # month day time-or-year
        (.+)$                           # filename
        ",
    )
    .ok()?;
    let caps = re.captures(line)?;

    let attributes = &caps[1];
    let size = caps[2].parse::<u64>().ok()?;
    let modified = parse_unix_date(&caps[3], &caps[4], &caps[5]);
    let name = caps[6].to_string();

    if name == "." || name == ".." {
        return None;
    }

    let is_dir = attributes.starts_with('d');
    Some(FtpEntry {
        name,
        size: if is_dir { 0 } else { size },
        modified,
        is_dir,
    })
}

/// Unix listing date triplet: `MMM d HH:mm` (year implied, current) or
/// `MMM d yyyy` (midnight implied).
fn parse_unix_date(month: &str, day: &str, time_or_year: &str) -> Option<DateTime<Utc>> {
    if time_or_year.contains(':') {
        let combined = format!("{} {} {} {}", Utc::now().year(), month, day, time_or_year);
        NaiveDateTime::parse_from_str(&combined, "%Y %b %d %H:%M")
            .ok()
            .map(|dt| Utc.from_utc_datetime(&dt))
    } else {
        let combined = format!("{} {} {}", month, day, time_or_year);
        NaiveDate::parse_from_str(&combined, "%b %d %Y")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn mlsd_fixed_fact_set() {
        let entries = parse_listing(ListingKind::Mlsd, "type=dir;modify=20240101120000;filename");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "filename");
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].size, 0);
        assert_eq!(
            entries[0].modified,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn mlsd_file_with_size() {
        let entries = parse_listing(
            ListingKind::Mlsd,
            "Type=file;Size=1024;Modify=20260101120000; example.bin",
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "example.bin");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].size, 1024);
    }

    #[test]
    fn mlsd_unknown_type_yields_no_entry() {
        let raw = "type=cdir;modify=20240101120000;.\n\
                   type=pdir;modify=20240101120000;..\n\
                   type=file;size=10;modify=20240101120000;real.txt";
        let entries = parse_listing(ListingKind::Mlsd, raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "real.txt");
    }

    #[test]
    fn mlsd_unrecognized_facts_are_ignored() {
        let entries = parse_listing(
            ListingKind::Mlsd,
            "type=file;size=5;unique=0g48a;perm=rw;x.bin",
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 5);
        assert_eq!(entries[0].modified, None);
    }

    #[test]
    fn windows_file_line() {
        let entries = parse_listing(ListingKind::List, "01-02-24 03:04PM 1024 report.txt");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "report.txt");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].size, 1024);
        assert_eq!(
            entries[0].modified,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 0).unwrap())
        );
    }

    #[test]
    fn windows_directory_line() {
        let entries = parse_listing(ListingKind::List, "01-01-26  12:00AM      <DIR> My Documents");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[0].name, "My Documents");
    }

    #[test]
    fn unix_file_line() {
        let entries = parse_listing(
            ListingKind::List,
            "-rw-r--r-- 1 u g 2048 Jan 2 03:04 report.txt",
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "report.txt");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].size, 2048);
    }

    #[test]
    fn unix_directory_with_year() {
        let entries = parse_listing(ListingKind::List, "drwxr-xr-x 2 u g 0 Jan 2 2024 sub");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].name, "sub");
        assert_eq!(
            entries[0].modified,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn detection_is_per_payload_not_per_line() {
        // First line parses as a Windows date, so the whole payload is
        // read as Windows format; the Unix-shaped line is skipped.
        let raw = "01-02-24 03:04PM 1024 report.txt\n\
                   -rw-r--r-- 1 u g 2048 Jan 2 03:04 stray.txt";
        let entries = parse_listing(ListingKind::List, raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "report.txt");
    }

    #[test]
    fn unix_dot_entries_excluded() {
        let raw = "drwxr-xr-x 2 u g 0 Jan 2 2024 .\n\
                   drwxr-xr-x 2 u g 0 Jan 2 2024 ..\n\
                   drwxr-xr-x 2 u g 0 Jan 2 2024 kept";
        let entries = parse_listing(ListingKind::List, raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "kept");
    }

    #[test]
    fn unparseable_lines_are_skipped() {
        let raw = "-rw-r--r-- 1 u g 10 Jan 2 03:04 ok.txt\n\
                   total 12\n\
                   complete garbage";
        let entries = parse_listing(ListingKind::List, raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ok.txt");
    }

    #[test]
    fn entirely_unparseable_listing_is_empty() {
        let entries = parse_listing(ListingKind::List, "total 0\n???\n");
        assert!(entries.is_empty());
    }

    #[test]
    fn names_with_spaces_survive() {
        let entries = parse_listing(
            ListingKind::List,
            "-rw-r--r-- 1 u g 7 Jan 2 2024 a name with spaces.txt",
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a name with spaces.txt");
    }
}
