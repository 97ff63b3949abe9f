use std::{path::Path, time::Duration};

use chrono::{DateTime, Local};
use humansize::{ToF64, Unsigned, DECIMAL};

/// Quotes paths containing spaces or control characters.
pub fn format_path(path: &Path) -> String {
    snailquote::escape(&path.to_string_lossy()).into_owned()
}

pub fn format_object(bucket: &str, key: &str) -> String {
    format!("{bucket}:{key}")
}

pub fn format_size<T: ToF64 + Unsigned>(input: T) -> String {
    humansize::format_size(input, DECIMAL)
}

/// Rounds to whole seconds so log lines stay short.
pub fn format_elapsed(elapsed: Duration) -> String {
    let rounded = Duration::from_secs(elapsed.as_secs());
    humantime::format_duration(rounded).to_string()
}

pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Log files are rotated by this date.
pub fn format_date(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use chrono::{Local, TimeZone};

    use super::{format_date, format_elapsed, format_path, format_timestamp};

    #[test]
    fn plain_path_unquoted() {
        assert_eq!(format_path(Path::new("/seq/run1")), "/seq/run1");
    }

    #[test]
    fn path_with_space_quoted() {
        assert_eq!(format_path(Path::new("/seq/run 1")), "'/seq/run 1'");
    }

    #[test]
    fn elapsed_drops_subseconds() {
        assert_eq!(format_elapsed(Duration::from_millis(61_900)), "1m 1s");
    }

    #[test]
    fn timestamp_and_date() {
        let time = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(format_timestamp(&time), "2024-03-09 07:05:02.000");
        assert_eq!(format_date(&time), "2024-03-09");
    }
}
