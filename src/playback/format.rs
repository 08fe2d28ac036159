//! Display helpers shared by the player controllers.

/// Strips the last `.suffix` from a stored media name.
///
/// - `"holiday.mp4"` → `"holiday"`
/// - `"archive.tar.gz"` → `"archive.tar"`
/// - `"README"` → `"README"`
///
/// # Arguments
///
/// * `name` - Stored file name
///
/// # Returns
///
/// The text before the last dot, or the whole name when it has none.
#[must_use]
pub fn strip_extension(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// Formats a playback position as `MM:SS`, or `H:MM:SS` from one hour on.
///
/// # Arguments
///
/// * `time_ms` - Position in milliseconds
///
/// # Returns
///
/// A clock string with zero-padded minutes and seconds.
#[must_use]
pub fn format_time(time_ms: u64) -> String {
    let total_seconds = time_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use crate::playback::format::{format_time, strip_extension};

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("holiday.mp4"), "holiday");
        assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
        assert_eq!(strip_extension("README"), "README");
        assert_eq!(strip_extension(".hidden"), "");
        assert_eq!(strip_extension(""), "");
    }

    #[test]
    fn test_format_time_minutes() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(999), "00:00");
        assert_eq!(format_time(65_000), "01:05");
        assert_eq!(format_time(3_599_999), "59:59");
    }

    #[test]
    fn test_format_time_hours() {
        assert_eq!(format_time(3_600_000), "1:00:00");
        assert_eq!(format_time(3_723_000), "1:02:03");
        assert_eq!(format_time(36_000_000), "10:00:00");
    }
}
