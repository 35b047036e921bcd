//! Human-readable size formatting for archive reports

use std::fmt;

/// Byte count rendered with a binary unit suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Format with two decimals once the value reaches a larger unit,
    /// e.g. `512B`, `1.50KB`, `3.00MB`.
    pub fn to_human_readable(&self) -> String {
        const UNITS: &[(&str, u64)] = &[
            ("TB", 1024 * 1024 * 1024 * 1024),
            ("GB", 1024 * 1024 * 1024),
            ("MB", 1024 * 1024),
            ("KB", 1024),
        ];

        for &(unit, divisor) in UNITS {
            if self.0 >= divisor {
                return format!("{:.2}{}", self.0 as f64 / divisor as f64, unit);
            }
        }

        format!("{}B", self.0)
    }
}

impl From<u64> for ByteSize {
    fn from(value: u64) -> Self {
        ByteSize(value)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_below_one_kilobyte() {
        assert_eq!(ByteSize(0).to_human_readable(), "0B");
        assert_eq!(ByteSize(1023).to_human_readable(), "1023B");
    }

    #[test]
    fn test_fractional_units() {
        assert_eq!(ByteSize(1536).to_human_readable(), "1.50KB");
        assert_eq!(ByteSize(5 * 1024 * 1024).to_human_readable(), "5.00MB");
        assert_eq!(
            ByteSize(50 * 1024 * 1024 * 1024).to_human_readable(),
            "50.00GB"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ByteSize(1024)), "1.00KB");
        assert_eq!(ByteSize::from(2048).as_u64(), 2048);
    }
}
