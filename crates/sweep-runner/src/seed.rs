use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Seeds are rendered in UTC+8 regardless of the host timezone, so run names
/// line up with the lab's local clock.
pub const SEED_UTC_OFFSET_SECS: i32 = 8 * 3600;
pub const SEED_FORMAT: &str = "%m%d%H%M%S";

pub type Clock = fn() -> DateTime<Utc>;

fn seed_offset() -> FixedOffset {
    FixedOffset::east_opt(SEED_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn seed_at(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&seed_offset())
        .format(SEED_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn seed_uses_fixed_offset() {
        let instant = Utc
            .with_ymd_and_hms(2024, 7, 3, 6, 25, 30)
            .single()
            .expect("valid instant");
        assert_eq!(seed_at(instant), "0703142530");
    }

    #[test]
    fn seed_rolls_over_the_date_line() {
        let instant = Utc
            .with_ymd_and_hms(2024, 12, 31, 20, 0, 1)
            .single()
            .expect("valid instant");
        assert_eq!(seed_at(instant), "0101040001");
    }

    #[test]
    fn seeds_one_second_apart_differ_in_seconds() {
        let first = Utc
            .with_ymd_and_hms(2024, 7, 3, 6, 25, 30)
            .single()
            .expect("valid instant");
        let a = seed_at(first);
        let b = seed_at(first + Duration::seconds(1));
        assert_ne!(a, b);
        assert_eq!(&a[..8], &b[..8]);
        assert_eq!(&a[8..], "30");
        assert_eq!(&b[8..], "31");
    }

    #[test]
    fn wall_clock_seed_is_ten_digits() {
        let clock: Clock = Utc::now;
        let seed = seed_at(clock());
        assert_eq!(seed.len(), 10);
        assert!(seed.chars().all(|c| c.is_ascii_digit()));
    }
}
