use chrono::NaiveDateTime;

use super::error::{CoreError, CoreResult};

/// Accepted input layouts, tried in order. The first is also the canonical
/// output layout.
const LAYOUTS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

pub const CANONICAL_LAYOUT: &str = LAYOUTS[0];

pub fn parse_datetime(value: &str) -> CoreResult<NaiveDateTime> {
    let trimmed = value.trim();
    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(trimmed, layout).ok())
        .ok_or_else(|| CoreError::format(value))
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(CANONICAL_LAYOUT).to_string()
}

/// Parses `value` under any accepted layout and re-renders it canonically
/// (`YYYY-MM-DD HH:mm:ss`, seconds defaulting to `00`).
pub fn normalize_datetime(value: &str) -> CoreResult<String> {
    parse_datetime(value).map(|dt| format_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert_eq, proptest};

    #[test]
    fn normalizes_every_accepted_layout() {
        for raw in [
            "2023-10-12 20:15:00",
            "2023-10-12 20:15",
            "2023-10-12T20:15:00",
            "2023-10-12T20:15",
            "  2023-10-12 20:15  ",
        ] {
            assert_eq!(normalize_datetime(raw).expect(raw), "2023-10-12 20:15:00");
        }
    }

    #[test]
    fn keeps_explicit_seconds() {
        assert_eq!(
            normalize_datetime("2023-02-28T15:49:37").expect("valid"),
            "2023-02-28 15:49:37"
        );
    }

    #[test]
    fn rejects_unknown_layouts_with_raw_value_in_message() {
        for raw in ["12/10/2023 20:15", "2023-10-12", "not a date", "2023-13-01 00:00"] {
            let err = normalize_datetime(raw).expect_err(raw);
            assert_eq!(err, CoreError::format(raw));
            assert!(err.to_string().contains(raw), "message should quote {raw}");
        }
    }

    proptest! {
        #[test]
        fn prop_canonical_strings_are_fixed_points(
            year in 1970i32..2100,
            month in 1u32..=12,
            day in 1u32..=28,
            hour in 0u32..24,
            minute in 0u32..60,
            second in 0u32..60,
        ) {
            let canonical =
                format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}");
            let normalized = normalize_datetime(&canonical).expect("canonical input parses");
            prop_assert_eq!(&normalized, &canonical);
            prop_assert_eq!(normalize_datetime(&normalized).expect("idempotent"), canonical);
        }
    }
}
