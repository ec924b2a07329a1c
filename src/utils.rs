use chrono::NaiveDate;

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

pub fn within_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Formats a value as dollars with thousands separators: `-$1,234.56`.
pub fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = group_thousands(cents / 100);
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, whole, cents % 100)
}

pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Percent with one decimal, or `n/a` when the change is undefined.
pub fn format_optional_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v),
        None => "n/a".to_string(),
    }
}

fn group_thousands(mut n: u64) -> String {
    let mut groups = Vec::new();
    loop {
        if n < 1000 {
            groups.push(n.to_string());
            break;
        }
        groups.push(format!("{:03}", n % 1000));
        n /= 1000;
    }
    groups.reverse();
    groups.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28)
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            last_day_of_month(2023, 12),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(last_day_of_month(2023, 13), None);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.5), "$999.50");
        assert_eq!(format_currency(1234.567), "$1,234.57");
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_currency(-77500.0), "-$77,500.00");
        assert_eq!(format_currency(-0.001), "$0.00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(4.30769), "4.31%");
        assert_eq!(format_optional_percent(Some(-12.345)), "-12.3%");
        assert_eq!(format_optional_percent(None), "n/a");
    }

    #[test]
    fn test_within_tolerance() {
        assert!(within_tolerance(100.0, 101.0, 1.0));
        assert!(!within_tolerance(100.0, 101.5, 1.0));
    }
}
