use chrono::NaiveDate;

pub const CURRENCY_SYMBOL: &str = "₹";

/// Plain two-decimal rendering used in forms and on pages: `1234.50`.
pub fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    let whole = abs / 100;
    let frac = abs % 100;
    format!("{sign}{whole}.{frac:02}")
}

/// Currency rendering with thousands separators: `₹1,234.50`, `₹-5.00`.
pub fn format_currency(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    let whole = group_thousands(abs / 100);
    let frac = abs % 100;
    format!("{CURRENCY_SYMBOL}{sign}{whole}.{frac:02}")
}

fn group_thousands(value: i64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Parses user input like `12`, `12.5` or `12,50` into cents.
/// Negative values and more than two fractional digits are rejected.
pub fn parse_amount_to_cents(input: &str) -> Option<i64> {
    let mut s = input.trim().to_string();
    if s.is_empty() {
        return None;
    }
    if s.starts_with('-') || s.starts_with('+') {
        return None;
    }
    s = s.replace(',', ".");
    let mut parts = s.split('.');
    let whole_str = parts.next()?;
    let frac_str = parts.next();
    if parts.next().is_some() {
        return None;
    }
    let whole: i64 = if whole_str.is_empty() {
        0
    } else {
        whole_str.parse().ok()?
    };
    let frac = match frac_str {
        None => 0,
        Some(frac) => {
            if frac.is_empty() || frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let mut padded = frac.to_string();
            while padded.len() < 2 {
                padded.push('0');
            }
            padded.parse::<i64>().ok()?
        }
    };
    whole.checked_mul(100)?.checked_add(frac)
}

/// `05 Mar 2025`
pub fn format_report_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(0), "₹0.00");
        assert_eq!(format_currency(15_000), "₹150.00");
        assert_eq!(format_currency(123_450), "₹1,234.50");
        assert_eq!(format_currency(123_456_789), "₹1,234,567.89");
        assert_eq!(format_currency(-500), "₹-5.00");
    }

    #[test]
    fn plain_money_has_two_decimals() {
        assert_eq!(format_money(85_000), "850.00");
        assert_eq!(format_money(-7), "-0.07");
    }

    #[test]
    fn parses_amounts() {
        assert_eq!(parse_amount_to_cents("1000"), Some(100_000));
        assert_eq!(parse_amount_to_cents(" 12.5 "), Some(1_250));
        assert_eq!(parse_amount_to_cents("12,05"), Some(1_205));
        assert_eq!(parse_amount_to_cents(".75"), Some(75));
        assert_eq!(parse_amount_to_cents(""), None);
        assert_eq!(parse_amount_to_cents("-3"), None);
        assert_eq!(parse_amount_to_cents("1.234"), None);
        assert_eq!(parse_amount_to_cents("1.2.3"), None);
        assert_eq!(parse_amount_to_cents("abc"), None);
        assert_eq!(parse_amount_to_cents("5."), None);
    }

    #[test]
    fn report_dates_use_short_month() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(format_report_date(date), "05 Mar 2025");
    }
}
