use chrono::{Datelike, NaiveDate};

/// Calendar quarter (1-4) a month falls into.
pub fn quarter_of_month(month: u32) -> u32 {
    month.div_ceil(3)
}

/// Quarter key in `YYYY-Qn` form. Keys of this shape sort
/// chronologically as plain strings.
pub fn quarter_key(date: NaiveDate) -> String {
    format!("{}-Q{}", date.year(), quarter_of_month(date.month()))
}

pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Number of ~30-day months covered by a date range, never less than one.
/// Used to annualize invoiced totals when no ARR figure is available.
pub fn month_span(start: NaiveDate, end: NaiveDate) -> i64 {
    let days = days_between(start, end).max(0);
    ((days as f64) / 30.0).ceil().max(1.0) as i64
}

/// Lowercased identifier slug: alphanumerics kept, runs of anything else
/// collapsed to a single dash.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
