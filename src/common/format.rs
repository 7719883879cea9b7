use chrono::Duration;

/// Format a repository age as a coarse human string.
///
/// Evaluated in priority order: years, months, days, hours, minutes. The
/// remainder unit is appended only when non-zero, e.g. "1y 35d",
/// "1mo 10d", "1d 1h". Years count as 365 days and months as 30.
pub fn format_age(age: Duration) -> String {
    let days = age.num_days();
    if days > 365 {
        let years = days / 365;
        let rem = days % 365;
        if rem > 0 {
            format!("{}y {}d", years, rem)
        } else {
            format!("{}y", years)
        }
    } else if days > 30 {
        let months = days / 30;
        let rem = days % 30;
        if rem > 0 {
            format!("{}mo {}d", months, rem)
        } else {
            format!("{}mo", months)
        }
    } else if days > 0 {
        let hours = age.num_hours() - days * 24;
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    } else if age.num_hours() > 0 {
        let hours = age.num_hours();
        let minutes = age.num_minutes() - hours * 60;
        if minutes > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}h", hours)
        }
    } else {
        format!("{}m", age.num_minutes().max(0))
    }
}

/// Format a repository count with its plural.
pub fn format_count(count: usize) -> String {
    if count == 1 {
        "1 repository".to_string()
    } else {
        format!("{} repositories", count)
    }
}

/// Format elapsed wall-clock time in human-readable form.
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor() as u64;
        let remaining = secs - (mins as f64 * 60.0);
        format!("{}m {:.0}s", mins, remaining)
    }
}
