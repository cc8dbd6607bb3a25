//! Group-title age suffix helpers
//!
//! A suffixed title looks like `"Research (3h)"`; an unnamed group with the
//! age toggle on carries just `"(3h)"`. Units roll over at 60 minutes and
//! 48 hours.

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

/// Render an age as the parenthesized suffix, without a leading space.
pub fn format_age_suffix(age_ms: i64) -> String {
    let age_ms = age_ms.max(0);
    let minutes = age_ms / MINUTE_MS;
    if minutes < 60 {
        return format!("({minutes}m)");
    }
    let hours = age_ms / HOUR_MS;
    if hours < 48 {
        return format!("({hours}h)");
    }
    format!("({}d)", age_ms / DAY_MS)
}

/// Append the age suffix to a base title.
pub fn append_age_suffix(base: &str, age_ms: i64) -> String {
    let suffix = format_age_suffix(age_ms);
    let base = base.trim_end();
    if base.is_empty() {
        suffix
    } else {
        format!("{base} {suffix}")
    }
}

fn is_age_suffix(inner: &str) -> bool {
    let Some(unit) = inner.chars().last() else {
        return false;
    };
    if !matches!(unit, 'm' | 'h' | 'd') {
        return false;
    }
    let digits = &inner[..inner.len() - 1];
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Remove a trailing age suffix, if present.
pub fn strip_age_suffix(title: &str) -> &str {
    let trimmed = title.trim_end();
    if !trimmed.ends_with(')') {
        return title;
    }
    let Some(open) = trimmed.rfind('(') else {
        return title;
    };
    if is_age_suffix(&trimmed[open + 1..trimmed.len() - 1]) {
        trimmed[..open].trim_end()
    } else {
        title
    }
}

/// The title a user actually chose: suffix stripped, whitespace trimmed.
/// Empty means the group is unnamed.
pub fn effective_title(title: &str) -> &str {
    strip_age_suffix(title).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_rollover() {
        assert_eq!(format_age_suffix(0), "(0m)");
        assert_eq!(format_age_suffix(59 * MINUTE_MS), "(59m)");
        assert_eq!(format_age_suffix(60 * MINUTE_MS), "(1h)");
        assert_eq!(format_age_suffix(47 * HOUR_MS), "(47h)");
        assert_eq!(format_age_suffix(48 * HOUR_MS), "(2d)");
        assert_eq!(format_age_suffix(10 * DAY_MS), "(10d)");
    }

    #[test]
    fn append_and_strip_round_trip() {
        let titled = append_age_suffix("Research", 3 * HOUR_MS);
        assert_eq!(titled, "Research (3h)");
        assert_eq!(strip_age_suffix(&titled), "Research");

        let unnamed = append_age_suffix("", 5 * MINUTE_MS);
        assert_eq!(unnamed, "(5m)");
        assert_eq!(strip_age_suffix(&unnamed), "");
    }

    #[test]
    fn replacing_a_suffix_does_not_stack() {
        let old = append_age_suffix("Work", MINUTE_MS);
        let new = append_age_suffix(strip_age_suffix(&old), 2 * MINUTE_MS);
        assert_eq!(new, "Work (2m)");
    }

    #[test]
    fn non_suffix_parentheses_survive() {
        assert_eq!(strip_age_suffix("Plan (draft)"), "Plan (draft)");
        assert_eq!(strip_age_suffix("Totals (2024)"), "Totals (2024)");
        assert_eq!(strip_age_suffix("(m)"), "(m)");
        assert_eq!(strip_age_suffix("ends)"), "ends)");
    }

    #[test]
    fn effective_title_detects_unnamed() {
        assert_eq!(effective_title("  (12m) "), "");
        assert_eq!(effective_title("News (1h)"), "News");
        assert_eq!(effective_title("   "), "");
    }
}
