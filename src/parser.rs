//! Parsers for the text fields scraped from route pages.

/// Sums the `N minute(s)` and `N second(s)` components of a "time since last
/// stop" string into seconds.
///
/// Returns `None` when the text contains no recognised component.
///
/// ```
/// use bus_tracker::parser::parse_time_since;
/// assert_eq!(parse_time_since("2 minutes 5 seconds ago"), Some(125));
/// ```
pub fn parse_time_since(text: &str) -> Option<u32> {
    let mut tokens = text.split_whitespace().peekable();
    let mut total: Option<u32> = None;

    while let Some(token) = tokens.next() {
        let Ok(value) = token.parse::<u32>() else {
            continue;
        };
        let Some(unit) = tokens.peek() else {
            break;
        };

        let unit = unit
            .trim_matches(|c: char| !c.is_ascii_alphabetic())
            .to_ascii_lowercase();
        let unit = unit.strip_suffix('s').unwrap_or(&unit);

        let secs = match unit {
            "minute" => value.saturating_mul(60),
            "second" => value,
            _ => continue,
        };
        total = Some(total.unwrap_or(0).saturating_add(secs));
        tokens.next();
    }

    total
}

/// Splits a last-stop label into the stop name and whether the bus is at it.
///
/// Labels starting with `Leaving` (any case) mean the bus has departed.
pub fn parse_last_stop(text: &str) -> (&str, bool) {
    const PREFIX: &str = "leaving";
    let trimmed = text.trim();

    match trimmed.get(..PREFIX.len()) {
        Some(head)
            if head.eq_ignore_ascii_case(PREFIX)
                && trimmed[PREFIX.len()..].starts_with(char::is_whitespace) =>
        {
            (trimmed[PREFIX.len()..].trim_start(), false)
        }
        _ => (trimmed, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minutes_and_seconds() {
        assert_eq!(parse_time_since("1 minute 1 second"), Some(61));
        assert_eq!(parse_time_since("12 seconds"), Some(12));
        assert_eq!(parse_time_since("3 minutes"), Some(180));
    }

    #[test]
    fn test_parse_ignores_unknown_units() {
        assert_eq!(parse_time_since("4 buses, 20 seconds"), Some(20));
        assert_eq!(parse_time_since("4 buses"), None);
        assert_eq!(parse_time_since(""), None);
    }

    #[test]
    fn test_parse_last_stop_leaving_prefix() {
        assert_eq!(parse_last_stop("Leaving Market Place"), ("Market Place", false));
        assert_eq!(parse_last_stop("LEAVING  Europort"), ("Europort", false));
        assert_eq!(parse_last_stop(" Market Place "), ("Market Place", true));
        assert_eq!(parse_last_stop("Leavingston"), ("Leavingston", true));
    }
}
