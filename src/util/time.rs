use std::time::Duration;

// Parse a delay like "500ms", "2s", "1m" or a bare "750" (milliseconds).
// Returns None if unparseable.
pub fn parse_delay_str(s: &str) -> Option<Duration> {
    let s = s.trim();
    // "500ms"
    if let Some(stripped) = s.strip_suffix("ms") {
        return stripped.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    // "2s"
    if let Some(stripped) = s.strip_suffix('s') {
        return stripped.trim().parse::<u64>().ok().map(Duration::from_secs);
    }
    // "1m"
    if let Some(stripped) = s.strip_suffix('m') {
        return stripped.trim().parse::<u64>().ok().and_then(|m| m.checked_mul(60)).map(Duration::from_secs);
    }
    s.parse::<u64>().ok().map(Duration::from_millis)
}

// Helper for Option<String> inputs used by CLI flags like --filter-delay
pub fn parse_delay_opt(delay: &Option<String>) -> anyhow::Result<Option<Duration>> {
    let Some(s) = delay.as_ref() else { return Ok(None) };
    match parse_delay_str(s) {
        Some(d) => Ok(Some(d)),
        None => anyhow::bail!("invalid delay: {s} (expected e.g. 500ms, 2s, 1m)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(parse_delay_str("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_delay_str("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_delay_str("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_delay_str(" 750 "), Some(Duration::from_millis(750)));
        assert_eq!(parse_delay_str("soon"), None);
        assert_eq!(parse_delay_str("-1s"), None);
    }

    #[test]
    fn huge_minute_values_are_rejected() {
        assert_eq!(parse_delay_str("307445734561825861m"), None);
        assert_eq!(parse_delay_str("307445734561825860m"), Some(Duration::from_secs(307445734561825860 * 60)));
        assert!(parse_delay_opt(&Some("307445734561825861m".into())).is_err());
    }

    #[test]
    fn option_helper_rejects_garbage() {
        assert_eq!(parse_delay_opt(&None).unwrap(), None);
        assert_eq!(parse_delay_opt(&Some("3s".into())).unwrap(), Some(Duration::from_secs(3)));
        assert!(parse_delay_opt(&Some("later".into())).is_err());
    }
}
