use std::path::PathBuf;
use std::time::Duration;

pub fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| parse_csv(&raw))
}

pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Non-empty string variable.
pub fn string_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn path_var(name: &str) -> Option<PathBuf> {
    string_var(name).map(PathBuf::from)
}

/// Humantime duration such as `3s`, `10m` or `1day`.
pub fn parse_duration(raw: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(raw.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_skips_blanks() {
        assert_eq!(parse_csv("a@x, ,b@y,"), vec!["a@x", "b@y"]);
    }

    #[test]
    fn durations_use_humantime() {
        assert_eq!(parse_duration("1day").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("soon").is_err());
    }
}
