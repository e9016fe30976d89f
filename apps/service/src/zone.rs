use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Resolve an IANA zone name, falling back to UTC when it is unknown.
pub fn resolve(name: &str) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(e) => {
            warn!("Failed to load timezone {name:?}, falling back to UTC: {e}");
            Tz::UTC
        }
    }
}

/// RFC 3339 timestamp at second precision in `tz`, e.g. `2024-05-01T15:04:05+03:00`.
pub fn rfc3339(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_resolve_known_zone() {
        assert_eq!(resolve("Africa/Nairobi"), Tz::Africa__Nairobi);
    }

    #[test]
    fn test_unknown_zone_falls_back_to_utc() {
        assert_eq!(resolve("Mars/Olympus_Mons"), Tz::UTC);
        assert_eq!(resolve(""), Tz::UTC);
    }

    #[test]
    fn test_rfc3339_in_zone() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(rfc3339(at, Tz::Africa__Nairobi), "2024-05-01T15:00:00+03:00");
        assert_eq!(rfc3339(at, Tz::UTC), "2024-05-01T12:00:00Z");
    }
}
