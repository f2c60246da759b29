//! "Last seen" classification.

use serde::Serialize;

/// Minutes since last action still counted as online.
const ONLINE_MAX_MINUTES: u64 = 10;

/// Minutes since last action below which a player is idle rather than offline.
const IDLE_MAX_MINUTES: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineStatus {
    Online,
    Idle,
    Offline,
}

impl std::fmt::Display for OnlineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnlineStatus::Online => f.pad("online"),
            OnlineStatus::Idle => f.pad("idle"),
            OnlineStatus::Offline => f.pad("offline"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Minute,
    Hour,
    Day,
}

/// Parse "<n> <unit> ago" into its amount and unit.
fn parse_elapsed(text: &str) -> Option<(u64, Unit)> {
    let mut tokens = text.split_whitespace();
    let amount = tokens.next()?.parse::<u64>().ok()?;
    let unit = tokens.next()?.to_ascii_lowercase();

    let unit = if unit.starts_with("minute") {
        Unit::Minute
    } else if unit.starts_with("hour") {
        Unit::Hour
    } else if unit.starts_with("day") {
        Unit::Day
    } else {
        return None;
    };
    Some((amount, unit))
}

/// Classify Torn's free-text last action ("9 minutes ago", "Online").
///
/// "Online" anywhere wins. Otherwise a minute count of at most 10 is online
/// and under 60 is idle; hours, days and unparseable text are offline.
pub fn online_status(last_action: &str) -> OnlineStatus {
    if last_action.contains("Online") {
        return OnlineStatus::Online;
    }

    match parse_elapsed(last_action) {
        Some((minutes, Unit::Minute)) if minutes <= ONLINE_MAX_MINUTES => OnlineStatus::Online,
        Some((minutes, Unit::Minute)) if minutes < IDLE_MAX_MINUTES => OnlineStatus::Idle,
        _ => OnlineStatus::Offline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minute_boundaries() {
        assert_eq!(online_status("9 minutes ago"), OnlineStatus::Online);
        assert_eq!(online_status("10 minutes ago"), OnlineStatus::Online);
        assert_eq!(online_status("11 minutes ago"), OnlineStatus::Idle);
        assert_eq!(online_status("59 minutes ago"), OnlineStatus::Idle);
        assert_eq!(online_status("60 minutes ago"), OnlineStatus::Offline);
    }

    #[test]
    fn test_singular_units() {
        assert_eq!(online_status("1 minute ago"), OnlineStatus::Online);
        assert_eq!(online_status("1 hour ago"), OnlineStatus::Offline);
        assert_eq!(online_status("1 day ago"), OnlineStatus::Offline);
    }

    #[test]
    fn test_hours_and_days_are_offline() {
        assert_eq!(online_status("2 hours ago"), OnlineStatus::Offline);
        assert_eq!(online_status("3 days ago"), OnlineStatus::Offline);
    }

    #[test]
    fn test_online_marker() {
        assert_eq!(online_status("Online"), OnlineStatus::Online);
        assert_eq!(online_status("Status: Online now"), OnlineStatus::Online);
    }

    #[test]
    fn test_unusable_text() {
        assert_eq!(online_status(""), OnlineStatus::Offline);
        assert_eq!(online_status("Offline"), OnlineStatus::Offline);
        assert_eq!(online_status("a while ago"), OnlineStatus::Offline);
        assert_eq!(online_status("5 seconds ago"), OnlineStatus::Offline);
    }
}
