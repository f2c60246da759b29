/// Format a hospital countdown as `m:ss` (minutes are not capped at 59)
pub fn format_countdown(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Format seconds as `HH:MM:SS`, clamping negatives to zero
pub fn format_clock(seconds: i64) -> String {
    if seconds <= 0 {
        return "00:00:00".to_string();
    }
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Format an epoch-seconds timestamp relative to `now` ("5m ago")
pub fn format_relative_time(timestamp: i64, now: i64) -> String {
    if timestamp <= 0 {
        return "Unknown".to_string();
    }
    let diff = now - timestamp;
    if diff < 0 {
        "just now".to_string()
    } else if diff < 60 {
        format!("{}s ago", diff)
    } else if diff < 3600 {
        format!("{}m ago", diff / 60)
    } else if diff < 86_400 {
        format!("{}h ago", diff / 3600)
    } else {
        format!("{}d ago", diff / 86_400)
    }
}

/// Abbreviate large numbers for stat columns (1.25B, 3.40M, 12.00K)
pub fn format_number(num: f64) -> String {
    if !num.is_finite() {
        return "0".to_string();
    }
    if num >= 1e9 {
        format!("{:.2}B", num / 1e9)
    } else if num >= 1e6 {
        format!("{:.2}M", num / 1e6)
    } else if num >= 1e3 {
        format!("{:.2}K", num / 1e3)
    } else {
        format!("{}", num.round() as i64)
    }
}

/// Extract a player id from a bare number or a profile/attack URL
/// (`XID=`, `user2ID=` or `ID=` query parameters).
pub fn parse_player_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input.chars().all(|c| c.is_ascii_digit()) {
        return Some(input.to_string());
    }

    for marker in ["XID=", "user2ID=", "ID="] {
        if let Some(pos) = input.find(marker) {
            let digits: String = input[pos + marker.len()..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !digits.is_empty() {
                return Some(digits);
            }
        }
    }
    None
}
