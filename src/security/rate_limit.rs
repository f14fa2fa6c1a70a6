use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

static RATE_LIMITER: Lazy<Mutex<HashMap<String, (u32, Instant)>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fixed-window counter keyed by caller IP. Returns false once the window's
/// budget is spent.
pub fn check(ip: &str, limit: u32, window_secs: u64) -> bool {
    let mut map = RATE_LIMITER.lock().unwrap();
    let entry = map.entry(ip.to_string()).or_insert((0, Instant::now()));
    if entry.1.elapsed() > Duration::from_secs(window_secs) {
        *entry = (0, Instant::now());
    }
    if entry.0 >= limit {
        return false;
    }
    entry.0 += 1;
    true
}

/// Caller IP as forwarded by the proxy; none when running bare.
pub fn extract_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    for key in ["x-forwarded-for", "x-real-ip"] {
        if let Some(val) = headers.get(key).and_then(|v| v.to_str().ok()) {
            let first = val.split(',').next().unwrap_or(val).trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denies_after_budget_spent() {
        let ip = "203.0.113.77";
        for _ in 0..5 {
            assert!(check(ip, 5, 60));
        }
        assert!(!check(ip, 5, 60));
    }

    #[test]
    fn extracts_first_forwarded_hop() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-forwarded-for", "198.51.100.9, 10.0.0.1".parse().unwrap());
        assert_eq!(extract_ip(&headers).as_deref(), Some("198.51.100.9"));
    }
}
