use std::time::Duration;

const RETRYABLE_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Tools whose result may be reused across calls within the TTL. Everything
/// else is assumed to mutate state and is never cached.
const CACHEABLE_PREFIXES: &[&str] = &["get_", "list_", "status_"];

/// Mutating tool -> cacheable tools it invalidates on success.
const INVALIDATION_TABLE: &[(&str, &[&str])] = &[
    ("add_task", &["list_tasks"]),
    ("complete_task", &["list_tasks"]),
    ("delete_task", &["list_tasks"]),
    ("create_event", &["list_events", "get_calendar"]),
    ("update_event", &["list_events", "get_calendar"]),
    ("update_profile", &["get_profile"]),
    ("send_sms", &["status_sms"]),
];

pub fn is_cacheable(tool_name: &str) -> bool {
    CACHEABLE_PREFIXES.iter().any(|p| tool_name.starts_with(p))
}

pub fn invalidation_targets(tool_name: &str) -> &'static [&'static str] {
    INVALIDATION_TABLE
        .iter()
        .find(|(name, _)| *name == tool_name)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

/// Per-tool cache TTL. Time-sensitive lookups expire fastest, slow-changing
/// profile data slowest.
pub fn ttl_for(tool_name: &str) -> Duration {
    if tool_name.contains("time") {
        Duration::from_secs(5)
    } else if tool_name.contains("weather") {
        Duration::from_secs(300)
    } else if tool_name.contains("status") {
        Duration::from_secs(30)
    } else if tool_name.contains("list") {
        Duration::from_secs(60)
    } else if tool_name.contains("profile") {
        Duration::from_secs(120)
    } else {
        Duration::from_secs(60)
    }
}

/// Per-tool request timeout.
pub fn timeout_for(tool_name: &str) -> Duration {
    if tool_name.contains("search") && !tool_name.contains("web") {
        Duration::from_secs(60)
    } else if tool_name.contains("web_search") {
        Duration::from_secs(45)
    } else if tool_name.contains("sms") || tool_name.contains("weather") {
        Duration::from_secs(15)
    } else if tool_name.contains("calendar") && !tool_name.starts_with("get_") {
        Duration::from_secs(20)
    } else {
        Duration::from_secs(30)
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Exponential backoff capped at 5s: 0.5, 1, 2, ... 5.
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let secs = (0.5 * 2f64.powi(attempt as i32)).min(5.0);
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_prefixes_are_cacheable() {
        assert!(is_cacheable("get_profile"));
        assert!(is_cacheable("list_tasks"));
        assert!(!is_cacheable("add_task"));
    }

    #[test]
    fn mutating_tool_invalidates_its_declared_targets() {
        assert_eq!(invalidation_targets("add_task"), &["list_tasks"]);
        assert!(invalidation_targets("get_profile").is_empty());
    }

    #[test]
    fn backoff_is_capped_at_five_seconds() {
        assert_eq!(backoff_for_attempt(0), Duration::from_secs_f64(0.5));
        assert_eq!(backoff_for_attempt(1), Duration::from_secs_f64(1.0));
        assert_eq!(backoff_for_attempt(10), Duration::from_secs_f64(5.0));
    }

    #[test]
    fn retryable_statuses_match_transient_http_errors() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }
}
