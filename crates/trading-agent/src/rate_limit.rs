//! Per-(route class, client IP) sliding 60s window rate limiter. A single
//! mutex-guarded map, matching the in-memory limiter described for the
//! ambient HTTP façade — no external store needed for one process.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Order,
    AccountRead,
    Quotes,
    Bars,
    News,
    Default,
}

impl RouteClass {
    fn limit(self) -> u32 {
        match self {
            RouteClass::Order => 5,
            RouteClass::AccountRead => 30,
            RouteClass::Quotes => 60,
            RouteClass::Bars => 30,
            RouteClass::News => 20,
            RouteClass::Default => 100,
        }
    }
}

pub struct RateLimiter {
    hits: Mutex<HashMap<(RouteClass, IpAddr), Vec<Instant>>>,
}

pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, class: RouteClass, ip: IpAddr) -> Decision {
        let limit = class.limit();
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap();
        let entry = hits.entry((class, ip)).or_default();
        entry.retain(|t| now.duration_since(*t) < WINDOW);

        if entry.len() as u32 >= limit {
            let oldest = entry.first().copied().unwrap_or(now);
            let retry_after = WINDOW
                .saturating_sub(now.duration_since(oldest))
                .as_secs()
                .max(1);
            return Decision {
                allowed: false,
                remaining: 0,
                retry_after_secs: retry_after,
            };
        }

        entry.push(now);
        Decision {
            allowed: true,
            remaining: limit - entry.len() as u32,
            retry_after_secs: 0,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_blocks() {
        let limiter = RateLimiter::new();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        for _ in 0..5 {
            assert!(limiter.check(RouteClass::Order, ip).allowed);
        }
        let blocked = limiter.check(RouteClass::Order, ip);
        assert!(!blocked.allowed);
        assert!(blocked.retry_after_secs >= 1);
    }

    #[test]
    fn separate_route_classes_have_independent_budgets() {
        let limiter = RateLimiter::new();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        for _ in 0..5 {
            assert!(limiter.check(RouteClass::Order, ip).allowed);
        }
        assert!(limiter.check(RouteClass::Quotes, ip).allowed);
    }

    #[test]
    fn separate_ips_have_independent_budgets() {
        let limiter = RateLimiter::new();
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        for _ in 0..5 {
            assert!(limiter.check(RouteClass::Order, a).allowed);
        }
        assert!(limiter.check(RouteClass::Order, b).allowed);
    }
}
