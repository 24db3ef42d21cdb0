//! Process-wide cooperative rate limiter for outbound API traffic.

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum delay between consecutive requests. Reads and writes
/// share one timeline but may carry different minimum delays. Retries are
/// expected to bypass [`RateLimiter::acquire`] so a failed request is not
/// throttled twice.
#[derive(Debug)]
pub struct RateLimiter {
    read_delay: Duration,
    write_delay: Duration,
    last: tokio::sync::Mutex<Option<Instant>>,
}

/// Hosts that get a stricter floor regardless of configuration.
const WIKIMEDIA_SUFFIXES: &[&str] = &[
    "wikipedia.org",
    "wikimedia.org",
    "wiktionary.org",
    "wikidata.org",
    "wikisource.org",
    "wikibooks.org",
    "wikiquote.org",
];

const WIKIMEDIA_FLOOR: Duration = Duration::from_millis(1000);

impl RateLimiter {
    pub fn new(read_delay: Duration, write_delay: Duration) -> RateLimiter {
        RateLimiter {
            read_delay,
            write_delay,
            last: tokio::sync::Mutex::new(None),
        }
    }

    /// Applies the Wikimedia floor when `api_url` points at a foundation
    /// host.
    pub fn for_api_url(api_url: &str, read_delay: Duration, write_delay: Duration) -> RateLimiter {
        let host = host_of(api_url).unwrap_or_default();
        let strict = WIKIMEDIA_SUFFIXES
            .iter()
            .any(|suffix| host == *suffix || host.ends_with(&format!(".{suffix}")));
        if strict {
            RateLimiter::new(
                read_delay.max(WIKIMEDIA_FLOOR),
                write_delay.max(WIKIMEDIA_FLOOR),
            )
        } else {
            RateLimiter::new(read_delay, write_delay)
        }
    }

    /// Waits until the configured delay since the previous request has
    /// elapsed, then claims the current instant.
    pub async fn acquire(&self, write: bool) {
        let delay = if write { self.write_delay } else { self.read_delay };
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let due = previous + delay;
            let now = Instant::now();
            if due > now {
                tokio::time::sleep(due - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}

fn host_of(url: &str) -> Option<String> {
    let rest = url.split("://").nth(1)?;
    let host = rest.split(['/', '?']).next()?;
    let host = host.split('@').last()?;
    Some(host.split(':').next()?.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_min_delay() {
        let limiter = RateLimiter::new(Duration::from_millis(50), Duration::from_millis(50));
        let start = Instant::now();
        limiter.acquire(false).await;
        limiter.acquire(false).await;
        limiter.acquire(false).await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(10), Duration::from_secs(10));
        let start = Instant::now();
        limiter.acquire(true).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wikimedia_hosts_get_the_floor() {
        let limiter = RateLimiter::for_api_url(
            "https://en.wikipedia.org/w/api.php",
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        assert_eq!(limiter.read_delay, WIKIMEDIA_FLOOR);

        let limiter = RateLimiter::for_api_url(
            "https://wiki.example.org/api.php",
            Duration::from_millis(100),
            Duration::from_millis(200),
        );
        assert_eq!(limiter.read_delay, Duration::from_millis(100));
        assert_eq!(limiter.write_delay, Duration::from_millis(200));
    }

    #[test]
    fn host_parsing() {
        assert_eq!(
            host_of("https://en.wikipedia.org/w/api.php").as_deref(),
            Some("en.wikipedia.org")
        );
        assert_eq!(
            host_of("http://localhost:8080/api.php").as_deref(),
            Some("localhost")
        );
        assert_eq!(host_of("not a url"), None);
    }
}
