//! Rotating header profiles and session cookie seeding.
//!
//! Each request is sent with a randomly selected realistic browser profile
//! so repeated polling does not present a fixed fingerprint.

use std::time::SystemTime;

/// Real browser user agents, rotated per request.
pub const USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Firefox on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    // Chrome on Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

/// One realistic request-header set.
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    pub user_agent: &'static str,
    pub accept: &'static str,
    pub accept_language: &'static str,
}

impl HeaderProfile {
    /// Pick a profile using clock nanos as the entropy source.
    pub fn random() -> Self {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as usize)
            .unwrap_or(0);
        Self {
            user_agent: USER_AGENTS[nanos % USER_AGENTS.len()],
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            accept_language: "en-US,en;q=0.5",
        }
    }

    /// Static headers sent with every profile.
    pub fn common_headers() -> &'static [(&'static str, &'static str)] {
        &[
            ("Upgrade-Insecure-Requests", "1"),
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-User", "?1"),
            ("Cache-Control", "max-age=0"),
            ("DNT", "1"),
        ]
    }
}

/// Plausible first-contact session cookies for a store domain.
///
/// A request arriving with a locale, currency, and session id looks like a
/// returning visitor rather than a cold client.
pub fn seed_cookies(domain: &str) -> Vec<String> {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let session_id = format!(
        "{:03}-{:07}-{:07}",
        nanos % 1000,
        (nanos / 1000) % 10_000_000,
        (nanos / 7919) % 10_000_000
    );

    vec![
        format!("session-id={session_id}; Domain=.{domain}; Path=/"),
        format!("i18n-prefs=INR; Domain=.{domain}; Path=/"),
        format!("lc-main=en_IN; Domain=.{domain}; Path=/"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_profile_is_realistic() {
        let profile = HeaderProfile::random();
        assert!(profile.user_agent.contains("Mozilla"));
        assert!(profile.accept.contains("text/html"));
    }

    #[test]
    fn seed_cookies_scoped_to_domain() {
        let cookies = seed_cookies("amazon.in");
        assert_eq!(cookies.len(), 3);
        assert!(cookies.iter().all(|c| c.contains("Domain=.amazon.in")));
        assert!(cookies.iter().any(|c| c.starts_with("session-id=")));
        assert!(cookies.iter().any(|c| c.contains("i18n-prefs=INR")));
    }
}
