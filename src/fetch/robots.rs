//! Robots exclusion: parsing and a per-origin, lazily populated gate.
//!
//! [`RobotsTxt`] parses the file; [`RobotsGate`] fetches it once per origin
//! and answers `can_fetch` from the cached result. A robots file that cannot
//! be retrieved is treated as "allow everything" so that missing robots data
//! never halts crawling, but a disallow rule from a file that *was* retrieved
//! is always honored.

use super::rate_limit::DomainRateLimiter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, instrument, warn};
use url::Url;

/// Parsed robots.txt rules.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    groups: Vec<Group>,
    sitemaps: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Group {
    /// Lowercased product tokens; `*` for the wildcard group.
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    pattern: String,
}

impl Rule {
    /// Length used for longest-match precedence.
    fn specificity(&self) -> usize {
        self.pattern.len()
    }

    fn matches(&self, path: &str) -> bool {
        pattern_matches(&self.pattern, path)
    }
}

/// Match a robots path pattern supporting `*` (any run) and a trailing `$`.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or_default();
    if !path.starts_with(first) {
        return false;
    }
    let mut pos = first.len();
    let rest: Vec<&str> = pieces.collect();

    if rest.is_empty() {
        return !anchored || pos == path.len();
    }

    for (i, piece) in rest.iter().enumerate() {
        let is_last = i == rest.len() - 1;
        if is_last && anchored {
            return path.len() >= pos + piece.len() && path.ends_with(piece);
        }
        match path[pos..].find(piece) {
            Some(found) => pos += found + piece.len(),
            None => return false,
        }
    }
    true
}

impl RobotsTxt {
    /// Parse robots.txt content. Unknown directives are ignored.
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current: Option<Group> = None;
        let mut saw_rule = false;

        for raw_line in content.lines() {
            let line = match raw_line.split_once('#') {
                Some((before, _)) => before,
                None => raw_line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_ascii_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    // Consecutive user-agent lines share one group.
                    if saw_rule || current.is_none() {
                        if let Some(group) = current.take() {
                            robots.groups.push(group);
                        }
                        current = Some(Group::default());
                        saw_rule = false;
                    }
                    // A blank agent opens a group that matches nobody.
                    if !value.is_empty() {
                        if let Some(group) = current.as_mut() {
                            group.agents.push(value.to_ascii_lowercase());
                        }
                    }
                }
                "allow" | "disallow" => {
                    saw_rule = true;
                    // An empty Disallow means "allow all" and adds no rule.
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(group) = current.as_mut() {
                        group.rules.push(Rule {
                            allow: directive == "allow",
                            pattern: value.to_string(),
                        });
                    }
                }
                "crawl-delay" => {
                    saw_rule = true;
                    if let (Some(group), Ok(delay)) = (current.as_mut(), value.parse::<f64>()) {
                        if delay.is_finite() && delay >= 0.0 {
                            group.crawl_delay = Some(delay);
                        }
                    }
                }
                "sitemap" => robots.sitemaps.push(value.to_string()),
                _ => {}
            }
        }

        if let Some(group) = current {
            robots.groups.push(group);
        }
        robots
    }

    /// The group that applies to `user_agent`: a product-token match, else `*`.
    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let ua = user_agent.to_ascii_lowercase();
        let token = ua.split(['/', ' ']).next().unwrap_or_default();

        self.groups
            .iter()
            .find(|g| {
                g.agents
                    .iter()
                    .any(|a| a != "*" && (a == token || ua.contains(a.as_str())))
            })
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
    }

    /// Check if a path (with optional query) is allowed for a user-agent.
    ///
    /// The most specific (longest) matching rule wins; `Allow` wins ties.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };
        if path == "/robots.txt" {
            return true;
        }

        group
            .rules
            .iter()
            .filter(|r| r.matches(path))
            .max_by(|a, b| {
                a.specificity()
                    .cmp(&b.specificity())
                    .then(a.allow.cmp(&b.allow))
            })
            .is_none_or(|r| r.allow)
    }

    /// Crawl delay requested for a user-agent, if any. [`RobotsGate`] hands
    /// it to the rate limiter when it exceeds the configured interval.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.group_for(user_agent)
            .and_then(|g| g.crawl_delay)
            .map(Duration::from_secs_f64)
    }

    /// Sitemaps listed in the file.
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

/// Per-origin robots cache. `None` records "no usable robots file".
type OriginSlot = Arc<OnceCell<Option<Arc<RobotsTxt>>>>;

/// Answers "may we fetch this URL?" with one robots.txt request per origin.
#[derive(Debug)]
pub struct RobotsGate {
    http: reqwest::Client,
    user_agent: String,
    limiter: Arc<DomainRateLimiter>,
    origins: Mutex<HashMap<String, OriginSlot>>,
}

impl RobotsGate {
    pub fn new(
        http: reqwest::Client,
        user_agent: impl Into<String>,
        limiter: Arc<DomainRateLimiter>,
    ) -> Self {
        Self {
            http,
            user_agent: user_agent.into(),
            limiter,
            origins: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `url` may be fetched. Fails open when robots data is unavailable.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn can_fetch(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        let slot = {
            let mut origins = self.origins.lock().await;
            origins.entry(origin.clone()).or_default().clone()
        };

        let robots = slot
            .get_or_init(|| self.load(origin.clone()))
            .await
            .clone();

        match robots {
            Some(robots) => {
                let mut path = url.path().to_string();
                if let Some(q) = url.query() {
                    path.push('?');
                    path.push_str(q);
                }
                let allowed = robots.is_allowed(&self.user_agent, &path);
                if !allowed {
                    debug!(%origin, %path, "Disallowed by robots.txt");
                }
                allowed
            }
            None => true,
        }
    }

    /// Fetch and parse `{origin}/robots.txt`; `None` on any failure.
    #[instrument(level = "debug", skip(self))]
    async fn load(&self, origin: String) -> Option<Arc<RobotsTxt>> {
        let robots_url = match Url::parse(&format!("{origin}/robots.txt")) {
            Ok(u) => u,
            Err(e) => {
                warn!(%origin, error = %e, "Cannot build robots.txt URL; allowing all");
                return None;
            }
        };

        self.limiter.wait_before_request(&robots_url).await;
        let response = match self.http.get(robots_url.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt unavailable; allowing all");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(url = %robots_url, status = %response.status(), "No robots.txt; allowing all");
            return None;
        }
        match response.text().await {
            Ok(body) => {
                let robots = RobotsTxt::parse(&body);
                debug!(url = %robots_url, groups = robots.groups.len(), "Parsed robots.txt");
                if let Some(delay) = robots.crawl_delay(&self.user_agent) {
                    self.limiter.apply_crawl_delay(&robots_url, delay);
                }
                Some(Arc::new(robots))
            }
            Err(e) => {
                warn!(url = %robots_url, error = %e, "Failed reading robots.txt; allowing all");
                None
            }
        }
    }
}
