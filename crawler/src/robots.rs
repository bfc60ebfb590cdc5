use anyhow::Result;
use parking_lot::RwLock;
use reqwest::{header, Client, Url};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Robots {
    pub allows: Vec<String>,
    pub disallows: Vec<String>,
    pub crawl_delay_ms: Option<u64>,
}

pub type RobotsCache = Arc<RwLock<HashMap<String, Robots>>>;

pub fn parse_robots(txt: &str) -> Robots {
    // minimal parser for the '*' group
    let mut active = false;
    let mut allows = Vec::new();
    let mut disallows = Vec::new();
    let mut crawl_delay_ms: Option<u64> = None;
    for line in txt.lines() {
        let l = line.trim();
        if l.is_empty() || l.starts_with('#') { continue; }
        if let Some((k, v)) = l.split_once(':') {
            let key = k.trim().to_lowercase();
            let val = v.trim();
            match key.as_str() {
                "user-agent" => { active = val == "*"; }
                "allow" if active => allows.push(val.to_string()),
                "disallow" if active && !val.is_empty() => disallows.push(val.to_string()),
                "crawl-delay" if active => {
                    if let Ok(n) = val.parse::<f64>() { crawl_delay_ms = Some((n * 1000.0) as u64); }
                }
                _ => {}
            }
        }
    }
    Robots { allows, disallows, crawl_delay_ms }
}

pub async fn allowed(client: &Client, cache: &RobotsCache, url: &Url, ua: &str) -> Result<bool> {
    let host = match url.host_str() { Some(h) => h.to_string(), None => return Ok(false) };
    let rules_opt = { let c = cache.read(); c.get(&host).cloned() };
    let rules = if let Some(r) = rules_opt { r } else {
        let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);
        let txt = match client
            .get(&robots_url)
            .header(header::USER_AGENT, ua)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            _ => String::new(),
        };
        let parsed = parse_robots(&txt);
        { let mut c = cache.write(); c.insert(host.clone(), parsed.clone()); }
        tracing::debug!(host, disallows = parsed.disallows.len(), "robots.txt cached");
        parsed
    };
    Ok(path_allowed(url.path(), &rules))
}

pub fn robots_delay(cache: &RobotsCache, url: &Url) -> Option<u64> {
    let host = url.host_str()?;
    cache.read().get(host).and_then(|r| r.crawl_delay_ms)
}

pub fn path_allowed(path: &str, rules: &Robots) -> bool {
    // longest matching Allow vs Disallow wins
    let best_allow = rules.allows.iter().filter(|a| path.starts_with(a.as_str())).map(String::len).max();
    let best_dis = rules.disallows.iter().filter(|d| path.starts_with(d.as_str())).map(String::len).max();
    match (best_allow, best_dis) {
        (Some(a), Some(d)) => a >= d,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXT: &str = "# comment\nUser-agent: googlebot\nDisallow: /\n\nUser-agent: *\nDisallow: /private\nAllow: /private/open\nDisallow:\nCrawl-delay: 1.5\n";

    #[test]
    fn parses_star_group_only() {
        let rules = parse_robots(TXT);
        assert_eq!(rules.disallows, ["/private"]);
        assert_eq!(rules.allows, ["/private/open"]);
        assert_eq!(rules.crawl_delay_ms, Some(1500));
    }

    #[test]
    fn longest_rule_wins() {
        let rules = parse_robots(TXT);
        assert!(path_allowed("/index.html", &rules));
        assert!(!path_allowed("/private/secret.html", &rules));
        assert!(path_allowed("/private/open/page.html", &rules));
    }

    #[test]
    fn empty_robots_allows_everything() {
        assert!(path_allowed("/anything", &parse_robots("")));
    }
}
