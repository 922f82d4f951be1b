//! Domain extraction and heuristic link risk.
//!
//! The score is a cheap best-effort signal compared against thresholds, not a
//! reputation lookup.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::message::LinkEntity;

/// A whole dotted hostname with an alphabetic TLD.
static HOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)+[a-z]{2,24}$")
        .expect("host regex is valid")
});

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9+.\-]*$").expect("scheme regex is valid"));

/// Generic TLDs accepted for hosts written without a scheme. Two-letter country
/// codes are accepted too, minus [`FILE_EXTENSIONS`].
pub const BARE_HOST_TLDS: &[&str] = &[
    "com", "net", "org", "info", "biz", "edu", "gov", "mil", "int", "app", "dev", "xyz", "top",
    "click", "link", "work", "site", "online", "store", "shop", "live", "pro", "tech", "club",
    "space", "fun", "icu", "cam", "rest", "buzz", "country", "loan", "win", "bid", "blog", "news",
    "cloud", "page", "digital", "email", "group", "media", "network", "world", "today", "money",
    "finance", "games", "bet", "casino", "vip", "best", "life", "one", "asia", "mobi", "name",
];

/// Two-letter endings that are far more often file names than country hosts.
pub const FILE_EXTENSIONS: &[&str] = &["js", "ts", "py", "md", "gz", "db"];

pub const SUSPICIOUS_TLDS: &[&str] = &[
    "xyz", "top", "click", "link", "work", "gq", "ml", "cf", "tk", "ga", "zip", "mov", "loan",
    "win", "bid", "icu", "cam", "rest", "buzz", "country",
];

pub const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "crypto", "wallet", "verify", "airdrop", "bonus", "login", "secure", "account", "giveaway",
    "claim", "gift", "nft", "invest", "free",
];

const TLD_WEIGHT: f64 = 0.3;
const KEYWORD_WEIGHT: f64 = 0.2;
const SHORT_NAME_WEIGHT: f64 = 0.1;
const LONG_DOMAIN_WEIGHT: f64 = 0.1;
const HYPHEN_WEIGHT: f64 = 0.15;

/// Host of one whitespace-separated token, or `None` when the token is not a link.
fn host_of(token: &str) -> Option<String> {
    let token = token
        .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_lowercase();
    let (rest, schemed) = match token.split_once("://") {
        Some((scheme, rest)) if SCHEME_RE.is_match(scheme) => (rest, true),
        Some(_) => return None,
        None => (token.as_str(), false),
    };

    let authority = rest.split(|c: char| matches!(c, '/' | '?' | '#')).next().unwrap_or("");
    if !schemed && authority.contains('@') {
        // e-mail address
        return None;
    }
    let authority = authority.rsplit('@').next().unwrap_or("");
    let host = authority.split(':').next().unwrap_or("");
    let host = host.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    let host = host.strip_prefix("www.").unwrap_or(host);
    if !host.contains('.') || !HOST_RE.is_match(host) {
        return None;
    }

    let tld = host.rsplit('.').next().unwrap_or("");
    let bare_ok = if tld.len() == 2 {
        !FILE_EXTENSIONS.contains(&tld)
    } else {
        BARE_HOST_TLDS.contains(&tld)
    };
    if schemed || bare_ok {
        Some(host.to_string())
    } else {
        None
    }
}

fn hosts_in(text: &str, out: &mut BTreeSet<String>) {
    out.extend(text.split_whitespace().filter_map(host_of));
}

/// Lower-cased, deduplicated hostnames from the text and from hidden links.
pub fn extract_domains(text: &str, entities: &[LinkEntity]) -> BTreeSet<String> {
    let mut domains = BTreeSet::new();
    hosts_in(text, &mut domains);
    for entity in entities {
        if entity.visible.trim() != entity.url.trim() {
            hosts_in(&entity.url, &mut domains);
        }
    }
    domains
}

/// Heuristic risk of a single domain in `[0, 1]`.
pub fn domain_score(domain: &str) -> f64 {
    let domain = domain.to_lowercase();
    let labels: Vec<&str> = domain.split('.').collect();
    let tld = labels.last().copied().unwrap_or("");
    let name = if labels.len() >= 2 {
        labels[labels.len() - 2]
    } else {
        domain.as_str()
    };

    let mut score = 0.0;
    if SUSPICIOUS_TLDS.contains(&tld) {
        score += TLD_WEIGHT;
    }
    for keyword in SUSPICIOUS_KEYWORDS {
        if domain.contains(keyword) {
            score += KEYWORD_WEIGHT;
        }
    }
    if name.len() < 4 {
        score += SHORT_NAME_WEIGHT;
    }
    if domain.len() > 30 {
        score += LONG_DOMAIN_WEIGHT;
    }
    if domain.matches('-').count() > 2 {
        score += HYPHEN_WEIGHT;
    }
    score.min(1.0)
}

/// `0.7 * mean + 0.3 * max` over per-domain scores; `0.0` for no domains.
pub fn risk_score<'a, I>(domains: I) -> f64
where
    I: IntoIterator<Item = &'a String>,
{
    let scores: Vec<f64> = domains.into_iter().map(|d| domain_score(d)).collect();
    if scores.is_empty() {
        return 0.0;
    }
    let avg = scores.iter().sum::<f64>() / scores.len() as f64;
    let max = scores.iter().cloned().fold(0.0, f64::max);
    (0.7 * avg + 0.3 * max).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_score_components() {
        assert_eq!(domain_score("example.com"), 0.0);
        assert!((domain_score("example.xyz") - 0.3).abs() < 1e-9);
        assert!((domain_score("abc.com") - 0.1).abs() < 1e-9);
        assert!((domain_score("my-crypto-wallet-verify.top") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_host_of_stops_at_path_and_port() {
        assert_eq!(
            host_of("https://user@Example.com:8443/a/index.html?q=1"),
            Some("example.com".to_string())
        );
        assert_eq!(host_of("(www.example.org/path),"), Some("example.org".to_string()));
        assert_eq!(host_of("javascript:alert(1)"), None);
        assert_eq!(host_of("app.js"), None);
        assert_eq!(host_of("https://files.example.zip/x"), Some("files.example.zip".to_string()));
    }

    #[test]
    fn test_email_domains_are_ignored() {
        let domains = extract_domains("write to admin@mail.example.org please", &[]);
        assert!(domains.is_empty());
    }
}
