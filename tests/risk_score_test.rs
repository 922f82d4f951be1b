use emerald_moderator::message::LinkEntity;
use emerald_moderator::risk::{domain_score, extract_domains, risk_score};

#[test]
fn test_extracts_plain_and_schemed_hosts() {
    let domains = extract_domains(
        "see https://www.Example.com/page and docs.rs, also t.me/channel",
        &[],
    );
    let domains: Vec<&str> = domains.iter().map(String::as_str).collect();
    assert_eq!(domains, vec!["docs.rs", "example.com", "t.me"]);
}

#[test]
fn test_url_paths_are_not_domains() {
    let domains = extract_domains("docs at https://example.com/guide/index.html", &[]);
    assert_eq!(domains.into_iter().collect::<Vec<_>>(), vec!["example.com".to_string()]);
}

#[test]
fn test_file_names_are_not_domains() {
    assert!(extract_domains("I attached report.pdf and notes.txt", &[]).is_empty());
    assert!(extract_domains("see main.js or setup.py", &[]).is_empty());
    // with a scheme any alphabetic TLD counts
    assert!(extract_domains("https://update.example.zip", &[]).contains("update.example.zip"));
}

#[test]
fn test_hidden_link_targets_are_included() {
    let entities = vec![
        LinkEntity {
            visible: "our website".to_string(),
            url: "https://free-gift-claim.xyz/now".to_string(),
        },
        LinkEntity {
            visible: "https://example.com".to_string(),
            url: "https://example.com".to_string(),
        },
    ];
    let domains = extract_domains("click our website", &entities);
    assert!(domains.contains("free-gift-claim.xyz"));
    assert!(!domains.contains("example.com"));
}

#[test]
fn test_no_domains_means_zero_risk() {
    let domains = extract_domains("just a normal sentence. nothing here", &[]);
    assert!(domains.is_empty());
    assert_eq!(risk_score(&domains), 0.0);
}

#[test]
fn test_risk_blends_mean_and_max() {
    let domains = extract_domains("example.com my-crypto-wallet-verify.top", &[]);
    let score = risk_score(&domains);
    // mean 0.5, max 1.0
    assert!((score - 0.65).abs() < 1e-9);
}

#[test]
fn test_scores_are_bounded() {
    for domain in [
        "a.tk",
        "free-crypto-wallet-login-verify-bonus-airdrop.click",
        "example.org",
    ] {
        let score = domain_score(domain);
        assert!((0.0..=1.0).contains(&score), "{} scored {}", domain, score);
    }
    let benign = extract_domains("rust-lang.org github.com", &[]);
    assert!(risk_score(&benign) < 0.6);
}

#[test]
fn test_suspicious_tld_scores_higher() {
    assert!(domain_score("shop-example.xyz") > domain_score("shop-example.com"));
    assert!(domain_score("weather.top") > domain_score("weather.org"));
}
