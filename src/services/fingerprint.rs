//! Device fingerprinting: canonical hashing, signal normalization and
//! probabilistic match scoring.
//!
//! The hash is SHA-256 over the UTF-8 bytes of the `|`-joined signals in a
//! fixed order (missing components contribute an empty string). Scoring
//! weights sum to exactly 100; a component scores zero when either side is
//! missing its signal.

use sha2::{Digest, Sha256};

use crate::storage::FingerprintSignals;

pub const WEIGHT_IP: u8 = 40;
pub const WEIGHT_USER_AGENT: u8 = 30;
pub const WEIGHT_TIMEZONE: u8 = 10;
pub const WEIGHT_LANGUAGE: u8 = 10;
pub const WEIGHT_SCREEN: u8 = 10;

/// Minimum score an attribution candidate must reach.
pub const CONFIDENCE_THRESHOLD: u8 = 70;

const UA_PLATFORM_TOKENS: &[&str] = &[
    "iPhone",
    "iPad",
    "Android",
    "Windows",
    "Macintosh",
    "Linux",
];

const UA_BROWSER_TOKENS: &[&str] = &["Chrome", "Safari", "Firefox", "Edge", "Opera"];

/// Canonical signal string: `ip|ua|tz|lang|sw|sh|platform|platform_version`.
pub fn canonical_signal_string(signals: &FingerprintSignals) -> String {
    let width = signals
        .screen_width
        .map(|w| w.to_string())
        .unwrap_or_default();
    let height = signals
        .screen_height
        .map(|h| h.to_string())
        .unwrap_or_default();

    [
        signals.ip_address.as_deref().unwrap_or(""),
        signals.user_agent.as_deref().unwrap_or(""),
        signals.timezone.as_deref().unwrap_or(""),
        signals.language.as_deref().unwrap_or(""),
        width.as_str(),
        height.as_str(),
        signals.platform.as_deref().unwrap_or(""),
        signals.platform_version.as_deref().unwrap_or(""),
    ]
    .join("|")
}

/// Hex-encoded SHA-256 of the canonical signal string.
pub fn fingerprint_hash(signals: &FingerprintSignals) -> String {
    let canonical = canonical_signal_string(signals);
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

/// Normalize an IP for matching: IPv4 keeps the first three octets, IPv6
/// the first four groups; anything else passes through unchanged.
pub fn normalize_ip(ip: &str) -> String {
    if ip.contains('.') && !ip.contains(':') {
        let octets: Vec<&str> = ip.split('.').collect();
        if octets.len() == 4 {
            return octets[..3].join(".");
        }
    } else if ip.contains(':') {
        let groups: Vec<&str> = ip.split(':').collect();
        if groups.len() > 4 {
            return groups[..4].join(":");
        }
    }
    ip.to_string()
}

/// Normalize a User-Agent for matching: `{platform}|{browser}` lowercased,
/// where each token is the first match from a fixed list (empty if none).
pub fn normalize_user_agent(user_agent: &str) -> String {
    let platform = UA_PLATFORM_TOKENS
        .iter()
        .find(|t| user_agent.contains(*t))
        .copied()
        .unwrap_or("");
    let browser = UA_BROWSER_TOKENS
        .iter()
        .find(|t| user_agent.contains(*t))
        .copied()
        .unwrap_or("");
    format!("{}|{}", platform, browser).to_lowercase()
}

/// Scored comparison of two signal bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchScore {
    pub score: u8,
    pub matched_factors: Vec<&'static str>,
}

impl MatchScore {
    pub fn meets_threshold(&self) -> bool {
        self.score >= CONFIDENCE_THRESHOLD
    }
}

/// Score a stored click fingerprint against install-reported signals.
pub fn score_signals(click: &FingerprintSignals, install: &FingerprintSignals) -> MatchScore {
    let mut score = 0u8;
    let mut matched_factors = Vec::new();

    if let (Some(a), Some(b)) = (&click.ip_address, &install.ip_address) {
        if normalize_ip(a) == normalize_ip(b) {
            score += WEIGHT_IP;
            matched_factors.push("ip");
        }
    }

    if let (Some(a), Some(b)) = (&click.user_agent, &install.user_agent) {
        if normalize_user_agent(a) == normalize_user_agent(b) {
            score += WEIGHT_USER_AGENT;
            matched_factors.push("user_agent");
        }
    }

    if let (Some(a), Some(b)) = (&click.timezone, &install.timezone) {
        if a == b {
            score += WEIGHT_TIMEZONE;
            matched_factors.push("timezone");
        }
    }

    if let (Some(a), Some(b)) = (&click.language, &install.language) {
        if primary_language(a) == primary_language(b) {
            score += WEIGHT_LANGUAGE;
            matched_factors.push("language");
        }
    }

    if let (Some(w1), Some(h1), Some(w2), Some(h2)) = (
        click.screen_width,
        click.screen_height,
        install.screen_width,
        install.screen_height,
    ) {
        if w1 == w2 && h1 == h2 {
            score += WEIGHT_SCREEN;
            matched_factors.push("screen");
        }
    }

    MatchScore {
        score,
        matched_factors,
    }
}

/// First two characters, lowercased (`en-US` -> `en`).
fn primary_language(lang: &str) -> String {
    lang.chars().take(2).collect::<String>().to_lowercase()
}
