//! User-Agent classification.
//!
//! Two separate concerns live here:
//! - the routing device class (`ios` / `android` / `web`) derived by
//!   substring matching, which drives destination selection and targeting;
//! - descriptive platform/browser names parsed with woothee, which only
//!   annotate click rows and fingerprints.

use woothee::parser::Parser;

use crate::storage::DeviceClass;

/// In-app browser UA markers: embedded web views that do not honor
/// Universal Links (Gmail/GSA, Facebook, Instagram, Twitter, LinkedIn,
/// WeChat, Outlook, Yahoo Mail).
const IN_APP_BROWSER_MARKERS: &[&str] = &[
    "gsa",
    "gmail",
    "fban",
    "fbav",
    "instagram",
    "twitter",
    "linkedin",
    "micromessenger",
    "outlook",
    "yahoomail",
];

/// Social / preview scraper UA markers. Scrapers get OG HTML and no click.
const SCRAPER_MARKERS: &[&str] = &[
    "facebookexternalhit",
    "facebot",
    "twitterbot",
    "linkedinbot",
    "slackbot",
    "discordbot",
    "telegrambot",
    "whatsapp",
    "pinterestbot",
    "skypeuripreview",
    "googlebot",
    "bingbot",
    "ia_archiver",
];

/// Descriptive UA parse result (annotations only, never routing).
#[derive(Debug, Clone, Default)]
pub struct ParsedAgent {
    pub platform: Option<String>,
    pub platform_version: Option<String>,
    pub browser: Option<String>,
}

/// Derive the routing device class from a User-Agent.
pub fn detect_device_class(user_agent: &str) -> DeviceClass {
    let ua = user_agent.to_lowercase();
    if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        DeviceClass::Ios
    } else if ua.contains("android") {
        DeviceClass::Android
    } else {
        DeviceClass::Web
    }
}

/// Whether the UA is an embedded in-app browser.
pub fn is_in_app_browser(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    IN_APP_BROWSER_MARKERS.iter().any(|m| ua.contains(m))
}

/// Whether the UA is a link-preview scraper.
pub fn is_social_scraper(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    SCRAPER_MARKERS.iter().any(|m| ua.contains(m))
}

/// Parse descriptive platform/browser fields from a User-Agent.
///
/// The platform name is normalized to the device-class taxonomy's names
/// (`iOS` / `Android`) for mobile classes so click rows and SDK-reported
/// signals compare equal; desktop UAs keep woothee's OS name.
pub fn parse_user_agent(user_agent: &str) -> ParsedAgent {
    let parser = Parser::new();
    let result = match parser.parse(user_agent) {
        Some(r) => r,
        None => {
            return ParsedAgent {
                platform: match detect_device_class(user_agent) {
                    DeviceClass::Ios => Some("iOS".to_string()),
                    DeviceClass::Android => Some("Android".to_string()),
                    DeviceClass::Web => None,
                },
                platform_version: None,
                browser: None,
            }
        }
    };

    let platform = match detect_device_class(user_agent) {
        DeviceClass::Ios => Some("iOS".to_string()),
        DeviceClass::Android => Some("Android".to_string()),
        DeviceClass::Web => {
            if result.os != "UNKNOWN" && !result.os.is_empty() {
                Some(result.os.to_string())
            } else {
                None
            }
        }
    };

    let platform_version = if result.os_version.is_empty() || result.os_version == "UNKNOWN" {
        None
    } else {
        Some(result.os_version.to_string())
    };

    let browser = if result.name != "UNKNOWN" && !result.name.is_empty() {
        Some(result.name.to_string())
    } else {
        None
    };

    ParsedAgent {
        platform,
        platform_version,
        browser,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
    const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    #[test]
    fn device_class_from_ua_substrings() {
        assert_eq!(detect_device_class(IPHONE_UA), DeviceClass::Ios);
        assert_eq!(detect_device_class("something iPad something"), DeviceClass::Ios);
        assert_eq!(detect_device_class(ANDROID_UA), DeviceClass::Android);
        assert_eq!(detect_device_class(DESKTOP_UA), DeviceClass::Web);
        assert_eq!(detect_device_class(""), DeviceClass::Web);
    }

    #[test]
    fn device_class_matching_is_case_insensitive() {
        assert_eq!(detect_device_class("IPHONE"), DeviceClass::Ios);
        assert_eq!(detect_device_class("ANDROID"), DeviceClass::Android);
    }

    #[test]
    fn in_app_browser_detection() {
        assert!(is_in_app_browser(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) GSA/295.0.598539858 Mobile/15E148 Safari/604.1"
        ));
        assert!(is_in_app_browser("... [FBAN/FBIOS;FBAV/400.0.0;] ..."));
        assert!(is_in_app_browser("Mozilla/5.0 ... Instagram 310.0.0.0"));
        assert!(is_in_app_browser("... MicroMessenger/8.0.44 ..."));
        assert!(!is_in_app_browser(IPHONE_UA));
    }

    #[test]
    fn scraper_detection() {
        assert!(is_social_scraper(
            "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)"
        ));
        assert!(is_social_scraper("Twitterbot/1.0"));
        assert!(is_social_scraper(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
        ));
        assert!(is_social_scraper("WhatsApp/2.23.20.0"));
        assert!(!is_social_scraper(IPHONE_UA));
        assert!(!is_social_scraper(DESKTOP_UA));
    }

    #[test]
    fn parse_iphone_ua() {
        let parsed = parse_user_agent(IPHONE_UA);
        assert_eq!(parsed.platform.as_deref(), Some("iOS"));
        assert_eq!(parsed.browser.as_deref(), Some("Safari"));
        assert!(parsed.platform_version.is_some());
    }

    #[test]
    fn parse_android_ua() {
        let parsed = parse_user_agent(ANDROID_UA);
        assert_eq!(parsed.platform.as_deref(), Some("Android"));
        assert_eq!(parsed.browser.as_deref(), Some("Chrome"));
    }

    #[test]
    fn parse_desktop_ua_keeps_os_name() {
        let parsed = parse_user_agent(DESKTOP_UA);
        assert_eq!(parsed.platform.as_deref(), Some("Windows 10"));
        assert_eq!(parsed.browser.as_deref(), Some("Chrome"));
    }

    #[test]
    fn parse_garbage_ua() {
        let parsed = parse_user_agent("not a real user agent");
        assert!(parsed.platform.is_none());
    }
}
