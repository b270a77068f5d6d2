//! GeoIP lookup.
//!
//! Queries an external HTTP API (ip-api.com format by default) for the full
//! geo tuple. Private and loopback addresses are never sent out. Country
//! names come from a small static table keyed by ISO code, falling back to
//! the code itself for codes outside the table.

use std::net::IpAddr;
use std::time::Duration;

use tracing::{trace, warn};

use crate::config::GeoIpConfig;
use crate::storage::GeoLocation;
use crate::utils::ip::is_private_or_local;

/// Country display names for common ISO 3166-1 alpha-2 codes.
const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("AR", "Argentina"),
    ("AT", "Austria"),
    ("AU", "Australia"),
    ("BE", "Belgium"),
    ("BR", "Brazil"),
    ("CA", "Canada"),
    ("CH", "Switzerland"),
    ("CL", "Chile"),
    ("CN", "China"),
    ("CO", "Colombia"),
    ("CZ", "Czechia"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("EG", "Egypt"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("GR", "Greece"),
    ("HK", "Hong Kong"),
    ("ID", "Indonesia"),
    ("IE", "Ireland"),
    ("IL", "Israel"),
    ("IN", "India"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KR", "South Korea"),
    ("MX", "Mexico"),
    ("MY", "Malaysia"),
    ("NG", "Nigeria"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("NZ", "New Zealand"),
    ("PH", "Philippines"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("RU", "Russia"),
    ("SA", "Saudi Arabia"),
    ("SE", "Sweden"),
    ("SG", "Singapore"),
    ("TH", "Thailand"),
    ("TR", "Turkey"),
    ("TW", "Taiwan"),
    ("UA", "Ukraine"),
    ("US", "United States"),
    ("VN", "Vietnam"),
    ("ZA", "South Africa"),
];

/// Display name for an ISO country code; the code itself if unknown.
pub fn country_name_for_code(code: &str) -> String {
    let upper = code.to_ascii_uppercase();
    COUNTRY_NAMES
        .iter()
        .find(|(c, _)| *c == upper)
        .map(|(_, name)| name.to_string())
        .unwrap_or(upper)
}

/// External-API geo provider.
pub struct GeoIpProvider {
    client: reqwest::Client,
    api_url_template: String,
    enabled: bool,
}

impl GeoIpProvider {
    /// Build from config. `api_url` uses `{ip}` as placeholder.
    pub fn new(config: &GeoIpConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url_template: config.api_url.clone(),
            enabled: config.enabled,
        }
    }

    /// Look up the geo tuple for an IP. Returns an empty tuple for private
    /// addresses, unparseable input, disabled lookup, or upstream failure.
    pub async fn lookup(&self, ip: &str) -> GeoLocation {
        if !self.enabled {
            return GeoLocation::default();
        }

        match ip.parse::<IpAddr>() {
            Ok(addr) if is_private_or_local(&addr) => {
                trace!("Skipping GeoIP lookup for private/local IP: {}", ip);
                return GeoLocation::default();
            }
            Ok(_) => {}
            Err(_) => {
                trace!("Skipping GeoIP lookup for unparseable IP: {}", ip);
                return GeoLocation::default();
            }
        }

        let url = self.api_url_template.replace("{ip}", ip);

        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("GeoIP request failed for {}: {}", ip, e);
                return GeoLocation::default();
            }
        };

        let json: serde_json::Value = match resp.json().await {
            Ok(j) => j,
            Err(e) => {
                warn!("GeoIP response parse failed for {}: {}", ip, e);
                return GeoLocation::default();
            }
        };

        Self::location_from_json(&json)
    }

    /// Map an ip-api.com style response to the geo tuple. Common alternate
    /// field names are also accepted.
    fn location_from_json(json: &serde_json::Value) -> GeoLocation {
        if json["status"].as_str() == Some("fail") {
            return GeoLocation::default();
        }

        let country_code = json["countryCode"]
            .as_str()
            .or_else(|| json["country_code"].as_str())
            .map(|c| c.to_ascii_uppercase());

        GeoLocation {
            country_name: country_code.as_deref().map(country_name_for_code),
            country_code,
            region: json["regionName"]
                .as_str()
                .or_else(|| json["region"].as_str())
                .map(String::from),
            city: json["city"].as_str().map(String::from),
            latitude: json["lat"].as_f64().or_else(|| json["latitude"].as_f64()),
            longitude: json["lon"].as_f64().or_else(|| json["longitude"].as_f64()),
            timezone: json["timezone"].as_str().map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_country_codes_resolve_to_names() {
        assert_eq!(country_name_for_code("US"), "United States");
        assert_eq!(country_name_for_code("de"), "Germany");
        assert_eq!(country_name_for_code("JP"), "Japan");
    }

    #[test]
    fn unknown_codes_fall_back_to_the_code() {
        assert_eq!(country_name_for_code("XX"), "XX");
        assert_eq!(country_name_for_code("zz"), "ZZ");
    }

    #[test]
    fn location_from_ip_api_response() {
        let json = serde_json::json!({
            "status": "success",
            "countryCode": "US",
            "regionName": "Virginia",
            "city": "Ashburn",
            "lat": 39.03,
            "lon": -77.5,
            "timezone": "America/New_York"
        });

        let geo = GeoIpProvider::location_from_json(&json);
        assert_eq!(geo.country_code.as_deref(), Some("US"));
        assert_eq!(geo.country_name.as_deref(), Some("United States"));
        assert_eq!(geo.region.as_deref(), Some("Virginia"));
        assert_eq!(geo.city.as_deref(), Some("Ashburn"));
        assert_eq!(geo.timezone.as_deref(), Some("America/New_York"));
        assert_eq!(geo.latitude, Some(39.03));
    }

    #[test]
    fn failed_status_yields_empty_tuple() {
        let json = serde_json::json!({"status": "fail", "message": "private range"});
        let geo = GeoIpProvider::location_from_json(&json);
        assert!(geo.country_code.is_none());
    }

    #[tokio::test]
    async fn private_ips_are_not_looked_up() {
        let provider = GeoIpProvider::new(&crate::config::GeoIpConfig {
            enabled: true,
            // Would fail loudly if contacted
            api_url: "http://127.0.0.1:1/json/{ip}".into(),
            timeout_ms: 100,
        });

        let geo = provider.lookup("192.168.1.10").await;
        assert!(geo.country_code.is_none());
    }
}
