//! Input and output records for a scrape pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One store location from the site list.
///
/// Only the postal code and city are interpreted; every other field rides
/// along in `extra` and is passed through to the result record unchanged.
/// The postal code is the identity key for deduplication: two locations
/// sharing a code share one cached search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "zip", alias = "postalCode")]
    pub postal_code: String,
    pub city: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Per-location availability report, one per input location, in input order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResult {
    pub name: String,
    pub has_availability: bool,
    /// Display fragment of the raw site answer, outer quotes stripped.
    pub extra_data: String,
    pub sign_up_link: String,
    #[serde(flatten)]
    pub location: Location,
    /// Taken at result-construction time, not at query time.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_accepts_zip_and_postal_code_spellings() {
        let a: Location = serde_json::from_str(r#"{"zip":"04101","city":"Portland"}"#).unwrap();
        let b: Location =
            serde_json::from_str(r#"{"postalCode":"04101","city":"Portland"}"#).unwrap();
        assert_eq!(a.postal_code, "04101");
        assert_eq!(a, b);
    }

    #[test]
    fn location_passes_unknown_fields_through() {
        let loc: Location = serde_json::from_str(
            r#"{"zip":"04101","city":"Portland","street":"295 Forest Ave","massVax":true}"#,
        )
        .unwrap();
        assert_eq!(loc.extra["street"], "295 Forest Ave");
        assert_eq!(loc.extra["massVax"], true);

        let out = serde_json::to_value(&loc).unwrap();
        assert_eq!(out["zip"], "04101");
        assert_eq!(out["street"], "295 Forest Ave");
    }

    #[test]
    fn result_serializes_with_feed_field_names() {
        let loc: Location = serde_json::from_str(r#"{"zip":"04102","city":"Westbrook"}"#).unwrap();
        let result = AvailabilityResult {
            name: "Hannaford (Westbrook)".into(),
            has_availability: true,
            extra_data: "slots open".into(),
            sign_up_link: "https://example.com".into(),
            location: loc,
            timestamp: Utc::now(),
        };
        let out = serde_json::to_value(&result).unwrap();
        assert_eq!(out["hasAvailability"], true);
        assert_eq!(out["extraData"], "slots open");
        assert_eq!(out["signUpLink"], "https://example.com");
        assert_eq!(out["zip"], "04102");
        assert_eq!(out["city"], "Westbrook");
    }
}
