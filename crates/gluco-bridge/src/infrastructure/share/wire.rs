//! Share web-service wire format.
//!
//! # Endpoints
//!
//! ```text
//! POST /ShareWebServices/Services/General/AuthenticatePublisherAccount
//!      {"accountName", "password", "applicationId"}      → "<account uuid>"
//! POST /ShareWebServices/Services/General/LoginPublisherAccountById
//!      {"accountId", "password", "applicationId"}        → "<session uuid>"
//! POST /ShareWebServices/Services/Publisher/ReadPublisherLatestGlucoseValues
//!      ?sessionId=..&minutes=10&maxCount=1               → [{"WT": "Date(ms)", "Value": 120, "Trend": "Flat"}]
//! ```
//!
//! Failures come back as a non-2xx status with a JSON body such as
//! `{"Code": "SessionIdNotFound", "Message": "..."}`.

use chrono::{DateTime, TimeZone, Utc};
use gluco_core::{GlucoseValue, Reading, Region, Trend};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const AUTHENTICATE_PATH: &str =
    "/ShareWebServices/Services/General/AuthenticatePublisherAccount";
pub const LOGIN_BY_ID_PATH: &str = "/ShareWebServices/Services/General/LoginPublisherAccountById";
pub const LATEST_GLUCOSE_PATH: &str =
    "/ShareWebServices/Services/Publisher/ReadPublisherLatestGlucoseValues";

/// Look-back window and count for the latest-value query.
pub const LATEST_WINDOW_MINUTES: u32 = 10;
pub const LATEST_MAX_COUNT: u32 = 1;

const APPLICATION_ID_DEFAULT: &str = "d89443d2-327c-4a6f-89e5-496bbb0317db";
const APPLICATION_ID_JP: &str = "d8665ade-9673-4e27-9ff6-92db4ce13d13";

/// Error codes that mean the session or the credentials are no good.
const AUTH_ERROR_CODES: &[&str] = &[
    "SessionIdNotFound",
    "SessionNotValid",
    "AccountPasswordInvalid",
    "AuthenticateAccountNotFound",
    "AuthenticatePasswordInvalid",
    "SSO_AuthenticateAccountNotFound",
    "SSO_AuthenticatePasswordInvalid",
    "SSO_AuthenticateMaxAttemptsExceeed",
];

/// Base URL of the Share deployment serving `region`.
pub fn base_url(region: Region) -> &'static str {
    match region {
        Region::Us => "https://share2.dexcom.com",
        Region::Ous => "https://shareous1.dexcom.com",
        Region::Jp => "https://share.dexcom.jp",
    }
}

/// Application id the deployment expects in login requests.
pub fn application_id(region: Region) -> &'static str {
    match region {
        Region::Us | Region::Ous => APPLICATION_ID_DEFAULT,
        Region::Jp => APPLICATION_ID_JP,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest<'a> {
    pub account_name: &'a str,
    pub password: &'a str,
    pub application_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginByIdRequest<'a> {
    pub account_id: &'a str,
    pub password: &'a str,
    pub application_id: &'a str,
}

/// One entry of the latest-values array.
#[derive(Debug, Deserialize)]
pub struct GlucoseEntry {
    #[serde(rename = "WT")]
    pub wt: String,
    #[serde(rename = "Value")]
    pub value: i64,
    #[serde(rename = "Trend", default)]
    pub trend: Option<WireTrend>,
}

/// Newer deployments send the trend by name, older ones by number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireTrend {
    Code(u8),
    Name(String),
}

impl WireTrend {
    pub fn to_trend(&self) -> Trend {
        match self {
            WireTrend::Code(c) => Trend::from_share_code(*c),
            WireTrend::Name(n) => Trend::from_share_name(n),
        }
    }
}

impl GlucoseEntry {
    /// Converts to a domain reading, or `None` if the timestamp is malformed.
    pub fn to_reading(&self) -> Option<Reading> {
        let timestamp = parse_share_date(&self.wt)?;
        let trend = self
            .trend
            .as_ref()
            .map(WireTrend::to_trend)
            .unwrap_or_default();
        Some(Reading::new(
            GlucoseValue::from_mg_dl(self.value),
            trend,
            timestamp,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "Code")]
    pub code: Option<String>,
    #[serde(rename = "Message")]
    pub message: Option<String>,
}

/// How a failed response should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    Auth(String),
    Transient(String),
}

/// Classifies a non-success response from its status and body.
pub fn classify_failure(status: u16, body: &str) -> FailureClass {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|b| b.code.clone());

    if let Some(code) = code.as_deref() {
        if AUTH_ERROR_CODES.contains(&code) {
            return FailureClass::Auth(code.to_string());
        }
    }
    if status == 401 || status == 403 {
        return FailureClass::Auth(code.unwrap_or_else(|| format!("HTTP {status}")));
    }

    let detail = match (code, parsed.and_then(|b| b.message)) {
        (Some(c), Some(m)) => format!("HTTP {status} {c}: {m}"),
        (Some(c), None) => format!("HTTP {status} {c}"),
        _ => format!("HTTP {status}"),
    };
    FailureClass::Transient(detail)
}

/// Result of reading a login response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginId {
    /// A usable account or session id.
    Id(String),
    /// The nil UUID, sent when a login is refused without an error status.
    Nil,
    /// Not a JSON string holding a UUID (proxy pages, truncated bodies).
    Unparseable,
}

/// Parses a login response: a JSON string holding a UUID.
pub fn parse_login_id(body: &str) -> LoginId {
    let Ok(raw) = serde_json::from_str::<String>(body) else {
        return LoginId::Unparseable;
    };
    match Uuid::parse_str(raw.trim()) {
        Ok(id) if id.is_nil() => LoginId::Nil,
        Ok(id) => LoginId::Id(id.to_string()),
        Err(_) => LoginId::Unparseable,
    }
}

/// Parses `Date(1700000000000)` or `Date(1700000000000-0400)`.
///
/// The millisecond count is already UTC; the offset suffix only describes
/// the uploader's local zone and is ignored.
pub fn parse_share_date(raw: &str) -> Option<DateTime<Utc>> {
    let inner = raw.trim().strip_prefix("Date(")?.strip_suffix(')')?;
    let digits_end = inner
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
        .map(|(i, _)| i)
        .unwrap_or(inner.len());
    let millis: i64 = inner[..digits_end].parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_hosts() {
        assert_eq!(base_url(Region::Us), "https://share2.dexcom.com");
        assert_eq!(base_url(Region::Ous), "https://shareous1.dexcom.com");
        assert_eq!(base_url(Region::Jp), "https://share.dexcom.jp");
        assert_ne!(application_id(Region::Jp), application_id(Region::Us));
    }

    #[test]
    fn test_parse_share_date_with_and_without_offset() {
        let plain = parse_share_date("Date(1700000000000)").unwrap();
        let offset = parse_share_date("Date(1700000000000-0400)").unwrap();
        let plus = parse_share_date("Date(1700000000000+0100)").unwrap();
        assert_eq!(plain.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(plain, offset);
        assert_eq!(plain, plus);
    }

    #[test]
    fn test_parse_share_date_rejects_garbage() {
        assert!(parse_share_date("2023-11-14T22:13:20Z").is_none());
        assert!(parse_share_date("Date()").is_none());
        assert!(parse_share_date("Date(abc)").is_none());
    }

    #[test]
    fn test_entry_with_named_trend() {
        // Arrange
        let json = r#"[{"WT":"Date(1700000000000)","ST":"Date(1700000000000)","DT":"Date(1700000000000-0500)","Value":142,"Trend":"FortyFiveUp"}]"#;

        // Act
        let entries: Vec<GlucoseEntry> = serde_json::from_str(json).unwrap();
        let reading = entries[0].to_reading().unwrap();

        // Assert
        assert_eq!(reading.value, GlucoseValue::MgDl(142));
        assert_eq!(reading.trend, Trend::RisingSlow);
    }

    #[test]
    fn test_entry_with_numeric_trend_and_out_of_range_value() {
        let json = r#"{"WT":"Date(1700000000000)","Value":39,"Trend":7}"#;
        let entry: GlucoseEntry = serde_json::from_str(json).unwrap();
        let reading = entry.to_reading().unwrap();
        assert_eq!(reading.value, GlucoseValue::Low);
        assert_eq!(reading.trend, Trend::DoubleDown);
    }

    #[test]
    fn test_entry_without_trend_is_unknown() {
        let json = r#"{"WT":"Date(1700000000000)","Value":100}"#;
        let entry: GlucoseEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.to_reading().unwrap().trend, Trend::Unknown);
    }

    #[test]
    fn test_classify_auth_codes_regardless_of_status() {
        let body = r#"{"Code":"SessionIdNotFound","Message":"Session ID not found"}"#;
        assert_eq!(
            classify_failure(500, body),
            FailureClass::Auth("SessionIdNotFound".into())
        );
    }

    #[test]
    fn test_classify_401_without_body_is_auth() {
        assert_eq!(classify_failure(401, ""), FailureClass::Auth("HTTP 401".into()));
    }

    #[test]
    fn test_classify_server_errors_and_throttling_as_transient() {
        assert!(matches!(classify_failure(503, "oops"), FailureClass::Transient(_)));
        assert!(matches!(classify_failure(429, ""), FailureClass::Transient(_)));
        assert_eq!(
            classify_failure(500, r#"{"Code":"InternalError"}"#),
            FailureClass::Transient("HTTP 500 InternalError".into())
        );
    }

    #[test]
    fn test_parse_login_id() {
        assert_eq!(
            parse_login_id("\"a3c1e2f4-1111-2222-3333-444455556666\""),
            LoginId::Id("a3c1e2f4-1111-2222-3333-444455556666".to_string())
        );
        assert_eq!(
            parse_login_id("\"00000000-0000-0000-0000-000000000000\""),
            LoginId::Nil
        );
    }

    #[test]
    fn test_parse_login_id_unreadable_bodies() {
        assert_eq!(parse_login_id("not json"), LoginId::Unparseable);
        assert_eq!(parse_login_id("<html>sign in to Wi-Fi</html>"), LoginId::Unparseable);
        assert_eq!(parse_login_id("\"a3c1e2f4-1111"), LoginId::Unparseable);
        assert_eq!(parse_login_id("\"not-a-uuid\""), LoginId::Unparseable);
    }
}
