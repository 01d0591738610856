//! Verification payload handling.
//!
//! The e-KYC provider returns the subject's demographic profile as a JSON
//! object whose field names have drifted across provider API versions
//! (`full_address` vs `address`, `date_of_birth` vs `dob`, ...). The payload
//! is kept verbatim and accessed through a single ordered-fallback resolver
//! over a fixed alias list per field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const NAME_ALIASES: &[&str] = &["name", "full_name"];
const GENDER_ALIASES: &[&str] = &["gender"];
const DOB_ALIASES: &[&str] = &["date_of_birth", "dob"];
const ADDRESS_ALIASES: &[&str] = &["full_address", "address"];
const PHOTO_ALIASES: &[&str] = &["photo", "photo_url"];

/// Returns the value of the first alias present in `data` as a string.
///
/// Non-string scalar values are rendered with `to_string` so that a numeric
/// `dob` or similar does not silently disappear; null and missing keys fall
/// through to the next alias.
fn resolve(data: &Value, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        match data.get(alias) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Null) | None => continue,
            Some(other) if other.is_object() || other.is_array() => continue,
            Some(other) => return Some(other.to_string()),
        }
    }
    None
}

/// The provider's profile payload, stored verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationPayload(Value);

impl VerificationPayload {
    pub fn new(data: Value) -> Self {
        Self(data)
    }

    pub fn name(&self) -> String {
        resolve(&self.0, NAME_ALIASES).unwrap_or_default()
    }

    pub fn gender(&self) -> String {
        resolve(&self.0, GENDER_ALIASES).unwrap_or_default()
    }

    pub fn dob(&self) -> String {
        resolve(&self.0, DOB_ALIASES).unwrap_or_default()
    }

    pub fn address(&self) -> String {
        resolve(&self.0, ADDRESS_ALIASES).unwrap_or_default()
    }

    pub fn photo(&self) -> String {
        resolve(&self.0, PHOTO_ALIASES).unwrap_or_default()
    }

    /// Caller-facing summary returned by the verify-OTP endpoint.
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            name: self.name(),
            gender: self.gender(),
            dob: self.dob(),
            address: self.address(),
            photo: self.photo(),
        }
    }
}

/// Flattened profile fields exposed to the caller after OTP verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub name: String,
    pub gender: String,
    pub dob: String,
    pub address: String,
    pub photo: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_primary_alias_first() {
        let payload = VerificationPayload::new(json!({
            "name": "Asha",
            "full_name": "Asha K",
            "date_of_birth": "1990-01-01",
        }));
        assert_eq!(payload.name(), "Asha");
        assert_eq!(payload.dob(), "1990-01-01");
    }

    #[test]
    fn falls_back_through_aliases_in_order() {
        let payload = VerificationPayload::new(json!({
            "full_name": "Asha K",
            "dob": "1990-01-01",
            "address": "12 MG Road",
            "photo_url": "data:image/jpeg;base64,xyz",
        }));
        assert_eq!(payload.name(), "Asha K");
        assert_eq!(payload.dob(), "1990-01-01");
        assert_eq!(payload.address(), "12 MG Road");
        assert_eq!(payload.photo(), "data:image/jpeg;base64,xyz");
    }

    #[test]
    fn null_values_fall_through() {
        let payload = VerificationPayload::new(json!({
            "full_address": null,
            "address": "12 MG Road",
        }));
        assert_eq!(payload.address(), "12 MG Road");
    }

    #[test]
    fn missing_fields_resolve_to_empty() {
        let payload = VerificationPayload::new(json!({}));
        assert_eq!(payload.name(), "");
        assert_eq!(payload.photo(), "");
    }

    #[test]
    fn summary_carries_all_fields() {
        let payload = VerificationPayload::new(json!({
            "name": "Asha",
            "gender": "F",
            "date_of_birth": "1990-01-01",
            "full_address": "12 MG Road",
            "photo": "p",
        }));
        let summary = payload.summary();
        assert_eq!(summary.name, "Asha");
        assert_eq!(summary.gender, "F");
        assert_eq!(summary.dob, "1990-01-01");
        assert_eq!(summary.address, "12 MG Road");
        assert_eq!(summary.photo, "p");
    }
}
