//! Caller-owned input records. Every field is optional free text; the
//! renderer substitutes a localized fallback for anything absent.

use serde::{Deserialize, Serialize};

/// Patient identification block printed on the first page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientData {
    pub name: Option<String>,
    /// CPF in the reference deployment.
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// The prescribed medication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicationData {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub quantity: Option<String>,
    pub dosage_instructions: Option<String>,
}

/// Returns the field value unless it is absent, empty or whitespace-only.
pub(crate) fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_count_as_absent() {
        assert_eq!(present(&None), None);
        assert_eq!(present(&Some(String::new())), None);
        assert_eq!(present(&Some("  \n".to_string())), None);
        assert_eq!(present(&Some("1 mg".to_string())), Some("1 mg"));
    }

    #[test]
    fn patient_deserialises_with_missing_fields() {
        let patient: PatientData =
            serde_json::from_str(r#"{"name": "Maria", "email": "m@ex.com"}"#).unwrap();
        assert_eq!(patient.name.as_deref(), Some("Maria"));
        assert!(patient.national_id.is_none());
        assert!(patient.address.is_none());
    }
}
