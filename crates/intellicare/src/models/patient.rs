use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A row of the patients table as seen by the capabilities
pub struct PatientRecord {
    pub id: Uuid,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<ContactInfo>,
}

impl PatientRecord {
    /// One line summary, limited to the fields the model is allowed to see
    pub fn summary(&self) -> String {
        format!(
            "- Name: {} {}, DOB: {}, Gender: {}, ID: {}",
            self.first_name,
            self.last_name.as_deref().unwrap_or(""),
            self.date_of_birth
                .map(|dob| dob.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            self.gender.as_deref().unwrap_or("N/A"),
            self.id
        )
    }
}
