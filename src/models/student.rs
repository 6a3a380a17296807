use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::files;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub reg_no: String,
    pub full_name: Option<String>,
    pub certificate_number: Option<String>,
    pub contact_number: Option<String>,
    pub course_name: Option<String>,
    /// Stored filename, relative to the upload directory.
    pub file: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial student payload. `None` means "leave the stored value alone".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    #[serde(default, deserialize_with = "lenient_string")]
    pub reg_no: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub certificate_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contact_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub course_name: Option<String>,
}

impl StudentPatch {
    /// Sets a field by its wire name. Returns false for unknown names.
    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "regNo" => &mut self.reg_no,
            "fullName" => &mut self.full_name,
            "certificateNumber" => &mut self.certificate_number,
            "contactNumber" => &mut self.contact_number,
            "courseName" => &mut self.course_name,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn normalized(self) -> Self {
        fn trim(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string())
        }

        Self {
            reg_no: trim(self.reg_no),
            full_name: trim(self.full_name),
            certificate_number: trim(self.certificate_number),
            contact_number: trim(self.contact_number),
            course_name: trim(self.course_name),
        }
    }

    /// The registration number if present and non-blank.
    pub fn key(&self) -> Option<&str> {
        self.reg_no
            .as_deref()
            .map(str::trim)
            .filter(|reg_no| !reg_no.is_empty())
    }
}

// Accepts strings, numbers and booleans so that numeric contact or
// certificate numbers sent as JSON numbers are stored as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string, got {other}"
        ))),
    }
}

/// A student record as returned by lookups, with the public file path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    #[serde(flatten)]
    pub student: Student,
    pub file_path: Option<String>,
}

impl From<Student> for StudentView {
    fn from(student: Student) -> Self {
        let file_path = student.file.as_deref().map(files::public_path);
        Self { student, file_path }
    }
}

#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    Created(Student),
    Updated(Student),
}

impl UpsertOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            UpsertOutcome::Created(_) => "Student created successfully",
            UpsertOutcome::Updated(_) => "Student updated successfully",
        }
    }

    pub fn into_student(self) -> Student {
        match self {
            UpsertOutcome::Created(student) | UpsertOutcome::Updated(student) => student,
        }
    }
}
