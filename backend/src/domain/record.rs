//! Record data model.
//!
//! A [`Record`] is the single entity managed by the service. Ownership is fixed
//! at creation and every read or mutation is scoped to the owning identity.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Identity;

/// Department applied when a create request omits one.
pub const DEFAULT_DEPARTMENT: &str = "IT";
/// Status applied when a create request omits one.
pub const DEFAULT_STATUS: &str = "Active";
/// Departments offered by the data-entry form.
pub const DEPARTMENTS: [&str; 5] = ["IT", "HR", "Finance", "Marketing", "Operations"];
/// Statuses offered by the data-entry form.
pub const STATUSES: [&str; 3] = ["Active", "Inactive", "Pending"];

/// Caller-editable record fields, used to name the offending field in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Name,
    Email,
    Department,
    Status,
}

impl RecordField {
    /// Wire name of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Department => "department",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors raised for record input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    MissingRequiredField { field: RecordField },
    InvalidEmail,
    InvalidId,
}

impl RecordValidationError {
    /// Field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingRequiredField { field } => field.as_str(),
            Self::InvalidEmail => RecordField::Email.as_str(),
            Self::InvalidId => "id",
        }
    }

    /// Stable machine-readable code for adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingRequiredField { .. } => "missing_required_field",
            Self::InvalidEmail => "invalid_email",
            Self::InvalidId => "invalid_id",
        }
    }
}

impl fmt::Display for RecordValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredField { field } => write!(f, "{field} must not be empty"),
            Self::InvalidEmail => write!(f, "email must be a valid e-mail address"),
            Self::InvalidId => write!(f, "record id must be a positive integer"),
        }
    }
}

impl std::error::Error for RecordValidationError {}

/// System-generated record identifier.
///
/// ## Invariants
/// - Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RecordId(i64);

impl RecordId {
    /// Validate an identifier supplied by a caller.
    pub fn new(value: i64) -> Result<Self, RecordValidationError> {
        if value <= 0 {
            return Err(RecordValidationError::InvalidId);
        }
        Ok(Self(value))
    }

    /// Generate a fresh random 63-bit identifier.
    ///
    /// # Examples
    /// ```
    /// use records_backend::domain::RecordId;
    ///
    /// assert!(RecordId::generate().get() > 0);
    /// ```
    pub fn generate() -> Self {
        let raw = rand::random::<u64>() >> 1;
        let value = i64::try_from(raw).unwrap_or(i64::MAX);
        Self(value.max(1))
    }

    /// Raw integer value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = RecordValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| RecordValidationError::InvalidId)?;
        Self::new(value)
    }
}

impl TryFrom<i64> for RecordId {
    type Error = RecordValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordId> for i64 {
    fn from(value: RecordId) -> Self {
        value.0
    }
}

/// A persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub department: String,
    pub status: String,
    pub notes: Option<String>,
    pub owner_user: Identity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Caller-editable content of the record.
    pub fn content(&self) -> RecordContent {
        RecordContent {
            name: self.name.clone(),
            email: self.email.clone(),
            department: self.department.clone(),
            status: self.status.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Fields supplied when creating a record.
///
/// Department and status fall back to [`DEFAULT_DEPARTMENT`] and
/// [`DEFAULT_STATUS`] when omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRecordFields {
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. `None` leaves the stored value unchanged.
///
/// `notes` uses a nested option so callers can clear it with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub notes: Option<Option<String>>,
}

impl RecordPatch {
    /// Apply the patch on top of existing content.
    pub fn apply(self, mut content: RecordContent) -> RecordContent {
        if let Some(name) = self.name {
            content.name = name;
        }
        if let Some(email) = self.email {
            content.email = email;
        }
        if let Some(department) = self.department {
            content.department = department;
        }
        if let Some(status) = self.status {
            content.status = status;
        }
        if let Some(notes) = self.notes {
            content.notes = notes;
        }
        content
    }
}

/// Editable record content prior to validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContent {
    pub name: String,
    pub email: String,
    pub department: String,
    pub status: String,
    pub notes: Option<String>,
}

impl From<NewRecordFields> for RecordContent {
    fn from(value: NewRecordFields) -> Self {
        Self {
            name: value.name,
            email: value.email,
            department: value
                .department
                .unwrap_or_else(|| DEFAULT_DEPARTMENT.to_owned()),
            status: value.status.unwrap_or_else(|| DEFAULT_STATUS.to_owned()),
            notes: value.notes,
        }
    }
}

impl RecordContent {
    /// Check required fields and e-mail syntax.
    ///
    /// # Examples
    /// ```
    /// use records_backend::domain::{NewRecordFields, RecordContent, RecordValidationError};
    ///
    /// let content = RecordContent::from(NewRecordFields {
    ///     name: String::new(),
    ///     email: "x".into(),
    ///     ..NewRecordFields::default()
    /// });
    /// assert!(matches!(
    ///     content.validate(),
    ///     Err(RecordValidationError::MissingRequiredField { .. })
    /// ));
    /// ```
    pub fn validate(self) -> Result<Self, RecordValidationError> {
        let required = [
            (RecordField::Name, &self.name),
            (RecordField::Email, &self.email),
            (RecordField::Department, &self.department),
            (RecordField::Status, &self.status),
        ];
        if let Some((field, _)) = required
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
        {
            return Err(RecordValidationError::MissingRequiredField { field });
        }
        if !is_valid_email(&self.email) {
            return Err(RecordValidationError::InvalidEmail);
        }
        Ok(self)
    }
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        let pattern = r"^[^@\s]+@[^@\s]+\.[^@\s.]+$";
        Regex::new(pattern).unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Syntactic e-mail check: one `@`, no whitespace, a dotted domain.
pub fn is_valid_email(candidate: &str) -> bool {
    email_regex().is_match(candidate)
}

/// Case-insensitive substring filter over name and e-mail.
///
/// Blank terms are ignored. When both terms are present a record must match
/// both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    name: Option<String>,
    email: Option<String>,
}

impl RecordFilter {
    /// Build a filter, discarding blank terms.
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self {
            name: normalise_term(name),
            email: normalise_term(email),
        }
    }

    /// Name term, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// E-mail term, if any.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Whether the filter accepts every record.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    /// Evaluate the filter against a record.
    pub fn matches(&self, record: &Record) -> bool {
        contains_ignore_case(&record.name, self.name())
            && contains_ignore_case(&record.email, self.email())
    }
}

fn normalise_term(term: Option<String>) -> Option<String> {
    term.map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(name: &str, email: &str) -> Record {
        let now = Utc::now();
        Record {
            id: RecordId::generate(),
            name: name.to_owned(),
            email: email.to_owned(),
            department: DEFAULT_DEPARTMENT.to_owned(),
            status: DEFAULT_STATUS.to_owned(),
            notes: None,
            owner_user: Identity::new("owner@example.com").expect("identity"),
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[case("ada@x.com", true)]
    #[case("first.last+tag@sub.example.org", true)]
    #[case("x", false)]
    #[case("ada@", false)]
    #[case("@x.com", false)]
    #[case("ada@x", false)]
    #[case("ada @x.com", false)]
    #[case("ada@@x.com", false)]
    fn email_syntax(#[case] candidate: &str, #[case] expected: bool) {
        assert_eq!(is_valid_email(candidate), expected);
    }

    #[rstest]
    #[case("", "ada@x.com", RecordField::Name)]
    #[case("Ada", "  ", RecordField::Email)]
    fn missing_fields_are_named(
        #[case] name: &str,
        #[case] email: &str,
        #[case] expected: RecordField,
    ) {
        let content = RecordContent::from(NewRecordFields {
            name: name.to_owned(),
            email: email.to_owned(),
            ..NewRecordFields::default()
        });
        let error = content.validate().expect_err("validation fails");
        assert_eq!(
            error,
            RecordValidationError::MissingRequiredField { field: expected }
        );
        assert_eq!(error.field(), expected.as_str());
    }

    #[test]
    fn missing_name_is_reported_before_bad_email() {
        let content = RecordContent::from(NewRecordFields {
            name: String::new(),
            email: "x".to_owned(),
            ..NewRecordFields::default()
        });
        assert!(matches!(
            content.validate(),
            Err(RecordValidationError::MissingRequiredField {
                field: RecordField::Name
            })
        ));
    }

    #[test]
    fn defaults_fill_department_and_status() {
        let content = RecordContent::from(NewRecordFields {
            name: "Ada".to_owned(),
            email: "ada@x.com".to_owned(),
            ..NewRecordFields::default()
        });
        assert_eq!(content.department, DEFAULT_DEPARTMENT);
        assert_eq!(content.status, DEFAULT_STATUS);
    }

    #[test]
    fn patch_leaves_unsupplied_fields_untouched() {
        let original = record("Ada", "ada@x.com").content();
        let patched = RecordPatch {
            status: Some("Inactive".to_owned()),
            ..RecordPatch::default()
        }
        .apply(original.clone());

        assert_eq!(patched.status, "Inactive");
        assert_eq!(patched.name, original.name);
        assert_eq!(patched.email, original.email);
        assert_eq!(patched.department, original.department);
    }

    #[test]
    fn patch_can_clear_notes() {
        let mut original = record("Ada", "ada@x.com").content();
        original.notes = Some("keep?".to_owned());
        let patched = RecordPatch {
            notes: Some(None),
            ..RecordPatch::default()
        }
        .apply(original);
        assert!(patched.notes.is_none());
    }

    #[rstest]
    #[case(Some("ADA"), None, true)]
    #[case(Some("lov"), None, true)]
    #[case(None, Some("X.COM"), true)]
    #[case(Some("ada"), Some("other"), false)]
    #[case(Some("   "), None, true)]
    #[case(Some("grace"), None, false)]
    fn filter_matches_substrings_case_insensitively(
        #[case] name: Option<&str>,
        #[case] email: Option<&str>,
        #[case] expected: bool,
    ) {
        let filter = RecordFilter::new(name.map(str::to_owned), email.map(str::to_owned));
        assert_eq!(
            filter.matches(&record("Ada Lovelace", "ada@x.com")),
            expected
        );
    }

    #[rstest]
    #[case("0")]
    #[case("-4")]
    #[case("abc")]
    fn record_id_rejects_non_positive_values(#[case] raw: &str) {
        assert_eq!(
            raw.parse::<RecordId>(),
            Err(RecordValidationError::InvalidId)
        );
    }

    #[test]
    fn generated_ids_are_positive() {
        for _ in 0..64 {
            assert!(RecordId::generate().get() > 0);
        }
    }
}
