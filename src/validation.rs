use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub const MIN_PASSWORD_LEN: usize = 8;

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(|v| v.as_slice())
    }

    /// First message, used as the summary line of the error envelope.
    pub fn first_message(&self) -> String {
        self.0
            .values()
            .flat_map(|msgs| msgs.first())
            .next()
            .cloned()
            .unwrap_or_else(|| "The given data was invalid.".to_string())
    }

    pub fn required(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, format!("The {} field is required.", label(field)));
            return false;
        }
        true
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if self.required(field, value) && !is_valid_email(value) {
            self.add(
                field,
                format!("The {} must be a valid email address.", label(field)),
            );
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(
                field,
                format!("The {} may not be greater than {max} characters.", label(field)),
            );
        }
    }

    /// Password policy plus the `{field}_confirmation` match.
    pub fn password(&mut self, field: &str, value: &str, confirmation: Option<&str>) {
        if !self.required(field, value) {
            return;
        }
        if value.chars().count() < MIN_PASSWORD_LEN {
            self.add(
                field,
                format!("The {} must be at least {MIN_PASSWORD_LEN} characters.", label(field)),
            );
        }
        if let Some(confirmation) = confirmation {
            if confirmation != value {
                self.add(field, format!("The {} confirmation does not match.", label(field)));
            }
        }
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    value.len() <= 255 && EMAIL_RE.is_match(value)
}

/// Emails are compared and stored case-insensitively.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(is_valid_email("user@email.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("user"));
        assert!(!is_valid_email("user@host"));
        assert!(!is_valid_email("us er@email.com"));
        assert!(!is_valid_email("@email.com"));
    }

    #[test]
    fn password_confirmation_mismatch_is_reported_on_password() {
        let mut errors = ValidationErrors::new();
        errors.password("password", "password123", Some("password124"));
        assert_eq!(
            errors.get("password").unwrap(),
            ["The password confirmation does not match."]
        );
    }

    #[test]
    fn short_password_is_reported() {
        let mut errors = ValidationErrors::new();
        errors.password("password", "short", None);
        assert!(errors.get("password").unwrap()[0].contains("at least 8"));
    }

    #[test]
    fn empty_email_reports_required_only() {
        let mut errors = ValidationErrors::new();
        errors.email("email", "  ");
        assert_eq!(errors.get("email").unwrap(), ["The email field is required."]);
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  User@Email.COM "), "user@email.com");
    }
}
