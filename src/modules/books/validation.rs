//! Field rules for book requests.
//!
//! Every function here is pure: it takes raw client input and returns either
//! normalized values or every field error found, never just the first one.

use serde::Serialize;
use serde_json::{json, Value};
use shelf_http::AppError;
use thiserror::Error;
use validator::ValidateEmail;

use super::models::{
    field, BookRequestChanges, BookRequestPayload, BookStatus, NewBookRequest, StatusPayload,
    UnknownStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// Field absent, empty, or whitespace only
    Required,
    /// Value has the wrong shape or exceeds its length limit
    InvalidFormat,
    /// Value is not one of the recognized choices
    InvalidEnum,
    /// A field an action cannot run without was not sent
    MissingField,
}

impl FieldErrorKind {
    pub const fn code(&self) -> &'static str {
        match self {
            FieldErrorKind::Required => "required",
            FieldErrorKind::InvalidFormat => "invalid_format",
            FieldErrorKind::InvalidEnum => "invalid_enum",
            FieldErrorKind::MissingField => "missing_field",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub code: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, code: FieldErrorKind, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
        }
    }

    fn required(field: &'static str) -> Self {
        Self::new(field, FieldErrorKind::Required, "This field is required.")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summary(.0))]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn field(&self, name: &str) -> Option<&FieldError> {
        self.0.iter().find(|error| error.field == name)
    }
}

fn summary(errors: &[FieldError]) -> String {
    match errors {
        [only] => only.message.clone(),
        _ => errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join("; "),
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let message = errors.to_string();
        let details = errors
            .0
            .iter()
            .map(|error| {
                json!({
                    "field": error.field,
                    "code": error.code.code(),
                    "message": error.message,
                })
            })
            .collect();
        AppError::validation(details, message)
    }
}

/// Validate a payload that must carry every field (create, full replace).
/// An absent `status` defaults to `Pendente`.
pub fn validate_new(payload: &BookRequestPayload) -> Result<NewBookRequest, ValidationErrors> {
    let mut errors = Vec::new();

    let name = collect(&mut errors, require("name", payload.name.as_deref(), clean_text));
    let email = collect(&mut errors, require("email", payload.email.as_deref(), clean_email));
    let book = collect(&mut errors, require("book", payload.book.as_deref(), clean_text));
    let date = collect(&mut errors, require("date", payload.date.as_deref(), clean_text));
    let status = match payload.status.as_ref() {
        Some(raw) => collect(&mut errors, clean_status(raw)),
        None => Some(BookStatus::default()),
    };

    match (name, email, book, date, status) {
        (Some(name), Some(email), Some(book), Some(date), Some(status)) if errors.is_empty() => {
            Ok(NewBookRequest {
                name,
                email,
                book,
                date,
                status,
            })
        }
        _ => Err(ValidationErrors(errors)),
    }
}

/// Validate only the fields the client supplied (partial update)
pub fn validate_changes(
    payload: &BookRequestPayload,
) -> Result<BookRequestChanges, ValidationErrors> {
    let mut errors = Vec::new();

    let changes = BookRequestChanges {
        name: optional(&mut errors, "name", payload.name.as_deref(), clean_text),
        email: optional(&mut errors, "email", payload.email.as_deref(), clean_email),
        book: optional(&mut errors, "book", payload.book.as_deref(), clean_text),
        date: optional(&mut errors, "date", payload.date.as_deref(), clean_text),
        status: payload
            .status
            .as_ref()
            .and_then(|raw| collect(&mut errors, clean_status(raw))),
    };

    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(ValidationErrors(errors))
    }
}

/// Validate the body of the status-only action
pub fn validate_status_change(payload: &StatusPayload) -> Result<BookStatus, ValidationErrors> {
    match payload.status.as_ref() {
        None => Err(missing_status()),
        Some(Value::String(raw)) if raw.is_empty() => Err(missing_status()),
        Some(raw) => clean_status(raw).map_err(|error| ValidationErrors(vec![error])),
    }
}

fn missing_status() -> ValidationErrors {
    ValidationErrors(vec![FieldError::new(
        "status",
        FieldErrorKind::MissingField,
        "status is required",
    )])
}

type Cleaner<T> = fn(&'static str, &str) -> Result<T, FieldError>;

fn collect<T>(errors: &mut Vec<FieldError>, result: Result<T, FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            errors.push(error);
            None
        }
    }
}

fn require<T>(
    field: &'static str,
    raw: Option<&str>,
    clean: Cleaner<T>,
) -> Result<T, FieldError> {
    match raw {
        Some(raw) => clean(field, raw),
        None => Err(FieldError::required(field)),
    }
}

fn optional<T>(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    raw: Option<&str>,
    clean: Cleaner<T>,
) -> Option<T> {
    raw.and_then(|raw| collect(errors, clean(field, raw)))
}

fn clean_text(field_name: &'static str, raw: &str) -> Result<String, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(FieldError::required(field_name));
    }
    check_length(field_name, value)?;
    Ok(value.to_string())
}

fn clean_email(field_name: &'static str, raw: &str) -> Result<String, FieldError> {
    let value = clean_text(field_name, raw)?;
    if !value.validate_email() {
        return Err(FieldError::new(
            field_name,
            FieldErrorKind::InvalidFormat,
            "Enter a valid email address.",
        ));
    }
    Ok(value.to_lowercase())
}

/// Only JSON strings can name a status; any other value is an unknown choice.
fn clean_status(raw: &Value) -> Result<BookStatus, FieldError> {
    let parsed = match raw {
        Value::String(value) => value.parse::<BookStatus>(),
        other => Err(UnknownStatus(other.to_string())),
    };
    parsed.map_err(|err| FieldError::new("status", FieldErrorKind::InvalidEnum, err.to_string()))
}

fn check_length(field_name: &'static str, value: &str) -> Result<(), FieldError> {
    let limit = field(field_name).and_then(|meta| meta.max_length);
    match limit {
        Some(max) if value.chars().count() > max => Err(FieldError::new(
            field_name,
            FieldErrorKind::InvalidFormat,
            format!("Ensure this field has no more than {max} characters."),
        )),
        _ => Ok(()),
    }
}
