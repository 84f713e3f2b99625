use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

/// Review state of a book request. Any state may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BookStatus {
    /// Waiting for review
    #[default]
    Pendente,
    /// Approved for purchase
    Aprobado,
    /// Purchased
    Mercado,
    /// Rejected
    Rexeitado,
}

impl BookStatus {
    pub const ALL: [BookStatus; 4] = [
        BookStatus::Pendente,
        BookStatus::Aprobado,
        BookStatus::Mercado,
        BookStatus::Rexeitado,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Pendente => "Pendente",
            BookStatus::Aprobado => "Aprobado",
            BookStatus::Mercado => "Mercado",
            BookStatus::Rexeitado => "Rexeitado",
        }
    }

    /// `"Pendente, Aprobado, Mercado, Rexeitado"`
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(BookStatus::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status. Must be one of: {}", BookStatus::valid_values())]
pub struct UnknownStatus(pub String);

impl FromStr for BookStatus {
    type Err = UnknownStatus;

    /// Exact, case-sensitive match
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        BookStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

/// A student's request to have a book purchased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRequest {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub book: String,
    /// Free-form date as typed by the student
    pub date: String,
    pub status: BookStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl fmt::Display for BookRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.book)
    }
}

/// Normalized field values for a create or full replace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookRequest {
    pub name: String,
    pub email: String,
    pub book: String,
    pub date: String,
    pub status: BookStatus,
}

/// Normalized subset of fields for a partial update; `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookRequestChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub book: Option<String>,
    pub date: Option<String>,
    pub status: Option<BookStatus>,
}

impl BookRequestChanges {
    pub fn status(status: BookStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Apply the supplied fields onto `record`, leaving timestamps alone
    pub fn apply_to(self, record: &mut BookRequest) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(email) = self.email {
            record.email = email;
        }
        if let Some(book) = self.book {
            record.book = book;
        }
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
    }
}

/// Raw client input for create, replace and partial update.
///
/// Server-assigned fields (`id`, `created_at`, `updated_at`) are not part of
/// the payload and are dropped if a client sends them. `status` is kept as raw
/// JSON so that a number or object is reported against the field instead of
/// failing the whole body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookRequestPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub book: Option<String>,
    pub date: Option<String>,
    pub status: Option<Value>,
}

/// Raw client input for the status-only action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPayload {
    pub status: Option<Value>,
}

/// Static description of one `BookRequest` field, shared by validation and
/// the admin view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    pub label: &'static str,
    pub max_length: Option<usize>,
    pub editable: bool,
}

pub const FIELDS: &[FieldMeta] = &[
    FieldMeta {
        name: "id",
        label: "ID",
        max_length: None,
        editable: false,
    },
    FieldMeta {
        name: "name",
        label: "Nome do Alumno/a",
        max_length: Some(200),
        editable: true,
    },
    FieldMeta {
        name: "email",
        label: "Correo Electrónico",
        max_length: Some(254),
        editable: true,
    },
    FieldMeta {
        name: "book",
        label: "Libro Solicitado",
        max_length: Some(500),
        editable: true,
    },
    FieldMeta {
        name: "date",
        label: "Data da Petición",
        max_length: Some(100),
        editable: true,
    },
    FieldMeta {
        name: "status",
        label: "Estado",
        max_length: Some(20),
        editable: true,
    },
    FieldMeta {
        name: "created_at",
        label: "Created at",
        max_length: None,
        editable: false,
    },
    FieldMeta {
        name: "updated_at",
        label: "Updated at",
        max_length: None,
        editable: false,
    },
];

pub fn field(name: &str) -> Option<&'static FieldMeta> {
    FIELDS.iter().find(|meta| meta.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn status_parsing_is_exact() {
        assert_eq!("Aprobado".parse::<BookStatus>(), Ok(BookStatus::Aprobado));
        assert!("aprobado".parse::<BookStatus>().is_err());
        assert!(" Mercado".parse::<BookStatus>().is_err());
    }

    #[test]
    fn unknown_status_lists_every_valid_value() {
        let err = "Unknown".parse::<BookStatus>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status. Must be one of: Pendente, Aprobado, Mercado, Rexeitado"
        );
    }

    #[test]
    fn record_serializes_with_rfc3339_timestamps() {
        let record = BookRequest {
            id: 3,
            name: "Uxía".to_string(),
            email: "uxia@example.com".to_string(),
            book: "Memorias dun neno labrego".to_string(),
            date: "2024-10-01".to_string(),
            status: BookStatus::Mercado,
            created_at: datetime!(2024-10-01 08:30:00 UTC),
            updated_at: datetime!(2024-10-02 09:00:00.000001 UTC),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "Mercado");
        assert_eq!(value["created_at"], "2024-10-01T08:30:00Z");
        assert_eq!(value["updated_at"], "2024-10-02T09:00:00.000001Z");
        assert_eq!(record.to_string(), "Uxía - Memorias dun neno labrego");
    }

    #[test]
    fn payload_drops_server_assigned_fields() {
        let payload: BookRequestPayload = serde_json::from_value(json!({
            "id": 99,
            "name": "Brais",
            "created_at": "2020-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(payload.name.as_deref(), Some("Brais"));
        assert!(payload.email.is_none());
    }

    #[test]
    fn status_of_any_json_type_reaches_validation() {
        let payload: StatusPayload = serde_json::from_value(json!({ "status": 5 })).unwrap();
        assert_eq!(payload.status, Some(json!(5)));

        let payload: BookRequestPayload =
            serde_json::from_value(json!({ "status": null })).unwrap();
        assert!(payload.status.is_none());
    }

    #[test]
    fn changes_only_touch_supplied_fields() {
        let mut record = BookRequest {
            id: 1,
            name: "Antía".to_string(),
            email: "antia@example.com".to_string(),
            book: "Sempre en Galiza".to_string(),
            date: "ayer".to_string(),
            status: BookStatus::Pendente,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
        };

        BookRequestChanges {
            book: Some("Os eidos".to_string()),
            ..Default::default()
        }
        .apply_to(&mut record);

        assert_eq!(record.book, "Os eidos");
        assert_eq!(record.name, "Antía");
        assert_eq!(record.status, BookStatus::Pendente);

        BookRequestChanges::status(BookStatus::Rexeitado).apply_to(&mut record);
        assert_eq!(record.status, BookStatus::Rexeitado);
        assert_eq!(record.book, "Os eidos");
    }

    #[test]
    fn field_metadata_marks_timestamps_read_only() {
        assert!(!field("created_at").unwrap().editable);
        assert!(!field("updated_at").unwrap().editable);
        assert_eq!(field("book").unwrap().max_length, Some(500));
        assert!(field("nope").is_none());
    }
}
