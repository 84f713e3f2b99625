//! Administrative change list and edit form for book requests.
//!
//! This is a presentation layer over [`BookRequestStore`]: it decides which
//! columns and sections are shown, never how records behave. Edits go through
//! the same partial-update rules as the HTTP API.

use std::sync::Arc;

use shelf_db::DbError;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;

use super::models::{field, BookRequest, BookRequestPayload};
use super::store::{BookRequestFilter, BookRequestStore};
use super::validation::{self, ValidationErrors};

/// Columns of the change list, in display order
pub const LIST_DISPLAY: &[&str] = &["name", "email", "book", "status", "date", "created_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fieldset {
    pub title: &'static str,
    pub fields: &'static [&'static str],
    pub collapsed: bool,
}

pub const FIELDSETS: &[Fieldset] = &[
    Fieldset {
        title: "Información do Alumno",
        fields: &["name", "email"],
        collapsed: false,
    },
    Fieldset {
        title: "Detalles da Solicitude",
        fields: &["book", "date", "status"],
        collapsed: false,
    },
    Fieldset {
        title: "Metadata",
        fields: &["created_at", "updated_at"],
        collapsed: true,
    },
];

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] DbError),
}

/// One row of the change list: the record id plus one cell per
/// [`LIST_DISPLAY`] column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeListRow {
    pub id: i64,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayField {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: &'static str,
    pub collapsed: bool,
    pub fields: Vec<DisplayField>,
}

/// Detail page of a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub id: i64,
    pub title: String,
    pub sections: Vec<Section>,
}

pub struct BookRequestAdmin {
    store: Arc<dyn BookRequestStore>,
}

impl BookRequestAdmin {
    pub fn new(store: Arc<dyn BookRequestStore>) -> Self {
        Self { store }
    }

    /// Column headers for [`LIST_DISPLAY`]
    pub fn headers() -> Vec<&'static str> {
        LIST_DISPLAY.iter().map(|name| label(name)).collect()
    }

    pub async fn changelist(&self, filter: &BookRequestFilter) -> Result<Vec<ChangeListRow>, AdminError> {
        let records = self.store.search(filter).await?;

        Ok(records
            .iter()
            .map(|record| ChangeListRow {
                id: record.id,
                cells: LIST_DISPLAY
                    .iter()
                    .map(|name| display_value(record, name))
                    .collect(),
            })
            .collect())
    }

    pub async fn detail(&self, id: i64) -> Result<DetailView, AdminError> {
        let record = self.store.get(id).await?;
        Ok(detail_view(&record))
    }

    /// Apply an edit to the editable fields. Timestamps are not part of the
    /// form and can't be changed here.
    pub async fn edit(&self, id: i64, form: BookRequestPayload) -> Result<DetailView, AdminError> {
        let changes = validation::validate_changes(&form)?;
        let record = self.store.merge(id, changes).await?;

        tracing::info!(id, "book request edited from admin");
        Ok(detail_view(&record))
    }
}

fn label(name: &str) -> &'static str {
    field(name).map(|meta| meta.label).unwrap_or("?")
}

fn detail_view(record: &BookRequest) -> DetailView {
    let sections = FIELDSETS
        .iter()
        .map(|fieldset| Section {
            title: fieldset.title,
            collapsed: fieldset.collapsed,
            fields: fieldset
                .fields
                .iter()
                .filter_map(|name| field(name))
                .map(|meta| DisplayField {
                    name: meta.name,
                    label: meta.label,
                    value: display_value(record, meta.name),
                    editable: meta.editable,
                })
                .collect(),
        })
        .collect();

    DetailView {
        id: record.id,
        title: record.to_string(),
        sections,
    }
}

fn display_value(record: &BookRequest, name: &str) -> String {
    match name {
        "id" => record.id.to_string(),
        "name" => record.name.clone(),
        "email" => record.email.clone(),
        "book" => record.book.clone(),
        "date" => record.date.clone(),
        "status" => record.status.to_string(),
        "created_at" => record.created_at.format(&Rfc3339).unwrap_or_default(),
        "updated_at" => record.updated_at.format(&Rfc3339).unwrap_or_default(),
        _ => String::new(),
    }
}
