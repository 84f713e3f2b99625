pub mod admin;
pub mod models;
pub mod routes;
pub mod store;
pub mod validation;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use shelf_db::Pool;
use shelf_kernel::{InitCtx, Migration, Module};

use admin::BookRequestAdmin;
use store::{BookRequestStore, SqliteBookRequestStore};

const MODULE_NAME: &str = "books";

/// Book purchase requests: REST handlers, storage schema and admin view
pub struct BooksModule {
    store: Arc<dyn BookRequestStore>,
}

impl BooksModule {
    pub fn new(store: Arc<dyn BookRequestStore>) -> Self {
        Self { store }
    }

    pub fn admin(&self) -> BookRequestAdmin {
        BookRequestAdmin::new(self.store.clone())
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.store.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE book_request (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name       TEXT    NOT NULL CHECK (length(name) BETWEEN 1 AND 200),
                email      TEXT    NOT NULL CHECK (length(email) BETWEEN 1 AND 254),
                book       TEXT    NOT NULL CHECK (length(book) BETWEEN 1 AND 500),
                date       TEXT    NOT NULL CHECK (length(date) <= 100),
                status     TEXT    NOT NULL DEFAULT 'Pendente'
                           CHECK (status IN ('Pendente', 'Aprobado', 'Mercado', 'Rexeitado')),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                CHECK (created_at <= updated_at)
            );
            CREATE INDEX book_request_created_at_idx ON book_request (created_at DESC, id DESC);
            CREATE INDEX book_request_status_idx ON book_request (status);
            "#,
    }]
}

/// Create the module backed by SQLite
pub fn create_module(pool: Pool) -> Arc<BooksModule> {
    Arc::new(BooksModule::new(Arc::new(SqliteBookRequestStore::new(pool))))
}

fn record_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "integer", "readOnly": true },
            "name": { "type": "string", "maxLength": 200, "description": "Nome do Alumno/a" },
            "email": { "type": "string", "format": "email", "description": "Correo Electrónico" },
            "book": { "type": "string", "maxLength": 500, "description": "Libro Solicitado" },
            "date": { "type": "string", "maxLength": 100, "description": "Data da Petición" },
            "status": { "$ref": "#/components/schemas/BookStatus" },
            "created_at": { "type": "string", "format": "date-time", "readOnly": true },
            "updated_at": { "type": "string", "format": "date-time", "readOnly": true }
        },
        "required": ["id", "name", "email", "book", "date", "status", "created_at", "updated_at"]
    })
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn record_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookRequest" }
            }
        }
    })
}

fn payload_body(schema: &str) -> serde_json::Value {
    json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": format!("#/components/schemas/{schema}") }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let id_param = json!([{
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer" }
    }]);

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List book requests, newest first",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "All book requests",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/BookRequest" }
                                    }
                                }
                            }
                        }
                    }
                },
                "post": {
                    "summary": "Submit a book request",
                    "tags": ["Books"],
                    "requestBody": payload_body("BookRequestInput"),
                    "responses": {
                        "201": record_response("Created"),
                        "400": error_response("Validation error")
                    }
                }
            },
            "/{id}": {
                "parameters": id_param,
                "get": {
                    "summary": "Retrieve a book request",
                    "tags": ["Books"],
                    "responses": {
                        "200": record_response("The book request"),
                        "404": error_response("Not found")
                    }
                },
                "put": {
                    "summary": "Replace every field of a book request",
                    "tags": ["Books"],
                    "requestBody": payload_body("BookRequestInput"),
                    "responses": {
                        "200": record_response("Updated"),
                        "400": error_response("Validation error"),
                        "404": error_response("Not found")
                    }
                },
                "patch": {
                    "summary": "Update the supplied fields of a book request",
                    "tags": ["Books"],
                    "requestBody": payload_body("BookRequestInput"),
                    "responses": {
                        "200": record_response("Updated"),
                        "400": error_response("Validation error"),
                        "404": error_response("Not found")
                    }
                },
                "delete": {
                    "summary": "Delete a book request",
                    "tags": ["Books"],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "404": error_response("Not found")
                    }
                }
            },
            "/{id}/update_status": {
                "parameters": id_param,
                "patch": {
                    "summary": "Change only the status of a book request",
                    "tags": ["Books"],
                    "requestBody": payload_body("StatusInput"),
                    "responses": {
                        "200": record_response("Updated"),
                        "400": error_response("Missing or invalid status"),
                        "404": error_response("Not found")
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "BookStatus": {
                    "type": "string",
                    "enum": models::BookStatus::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                    "default": "Pendente"
                },
                "BookRequest": record_schema(),
                "BookRequestInput": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "maxLength": 200 },
                        "email": { "type": "string", "format": "email" },
                        "book": { "type": "string", "maxLength": 500 },
                        "date": { "type": "string", "maxLength": 100 },
                        "status": { "$ref": "#/components/schemas/BookStatus" }
                    }
                },
                "StatusInput": {
                    "type": "object",
                    "properties": {
                        "status": { "$ref": "#/components/schemas/BookStatus" }
                    },
                    "required": ["status"]
                }
            }
        }
    })
}
