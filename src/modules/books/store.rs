//! Durable storage for book requests.

use async_trait::async_trait;
use shelf_db::{DbError, Pool, Result};
use sqlx::{QueryBuilder, Sqlite};
use time::{Duration, OffsetDateTime};

use super::models::{BookRequest, BookRequestChanges, BookStatus, NewBookRequest};

const SELECT_COLUMNS: &str =
    "SELECT id, name, email, book, date, status, created_at, updated_at FROM book_request";

/// Columns matched by free-text search
pub const SEARCH_FIELDS: &[&str] = &["name", "email", "book"];

/// Narrowing applied by the admin change list. The default filter matches
/// every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookRequestFilter {
    pub status: Option<BookStatus>,
    /// Inclusive lower bound on `created_at`
    pub created_after: Option<OffsetDateTime>,
    /// Exclusive upper bound on `created_at`
    pub created_before: Option<OffsetDateTime>,
    /// Whitespace-separated terms; each must appear in one of [`SEARCH_FIELDS`]
    pub search: Option<String>,
}

/// Storage operations for `BookRequest` records.
///
/// Every mutation stamps `updated_at`; only `insert` stamps `created_at`.
/// Operations on an unknown id fail with [`DbError::NotFound`].
#[async_trait]
pub trait BookRequestStore: Send + Sync {
    async fn insert(&self, new: NewBookRequest) -> Result<BookRequest>;

    async fn get(&self, id: i64) -> Result<BookRequest>;

    /// All records, newest first
    async fn list(&self) -> Result<Vec<BookRequest>> {
        self.search(&BookRequestFilter::default()).await
    }

    /// Matching records, newest first
    async fn search(&self, filter: &BookRequestFilter) -> Result<Vec<BookRequest>>;

    async fn replace(&self, id: i64, record: NewBookRequest) -> Result<BookRequest>;

    async fn merge(&self, id: i64, changes: BookRequestChanges) -> Result<BookRequest>;

    async fn delete(&self, id: i64) -> Result<()>;
}

#[derive(sqlx::FromRow)]
struct BookRequestRow {
    id: i64,
    name: String,
    email: String,
    book: String,
    date: String,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<BookRequestRow> for BookRequest {
    type Error = DbError;

    fn try_from(row: BookRequestRow) -> Result<Self> {
        let status = row
            .status
            .parse::<BookStatus>()
            .map_err(|_| DbError::CorruptRow(format!("book_request {} has status '{}'", row.id, row.status)))?;

        Ok(BookRequest {
            id: row.id,
            name: row.name,
            email: row.email,
            book: row.book,
            date: row.date,
            status,
            created_at: from_micros(row.created_at)?,
            updated_at: from_micros(row.updated_at)?,
        })
    }
}

/// Timestamps are stored as integer microseconds since the epoch so that
/// ordering in SQL matches ordering in time.
fn to_micros(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000) as i64
}

fn from_micros(micros: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
        .map_err(|err| DbError::CorruptRow(format!("timestamp {micros} out of range: {err}")))
}

fn now() -> Result<OffsetDateTime> {
    from_micros(to_micros(OffsetDateTime::now_utc()))
}

/// A stamp strictly after `previous`, even if the clock has not moved on
fn next_stamp(previous: OffsetDateTime) -> Result<OffsetDateTime> {
    let now = now()?;
    if now > previous {
        Ok(now)
    } else {
        Ok(previous + Duration::microseconds(1))
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub struct SqliteBookRequestStore {
    pool: Pool,
}

impl SqliteBookRequestStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn write(&self, record: &BookRequest) -> Result<()> {
        let result = sqlx::query(
            "UPDATE book_request \
             SET name = ?, email = ?, book = ?, date = ?, status = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.book)
        .bind(&record.date)
        .bind(record.status.as_str())
        .bind(to_micros(record.updated_at))
        .bind(record.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl BookRequestStore for SqliteBookRequestStore {
    async fn insert(&self, new: NewBookRequest) -> Result<BookRequest> {
        let stamp = now()?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO book_request (name, email, book, date, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.book)
        .bind(&new.date)
        .bind(new.status.as_str())
        .bind(to_micros(stamp))
        .bind(to_micros(stamp))
        .fetch_one(&self.pool)
        .await?;

        Ok(BookRequest {
            id,
            name: new.name,
            email: new.email,
            book: new.book,
            date: new.date,
            status: new.status,
            created_at: stamp,
            updated_at: stamp,
        })
    }

    async fn get(&self, id: i64) -> Result<BookRequest> {
        let row: BookRequestRow = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)?;

        row.try_into()
    }

    async fn search(&self, filter: &BookRequestFilter) -> Result<Vec<BookRequest>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        query.push(" WHERE 1 = 1");

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(after) = filter.created_after {
            query.push(" AND created_at >= ").push_bind(to_micros(after));
        }
        if let Some(before) = filter.created_before {
            query.push(" AND created_at < ").push_bind(to_micros(before));
        }

        let terms = filter.search.as_deref().unwrap_or_default();
        for term in terms.split_whitespace() {
            let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
            query.push(" AND (");
            let mut columns = query.separated(" OR ");
            for column in SEARCH_FIELDS {
                columns.push(format!("lower({column}) LIKE "));
                columns.push_bind_unseparated(pattern.clone());
                columns.push_unseparated(" ESCAPE '\\'");
            }
            query.push(")");
        }

        query.push(" ORDER BY created_at DESC, id DESC");

        let rows: Vec<BookRequestRow> = query.build_query_as::<BookRequestRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(BookRequest::try_from).collect()
    }

    async fn replace(&self, id: i64, record: NewBookRequest) -> Result<BookRequest> {
        let current = self.get(id).await?;

        let updated = BookRequest {
            id,
            name: record.name,
            email: record.email,
            book: record.book,
            date: record.date,
            status: record.status,
            created_at: current.created_at,
            updated_at: next_stamp(current.updated_at)?,
        };
        self.write(&updated).await?;

        Ok(updated)
    }

    async fn merge(&self, id: i64, changes: BookRequestChanges) -> Result<BookRequest> {
        let mut record = self.get(id).await?;

        let previous = record.updated_at;
        changes.apply_to(&mut record);
        record.updated_at = next_stamp(previous)?;
        self.write(&record).await?;

        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM book_request WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::test_support::migrated_pool;
    use time::macros::datetime;

    fn new_request(name: &str, book: &str) -> NewBookRequest {
        NewBookRequest {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            book: book.to_string(),
            date: "2024-09-15".to_string(),
            status: BookStatus::Pendente,
        }
    }

    async fn store() -> SqliteBookRequestStore {
        SqliteBookRequestStore::new(migrated_pool().await)
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = store().await;

        let created = store.insert(new_request("Rosalía", "Follas novas")).await.unwrap();
        let fetched = store.get(created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let store = store().await;

        assert!(matches!(store.get(42).await, Err(DbError::NotFound)));
        assert!(matches!(store.delete(42).await, Err(DbError::NotFound)));
        assert!(matches!(
            store.merge(42, BookRequestChanges::status(BookStatus::Mercado)).await,
            Err(DbError::NotFound)
        ));
        assert!(matches!(
            store.replace(42, new_request("Celso", "Longa noite de pedra")).await,
            Err(DbError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = store().await;

        let first = store.insert(new_request("Ana", "Primeiro")).await.unwrap();
        let second = store.insert(new_request("Bea", "Segundo")).await.unwrap();
        let third = store.insert(new_request("Cris", "Terceiro")).await.unwrap();

        let ids: Vec<i64> = store.list().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn merge_keeps_other_fields_and_advances_updated_at() {
        let store = store().await;
        let created = store.insert(new_request("Manuel", "Os vellos non deben")).await.unwrap();

        let merged = store
            .merge(created.id, BookRequestChanges::status(BookStatus::Aprobado))
            .await
            .unwrap();

        assert_eq!(merged.status, BookStatus::Aprobado);
        assert_eq!(merged.name, created.name);
        assert_eq!(merged.book, created.book);
        assert_eq!(merged.created_at, created.created_at);
        assert!(merged.updated_at > created.updated_at);
        assert_eq!(store.get(created.id).await.unwrap(), merged);
    }

    #[tokio::test]
    async fn replace_overwrites_fields_but_not_created_at() {
        let store = store().await;
        let created = store.insert(new_request("Eduardo", "Arredor de si")).await.unwrap();

        let mut replacement = new_request("Eduardo Blanco", "A esmorga");
        replacement.status = BookStatus::Rexeitado;
        let replaced = store.replace(created.id, replacement).await.unwrap();

        assert_eq!(replaced.name, "Eduardo Blanco");
        assert_eq!(replaced.book, "A esmorga");
        assert_eq!(replaced.status, BookStatus::Rexeitado);
        assert_eq!(replaced.created_at, created.created_at);
        assert!(replaced.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn deleted_records_disappear_from_listing() {
        let store = store().await;
        let kept = store.insert(new_request("Xela", "Poemas")).await.unwrap();
        let gone = store.insert(new_request("Lois", "Cousas")).await.unwrap();

        store.delete(gone.id).await.unwrap();

        let ids: Vec<i64> = store.list().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![kept.id]);
        assert!(matches!(store.get(gone.id).await, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn each_term_may_match_a_different_search_field() {
        use crate::modules::books::models::field;
        assert!(SEARCH_FIELDS.iter().all(|name| field(name).is_some()));

        let store = store().await;
        let pondal = store.insert(new_request("Pondal", "Queixumes dos pinos")).await.unwrap();
        store.insert(new_request("Lamas", "Queixumes dos pinos")).await.unwrap();

        let found = store
            .search(&BookRequestFilter {
                search: Some("pondal@example queixumes".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![pondal.id]);
    }

    #[tokio::test]
    async fn search_filters_by_status_text_and_date() {
        let store = store().await;
        let rosalia = store.insert(new_request("Rosalia", "Cantares gallegos")).await.unwrap();
        let curros = store.insert(new_request("Curros", "Aires da miña terra")).await.unwrap();
        store
            .merge(curros.id, BookRequestChanges::status(BookStatus::Mercado))
            .await
            .unwrap();

        let bought = store
            .search(&BookRequestFilter {
                status: Some(BookStatus::Mercado),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(bought.len(), 1);
        assert_eq!(bought[0].id, curros.id);

        let by_text = store
            .search(&BookRequestFilter {
                search: Some("CANTARES  gallegos".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].id, rosalia.id);

        let by_email = store
            .search(&BookRequestFilter {
                search: Some("curros@".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_email.len(), 1);

        let wildcard = store
            .search(&BookRequestFilter {
                search: Some("%".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(wildcard.is_empty());

        let before_2000 = store
            .search(&BookRequestFilter {
                created_before: Some(datetime!(2000-01-01 00:00 UTC)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(before_2000.is_empty());

        let after_2000 = store
            .search(&BookRequestFilter {
                created_after: Some(datetime!(2000-01-01 00:00 UTC)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(after_2000.len(), 2);
    }

    #[test]
    fn stamps_are_strictly_increasing() {
        let future = OffsetDateTime::now_utc() + Duration::hours(1);
        let stamp = next_stamp(future).unwrap();
        assert_eq!(stamp, future + Duration::microseconds(1));
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
