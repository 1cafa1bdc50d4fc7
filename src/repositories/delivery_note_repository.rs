use crate::auth::{AccessFilter, CallerContext};
use crate::error::{AppError, Result};
use crate::models::{DeliveryNote, DeliveryNoteDetail, LineItem, NewDeliveryNote, NoteType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

const NOTE_COLUMNS: &str = r#"
    n.id, n.project_id, n.client_id, n.created_by, n.company_id, n.note_type, n.data,
    n.date, n.signed, n.signature_url, n.pdf_url, n.created_at, n.updated_at
"#;

/// Storage shape of a note; line items are kept as a JSON array.
#[derive(Debug, FromRow)]
struct NoteRow {
    id: i64,
    project_id: i64,
    client_id: i64,
    created_by: i64,
    company_id: Option<String>,
    note_type: NoteType,
    data: String,
    date: DateTime<Utc>,
    signed: bool,
    signature_url: Option<String>,
    pdf_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct DetailRow {
    #[sqlx(flatten)]
    note: NoteRow,
    project_name: Option<String>,
    client_name: Option<String>,
    created_by_email: Option<String>,
}

impl TryFrom<NoteRow> for DeliveryNote {
    type Error = AppError;

    fn try_from(row: NoteRow) -> Result<Self> {
        let data: Vec<LineItem> = serde_json::from_str(&row.data).map_err(|e| {
            AppError::Internal(format!("delivery note {} has unreadable items: {}", row.id, e))
        })?;

        Ok(DeliveryNote {
            id: row.id,
            project_id: row.project_id,
            client_id: row.client_id,
            created_by: row.created_by,
            company_id: row.company_id,
            note_type: row.note_type,
            data,
            date: row.date,
            signed: row.signed,
            signature_url: row.signature_url,
            pdf_url: row.pdf_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<DetailRow> for DeliveryNoteDetail {
    type Error = AppError;

    fn try_from(row: DetailRow) -> Result<Self> {
        Ok(DeliveryNoteDetail {
            note: row.note.try_into()?,
            project_name: row.project_name,
            client_name: row.client_name,
            created_by_email: row.created_by_email,
        })
    }
}

/// Outcome of the conditional signing commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    Committed,
    AlreadySigned,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait DeliveryNoteRepository: Send + Sync {
    async fn create(&self, caller: &CallerContext, note: &NewDeliveryNote)
        -> Result<DeliveryNote>;
    async fn list(&self, filter: &AccessFilter) -> Result<Vec<DeliveryNote>>;
    async fn find(&self, id: i64, filter: &AccessFilter) -> Result<Option<DeliveryNote>>;
    /// Loads a note with its project, client and creator resolved.
    async fn find_detail(&self, id: i64, filter: &AccessFilter)
        -> Result<Option<DeliveryNoteDetail>>;
    /// Records the signature, only if the note is still unsigned.
    async fn mark_signed(&self, id: i64, signature_url: &str, pdf_url: &str)
        -> Result<SignOutcome>;
    /// Deletes the note, only if it is still unsigned.
    async fn delete_unsigned(&self, id: i64) -> Result<bool>;
}

pub struct SqliteDeliveryNoteRepository {
    pool: SqlitePool,
}

impl SqliteDeliveryNoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryNoteRepository for SqliteDeliveryNoteRepository {
    async fn create(
        &self,
        caller: &CallerContext,
        note: &NewDeliveryNote,
    ) -> Result<DeliveryNote> {
        let data = serde_json::to_string(&note.data)
            .map_err(|e| AppError::Internal(format!("failed to encode line items: {}", e)))?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO delivery_notes
                (project_id, client_id, created_by, company_id, note_type, data, date,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(note.project_id)
        .bind(note.client_id)
        .bind(caller.user_id)
        .bind(&caller.company_id)
        .bind(note.note_type)
        .bind(data)
        .bind(note.date)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.find(id, &AccessFilter::lookup(caller))
            .await?
            .ok_or_else(|| AppError::Internal(format!("delivery note {} vanished after insert", id)))
    }

    async fn list(&self, filter: &AccessFilter) -> Result<Vec<DeliveryNote>> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM delivery_notes n WHERE ", NOTE_COLUMNS));
        filter.push_predicate(&mut query, "n");
        query.push(" ORDER BY n.created_at DESC, n.id DESC");

        let rows = query
            .build_query_as::<NoteRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(DeliveryNote::try_from).collect()
    }

    async fn find(&self, id: i64, filter: &AccessFilter) -> Result<Option<DeliveryNote>> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM delivery_notes n WHERE n.id = ", NOTE_COLUMNS));
        query.push_bind(id).push(" AND ");
        filter.push_predicate(&mut query, "n");

        let row = query
            .build_query_as::<NoteRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(DeliveryNote::try_from).transpose()
    }

    async fn find_detail(
        &self,
        id: i64,
        filter: &AccessFilter,
    ) -> Result<Option<DeliveryNoteDetail>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            r#"
            SELECT {},
                   p.name AS project_name,
                   c.name AS client_name,
                   u.email AS created_by_email
            FROM delivery_notes n
            LEFT JOIN projects p ON p.id = n.project_id
            LEFT JOIN clients c ON c.id = n.client_id
            LEFT JOIN users u ON u.id = n.created_by
            WHERE n.id = "#,
            NOTE_COLUMNS
        ));
        query.push_bind(id).push(" AND ");
        filter.push_predicate(&mut query, "n");

        let row = query
            .build_query_as::<DetailRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(DeliveryNoteDetail::try_from).transpose()
    }

    async fn mark_signed(
        &self,
        id: i64,
        signature_url: &str,
        pdf_url: &str,
    ) -> Result<SignOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE delivery_notes
            SET signed = 1, signature_url = ?, pdf_url = ?, updated_at = ?
            WHERE id = ? AND signed = 0
            "#,
        )
        .bind(signature_url)
        .bind(pdf_url)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(SignOutcome::AlreadySigned);
        }
        Ok(SignOutcome::Committed)
    }

    async fn delete_unsigned(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM delivery_notes WHERE id = ? AND signed = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
