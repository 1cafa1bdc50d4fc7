use crate::auth::{AccessFilter, CallerContext};
use crate::error::{AppError, Result};
use crate::models::{Client, ClientPayload};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::is_unique_violation;

const CLIENT_SELECT: &str = r#"
    SELECT c.id, c.name, c.email, c.phone, c.address, c.contact_person, c.archived,
           c.created_by, c.company_id, c.created_at, c.updated_at
    FROM clients c
"#;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ClientRepository: Send + Sync {
    async fn name_taken(&self, name: &str, created_by: i64, except_id: Option<i64>)
        -> Result<bool>;
    async fn create(&self, caller: &CallerContext, payload: &ClientPayload) -> Result<Client>;
    async fn update(
        &self,
        id: i64,
        filter: &AccessFilter,
        payload: &ClientPayload,
    ) -> Result<Option<Client>>;
    async fn list(&self, filter: &AccessFilter) -> Result<Vec<Client>>;
    async fn find(&self, id: i64, filter: &AccessFilter) -> Result<Option<Client>>;
    /// Flips the archive flag, only when it currently holds the opposite value.
    async fn set_archived(
        &self,
        id: i64,
        filter: &AccessFilter,
        archived: bool,
    ) -> Result<Option<Client>>;
    async fn delete(&self, id: i64, filter: &AccessFilter) -> Result<bool>;
}

pub struct SqliteClientRepository {
    pool: SqlitePool,
}

impl SqliteClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn select_by_id(id: i64, filter: &AccessFilter) -> QueryBuilder<'static, Sqlite> {
        let mut query = QueryBuilder::new(CLIENT_SELECT);
        query.push(" WHERE c.id = ").push_bind(id).push(" AND ");
        filter.push_predicate(&mut query, "c");
        query
    }
}

fn duplicate_name(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Duplicate("Client already created by this user".to_string())
    } else {
        AppError::Database(err)
    }
}

#[async_trait]
impl ClientRepository for SqliteClientRepository {
    async fn name_taken(
        &self,
        name: &str,
        created_by: i64,
        except_id: Option<i64>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM clients WHERE name = ? AND created_by = ? AND id != ?",
        )
        .bind(name)
        .bind(created_by)
        .bind(except_id.unwrap_or(0))
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn create(&self, caller: &CallerContext, payload: &ClientPayload) -> Result<Client> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO clients
                (name, email, phone, address, contact_person, created_by, company_id,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payload.name.trim())
        .bind(&payload.email)
        .bind(&payload.phone)
        .bind(&payload.address)
        .bind(&payload.contact_person)
        .bind(caller.user_id)
        .bind(&caller.company_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(duplicate_name)?;

        let id = result.last_insert_rowid();
        self.find(id, &AccessFilter::owner(caller))
            .await?
            .ok_or_else(|| AppError::Internal(format!("client {} vanished after insert", id)))
    }

    async fn update(
        &self,
        id: i64,
        filter: &AccessFilter,
        payload: &ClientPayload,
    ) -> Result<Option<Client>> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE clients SET name = ");
        query
            .push_bind(payload.name.trim().to_string())
            .push(", email = ")
            .push_bind(payload.email.clone())
            .push(", phone = ")
            .push_bind(payload.phone.clone())
            .push(", address = ")
            .push_bind(payload.address.clone())
            .push(", contact_person = ")
            .push_bind(payload.contact_person.clone())
            .push(", updated_at = ")
            .push_bind(Utc::now())
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND ");
        filter.push_predicate(&mut query, "clients");

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(duplicate_name)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find(id, filter).await
    }

    async fn list(&self, filter: &AccessFilter) -> Result<Vec<Client>> {
        let mut query = QueryBuilder::<Sqlite>::new(CLIENT_SELECT);
        query.push(" WHERE ");
        filter.push_predicate(&mut query, "c");
        query.push(" ORDER BY c.created_at DESC, c.id DESC");

        let clients = query
            .build_query_as::<Client>()
            .fetch_all(&self.pool)
            .await?;
        Ok(clients)
    }

    async fn find(&self, id: i64, filter: &AccessFilter) -> Result<Option<Client>> {
        let client = Self::select_by_id(id, filter)
            .build_query_as::<Client>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    async fn set_archived(
        &self,
        id: i64,
        filter: &AccessFilter,
        archived: bool,
    ) -> Result<Option<Client>> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE clients SET archived = ");
        query
            .push_bind(archived)
            .push(", updated_at = ")
            .push_bind(Utc::now())
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND archived = ")
            .push_bind(!archived)
            .push(" AND ");
        filter.push_predicate(&mut query, "clients");

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find(id, filter).await
    }

    async fn delete(&self, id: i64, filter: &AccessFilter) -> Result<bool> {
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM clients WHERE id = ");
        query.push_bind(id).push(" AND ");
        filter.push_predicate(&mut query, "clients");

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
