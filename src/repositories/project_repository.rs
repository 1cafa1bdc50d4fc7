use crate::auth::{AccessFilter, CallerContext};
use crate::error::{AppError, Result};
use crate::models::Project;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::is_unique_violation;

const PROJECT_SELECT: &str = r#"
    SELECT p.id, p.name, p.description, p.archived, p.client_id, p.created_by,
           p.company_id, p.created_at, p.updated_at
    FROM projects p
"#;

/// Validated project fields, as written to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub name: String,
    pub description: Option<String>,
    pub client_id: i64,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ProjectRepository: Send + Sync {
    async fn name_taken(&self, name: &str, created_by: i64, except_id: Option<i64>)
        -> Result<bool>;
    async fn create(&self, caller: &CallerContext, record: &ProjectRecord) -> Result<Project>;
    async fn update(
        &self,
        id: i64,
        filter: &AccessFilter,
        record: &ProjectRecord,
    ) -> Result<Option<Project>>;
    async fn list(&self, filter: &AccessFilter) -> Result<Vec<Project>>;
    async fn find(&self, id: i64, filter: &AccessFilter) -> Result<Option<Project>>;
    /// Flips the archive flag, only when it currently holds the opposite value.
    async fn set_archived(
        &self,
        id: i64,
        filter: &AccessFilter,
        archived: bool,
    ) -> Result<Option<Project>>;
    async fn delete(&self, id: i64, filter: &AccessFilter) -> Result<bool>;
}

pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn duplicate_name(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Duplicate("A project with this name already exists.".to_string())
    } else {
        AppError::Database(err)
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn name_taken(
        &self,
        name: &str,
        created_by: i64,
        except_id: Option<i64>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE name = ? AND created_by = ? AND id != ?",
        )
        .bind(name)
        .bind(created_by)
        .bind(except_id.unwrap_or(0))
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn create(&self, caller: &CallerContext, record: &ProjectRecord) -> Result<Project> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO projects
                (name, description, client_id, created_by, company_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.client_id)
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
            .ok_or_else(|| AppError::Internal(format!("project {} vanished after insert", id)))
    }

    async fn update(
        &self,
        id: i64,
        filter: &AccessFilter,
        record: &ProjectRecord,
    ) -> Result<Option<Project>> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE projects SET name = ");
        query
            .push_bind(record.name.clone())
            .push(", description = ")
            .push_bind(record.description.clone())
            .push(", client_id = ")
            .push_bind(record.client_id)
            .push(", updated_at = ")
            .push_bind(Utc::now())
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND ");
        filter.push_predicate(&mut query, "projects");

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

    async fn list(&self, filter: &AccessFilter) -> Result<Vec<Project>> {
        let mut query = QueryBuilder::<Sqlite>::new(PROJECT_SELECT);
        query.push(" WHERE ");
        filter.push_predicate(&mut query, "p");
        query.push(" ORDER BY p.created_at DESC, p.id DESC");

        let projects = query
            .build_query_as::<Project>()
            .fetch_all(&self.pool)
            .await?;
        Ok(projects)
    }

    async fn find(&self, id: i64, filter: &AccessFilter) -> Result<Option<Project>> {
        let mut query = QueryBuilder::<Sqlite>::new(PROJECT_SELECT);
        query.push(" WHERE p.id = ").push_bind(id).push(" AND ");
        filter.push_predicate(&mut query, "p");

        let project = query
            .build_query_as::<Project>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn set_archived(
        &self,
        id: i64,
        filter: &AccessFilter,
        archived: bool,
    ) -> Result<Option<Project>> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE projects SET archived = ");
        query
            .push_bind(archived)
            .push(", updated_at = ")
            .push_bind(Utc::now())
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND archived = ")
            .push_bind(!archived)
            .push(" AND ");
        filter.push_predicate(&mut query, "projects");

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find(id, filter).await
    }

    async fn delete(&self, id: i64, filter: &AccessFilter) -> Result<bool> {
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM projects WHERE id = ");
        query.push_bind(id).push(" AND ");
        filter.push_predicate(&mut query, "projects");

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
