use std::sync::Arc;

use crate::auth::{AccessFilter, CallerContext};
use crate::error::{AppError, Result};
use crate::models::{Project, ProjectPayload};
use crate::repositories::{ClientRepository, ProjectRecord, ProjectRepository};

const DUPLICATE_PROJECT: &str = "A project with this name already exists.";

pub struct ProjectService {
    repository: Arc<dyn ProjectRepository>,
    clients: Arc<dyn ClientRepository>,
}

impl ProjectService {
    pub fn new(repository: Arc<dyn ProjectRepository>, clients: Arc<dyn ClientRepository>) -> Self {
        Self {
            repository,
            clients,
        }
    }

    /// Validates the payload and checks that the referenced client is visible to the caller.
    async fn to_record(&self, caller: &CallerContext, payload: ProjectPayload) -> Result<ProjectRecord> {
        let client_id = payload.validate()?;

        if self
            .clients
            .find(client_id, &AccessFilter::lookup(caller))
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Client not found".to_string()));
        }

        Ok(ProjectRecord {
            name: payload.name.trim().to_string(),
            description: payload.description,
            client_id,
        })
    }

    pub async fn create(&self, caller: &CallerContext, payload: ProjectPayload) -> Result<Project> {
        let record = self.to_record(caller, payload).await?;

        if self
            .repository
            .name_taken(&record.name, caller.user_id, None)
            .await?
        {
            return Err(AppError::Duplicate(DUPLICATE_PROJECT.to_string()));
        }

        let project = self.repository.create(caller, &record).await?;
        tracing::info!(project_id = project.id, user_id = caller.user_id, "Created project");
        Ok(project)
    }

    pub async fn update(
        &self,
        caller: &CallerContext,
        id: i64,
        payload: ProjectPayload,
    ) -> Result<Project> {
        let record = self.to_record(caller, payload).await?;

        if self
            .repository
            .name_taken(&record.name, caller.user_id, Some(id))
            .await?
        {
            return Err(AppError::Duplicate(DUPLICATE_PROJECT.to_string()));
        }

        self.repository
            .update(id, &AccessFilter::owner(caller), &record)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
    }

    pub async fn list(&self, caller: &CallerContext) -> Result<Vec<Project>> {
        self.repository.list(&AccessFilter::listing(caller)).await
    }

    pub async fn get(&self, caller: &CallerContext, id: i64) -> Result<Project> {
        self.repository
            .find(id, &AccessFilter::lookup(caller))
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
    }

    pub async fn archive(&self, caller: &CallerContext, id: i64) -> Result<Project> {
        self.repository
            .set_archived(id, &AccessFilter::owner(caller), true)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found or already archived".to_string()))
    }

    pub async fn restore(&self, caller: &CallerContext, id: i64) -> Result<Project> {
        self.repository
            .set_archived(id, &AccessFilter::owner(caller), false)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found or not archived".to_string()))
    }

    pub async fn delete(&self, caller: &CallerContext, id: i64) -> Result<()> {
        if !self
            .repository
            .delete(id, &AccessFilter::owner(caller))
            .await?
        {
            return Err(AppError::NotFound("Project not found".to_string()));
        }

        tracing::info!(project_id = id, user_id = caller.user_id, "Deleted project");
        Ok(())
    }
}
