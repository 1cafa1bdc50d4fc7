use std::sync::Arc;

use crate::auth::{AccessFilter, CallerContext};
use crate::error::{AppError, Result};
use crate::models::{Client, ClientPayload};
use crate::repositories::ClientRepository;

const DUPLICATE_CLIENT: &str = "Client already created by this user";

pub struct ClientService {
    repository: Arc<dyn ClientRepository>,
}

impl ClientService {
    pub fn new(repository: Arc<dyn ClientRepository>) -> Self {
        Self { repository }
    }

    pub async fn create(&self, caller: &CallerContext, payload: ClientPayload) -> Result<Client> {
        payload.validate()?;

        if self
            .repository
            .name_taken(payload.name.trim(), caller.user_id, None)
            .await?
        {
            return Err(AppError::Duplicate(DUPLICATE_CLIENT.to_string()));
        }

        let client = self.repository.create(caller, &payload).await?;
        tracing::info!(client_id = client.id, user_id = caller.user_id, "Created client");
        Ok(client)
    }

    pub async fn update(
        &self,
        caller: &CallerContext,
        id: i64,
        payload: ClientPayload,
    ) -> Result<Client> {
        payload.validate()?;

        if self
            .repository
            .name_taken(payload.name.trim(), caller.user_id, Some(id))
            .await?
        {
            return Err(AppError::Duplicate(DUPLICATE_CLIENT.to_string()));
        }

        self.repository
            .update(id, &AccessFilter::owner(caller), &payload)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))
    }

    pub async fn list(&self, caller: &CallerContext) -> Result<Vec<Client>> {
        self.repository.list(&AccessFilter::listing(caller)).await
    }

    pub async fn get(&self, caller: &CallerContext, id: i64) -> Result<Client> {
        self.repository
            .find(id, &AccessFilter::lookup(caller))
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))
    }

    pub async fn archive(&self, caller: &CallerContext, id: i64) -> Result<Client> {
        self.repository
            .set_archived(id, &AccessFilter::owner(caller), true)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found or already archived".to_string()))
    }

    pub async fn restore(&self, caller: &CallerContext, id: i64) -> Result<Client> {
        self.repository
            .set_archived(id, &AccessFilter::owner(caller), false)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found or not archived".to_string()))
    }

    pub async fn delete(&self, caller: &CallerContext, id: i64) -> Result<()> {
        if !self
            .repository
            .delete(id, &AccessFilter::owner(caller))
            .await?
        {
            return Err(AppError::NotFound("Client not found".to_string()));
        }

        tracing::info!(client_id = id, user_id = caller.user_id, "Deleted client");
        Ok(())
    }
}
