use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::push::{PushError, PushGateway, PushPayload};
use crate::{
    db::{
        jobdb::JobExt, memory::MemoryStore, notificationdb::NotificationExt, taxonomydb::TaxonomyExt,
        userdb::UserExt,
    },
    models::{
        jobmodel::{Job, NewJob},
        notificationmodel::TicketOutcome,
        usermodel::{NewUser, User},
    },
};

/// Gateway double: records every batch, answers per token.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    pub batches: Mutex<Vec<Vec<String>>>,
    pub outcomes: Mutex<HashMap<String, TicketOutcome>>,
    pub fail_all: Mutex<bool>,
}

impl RecordingGateway {
    pub fn answer(&self, token: &str, outcome: TicketOutcome) {
        self.outcomes.lock().unwrap().insert(token.to_string(), outcome);
    }

    pub fn fail_every_batch(&self) {
        *self.fail_all.lock().unwrap() = true;
    }

    pub fn sent_tokens(&self) -> Vec<String> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn publish(&self, tokens: &[String], _payload: &PushPayload) -> Result<Vec<TicketOutcome>, PushError> {
        self.batches.lock().unwrap().push(tokens.to_vec());
        if *self.fail_all.lock().unwrap() {
            return Err(PushError::Transport("connection reset".to_string()));
        }
        let outcomes = self.outcomes.lock().unwrap();
        Ok(tokens
            .iter()
            .map(|t| outcomes.get(t).cloned().unwrap_or(TicketOutcome::Delivered))
            .collect())
    }
}

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub async fn user(store: &MemoryStore, name: &str) -> User {
    store
        .save_user(NewUser {
            name: name.to_string(),
            email: Some(format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4())),
            phone: None,
            password: None,
            oauth_issuer: None,
        })
        .await
        .unwrap()
}

/// A user living in `location_id` with one registered device.
pub async fn resident(store: &MemoryStore, name: &str, location_id: Uuid) -> User {
    let user = user(store, name).await;
    store.set_user_locations(user.id, &[location_id]).await.unwrap();
    store
        .register_device(user.id, &format!("ExponentPushToken[{}]", name), Some("ios".into()))
        .await
        .unwrap();
    user
}

pub async fn pending_job(store: &MemoryStore, owner_id: Uuid, location_id: Option<Uuid>) -> Job {
    store
        .create_job(NewJob {
            owner_id,
            title: "Fix the sink".to_string(),
            description: "Kitchen sink leaks".to_string(),
            cost: BigDecimal::from(120_i64),
            address: None,
            location_id,
            service_ids: vec![],
        })
        .await
        .unwrap()
}
