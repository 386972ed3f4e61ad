use anyhow::Result;
use mongodb::{
    Client, Collection, IndexModel,
    bson::doc,
    error::{ErrorKind, WriteError, WriteFailure},
    options::{ClientOptions, IndexOptions},
};
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::constants::*;
use crate::models::User;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate email")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// User persistence used by the auth routes.
#[trait_variant::make(UserStore: Send)]
pub trait LocalUserStore {
    /// Fails with [`StoreError::Duplicate`] if the email is already taken.
    async fn insert(&self, user: &User) -> Result<(), StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
}

/// Opens the database behind a validated URI.
///
/// `connect` resolves only once the database has answered, so a returned
/// store is known to be reachable at that moment.
pub trait Connector {
    type Store: UserStore + Clone + Sync + 'static;

    fn connect(&self, uri: &str) -> impl Future<Output = Result<Self::Store>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

impl Connector for MongoConnector {
    type Store = MongoUserStore;

    async fn connect(&self, uri: &str) -> Result<MongoUserStore> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_selection_timeout = Some(Duration::from_secs(SERVER_SELECTION_TIMEOUT_SECS));
        options.app_name.get_or_insert_with(|| APP_NAME.to_string());

        let client = Client::with_options(options)?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE_NAME));

        db.run_command(doc! { "ping": 1 }).await?;

        let users = db.collection::<User>(USERS_COLLECTION);
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        users.create_index(email_index).await?;

        Ok(MongoUserStore { users })
    }
}

#[derive(Debug, Clone)]
pub struct MongoUserStore {
    users: Collection<User>,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError {
            code: DUPLICATE_KEY_CODE,
            ..
        }))
    )
}

impl UserStore for MongoUserStore {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        match self.users.insert_one(user).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate),
            Err(e) => Err(StoreError::Other(e.into())),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "email": email }).await?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }
}

/// In-process store keyed by user id.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }
}

/// Hands out a shared [`MemoryUserStore`] without touching the network.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryUserStore,
}

impl MemoryConnector {
    pub fn new(store: MemoryUserStore) -> Self {
        Self { store }
    }
}

impl Connector for MemoryConnector {
    type Store = MemoryUserStore;

    async fn connect(&self, _uri: &str) -> Result<MemoryUserStore> {
        Ok(self.store.clone())
    }
}
