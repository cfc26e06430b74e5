use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use parlor_store::{DocumentStore, StoreError};
use parlor_types::{collections, NameError, User, NAME_FIELD};

use crate::profile::{ProfileStore, DISPLAY_NAME_KEY};

/// What came of trying to claim a display name. `NameTaken` is a normal
/// outcome, not an error: the caller asks for another candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered(String),
    NameTaken,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The candidate failed validation; nothing was sent anywhere.
    #[error(transparent)]
    InvalidName(#[from] NameError),

    /// The store could not be asked. Deliberately distinct from
    /// [`RegisterOutcome::NameTaken`]: an unreachable store says nothing
    /// about whether the name is free.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The local profile database misbehaved.
    #[error("profile store failed: {0}")]
    Profile(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IdentityError {
    fn profile(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Profile(err.into())
    }
}

/// Gate in front of the room: nobody syncs or sends without a registered
/// display name.
pub struct IdentityGate {
    store: Arc<dyn DocumentStore>,
    profile: Arc<ProfileStore>,
}

impl IdentityGate {
    pub fn new(store: Arc<dyn DocumentStore>, profile: Arc<ProfileStore>) -> Self {
        Self { store, profile }
    }

    /// The display name this device registered earlier, if any. Answered
    /// from the local profile alone; the store is never contacted.
    pub async fn ensure_identity(&self) -> Result<Option<String>, IdentityError> {
        let profile = self.profile.clone();
        let saved = tokio::task::spawn_blocking(move || profile.get(DISPLAY_NAME_KEY))
            .await
            .map_err(IdentityError::profile)?
            .map_err(IdentityError::profile)?;
        Ok(saved)
    }

    /// Try to claim `candidate` for this device.
    ///
    /// Validation runs first and never touches the network. The claim
    /// itself is one unique insert; the store decides who wins when two
    /// clients race on the same name. Only after the store says yes is
    /// the name persisted locally.
    pub async fn register_name(&self, candidate: &str) -> Result<RegisterOutcome, IdentityError> {
        let user = User::new(candidate)?;

        match self
            .store
            .insert_unique(collections::USERS, NAME_FIELD, user.to_fields())
            .await
        {
            Ok(_) => {}
            Err(StoreError::Conflict { .. }) => {
                info!("display name '{}' is already taken", user.name);
                return Ok(RegisterOutcome::NameTaken);
            }
            Err(e) => return Err(e.into()),
        }

        let profile = self.profile.clone();
        let name = user.name.clone();
        tokio::task::spawn_blocking(move || profile.set(DISPLAY_NAME_KEY, &name))
            .await
            .map_err(IdentityError::profile)?
            .map_err(IdentityError::profile)?;

        info!("registered as '{}'", user.name);
        Ok(RegisterOutcome::Registered(user.name))
    }
}
