use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetcher::Fetcher;
use crate::store::RootState;

/// A remote user record. Only `id` and `name` are interpreted; every other
/// field the server sends is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub type UsersState = Vec<User>;

#[derive(Debug, Clone)]
pub enum UsersAction {
    FetchFulfilled { users: Vec<User> },
    FetchRejected { message: String },
}

pub fn reduce(mut state: UsersState, action: UsersAction) -> UsersState {
    match action {
        UsersAction::FetchFulfilled { users } => {
            state.extend(users);
            tracing::debug!(total = state.len(), "users fetch fulfilled");
        }
        UsersAction::FetchRejected { message } => {
            tracing::debug!(%message, "users fetch rejected; state unchanged");
        }
    }
    state
}

pub async fn fetch_users(fetcher: &Fetcher, url: Url) -> anyhow::Result<Vec<User>> {
    let bytes = fetcher.get_bytes(url.clone()).await?;
    let users: Vec<User> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse users from {}", url))?;
    tracing::info!(count = users.len(), "fetched users");
    Ok(users)
}

pub fn select_all_users(state: &RootState) -> &[User] {
    &state.users
}

pub fn select_user_by_id(state: &RootState, user_id: u64) -> Option<&User> {
    state.users.iter().find(|u| u.id == user_id)
}
