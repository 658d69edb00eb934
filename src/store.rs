use anyhow::Context as _;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::fetcher::Fetcher;
use crate::posts::{self, NewPost, PostsAction, PostsState};
use crate::users::{self, UsersAction, UsersState};

pub const POSTS_URL: &str = "https://jsonplaceholder.typicode.com/posts";
pub const USERS_URL: &str = "https://jsonplaceholder.typicode.com/users";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RootState {
    pub posts: PostsState,
    pub users: UsersState,
}

#[derive(Debug, Clone)]
pub enum Action {
    Posts(PostsAction),
    Users(UsersAction),
}

impl From<PostsAction> for Action {
    fn from(action: PostsAction) -> Self {
        Action::Posts(action)
    }
}

impl From<UsersAction> for Action {
    fn from(action: UsersAction) -> Self {
        Action::Users(action)
    }
}

pub fn reduce(state: RootState, action: Action) -> RootState {
    let RootState { posts, users } = state;
    match action {
        Action::Posts(action) => RootState {
            posts: posts::reduce(posts, action),
            users,
        },
        Action::Users(action) => RootState {
            posts,
            users: users::reduce(users, action),
        },
    }
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub posts: Url,
    pub users: Url,
}

#[derive(Debug, Clone)]
pub enum Thunk {
    FetchPosts,
    AddNewPost(NewPost),
    FetchUsers,
}

impl Thunk {
    fn type_prefix(&self) -> &'static str {
        match self {
            Thunk::FetchPosts => "posts/fetchPosts",
            Thunk::AddNewPost(_) => "posts/addNewPost",
            Thunk::FetchUsers => "users/fetchUsers",
        }
    }
}

/// An in-flight thunk. Joining yields the error of a rejection the slices do
/// not handle themselves (create-post and users fetch).
pub struct ThunkHandle {
    name: &'static str,
    task: JoinHandle<anyhow::Result<()>>,
}

impl ThunkHandle {
    /// Cancels the request. The thunk still settles, as rejected.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub async fn join(self) -> anyhow::Result<()> {
        self.task
            .await
            .with_context(|| format!("{} task", self.name))?
    }
}

/// Owns the root state. Transitions are applied one at a time through
/// `&mut self`; network thunks run as tokio tasks and report back over a
/// channel that only this store drains.
pub struct Store {
    state: RootState,
    fetcher: Fetcher,
    endpoints: Endpoints,
    in_flight: usize,
    settled_tx: mpsc::UnboundedSender<Action>,
    settled_rx: mpsc::UnboundedReceiver<Action>,
}

impl Store {
    pub fn new(fetcher: Fetcher, endpoints: Endpoints) -> Self {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        Self {
            state: RootState::default(),
            fetcher,
            endpoints,
            in_flight: 0,
            settled_tx,
            settled_rx,
        }
    }

    pub fn state(&self) -> &RootState {
        &self.state
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn dispatch(&mut self, action: impl Into<Action>) -> &RootState {
        let action = action.into();
        tracing::debug!(?action, "dispatch");
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
        &self.state
    }

    /// Starts `thunk` on the current tokio runtime. Every thunk settles with
    /// exactly one fulfilled or rejected action, applied on the next
    /// [`Store::settle`] or [`Store::next_settled`].
    pub fn dispatch_thunk(&mut self, thunk: Thunk) -> ThunkHandle {
        let name = thunk.type_prefix();
        let fetcher = self.fetcher.clone();
        self.in_flight += 1;
        tracing::debug!(thunk = name, "dispatch thunk");

        let task = match thunk {
            Thunk::FetchPosts => {
                self.dispatch(PostsAction::FetchPending);
                let url = self.endpoints.posts.clone();
                let settler = Settler::new(self.settled_tx.clone(), name, |message| {
                    PostsAction::FetchRejected { message }.into()
                });
                tokio::spawn(async move {
                    let action = match posts::fetch_posts(&fetcher, url).await {
                        Ok(batch) => PostsAction::FetchFulfilled {
                            posts: batch,
                            at: Utc::now(),
                        },
                        Err(err) => {
                            tracing::warn!("fetch posts failed: {:#}", err);
                            PostsAction::FetchRejected {
                                message: format!("{:#}", err),
                            }
                        }
                    };
                    settler.settle(action);
                    Ok(())
                })
            }
            Thunk::AddNewPost(draft) => {
                let url = self.endpoints.posts.clone();
                let settler = Settler::new(self.settled_tx.clone(), name, |message| {
                    PostsAction::AddNewPostRejected { message }.into()
                });
                tokio::spawn(async move {
                    match posts::add_new_post(&fetcher, url, &draft).await {
                        Ok(post) => {
                            settler.settle(PostsAction::AddNewPostFulfilled {
                                post,
                                at: Utc::now(),
                            });
                            Ok(())
                        }
                        Err(err) => {
                            settler.reject(format!("{:#}", err));
                            Err(err)
                        }
                    }
                })
            }
            Thunk::FetchUsers => {
                let url = self.endpoints.users.clone();
                let settler = Settler::new(self.settled_tx.clone(), name, |message| {
                    UsersAction::FetchRejected { message }.into()
                });
                tokio::spawn(async move {
                    match users::fetch_users(&fetcher, url).await {
                        Ok(batch) => {
                            settler.settle(UsersAction::FetchFulfilled { users: batch });
                            Ok(())
                        }
                        Err(err) => {
                            settler.reject(format!("{:#}", err));
                            Err(err)
                        }
                    }
                })
            }
        };

        ThunkHandle { name, task }
    }

    /// Applies every lifecycle action that has already arrived. Returns how
    /// many were applied.
    pub fn settle(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(action) = self.settled_rx.try_recv() {
            self.apply_settled(action);
            applied += 1;
        }
        applied
    }

    /// Waits for the next thunk to settle and applies its action. Returns
    /// `None` when nothing is in flight.
    pub async fn next_settled(&mut self) -> Option<&RootState> {
        if self.in_flight == 0 {
            return None;
        }
        let action = self.settled_rx.recv().await?;
        self.apply_settled(action);
        Some(&self.state)
    }

    /// Dispatches `thunk`, waits for it, and returns the resulting snapshot.
    pub async fn run(&mut self, thunk: Thunk) -> anyhow::Result<&RootState> {
        let handle = self.dispatch_thunk(thunk);
        let outcome = handle.join().await;
        self.settle();
        outcome?;
        Ok(&self.state)
    }

    fn apply_settled(&mut self, action: Action) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.dispatch(action);
    }
}

/// Delivers a thunk's single lifecycle action. Dropped unsettled (the task
/// panicked or was aborted), it delivers the thunk's rejected action instead.
struct Settler {
    tx: mpsc::UnboundedSender<Action>,
    name: &'static str,
    rejected: fn(String) -> Action,
    settled: bool,
}

impl Settler {
    fn new(
        tx: mpsc::UnboundedSender<Action>,
        name: &'static str,
        rejected: fn(String) -> Action,
    ) -> Self {
        Self {
            tx,
            name,
            rejected,
            settled: false,
        }
    }

    fn settle(mut self, action: impl Into<Action>) {
        self.deliver(action.into());
    }

    fn reject(mut self, message: String) {
        let action = (self.rejected)(message);
        self.deliver(action);
    }

    fn deliver(&mut self, action: Action) {
        self.settled = true;
        if self.tx.send(action).is_err() {
            tracing::debug!(thunk = self.name, "store dropped before thunk settled");
        }
    }
}

impl Drop for Settler {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(thunk = self.name, "thunk task ended without settling");
            let action = (self.rejected)(format!("{} task ended before settling", self.name));
            self.deliver(action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_snapshot() {
        let json = serde_json::to_value(RootState::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "posts": {"posts": [], "status": "idle", "error": null},
                "users": []
            })
        );
    }

    #[test]
    fn dropped_settler_delivers_rejection() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let settler = Settler::new(tx.clone(), "users/fetchUsers", |message| {
            UsersAction::FetchRejected { message }.into()
        });
        drop(settler);
        match rx.try_recv() {
            Ok(Action::Users(UsersAction::FetchRejected { message })) => {
                assert_eq!(message, "users/fetchUsers task ended before settling");
            }
            other => panic!("unexpected {other:?}"),
        }

        let settler = Settler::new(tx, "users/fetchUsers", |message| {
            UsersAction::FetchRejected { message }.into()
        });
        settler.settle(UsersAction::FetchFulfilled { users: Vec::new() });
        assert!(matches!(
            rx.try_recv(),
            Ok(Action::Users(UsersAction::FetchFulfilled { .. }))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn root_reduce_routes_to_one_slice() {
        let state = reduce(RootState::default(), PostsAction::FetchPending.into());
        assert_eq!(state.posts.status, posts::RequestStatus::Loading);
        assert!(state.users.is_empty());

        let users: Vec<users::User> =
            serde_json::from_str(r#"[{"id":1,"name":"a"}]"#).unwrap();
        let next = reduce(state.clone(), UsersAction::FetchFulfilled { users }.into());
        assert_eq!(next.posts, state.posts);
        assert_eq!(next.users.len(), 1);
    }
}
