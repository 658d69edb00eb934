use std::str::FromStr;

use anyhow::Context as _;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetcher::Fetcher;
use crate::store::RootState;

pub type PostId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reaction {
    ThumbsUp,
    Wow,
    Heart,
    Rocket,
    Coffee,
}

impl Reaction {
    pub const ALL: [Reaction; 5] = [
        Reaction::ThumbsUp,
        Reaction::Wow,
        Reaction::Heart,
        Reaction::Rocket,
        Reaction::Coffee,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Reaction::ThumbsUp => "thumbsUp",
            Reaction::Wow => "wow",
            Reaction::Heart => "heart",
            Reaction::Rocket => "rocket",
            Reaction::Coffee => "coffee",
        }
    }
}

impl FromStr for Reaction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reaction::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown reaction {s:?}"))
    }
}

/// Per-post reaction counters. Always fully populated; a fresh value has
/// every counter at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reactions {
    pub thumbs_up: u64,
    pub wow: u64,
    pub heart: u64,
    pub rocket: u64,
    pub coffee: u64,
}

impl Reactions {
    pub fn get(&self, reaction: Reaction) -> u64 {
        match reaction {
            Reaction::ThumbsUp => self.thumbs_up,
            Reaction::Wow => self.wow,
            Reaction::Heart => self.heart,
            Reaction::Rocket => self.rocket,
            Reaction::Coffee => self.coffee,
        }
    }

    pub fn increment(&mut self, reaction: Reaction) {
        let slot = match reaction {
            Reaction::ThumbsUp => &mut self.thumbs_up,
            Reaction::Wow => &mut self.wow,
            Reaction::Heart => &mut self.heart,
            Reaction::Rocket => &mut self.rocket,
            Reaction::Coffee => &mut self.coffee,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub body: String,
    /// `None` when a created post echoed an author id that is not a number;
    /// serialized as `null`.
    pub user_id: Option<u64>,
    pub date: DateTime<Utc>,
    pub reactions: Reactions,
}

/// A post as returned by `GET <posts>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePost {
    pub id: PostId,
    pub title: String,
    pub body: String,
    pub user_id: u64,
}

/// Body of `POST <posts>`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub user_id: u64,
}

/// The record echoed back by `POST <posts>`. Some backends echo `userId`
/// as a string, so it is kept raw until the post enters state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPost {
    pub id: PostId,
    pub title: String,
    pub body: String,
    pub user_id: RawUserId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawUserId {
    Number(u64),
    Float(f64),
    Text(String),
}

impl RawUserId {
    /// Numeric author id, if the echoed value denotes a non-negative integer.
    pub fn coerce(&self) -> Option<u64> {
        match self {
            RawUserId::Number(n) => Some(*n),
            RawUserId::Float(f) => integral(*f),
            RawUserId::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Some(0);
                }
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
        }
    }
}

fn integral(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then(|| f as u64)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Idle => "idle",
            RequestStatus::Loading => "loading",
            RequestStatus::Succeeded => "succeeded",
            RequestStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostsState {
    pub posts: Vec<Post>,
    pub status: RequestStatus,
    pub error: Option<String>,
}

/// Transitions of the posts slice. Fulfilled actions carry the instant the
/// request settled so the reducer stays deterministic.
#[derive(Debug, Clone)]
pub enum PostsAction {
    FetchPending,
    FetchFulfilled {
        posts: Vec<RemotePost>,
        at: DateTime<Utc>,
    },
    FetchRejected {
        message: String,
    },
    AddNewPostFulfilled {
        post: CreatedPost,
        at: DateTime<Utc>,
    },
    AddNewPostRejected {
        message: String,
    },
    ReactionAdded {
        post_id: PostId,
        reaction: String,
    },
}

impl PostsAction {
    pub fn reaction_added(post_id: PostId, reaction: impl Into<String>) -> Self {
        PostsAction::ReactionAdded {
            post_id,
            reaction: reaction.into(),
        }
    }
}

pub fn reduce(mut state: PostsState, action: PostsAction) -> PostsState {
    match action {
        PostsAction::FetchPending => {
            state.status = RequestStatus::Loading;
        }
        PostsAction::FetchFulfilled { posts, at } => {
            state.status = RequestStatus::Succeeded;
            // Post N of the batch is dated N minutes before `at`.
            let loaded = posts.into_iter().zip(1i64..).map(|(p, min)| Post {
                id: p.id,
                title: p.title,
                body: p.body,
                user_id: Some(p.user_id),
                date: at - TimeDelta::minutes(min),
                reactions: Reactions::default(),
            });
            state.posts.extend(loaded);
            tracing::debug!(total = state.posts.len(), "posts fetch fulfilled");
        }
        PostsAction::FetchRejected { message } => {
            state.status = RequestStatus::Failed;
            state.error = Some(message);
        }
        PostsAction::AddNewPostFulfilled { post, at } => {
            let user_id = post.user_id.coerce();
            if user_id.is_none() {
                tracing::warn!(id = post.id, user_id = ?post.user_id, "created post has non-numeric userId");
            }
            state.posts.push(Post {
                id: post.id,
                title: post.title,
                body: post.body,
                user_id,
                date: at,
                reactions: Reactions::default(),
            });
        }
        PostsAction::AddNewPostRejected { message } => {
            tracing::debug!(%message, "add new post rejected; state unchanged");
        }
        PostsAction::ReactionAdded { post_id, reaction } => {
            let Ok(reaction) = reaction.parse::<Reaction>() else {
                tracing::debug!(post_id, %reaction, "ignoring unknown reaction");
                return state;
            };
            match state.posts.iter_mut().find(|p| p.id == post_id) {
                Some(post) => post.reactions.increment(reaction),
                None => tracing::debug!(post_id, "ignoring reaction for unknown post"),
            }
        }
    }
    state
}

pub async fn fetch_posts(fetcher: &Fetcher, url: Url) -> anyhow::Result<Vec<RemotePost>> {
    let bytes = fetcher.get_bytes(url.clone()).await?;
    let posts: Vec<RemotePost> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse posts from {}", url))?;
    tracing::info!(count = posts.len(), "fetched posts");
    Ok(posts)
}

pub async fn add_new_post(
    fetcher: &Fetcher,
    url: Url,
    draft: &NewPost,
) -> anyhow::Result<CreatedPost> {
    let bytes = fetcher.post_json(url.clone(), draft).await?;
    let created: CreatedPost = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse created post from {}", url))?;
    tracing::info!(id = created.id, "created post");
    Ok(created)
}

pub fn select_all_posts(state: &RootState) -> &[Post] {
    &state.posts.posts
}

pub fn get_posts_status(state: &RootState) -> RequestStatus {
    state.posts.status
}

pub fn get_posts_error(state: &RootState) -> Option<&str> {
    state.posts.error.as_deref()
}

pub fn select_post_by_id(state: &RootState, post_id: PostId) -> Option<&Post> {
    state.posts.posts.iter().find(|p| p.id == post_id)
}
