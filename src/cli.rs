use clap::{Parser, ValueEnum};
use url::Url;

use crate::posts::PostId;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// One line per post with author and reaction counts.
    Summary,
    /// The whole root state as pretty-printed JSON.
    Json,
}

/// A `--react` argument: `<POST_ID>:<REACTION>`.
#[derive(Debug, Clone)]
pub struct ReactArg {
    pub post_id: PostId,
    pub reaction: String,
}

fn parse_react(s: &str) -> Result<ReactArg, String> {
    let (id, reaction) = s
        .split_once(':')
        .ok_or_else(|| format!("expected <POST_ID>:<REACTION>, got {s:?}"))?;
    let post_id = id
        .trim()
        .parse()
        .map_err(|e| format!("invalid post id {id:?}: {e}"))?;
    Ok(ReactArg {
        post_id,
        reaction: reaction.trim().to_string(),
    })
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Posts resource, used for both listing (GET) and creating (POST) posts.
    #[arg(long, default_value = crate::store::POSTS_URL)]
    pub posts_url: Url,

    /// Users resource.
    #[arg(long, default_value = crate::store::USERS_URL)]
    pub users_url: Url,

    /// Title of a post to create after loading. No post is created without it.
    #[arg(long)]
    pub new_title: Option<String>,

    /// Body of the post to create.
    #[arg(long, default_value = "")]
    pub new_body: String,

    /// Author of the post to create.
    #[arg(long, default_value_t = 1)]
    pub new_user_id: u64,

    /// Add a reaction, e.g. `--react 7:heart`. May be repeated.
    ///
    /// Reactions: thumbsUp, wow, heart, rocket, coffee. Unknown posts or reaction names are ignored.
    #[arg(long, value_parser = parse_react)]
    pub react: Vec<ReactArg>,

    /// Output format: `summary` or `json`.
    #[arg(long, value_enum, default_value = "summary")]
    pub format: OutputFormat,

    /// HTTP User-Agent.
    #[arg(long, default_value = "blog-state/0.1")]
    pub user_agent: String,
}
