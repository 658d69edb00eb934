mod cli;
mod fetcher;
pub mod posts;
pub mod store;
pub mod users;

use anyhow::Context as _;

pub use cli::{Args as CliArgs, OutputFormat, ReactArg};
pub use fetcher::Fetcher;
pub use store::{Action, Endpoints, RootState, Store, Thunk, ThunkHandle};

use posts::{NewPost, PostsAction, Reaction, RequestStatus};

/// Loads posts and users, applies the requested mutations, and renders the
/// final state in the requested format.
pub async fn run(args: CliArgs) -> anyhow::Result<String> {
    let fetcher = Fetcher::new(&args.user_agent)?;
    let mut store = Store::new(
        fetcher,
        Endpoints {
            posts: args.posts_url.clone(),
            users: args.users_url.clone(),
        },
    );

    let posts_task = store.dispatch_thunk(Thunk::FetchPosts);
    let users_task = store.dispatch_thunk(Thunk::FetchUsers);
    let (posts_res, users_res) = tokio::join!(posts_task.join(), users_task.join());
    store.settle();
    posts_res?;
    users_res.context("fetch users")?;

    if posts::get_posts_status(store.state()) == RequestStatus::Failed {
        tracing::warn!(
            error = posts::get_posts_error(store.state()).unwrap_or(""),
            "posts unavailable"
        );
    }

    if let Some(title) = args.new_title {
        let draft = NewPost {
            title,
            body: args.new_body,
            user_id: args.new_user_id,
        };
        store
            .run(Thunk::AddNewPost(draft))
            .await
            .context("add new post")?;
    }

    for react in args.react {
        store.dispatch(PostsAction::reaction_added(react.post_id, react.reaction));
    }

    match args.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(store.state()).context("serialize state")
        }
        OutputFormat::Summary => Ok(render_summary(store.state())),
    }
}

pub fn render_summary(state: &RootState) -> String {
    let status = posts::get_posts_status(state);
    let all = posts::select_all_posts(state);

    let mut lines = vec![format!("posts: {} ({})", status.as_str(), all.len())];
    if let Some(err) = posts::get_posts_error(state) {
        lines.push(format!("error: {err}"));
    }
    lines.push(format!("users: {}", users::select_all_users(state).len()));

    lines.extend(all.iter().map(|post| {
        let author = post
            .user_id
            .and_then(|id| users::select_user_by_id(state, id))
            .map(|u| u.name.as_str())
            .unwrap_or("unknown author");
        let reactions = Reaction::ALL
            .iter()
            .map(|r| format!("{} {}", r.name(), post.reactions.get(*r)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "#{} {} by {} @ {} [{}]",
            post.id,
            post.title,
            author,
            post.date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            reactions
        )
    }));

    lines.join("\n") + "\n"
}
