use std::sync::Arc;

use anyhow::Context;
use quill_client::{
    api::{cancellation, CommentId, PostId, Uuid},
    CommentTray, Level, ReplyAffordance, TrayView,
};

mod backend;
use backend::HttpCommentService;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base URL of the comment backend
    #[structopt(short, long, env = "QUILL_HOST")]
    host: String,

    /// Bearer token; comments can only be read without one
    #[structopt(short, long, env = "QUILL_TOKEN")]
    token: Option<String>,

    /// Post whose comments to work on
    #[structopt(short, long, parse(try_from_str = parse_post_id))]
    post: PostId,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// List the top-level comments
    Show,

    /// Show a comment along with its replies
    Thread {
        #[structopt(parse(try_from_str = parse_comment_id))]
        comment: CommentId,
    },

    /// Add a comment
    Comment { text: String },

    /// Reply to a top-level comment
    Reply {
        #[structopt(parse(try_from_str = parse_comment_id))]
        parent: CommentId,
        text: String,
    },

    /// Edit one of your comments
    Edit {
        #[structopt(parse(try_from_str = parse_comment_id))]
        comment: CommentId,
        text: String,

        /// Set when editing a reply
        #[structopt(long, parse(try_from_str = parse_comment_id))]
        parent: Option<CommentId>,
    },

    /// Delete one of your comments
    Delete {
        #[structopt(parse(try_from_str = parse_comment_id))]
        comment: CommentId,

        /// Set when deleting a reply
        #[structopt(long, parse(try_from_str = parse_comment_id))]
        parent: Option<CommentId>,
    },
}

fn parse_post_id(s: &str) -> Result<PostId, String> {
    Uuid::try_parse(s).map(PostId).map_err(|e| e.to_string())
}

fn parse_comment_id(s: &str) -> Result<CommentId, String> {
    Uuid::try_parse(s).map(CommentId).map_err(|e| e.to_string())
}

fn print_view(view: &TrayView) {
    if !view.loaded {
        println!("(comments could not be loaded)");
        return;
    }
    println!("{} comments", view.total_comments);
    for entry in &view.entries {
        let c = &entry.comment;
        let badge = if entry.by_post_author { " [author]" } else { "" };
        let edited = if c.is_edited() { " (edited)" } else { "" };
        println!(
            "\n{} @{}{badge} {}{edited}",
            c.author.display_name,
            c.author.username,
            c.created_at.format("%Y-%m-%d %H:%M"),
        );
        println!("  {}", c.content);
        println!("  id: {}", c.id.0);
        match &entry.replies {
            ReplyAffordance::None => (),
            ReplyAffordance::Collapsed { label } | ReplyAffordance::Opening { label } => {
                println!("  [{label}]")
            }
            ReplyAffordance::Expanded { label, replies } => {
                println!("  [{label}]");
                for r in replies {
                    let badge = if r.by_post_author { " [author]" } else { "" };
                    println!(
                        "    {} @{}{badge} replying to @{}",
                        r.comment.author.display_name, r.comment.author.username, r.replying_to,
                    );
                    println!("      {}", r.comment.content);
                    println!("      id: {}", r.comment.id.0);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let service = Arc::new(HttpCommentService::new(opt.host, opt.token));

    let (_teardown, cancel) = cancellation();
    let post = service
        .fetch_post(opt.post, &cancel)
        .await
        .context("fetching post")?;
    let actor = service
        .whoami(&cancel)
        .await
        .context("fetching the signed-in user")?;
    tracing::debug!(post = ?post.id, signed_in = actor.is_some(), "mounting comment tray");

    let tray = CommentTray::mount(service, actor, post).await;
    let res = match opt.cmd {
        Command::Show => Ok(()),
        Command::Thread { comment } => tray.expand(comment).await,
        Command::Comment { text } => tray.create(&text).await.map(drop),
        Command::Reply { parent, text } => tray.create_reply(parent, &text).await.map(drop),
        Command::Edit {
            comment,
            text,
            parent,
        } => match parent {
            None => tray.edit(comment, &text).await,
            Some(parent) => match tray.expand(parent).await {
                Ok(()) => tray.edit_reply(parent, comment, &text).await,
                Err(e) => Err(e),
            },
        },
        Command::Delete { comment, parent } => match parent {
            None => tray.delete(comment).await,
            Some(parent) => match tray.expand(parent).await {
                Ok(()) => tray.delete_reply(parent, comment).await,
                Err(e) => Err(e),
            },
        },
    };

    print_view(&tray.view());
    for n in tray.take_notifications() {
        match n.level {
            Level::Success => println!("\n{}", n.message),
            Level::Error => eprintln!("\nerror: {}", n.message),
        }
    }
    tray.unmount();

    res.context("running comment command")
}
