//! comment-pool - inspect how a discussion unfolds
//!
//! Loads comments from a JSON or SQLite file, drives the comment pool the
//! way a forum page would, and prints the resulting outline.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comment_pool::adapters::{JsonCommentSource, SqliteCommentSource};
use comment_pool::config::load_config;
use comment_pool::domain::{find_node, group_thread};
use comment_pool::outline::{render_forest, render_group};
use comment_pool::{CommentId, CommentPool, CommentSource, PoolLimits};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "comment-pool")]
#[command(about = "Rebuild and progressively reveal comment threads")]
#[command(version)]
struct Args {
    /// Comment file: `.json` array or SQLite database
    source: PathBuf,

    /// Number of comments shown before anything is revealed
    #[arg(short, long, default_value_t = 10)]
    initial: usize,

    /// Config file (default: <config dir>/comment-pool/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the visible forest
    Tree,
    /// Print everything loaded, hidden comments included
    Loaded,
    /// Reveal more top-level comments
    More {
        /// How many (default: configured batch)
        count: Option<usize>,
    },
    /// Reveal replies to a comment
    Children {
        id: String,
        count: Option<usize>,
    },
    /// Reveal every loaded ancestor of a comment
    Ancestors { id: String },
    /// Collapse the single-reply chain starting at a visible comment
    Group { id: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match source_kind(&args.source)? {
        SourceKind::Json => {
            let source = JsonCommentSource::new(&args.source, args.initial);
            run(source, config.limits, args.command).await
        }
        SourceKind::Sqlite => {
            let source = SqliteCommentSource::open(&args.source, args.initial)?;
            run(source, config.limits, args.command).await
        }
    }
}

enum SourceKind {
    Json,
    Sqlite,
}

fn source_kind(path: &Path) -> Result<SourceKind> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(SourceKind::Json),
        Some("db" | "sqlite" | "sqlite3") => Ok(SourceKind::Sqlite),
        _ => bail!(
            "Unrecognized comment source '{}': expected .json, .db or .sqlite",
            path.display()
        ),
    }
}

async fn run<S: CommentSource>(source: S, limits: PoolLimits, command: Command) -> Result<()> {
    let mut pool = CommentPool::open(source, limits)
        .await
        .context("Failed to load initial comments")?;

    match command {
        Command::Tree => {}
        Command::Loaded => {
            pool.ensure_loaded().await?;
            print!("{}", render_forest(&pool.loaded_tree(), &pool.state()));
            return Ok(());
        }
        Command::More { count } => match count {
            Some(count) => pool.reveal_top_level(count).await?,
            None => pool.load_more_top_level().await?,
        },
        Command::Children { id, count } => {
            let id = CommentId::new(id);
            match count {
                Some(count) => pool.reveal_children_of(&id, count).await?,
                None => pool.show_more_children_of(&id).await?,
            }
        }
        Command::Ancestors { id } => {
            pool.reveal_ancestor_chain(&CommentId::new(id)).await?;
        }
        Command::Group { id } => {
            let id = CommentId::new(id);
            let forest = pool.visible_tree();
            let Some(node) = find_node(&forest, &id) else {
                bail!("Comment {id} is not visible");
            };
            let Some(root) = &node.item else {
                bail!("Comment {id} is not loaded");
            };
            let state = pool.state();
            match group_thread(|candidate| state.is_visible(candidate), root, &node.children) {
                Some(group) => print!("{}", render_group(&group, &state)),
                None => println!("{id}: nothing to group"),
            }
            return Ok(());
        }
    }

    print!("{}", render_forest(&pool.visible_tree(), &pool.state()));
    if pool.should_offer_load_more(None) {
        println!("(more top-level comments available)");
    }
    Ok(())
}
