//! # seed
//!
//! Wires the Postgres adapters to the reply services and plays a short
//! discussion against a live database: one board, a small reply thread,
//! a tombstoned reply and a handful of views. Prints the resulting tree.
//!
//! ```text
//! BOARDHOLE__DATABASE__URL=postgres://... cargo run -p seed
//! ```

mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use configs::Settings;
use domains::BoardRepository;
use secrecy::ExposeSecret;
use services::{
    spawn_view_counter, AuthorRef, BoardQueryService, CreateReplyCommand, ReplyCommandService,
    ReplyQueryService, UpdateReplyCommand, ViewCounterUpdater,
};
use storage_adapters::postgres::{self, PgBoardRepository, PgReplyStore, PgUserRepository};
use tracing::{info, warn};

const VIEWS: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = configs::read_env_file();
    let settings = Settings::load().context("loading settings")?;
    telemetry::init(&settings.telemetry)?;
    if let Err(err) = env_file {
        warn!(error = %err, ".env file present but unreadable");
    }

    // 1. Storage
    let pool = postgres::connect(
        settings.database.url.expose_secret(),
        settings.database.max_connections,
        Duration::from_secs(settings.database.acquire_timeout_secs),
    )
    .await
    .context("connecting to postgres")?;

    let replies = Arc::new(PgReplyStore::new(pool.clone()));
    let boards = Arc::new(PgBoardRepository::new(pool.clone()));
    let users = Arc::new(PgUserRepository::new(pool));

    // 2. Services
    let max_depth = settings.replies.max_depth;
    let commands =
        ReplyCommandService::new(replies.clone(), boards.clone(), users.clone(), max_depth);
    let queries = ReplyQueryService::new(replies, max_depth);

    let updater = ViewCounterUpdater::new(boards.clone(), settings.view_counter.max_attempts);
    let (publisher, worker) = spawn_view_counter(
        updater,
        settings.view_counter.queue_capacity,
        settings.view_counter.concurrency,
    );
    let reader = BoardQueryService::new(boards.clone(), publisher);

    // 3. A discussion
    let alice = users.upsert("alice").await?;
    let bob = users.upsert("bob").await?;
    let board = boards.create("Welcome to the board", alice.id).await?;
    info!(board_id = %board.id, "board created");

    let root = commands
        .create(CreateReplyCommand {
            board_id: board.id,
            parent_id: None,
            author: AuthorRef::Id(alice.id),
            content: "First!".into(),
        })
        .await?;
    let answer = commands
        .create(CreateReplyCommand {
            board_id: board.id,
            parent_id: Some(root.id),
            author: AuthorRef::Username(bob.username.clone()),
            content: "Welcome, alice.".into(),
        })
        .await?;
    commands
        .create(CreateReplyCommand {
            board_id: board.id,
            parent_id: Some(answer.id),
            author: AuthorRef::Id(alice.id),
            content: "Thanks bob".into(),
        })
        .await?;
    commands
        .update(
            root.id,
            UpdateReplyCommand {
                content: Some("First! (edited)".into()),
            },
        )
        .await?;
    let outcome = commands.delete(answer.id).await?;
    info!(reply_id = %answer.id, ?outcome, "middle reply deleted");

    // 4. Views, then let the worker drain
    for _ in 0..VIEWS {
        reader.view(board.id).await?;
    }
    drop(reader);
    worker.await.context("view counter worker")?;

    let tree = queries.reply_tree(board.id).await?;
    let live = queries.count_for_board(board.id).await?;
    let views = boards
        .find_by_id(board.id)
        .await?
        .map(|b| b.view_count)
        .unwrap_or_default();

    println!("{}", serde_json::to_string_pretty(&tree)?);
    info!(board_id = %board.id, nodes = tree.total_count, live, views, "seed finished");
    Ok(())
}
