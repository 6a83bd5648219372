#![allow(dead_code)]

use std::sync::Arc;

use domains::{Board, DomainResult, ReplyView, User};
use fake::faker::internet::en::Username;
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use services::{AuthorRef, CreateReplyCommand, ReplyCommandService, ReplyQueryService};
use storage_adapters::MemoryDatabase;
use uuid::Uuid;

pub const MAX_DEPTH: u32 = 5;

/// Services wired to one in-memory database with a board and an author.
pub struct Harness {
    pub db: Arc<MemoryDatabase>,
    pub commands: ReplyCommandService,
    pub queries: ReplyQueryService,
    pub board: Board,
    pub author: User,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: u32) -> Self {
        let db = Arc::new(MemoryDatabase::new());
        let author = db.insert_user(Username().fake::<String>());
        let board = db.insert_board("General", author.id);

        Self {
            commands: ReplyCommandService::new(db.clone(), db.clone(), db.clone(), max_depth),
            queries: ReplyQueryService::new(db.clone(), max_depth),
            db,
            board,
            author,
        }
    }

    pub fn other_board(&self) -> Board {
        self.db.insert_board("Elsewhere", self.author.id)
    }

    pub fn create_command(&self, board_id: Uuid, parent_id: Option<Uuid>) -> CreateReplyCommand {
        CreateReplyCommand {
            board_id,
            parent_id,
            author: AuthorRef::Id(self.author.id),
            content: Sentence(3..8).fake(),
        }
    }

    pub async fn reply(&self, parent_id: Option<Uuid>) -> DomainResult<ReplyView> {
        self.commands
            .create(self.create_command(self.board.id, parent_id))
            .await
    }

    /// A root followed by `len - 1` nested replies, root first.
    pub async fn chain(&self, len: usize) -> Vec<ReplyView> {
        let mut chain: Vec<ReplyView> = Vec::with_capacity(len);
        for _ in 0..len {
            let parent = chain.last().map(|r| r.id);
            chain.push(self.reply(parent).await.expect("chain link within depth"));
        }
        chain
    }
}
