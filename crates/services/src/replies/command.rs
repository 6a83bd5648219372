//! # ReplyCommandService
//!
//! Create, edit and delete replies. Each operation runs inside one storage
//! transaction and blocks the caller until it commits.
//!
//! # Developer Note
//! Authorship checks happen before these methods are called; the service
//! itself trusts its caller.

use std::sync::Arc;

use domains::{
    validate_content, BoardRepository, DomainError, DomainResult, NewReply, Reply, ReplyStore,
    ReplyTransaction, ReplyView, User, UserRepository,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

/// How the author of a new reply is identified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRef {
    Id(Uuid),
    Username(String),
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReplyCommand {
    pub board_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author: AuthorRef,
    #[validate(custom(function = "reply_content"))]
    pub content: String,
}

/// Partial update: only `Some` fields are applied.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateReplyCommand {
    #[validate(custom(function = "reply_content"))]
    pub content: Option<String>,
}

/// What `delete` did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The reply still had children and was marked deleted
    Tombstoned,
    /// The reply was a leaf and its row is gone
    Removed,
}

pub struct ReplyCommandService {
    replies: Arc<dyn ReplyStore>,
    boards: Arc<dyn BoardRepository>,
    users: Arc<dyn UserRepository>,
    max_depth: u32,
}

impl ReplyCommandService {
    pub fn new(
        replies: Arc<dyn ReplyStore>,
        boards: Arc<dyn BoardRepository>,
        users: Arc<dyn UserRepository>,
        max_depth: u32,
    ) -> Self {
        Self {
            replies,
            boards,
            users,
            max_depth: max_depth.max(1),
        }
    }

    #[instrument(skip(self, cmd), fields(board_id = %cmd.board_id, parent_id = ?cmd.parent_id))]
    pub async fn create(&self, cmd: CreateReplyCommand) -> DomainResult<ReplyView> {
        cmd.validate().map_err(constraint_violation)?;

        // 1. The discussion and the author must exist
        let board = self
            .boards
            .find_by_id(cmd.board_id)
            .await?
            .ok_or_else(|| DomainError::not_found("board", cmd.board_id))?;
        let author = self.resolve_author(&cmd.author).await?;

        let mut tx = self.replies.begin().await?;

        // 2. A parent must live on the same board and leave room for one more level
        if let Some(parent_id) = cmd.parent_id {
            let parent = tx
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| DomainError::not_found("parent reply", parent_id))?;

            if parent.board_id != board.id {
                return Err(DomainError::InvalidArgument(format!(
                    "board mismatch: parent reply {parent_id} belongs to board {}",
                    parent.board_id
                )));
            }

            let parent_depth = depth_of(tx.as_mut(), &parent, self.max_depth).await?;
            if parent_depth + 1 >= self.max_depth {
                return Err(DomainError::InvalidArgument(format!(
                    "depth exceeded: replies nest at most {} levels",
                    self.max_depth
                )));
            }
        }

        // 3. Persist
        let saved = tx
            .insert(NewReply::new(board.id, cmd.parent_id, author.id, cmd.content))
            .await?;
        tx.commit().await?;

        info!(
            reply_id = %saved.id,
            board_id = %board.id,
            author = %author.username,
            "reply created"
        );
        Ok(ReplyView::from_reply(saved, author.username))
    }

    #[instrument(skip(self, cmd))]
    pub async fn update(&self, reply_id: Uuid, cmd: UpdateReplyCommand) -> DomainResult<ReplyView> {
        cmd.validate().map_err(constraint_violation)?;

        let mut tx = self.replies.begin().await?;
        let reply = load_reply(tx.as_mut(), reply_id).await?;
        // Resolved before commit so a failed lookup leaves the row untouched
        let author = self.author_of(&reply).await?;

        let saved = match cmd.content {
            Some(content) => tx.update_content(reply.id, &content).await?,
            None => reply,
        };
        tx.commit().await?;

        info!(reply_id = %saved.id, author = %author.username, "reply updated");
        Ok(ReplyView::from_reply(saved, author.username))
    }

    /// Tombstones a reply that has children, removes a leaf.
    ///
    /// A child inserted by another transaction between the children check
    /// and the removal is not guarded against; isolation is left to the store.
    #[instrument(skip(self))]
    pub async fn delete(&self, reply_id: Uuid) -> DomainResult<DeleteOutcome> {
        let mut tx = self.replies.begin().await?;
        let reply = load_reply(tx.as_mut(), reply_id).await?;

        let has_children = !tx.find_direct_children(reply.id).await?.is_empty();
        let outcome = if has_children {
            tx.mark_deleted(reply.id).await?;
            DeleteOutcome::Tombstoned
        } else {
            tx.remove(reply.id).await?;
            DeleteOutcome::Removed
        };
        tx.commit().await?;

        info!(reply_id = %reply_id, author_id = %reply.author_id, ?outcome, "reply deleted");
        Ok(outcome)
    }

    async fn resolve_author(&self, author: &AuthorRef) -> DomainResult<User> {
        match author {
            AuthorRef::Id(id) => self
                .users
                .find_by_id(*id)
                .await?
                .ok_or_else(|| DomainError::not_found("user", id)),
            AuthorRef::Username(username) => self
                .users
                .find_by_username(username)
                .await?
                .ok_or_else(|| DomainError::not_found("user", username)),
        }
    }

    async fn author_of(&self, reply: &Reply) -> DomainResult<User> {
        self.users
            .find_by_id(reply.author_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", reply.author_id))
    }
}

async fn load_reply(tx: &mut dyn ReplyTransaction, id: Uuid) -> DomainResult<Reply> {
    tx.find_by_id(id)
        .await?
        .ok_or_else(|| DomainError::not_found("reply", id))
}

/// Parent hops from `reply` up to its root.
///
/// The walk stops once it reaches `limit`, which is already too deep for
/// a new child; this also bounds the walk if the stored chain is corrupt.
async fn depth_of(tx: &mut dyn ReplyTransaction, reply: &Reply, limit: u32) -> DomainResult<u32> {
    let mut depth = 0;
    let mut parent_id = reply.parent_id;

    while let Some(id) = parent_id {
        depth += 1;
        if depth >= limit {
            break;
        }
        let ancestor = tx.find_by_id(id).await?.ok_or_else(|| {
            DomainError::Internal(format!("reply {} points at missing ancestor {id}", reply.id))
        })?;
        parent_id = ancestor.parent_id;
    }

    Ok(depth)
}

fn reply_content(content: &str) -> Result<(), ValidationError> {
    validate_content(content).map_err(|err| {
        let mut error = ValidationError::new("reply_content");
        error.message = Some(err.to_string().into());
        error
    })
}

fn constraint_violation(errors: ValidationErrors) -> DomainError {
    DomainError::ConstraintViolation(errors.to_string())
}
