//! Threaded replies: commands, tree reads and forest assembly.

pub mod command;
pub mod query;
pub mod tree;

pub use command::{
    AuthorRef, CreateReplyCommand, DeleteOutcome, ReplyCommandService, UpdateReplyCommand,
};
pub use query::ReplyQueryService;
pub use tree::ReplyForest;
