//! # services
//!
//! Business logic for threaded replies and the board view counter.
//! Storage is reached only through the ports defined in `domains`.

pub mod boards;
pub mod replies;
pub mod view_counter;

pub use boards::BoardQueryService;
pub use replies::{
    AuthorRef, CreateReplyCommand, DeleteOutcome, ReplyCommandService, ReplyForest,
    ReplyQueryService, UpdateReplyCommand,
};
pub use view_counter::{
    spawn_view_counter, ViewCountOutcome, ViewCounterUpdater, ViewSignalPublisher,
    DEFAULT_MAX_ATTEMPTS,
};
