//! Business logic services.

#![allow(missing_docs)]

pub mod account;
pub mod identity;
pub mod post;
pub mod stats;
pub mod storage;
pub mod vote;
pub mod winner;

pub use account::AccountService;
pub use identity::{ExternalIdentity, GoogleCredentials, GoogleIdentityProvider, IdentityProvider};
pub use post::{CreatePostInput, DeleteOutcome, FeedPage, PostAuthor, PostService, PostView};
pub use stats::{CompetitionStats, ResetOutcome, StatsService};
pub use storage::{
    CloudinaryConfig, CloudinaryStorage, LocalStorage, NoOpStorage, StorageBackend,
    StorageService, StoredImage,
};
pub use vote::{VoteAction, VoteOutcome, VoteService};
pub use winner::{DailyWinner, HistoryEntry, WinnerService};
