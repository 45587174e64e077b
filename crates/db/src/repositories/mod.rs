//! Repositories wrapping database access per entity.

pub mod post;
pub mod user;
pub mod vote;

pub use post::{PostRepository, PostWithVotes};
pub use user::UserRepository;
pub use vote::VoteRepository;
