//! Database entities.

pub mod comment;
pub mod poll;
pub mod poll_option;
pub mod report;
pub mod user;
pub mod vote;

pub use comment::Entity as Comment;
pub use poll::Entity as Poll;
pub use poll_option::Entity as PollOption;
pub use report::Entity as Report;
pub use user::Entity as User;
pub use vote::Entity as Vote;
