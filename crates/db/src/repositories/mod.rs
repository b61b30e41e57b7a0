//! Database repositories.

mod comment;
mod poll;
mod report;
mod user;

pub use comment::CommentRepository;
pub use poll::{
    PollOptionRepository, PollRepository, VoteAction, VotePlan, VoteRepository, VoteTransition,
    plan_transition,
};
pub use report::{ReportRepository, StatusCount};
pub use user::UserRepository;
