//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod comment;
pub mod moderation;
pub mod poll;
pub mod user;

pub use auth::{AuthService, Claims, parse_expiry};
pub use comment::{CommentService, Pagination, normalize_page};
pub use moderation::{
    CreateReportInput, ModerationService, ReportDashboard, ReportStatus, ReportView, StatusUpdate,
};
pub use poll::{
    CreatePollInput, OptionView, OptionsInput, PollService, PollView, effectively_active,
};
pub use user::{RegisterUserInput, RoleUpdate, UpdateProfileInput, UserService};
