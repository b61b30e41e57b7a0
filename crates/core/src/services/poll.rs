//! Poll service: creation, lifecycle, voting and derived views.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use enquete_common::{AppError, AppResult, IdGenerator, ensure_id};
use enquete_db::{
    entities::{poll, poll_option, user, user::UserRole, vote},
    repositories::{PollOptionRepository, PollRepository, VoteRepository, VoteTransition},
};
use sea_orm::Set;
use serde::Deserialize;

use crate::authorization::can_delete_poll;

/// Upper bound on options per poll, matching the create form.
const MAX_OPTIONS: usize = 10;

/// Compute effective activeness: the stored flag holds only until the
/// deadline passes.
#[must_use]
pub fn effectively_active(
    is_active: bool,
    ends_at: &chrono::DateTime<chrono::FixedOffset>,
    now: DateTime<Utc>,
) -> bool {
    is_active && ends_at.with_timezone(&Utc) > now
}

/// Poll options as submitted: either one newline-delimited block of text
/// (plain form posts) or a JSON array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OptionsInput {
    /// Newline-delimited text block.
    Text(String),
    /// Array of option texts.
    List(Vec<String>),
}

impl OptionsInput {
    /// Normalize to trimmed, non-empty option texts.
    #[must_use]
    pub fn normalize(&self) -> Vec<String> {
        match self {
            Self::Text(block) => block
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect(),
            Self::List(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Input for creating a poll.
#[derive(Debug, Deserialize)]
pub struct CreatePollInput {
    /// Poll title.
    pub title: String,
    /// Poll description.
    pub description: String,
    /// Voting deadline; must be strictly in the future.
    pub ends_at: DateTime<chrono::FixedOffset>,
    /// The selectable options.
    pub options: OptionsInput,
}

/// A poll option with its derived tally.
#[derive(Debug, Clone)]
pub struct OptionView {
    /// The option row.
    pub option: poll_option::Model,
    /// `COUNT(vote)` for this option.
    pub votes: i64,
}

/// A poll with author, options and derived tallies.
#[derive(Debug, Clone)]
pub struct PollView {
    /// The poll row (post lazy correction).
    pub poll: poll::Model,
    /// The poll's author, if still resolvable.
    pub author: Option<user::Model>,
    /// Options with tallies, in creation order.
    pub options: Vec<OptionView>,
    /// Sum of all option tallies.
    pub total_votes: i64,
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    option_repo: PollOptionRepository,
    vote_repo: VoteRepository,
    id_gen: IdGenerator,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        option_repo: PollOptionRepository,
        vote_repo: VoteRepository,
    ) -> Self {
        Self {
            poll_repo,
            option_repo,
            vote_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a poll with its options. Commits everything or nothing.
    pub async fn create(
        &self,
        author_id: &str,
        input: CreatePollInput,
    ) -> AppResult<(poll::Model, Vec<poll_option::Model>)> {
        let options = validate_create_input(&input)?;

        let poll_id = self.id_gen.generate();
        let poll_model = poll::ActiveModel {
            id: Set(poll_id.clone()),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description.trim().to_string()),
            ends_at: Set(input.ends_at),
            is_active: Set(true),
            author_id: Set(author_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let option_models = options
            .into_iter()
            .map(|text| poll_option::ActiveModel {
                id: Set(self.id_gen.generate()),
                text: Set(text),
                poll_id: Set(poll_id.clone()),
            })
            .collect();

        self.poll_repo
            .create_with_options(poll_model, option_models)
            .await
    }

    /// List polls flagged active, applying the lazy expiration correction.
    /// Freshly expired polls are flipped in storage and returned with
    /// `is_active = false`.
    pub async fn list_public(&self, limit: Option<u64>) -> AppResult<Vec<PollView>> {
        let rows = self.poll_repo.find_active_with_authors(limit).await?;

        let mut views = Vec::with_capacity(rows.len());
        for (poll, author) in rows {
            let poll = self.correct_if_expired(poll).await?;
            views.push(self.build_view(poll, author).await?);
        }
        Ok(views)
    }

    /// List a user's own polls, lazy-correcting stale ones.
    pub async fn list_by_author(&self, author_id: &str) -> AppResult<Vec<PollView>> {
        let polls = self.poll_repo.find_by_author(author_id).await?;

        let mut views = Vec::with_capacity(polls.len());
        for poll in polls {
            let poll = self.correct_if_expired(poll).await?;
            views.push(self.build_view(poll, None).await?);
        }
        Ok(views)
    }

    /// Get one poll with options and tallies, lazy-correcting staleness.
    pub async fn get(&self, poll_id: &str) -> AppResult<PollView> {
        ensure_id(poll_id)?;

        let (poll, author) = self
            .poll_repo
            .find_with_author(poll_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll {poll_id} not found")))?;

        let poll = self.correct_if_expired(poll).await?;
        self.build_view(poll, author).await
    }

    /// Delete a poll. Only the author or an admin may; options, votes,
    /// comments and reports cascade away with it.
    pub async fn delete(
        &self,
        actor_id: &str,
        actor_role: UserRole,
        poll_id: &str,
    ) -> AppResult<()> {
        ensure_id(poll_id)?;
        let poll = self.poll_repo.get_by_id(poll_id).await?;

        if !can_delete_poll(actor_id, actor_role, &poll.author_id) {
            return Err(AppError::Forbidden(
                "You do not have permission to delete this poll".to_string(),
            ));
        }

        self.poll_repo.delete(poll_id).await
    }

    /// Cast, switch or withdraw a vote (see the vote repository for the
    /// transactional transition).
    ///
    /// Preconditions checked here: the option must exist and its poll must
    /// be effectively active, with the lazy flip persisted when the check
    /// finds a stale row.
    pub async fn vote(&self, user_id: &str, option_id: &str) -> AppResult<VoteTransition> {
        ensure_id(option_id)?;

        let option = self
            .option_repo
            .find_by_id(option_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Option {option_id} not found")))?;

        let poll = self.poll_repo.get_fresh(&option.poll_id).await?;
        if !effectively_active(poll.is_active, &poll.ends_at, Utc::now()) {
            return Err(AppError::InvalidState(
                "This poll is no longer active".to_string(),
            ));
        }

        self.vote_repo
            .transition(user_id, option_id, &poll.id, self.id_gen.generate())
            .await
    }

    /// The caller's live vote on a poll, if any.
    pub async fn my_vote(&self, user_id: &str, poll_id: &str) -> AppResult<Option<vote::Model>> {
        ensure_id(poll_id)?;
        // 404 for unknown polls, not an empty result
        self.poll_repo.get_fresh(poll_id).await?;
        self.vote_repo.find_user_vote(user_id, poll_id).await
    }

    /// Bulk-deactivate expired polls. Invoked by the scheduler; returns the
    /// affected row count for logging.
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        self.poll_repo.deactivate_expired().await
    }

    /// Persist the lazy expiration correction when a read observes a poll
    /// whose stored flag outlived its deadline.
    async fn correct_if_expired(&self, mut poll: poll::Model) -> AppResult<poll::Model> {
        if poll.is_active && !effectively_active(poll.is_active, &poll.ends_at, Utc::now()) {
            self.poll_repo.set_inactive(&poll.id).await?;
            poll.is_active = false;
        }
        Ok(poll)
    }

    async fn build_view(
        &self,
        poll: poll::Model,
        author: Option<user::Model>,
    ) -> AppResult<PollView> {
        let options = self.option_repo.find_by_poll(&poll.id).await?;
        let option_ids: Vec<String> = options.iter().map(|o| o.id.clone()).collect();
        let tallies: HashMap<String, i64> = self.vote_repo.tally_for_options(&option_ids).await?;

        let options: Vec<OptionView> = options
            .into_iter()
            .map(|option| {
                let votes = tallies.get(&option.id).copied().unwrap_or(0);
                OptionView { option, votes }
            })
            .collect();
        let total_votes = options.iter().map(|o| o.votes).sum();

        Ok(PollView {
            poll,
            author,
            options,
            total_votes,
        })
    }
}

/// Validate poll creation input, collecting every violation like the web
/// form expects.
fn validate_create_input(input: &CreatePollInput) -> AppResult<Vec<String>> {
    let mut errors = Vec::new();

    let title = input.title.trim();
    if title.is_empty() {
        errors.push("Title is required".to_string());
    } else if title.len() < 5 {
        errors.push("Title must have at least 5 characters".to_string());
    } else if title.len() > 100 {
        errors.push("Title must have at most 100 characters".to_string());
    }

    let description = input.description.trim();
    if description.is_empty() {
        errors.push("Description is required".to_string());
    } else if description.len() > 500 {
        errors.push("Description must have at most 500 characters".to_string());
    }

    if input.ends_at.with_timezone(&Utc) <= Utc::now() {
        errors.push("End date must be in the future".to_string());
    }

    let options = input.options.normalize();
    if options.len() < 2 {
        errors.push("A poll needs at least 2 valid options".to_string());
    } else if options.len() > MAX_OPTIONS {
        errors.push(format!("A poll can have at most {MAX_OPTIONS} options"));
    }

    let unique: std::collections::HashSet<&String> = options.iter().collect();
    if unique.len() != options.len() {
        errors.push("Duplicate options are not allowed".to_string());
    }

    if errors.is_empty() {
        Ok(options)
    } else {
        Err(AppError::Validation(errors))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn future() -> DateTime<chrono::FixedOffset> {
        (Utc::now() + Duration::days(1)).into()
    }

    fn past() -> DateTime<chrono::FixedOffset> {
        (Utc::now() - Duration::hours(1)).into()
    }

    #[test]
    fn test_effectively_active() {
        let now = Utc::now();
        assert!(effectively_active(true, &future(), now));
        assert!(!effectively_active(true, &past(), now));
        assert!(!effectively_active(false, &future(), now));
        assert!(!effectively_active(false, &past(), now));
    }

    #[test]
    fn test_options_input_newline_block() {
        let input = OptionsInput::Text("Pizza\n  Salad  \n\nSushi\n".to_string());
        assert_eq!(input.normalize(), vec!["Pizza", "Salad", "Sushi"]);
    }

    #[test]
    fn test_options_input_list() {
        let input = OptionsInput::List(vec![
            " Pizza ".to_string(),
            String::new(),
            "Salad".to_string(),
        ]);
        assert_eq!(input.normalize(), vec!["Pizza", "Salad"]);
    }

    fn valid_input() -> CreatePollInput {
        CreatePollInput {
            title: "Lunch options".to_string(),
            description: "Where should we eat?".to_string(),
            ends_at: future(),
            options: OptionsInput::List(vec!["Pizza".to_string(), "Salad".to_string()]),
        }
    }

    #[test]
    fn test_validate_accepts_valid_input() {
        let options = validate_create_input(&valid_input()).unwrap();
        assert_eq!(options, vec!["Pizza", "Salad"]);
    }

    #[test]
    fn test_validate_rejects_single_option() {
        let input = CreatePollInput {
            options: OptionsInput::List(vec!["Pizza".to_string()]),
            ..valid_input()
        };
        match validate_create_input(&input) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("at least 2")));
            }
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_duplicate_options() {
        let input = CreatePollInput {
            options: OptionsInput::List(vec!["Pizza".to_string(), "Pizza".to_string()]),
            ..valid_input()
        };
        match validate_create_input(&input) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("Duplicate")));
            }
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_past_deadline() {
        let input = CreatePollInput {
            ends_at: past(),
            ..valid_input()
        };
        match validate_create_input(&input) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("future")));
            }
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_collects_multiple_errors() {
        let input = CreatePollInput {
            title: "Hm".to_string(),
            description: String::new(),
            ends_at: past(),
            options: OptionsInput::Text(String::new()),
        };
        match validate_create_input(&input) {
            Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    mod vote_preconditions {
        use super::*;
        use enquete_db::repositories::{PollOptionRepository, PollRepository, VoteRepository};
        use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
        use std::sync::Arc;

        const OPTION_ID: &str = "01jde9mvk4qs7cfr3sv1bxh1hy";
        const POLL_ID: &str = "01jde9mvk4qs7cfr3sv1bxh2aa";

        fn service_with(db: sea_orm::DatabaseConnection) -> PollService {
            let db = Arc::new(db);
            PollService::new(
                PollRepository::new(Arc::clone(&db)),
                PollOptionRepository::new(Arc::clone(&db)),
                VoteRepository::new(db),
            )
        }

        fn test_option() -> poll_option::Model {
            poll_option::Model {
                id: OPTION_ID.to_string(),
                text: "Pizza".to_string(),
                poll_id: POLL_ID.to_string(),
            }
        }

        fn test_poll(is_active: bool, ends_at: DateTime<chrono::FixedOffset>) -> poll::Model {
            poll::Model {
                id: POLL_ID.to_string(),
                title: "Lunch?".to_string(),
                description: "Where".to_string(),
                ends_at,
                is_active,
                author_id: "author".to_string(),
                created_at: Utc::now().into(),
            }
        }

        #[tokio::test]
        async fn test_vote_on_deactivated_poll_is_invalid_state() {
            // A report-accepted (or admin) deactivation leaves ends_at in the
            // future but the flag false; voting must still fail.
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_option()]])
                .append_query_results([[test_poll(false, future())]])
                .into_connection();

            let service = service_with(db);
            let result = service.vote("user1", OPTION_ID).await;

            assert!(matches!(result, Err(AppError::InvalidState(_))));
        }

        #[tokio::test]
        async fn test_vote_on_expired_poll_flips_and_rejects() {
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_option()]])
                .append_query_results([[test_poll(true, past())]])
                // the lazy correction persists is_active = false
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection();

            let service = service_with(db);
            let result = service.vote("user1", OPTION_ID).await;

            assert!(matches!(result, Err(AppError::InvalidState(_))));
        }

        #[tokio::test]
        async fn test_vote_with_malformed_option_id_is_rejected() {
            let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

            let service = service_with(db);
            let result = service.vote("user1", "not-a-ulid").await;

            assert!(matches!(result, Err(AppError::BadRequest(_))));
        }
    }
}
