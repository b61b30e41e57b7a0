//! Poll, option and vote repositories.
//!
//! The vote repository owns the transactional vote transition: the
//! find-check-delete-create sequence runs inside one serializable
//! transaction so two concurrent submissions by the same user cannot both
//! observe "no existing vote" and double-insert.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Poll, PollOption, Vote, poll, poll_option, user, vote};
use chrono::Utc;
use enquete_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    IsolationLevel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll {id} not found")))
    }

    /// Get a poll by ID, persisting the lazy expiration correction when the
    /// stored flag has outlived the deadline. Single-poll read paths go
    /// through here so no caller ever observes a stale `is_active`.
    pub async fn get_fresh(&self, id: &str) -> AppResult<poll::Model> {
        let mut poll = self.get_by_id(id).await?;
        if poll.is_active && poll.ends_at.with_timezone(&Utc) <= Utc::now() {
            self.set_inactive(&poll.id).await?;
            poll.is_active = false;
        }
        Ok(poll)
    }

    /// Find a poll together with its author.
    pub async fn find_with_author(
        &self,
        id: &str,
    ) -> AppResult<Option<(poll::Model, Option<user::Model>)>> {
        Poll::find_by_id(id)
            .find_also_related(crate::entities::User)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List polls currently flagged active, newest first, with their
    /// authors. Callers still need to apply the effective-activeness check;
    /// rows may be stale until lazily corrected or swept.
    pub async fn find_active_with_authors(
        &self,
        limit: Option<u64>,
    ) -> AppResult<Vec<(poll::Model, Option<user::Model>)>> {
        let mut query = Poll::find()
            .filter(poll::Column::IsActive.eq(true))
            .find_also_related(crate::entities::User)
            .order_by_desc(poll::Column::CreatedAt);

        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        query
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all polls created by a user, newest first.
    pub async fn find_by_author(&self, author_id: &str) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::AuthorId.eq(author_id))
            .order_by_desc(poll::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a poll and its options atomically: either the poll and every
    /// option commit, or nothing does.
    pub async fn create_with_options(
        &self,
        poll_model: poll::ActiveModel,
        option_models: Vec<poll_option::ActiveModel>,
    ) -> AppResult<(poll::Model, Vec<poll_option::Model>)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let poll = poll_model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut options = Vec::with_capacity(option_models.len());
        for model in option_models {
            let option = model
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            options.push(option);
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((poll, options))
    }

    /// Update a poll.
    pub async fn update(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Persist `is_active = false` for a single poll. Used by the lazy
    /// expiration correction and by accepted-report cascades.
    pub async fn set_inactive(&self, id: &str) -> AppResult<()> {
        Poll::update_many()
            .col_expr(poll::Column::IsActive, Expr::value(false))
            .filter(poll::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Bulk sweep: flag every expired-but-still-active poll inactive.
    /// Returns the number of rows affected. Idempotent and commutative with
    /// the lazy correction.
    pub async fn deactivate_expired(&self) -> AppResult<u64> {
        let result = Poll::update_many()
            .col_expr(poll::Column::IsActive, Expr::value(false))
            .filter(poll::Column::IsActive.eq(true))
            .filter(poll::Column::EndsAt.lt(Utc::now()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Delete a poll. Options, votes, comments and reports cascade.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Poll::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Poll option repository for database operations.
#[derive(Clone)]
pub struct PollOptionRepository {
    db: Arc<DatabaseConnection>,
}

impl PollOptionRepository {
    /// Create a new poll option repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an option by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll_option::Model>> {
        PollOption::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List a poll's options in insertion order (IDs are ULIDs, so the id
    /// ordering is creation order).
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Outcome of a vote transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    /// A vote was created (first vote, or a switch from another option).
    Created,
    /// The existing vote on the same option was toggled off.
    Removed,
}

/// Result of applying a vote transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTransition {
    /// What happened.
    pub action: VoteAction,
    /// The option the request targeted.
    pub option_id: String,
}

/// The planned effect of a vote request given the user's existing votes on
/// the poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VotePlan {
    /// Same option voted again: toggle the vote off.
    Toggle {
        /// ID of the vote to delete.
        vote_id: String,
    },
    /// A different option of the same poll holds the vote: switch.
    Switch {
        /// ID of the old vote to delete before creating the new one.
        old_vote_id: String,
    },
    /// No existing vote: cast a fresh one.
    Cast,
}

/// Decide what a vote request does, from the user's existing live votes on
/// the poll. Pure so the state machine can be tested exhaustively.
#[must_use]
pub fn plan_transition(existing: &[vote::Model], option_id: &str) -> VotePlan {
    if let Some(same) = existing.iter().find(|v| v.option_id == option_id) {
        return VotePlan::Toggle {
            vote_id: same.id.clone(),
        };
    }
    match existing.first() {
        Some(old) => VotePlan::Switch {
            old_vote_id: old.id.clone(),
        },
        None => VotePlan::Cast,
    }
}

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user's live votes across all options of a poll. The vote row
    /// carries no poll reference, so this joins through the option table.
    pub async fn find_by_user_and_poll(
        &self,
        user_id: &str,
        poll_id: &str,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .inner_join(PollOption)
            .filter(vote::Column::UserId.eq(user_id))
            .filter(poll_option::Column::PollId.eq(poll_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Apply a vote request atomically.
    ///
    /// Runs the existing-votes lookup, the plan decision and the
    /// delete/create writes inside one serializable transaction keyed by the
    /// user's votes on this poll. `new_vote_id` is consumed only when a vote
    /// is actually created.
    pub async fn transition(
        &self,
        user_id: &str,
        option_id: &str,
        poll_id: &str,
        new_vote_id: String,
    ) -> AppResult<VoteTransition> {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::Serializable), None)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let existing = Vote::find()
            .inner_join(PollOption)
            .filter(vote::Column::UserId.eq(user_id))
            .filter(poll_option::Column::PollId.eq(poll_id))
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let transition = match plan_transition(&existing, option_id) {
            VotePlan::Toggle { vote_id } => {
                Vote::delete_by_id(&vote_id)
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                VoteTransition {
                    action: VoteAction::Removed,
                    option_id: option_id.to_string(),
                }
            }
            VotePlan::Switch { old_vote_id } => {
                Vote::delete_by_id(&old_vote_id)
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                self.insert_vote(&txn, user_id, option_id, new_vote_id)
                    .await?;
                VoteTransition {
                    action: VoteAction::Created,
                    option_id: option_id.to_string(),
                }
            }
            VotePlan::Cast => {
                self.insert_vote(&txn, user_id, option_id, new_vote_id)
                    .await?;
                VoteTransition {
                    action: VoteAction::Created,
                    option_id: option_id.to_string(),
                }
            }
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(transition)
    }

    async fn insert_vote(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        user_id: &str,
        option_id: &str,
        vote_id: String,
    ) -> AppResult<vote::Model> {
        let model = vote::ActiveModel {
            id: Set(vote_id),
            user_id: Set(user_id.to_string()),
            option_id: Set(option_id.to_string()),
            created_at: Set(Utc::now().into()),
        };
        model
            .insert(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count live votes for a single option. Tallies are always derived;
    /// there is no stored counter to drift.
    pub async fn count_for_option(&self, option_id: &str) -> AppResult<u64> {
        Vote::find()
            .filter(vote::Column::OptionId.eq(option_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Derive tallies for a set of options in one grouped query. Options
    /// with no votes are absent from the map.
    pub async fn tally_for_options(
        &self,
        option_ids: &[String],
    ) -> AppResult<HashMap<String, i64>> {
        #[derive(Debug, FromQueryResult)]
        struct OptionTally {
            option_id: String,
            votes: i64,
        }

        if option_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Vote::find()
            .select_only()
            .column(vote::Column::OptionId)
            .column_as(vote::Column::Id.count(), "votes")
            .filter(vote::Column::OptionId.is_in(option_ids.iter().cloned()))
            .group_by(vote::Column::OptionId)
            .into_model::<OptionTally>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|r| (r.option_id, r.votes)).collect())
    }

    /// Find the option a user voted for on a poll, if any.
    pub async fn find_user_vote(
        &self,
        user_id: &str,
        poll_id: &str,
    ) -> AppResult<Option<vote::Model>> {
        let mut votes = self.find_by_user_and_poll(user_id, poll_id).await?;
        Ok(if votes.is_empty() {
            None
        } else {
            Some(votes.remove(0))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn test_vote(id: &str, user_id: &str, option_id: &str) -> vote::Model {
        vote::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            option_id: option_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_plan_no_existing_vote_casts() {
        let plan = plan_transition(&[], "opt1");
        assert_eq!(plan, VotePlan::Cast);
    }

    #[test]
    fn test_plan_same_option_toggles_off() {
        let existing = vec![test_vote("v1", "user1", "opt1")];
        let plan = plan_transition(&existing, "opt1");
        assert_eq!(
            plan,
            VotePlan::Toggle {
                vote_id: "v1".to_string()
            }
        );
    }

    #[test]
    fn test_plan_other_option_switches() {
        let existing = vec![test_vote("v1", "user1", "opt1")];
        let plan = plan_transition(&existing, "opt2");
        assert_eq!(
            plan,
            VotePlan::Switch {
                old_vote_id: "v1".to_string()
            }
        );
    }

    #[test]
    fn test_plan_prefers_toggle_over_switch() {
        // Defensive case: should multiple votes ever exist, the one on the
        // requested option wins the decision.
        let existing = vec![
            test_vote("v1", "user1", "opt1"),
            test_vote("v2", "user1", "opt2"),
        ];
        let plan = plan_transition(&existing, "opt2");
        assert_eq!(
            plan,
            VotePlan::Toggle {
                vote_id: "v2".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_deactivate_expired_reports_count() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                }])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let count = repo.deactivate_expired().await.unwrap();

        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_find_by_user_and_poll() {
        let votes = vec![test_vote("v1", "user1", "opt1")];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([votes])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let result = repo.find_by_user_and_poll("user1", "poll1").await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].option_id, "opt1");
    }
}
