//! Create vote table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vote::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Vote::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Vote::OptionId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Vote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_user")
                            .from(Vote::Table, Vote::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_option")
                            .from(Vote::Table, Vote::OptionId)
                            .to(PollOption::Table, PollOption::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, option_id) - a user holds at most one vote
        // per option. The one-vote-per-poll invariant spans options and is
        // enforced by the serializable vote transaction instead.
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_user_option")
                    .table(Vote::Table)
                    .col(Vote::UserId)
                    .col(Vote::OptionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: option_id (for tallying)
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_option_id")
                    .table(Vote::Table)
                    .col(Vote::OptionId)
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for finding a user's votes)
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_user_id")
                    .table(Vote::Table)
                    .col(Vote::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Vote {
    Table,
    Id,
    UserId,
    OptionId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum PollOption {
    Table,
    Id,
}
