//! Create poll and poll option tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Poll::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Poll::Title).string_len(100).not_null())
                    .col(ColumnDef::new(Poll::Description).text().not_null())
                    .col(
                        ColumnDef::new(Poll::EndsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Poll::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Poll::AuthorId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_author")
                            .from(Poll::Table, Poll::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: author_id (for listing a user's polls)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_author_id")
                    .table(Poll::Table)
                    .col(Poll::AuthorId)
                    .to_owned(),
            )
            .await?;

        // Index: (is_active, ends_at) - drives the expiration sweep and the
        // public listing
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_active_ends_at")
                    .table(Poll::Table)
                    .col(Poll::IsActive)
                    .col(Poll::EndsAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollOption::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollOption::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollOption::Text).string_len(256).not_null())
                    .col(
                        ColumnDef::new(PollOption::PollId)
                            .string_len(32)
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_option_poll")
                            .from(PollOption::Table, PollOption::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: poll_id (for loading a poll's options)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_option_poll_id")
                    .table(PollOption::Table)
                    .col(PollOption::PollId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollOption::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    Title,
    Description,
    EndsAt,
    IsActive,
    AuthorId,
    CreatedAt,
}

#[derive(Iden)]
enum PollOption {
    Table,
    Id,
    Text,
    PollId,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
