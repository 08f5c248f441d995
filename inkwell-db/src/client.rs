use crate::{
    record::{
        AuthenticationRecord, AuthorRecord, CommentRecord, FullPostRecord, GroupRecord, to_db_id,
    },
    store::{DbError, PostFilter, Result, SnowflakeSource, Store},
};
use async_trait::async_trait;
use inkwell_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        author::{Author, AuthorMarker, CreateAuthor, Username},
        comment::{Comment, CommentMarker},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{BodyText, Post, PostContent, PostMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use sqlx::{PgPool, migrate::Migrator, postgres::PgPoolOptions, query, query_as, query_scalar};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

macro_rules! select_full_post {
    () => {
        "
        SELECT
            posts.post_snowflake,
            posts.content,
            posts.image,
            authors.author_snowflake,
            authors.username,
            groups.group_snowflake,
            groups.slug,
            groups.title,
            groups.description
        FROM
            blog.posts
            JOIN blog.authors ON authors.author_snowflake = posts.author_snowflake
            LEFT JOIN blog.groups ON groups.group_snowflake = posts.group_snowflake
        "
    };
}

// Binds: $1 group, $2 author, $3 follower. Unused ones are bound as NULL.
macro_rules! post_filter {
    () => {
        "
        WHERE
            ($1::BIGINT IS NULL OR posts.group_snowflake = $1)
            AND ($2::BIGINT IS NULL OR posts.author_snowflake = $2)
            AND ($3::BIGINT IS NULL OR posts.author_snowflake IN (
                SELECT follows.author_snowflake
                FROM blog.follows
                WHERE follows.follower_snowflake = $3
            ))
        "
    };
}

type FilterBinds = (Option<i64>, Option<i64>, Option<i64>);

fn filter_binds(filter: PostFilter) -> FilterBinds {
    match filter {
        PostFilter::All => (None, None, None),
        PostFilter::Group(group_id) => (Some(to_db_id(group_id)), None, None),
        PostFilter::Author(author_id) => (None, Some(to_db_id(author_id)), None),
        PostFilter::FollowedBy(follower_id) => (None, None, Some(to_db_id(follower_id))),
    }
}

fn conflict_on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> DbError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => DbError::Conflict(what()),
        _ => err.into(),
    }
}

/// [`Store`] backed by PostgreSQL.
pub struct DbClient {
    pool: PgPool,
    snowflakes: SnowflakeSource,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            pool,
            snowflakes: SnowflakeSource::new(worker_id, process_id),
        }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        worker_id: WorkerId,
        process_id: ProcessId,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool, worker_id, process_id))
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        info!("Database schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl Store for DbClient {
    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>> {
        let record = query_as::<_, AuthorRecord>(
            "
            SELECT
                authors.author_snowflake,
                authors.username
            FROM
                blog.authors
            WHERE
                authors.author_snowflake = $1
            ",
        )
        .bind(to_db_id(author_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Author::try_from).transpose()?)
    }

    async fn fetch_author_by_username(&self, username: &Username) -> Result<Option<Author>> {
        let record = query_as::<_, AuthorRecord>(
            "
            SELECT
                authors.author_snowflake,
                authors.username
            FROM
                blog.authors
            WHERE
                authors.username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Author::try_from).transpose()?)
    }

    async fn create_author(&self, author: &CreateAuthor) -> Result<Id<AuthorMarker>> {
        let author_id = self.snowflakes.next_id();

        query(
            "
            INSERT INTO blog.authors (author_snowflake, username)
            VALUES ($1, $2)
            ",
        )
        .bind(to_db_id(author_id))
        .bind(author.username.get())
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_on_unique(err, || format!("Author {}", author.username)))?;

        Ok(author_id)
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.author_snowflake,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                blog.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Authentication::try_from).transpose()?)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO blog.authentications
                (token_hash, author_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(to_db_id(authentication.author))
        .bind(authentication.created_at)
        .bind(
            authentication
                .expires_after
                .map(|lifetime| lifetime.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT
                groups.group_snowflake,
                groups.slug,
                groups.title,
                groups.description
            FROM
                blog.groups
            WHERE
                groups.group_snowflake = $1
            ",
        )
        .bind(to_db_id(group_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Group::try_from).transpose()?)
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT
                groups.group_snowflake,
                groups.slug,
                groups.title,
                groups.description
            FROM
                blog.groups
            WHERE
                groups.slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Group::try_from).transpose()?)
    }

    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT
                groups.group_snowflake,
                groups.slug,
                groups.title,
                groups.description
            FROM
                blog.groups
            ORDER BY
                groups.title
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Id<GroupMarker>> {
        let group_id = self.snowflakes.next_id();

        query(
            "
            INSERT INTO blog.groups (group_snowflake, slug, title, description)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(to_db_id(group_id))
        .bind(group.slug.get())
        .bind(group.title.get())
        .bind(&group.description)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_on_unique(err, || format!("Group {}", group.slug)))?;

        Ok(group_id)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, FullPostRecord>(concat!(
            select_full_post!(),
            "WHERE posts.post_snowflake = $1"
        ))
        .bind(to_db_id(post_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Post::try_from).transpose()?)
    }

    async fn create_post(
        &self,
        author: Id<AuthorMarker>,
        content: &PostContent,
    ) -> Result<Id<PostMarker>> {
        let post_id = self.snowflakes.next_id();

        query(
            "
            INSERT INTO blog.posts
                (post_snowflake, author_snowflake, group_snowflake, content, image)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(to_db_id(post_id))
        .bind(to_db_id(author))
        .bind(content.group.map(to_db_id))
        .bind(content.text.get())
        .bind(content.image.as_ref().map(|image| image.get()))
        .execute(&self.pool)
        .await?;

        Ok(post_id)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, content: &PostContent) -> Result<bool> {
        let result = query(
            "
            UPDATE blog.posts
            SET
                group_snowflake = $2,
                content = $3,
                image = $4
            WHERE
                post_snowflake = $1
            ",
        )
        .bind(to_db_id(post_id))
        .bind(content.group.map(to_db_id))
        .bind(content.text.get())
        .bind(content.image.as_ref().map(|image| image.get()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let (group, author, follower) = filter_binds(filter);

        let count: i64 = query_scalar(concat!(
            "SELECT COUNT(*) FROM blog.posts",
            post_filter!()
        ))
        .bind(group)
        .bind(author)
        .bind(follower)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.cast_unsigned())
    }

    async fn fetch_posts(&self, filter: PostFilter, offset: u64, limit: u64) -> Result<Vec<Post>> {
        let (group, author, follower) = filter_binds(filter);

        let records = query_as::<_, FullPostRecord>(concat!(
            select_full_post!(),
            post_filter!(),
            "
            ORDER BY posts.post_snowflake DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(group)
        .bind(author)
        .bind(follower)
        .bind(limit.cast_signed())
        .bind(offset.cast_signed())
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.content,
                authors.author_snowflake,
                authors.username
            FROM
                blog.comments
                JOIN blog.authors ON authors.author_snowflake = comments.author_snowflake
            WHERE
                comments.post_snowflake = $1
            ORDER BY
                comments.comment_snowflake
            ",
        )
        .bind(to_db_id(post_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<AuthorMarker>,
        text: &BodyText,
    ) -> Result<Id<CommentMarker>> {
        let comment_id = self.snowflakes.next_id();

        query(
            "
            INSERT INTO blog.comments
                (comment_snowflake, post_snowflake, author_snowflake, content)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(to_db_id(comment_id))
        .bind(to_db_id(post_id))
        .bind(to_db_id(author))
        .bind(text.get())
        .execute(&self.pool)
        .await?;

        Ok(comment_id)
    }

    async fn insert_follow(&self, follow: Follow) -> Result<bool> {
        let result = query(
            "
            INSERT INTO blog.follows (follower_snowflake, author_snowflake)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(to_db_id(follow.follower()))
        .bind(to_db_id(follow.author()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_follow(&self, follow: Follow) -> Result<bool> {
        let result = query(
            "
            DELETE FROM blog.follows
            WHERE
                follower_snowflake = $1
                AND author_snowflake = $2
            ",
        )
        .bind(to_db_id(follow.follower()))
        .bind(to_db_id(follow.author()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn follow_exists(&self, follow: Follow) -> Result<bool> {
        let exists: bool = query_scalar(
            "
            SELECT EXISTS (
                SELECT 1
                FROM blog.follows
                WHERE
                    follower_snowflake = $1
                    AND author_snowflake = $2
            )
            ",
        )
        .bind(to_db_id(follow.follower()))
        .bind(to_db_id(follow.author()))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
