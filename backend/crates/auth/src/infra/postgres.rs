//! PostgreSQL Repository Implementations
//!
//! One pool-backed repository implements all three persistence traits.
//! Teardown deletes are single statements filtered by owner or id set;
//! none of them runs in a transaction, and each is a no-op once its
//! target rows are gone.

use chrono::{DateTime, Utc};
use kernel::id::{BookmarkId, CommentId, OtpId, PostId, UserId};
use platform::password::HashedPassword;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{otp_code::OtpCode, user::User};
use crate::domain::repository::{ContentRepository, OtpRepository, UserRepository};
use crate::domain::value_object::{ban::BanState, email::Email, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn as_uuids<T>(ids: &[kernel::id::Id<T>]) -> Vec<Uuid> {
    ids.iter().map(|id| *id.as_uuid()).collect()
}

// ============================================================================
// User Repository Implementation
// ============================================================================

const USER_COLUMNS: &str = r#"
    user_id,
    email,
    password_hash,
    epoch,
    refresh_token,
    is_banned,
    ban_reason,
    ban_expires_at,
    user_role,
    created_at,
    updated_at
"#;

impl UserRepository for PgAuthRepository {
    async fn create(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                email,
                password_hash,
                epoch,
                refresh_token,
                is_banned,
                ban_reason,
                ban_expires_at,
                user_role,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_phc_string())
        .bind(user.epoch)
        .bind(user.refresh_token.as_deref())
        .bind(user.ban.is_banned)
        .bind(user.ban.reason.as_deref())
        .bind(user.ban.expires_at)
        .bind(user.role.id())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                password_hash = $3,
                epoch = $4,
                refresh_token = $5,
                is_banned = $6,
                ban_reason = $7,
                ban_expires_at = $8,
                user_role = $9,
                updated_at = $10
            WHERE user_id = $1
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_phc_string())
        .bind(user.epoch)
        .bind(user.refresh_token.as_deref())
        .bind(user.ban.is_banned)
        .bind(user.ban.reason.as_deref())
        .bind(user.ban.expires_at)
        .bind(user.role.id())
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, user_id: &UserId) -> AuthResult<()> {
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_banned(&self) -> AuthResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_banned ORDER BY ban_expires_at NULLS FIRST"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_user()).collect()
    }

    async fn clear_expired_bans(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let cleared = sqlx::query(
            r#"
            UPDATE users SET
                is_banned = FALSE,
                ban_reason = NULL,
                ban_expires_at = NULL,
                updated_at = $1
            WHERE is_banned
              AND ban_expires_at IS NOT NULL
              AND ban_expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(cleared)
    }
}

/// Database row for users table
#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    password_hash: String,
    epoch: i64,
    refresh_token: Option<String>,
    is_banned: bool,
    ban_reason: Option<String>,
    ban_expires_at: Option<DateTime<Utc>>,
    user_role: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let password_hash = HashedPassword::from_phc_string(self.password_hash)
            .map_err(|e| AuthError::Internal(format!("Corrupt password hash: {}", e)))?;

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email),
            password_hash,
            epoch: self.epoch,
            refresh_token: self.refresh_token,
            ban: BanState {
                is_banned: self.is_banned,
                reason: self.ban_reason,
                expires_at: self.ban_expires_at,
            },
            role: UserRole::from_id(self.user_role),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ============================================================================
// One-Time Code Repository Implementation
// ============================================================================

impl OtpRepository for PgAuthRepository {
    async fn insert(&self, otp: &OtpCode) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (otp_id, owner_id, code_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(otp.otp_id.as_uuid())
        .bind(otp.owner.as_uuid())
        .bind(&otp.code_hash)
        .bind(otp.created_at)
        .bind(otp.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_latest_by_owner(&self, owner: &UserId) -> AuthResult<Option<OtpCode>> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            SELECT otp_id, owner_id, code_hash, created_at, expires_at
            FROM otp_codes
            WHERE owner_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(owner.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(OtpRow::into_otp))
    }

    async fn delete_all_by_owner(&self, owner: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM otp_codes WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

/// Database row for otp_codes table
#[derive(sqlx::FromRow)]
struct OtpRow {
    otp_id: Uuid,
    owner_id: Uuid,
    code_hash: Vec<u8>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl OtpRow {
    fn into_otp(self) -> OtpCode {
        OtpCode {
            otp_id: OtpId::from_uuid(self.otp_id),
            owner: UserId::from_uuid(self.owner_id),
            code_hash: self.code_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

// ============================================================================
// Content Repository Implementation (teardown surface)
// ============================================================================

impl ContentRepository for PgAuthRepository {
    async fn post_ids_owned_by(&self, owner: &UserId) -> AuthResult<Vec<PostId>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT post_id FROM posts WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().map(PostId::from_uuid).collect())
    }

    async fn comment_ids_owned_by(&self, owner: &UserId) -> AuthResult<Vec<CommentId>> {
        let ids =
            sqlx::query_scalar::<_, Uuid>("SELECT comment_id FROM comments WHERE owner_id = $1")
                .bind(owner.as_uuid())
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(CommentId::from_uuid).collect())
    }

    async fn bookmark_ids_owned_by(&self, owner: &UserId) -> AuthResult<Vec<BookmarkId>> {
        let ids =
            sqlx::query_scalar::<_, Uuid>("SELECT bookmark_id FROM bookmarks WHERE owner_id = $1")
                .bind(owner.as_uuid())
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(BookmarkId::from_uuid).collect())
    }

    async fn comment_ids_on_posts(&self, posts: &[PostId]) -> AuthResult<Vec<CommentId>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT comment_id FROM comments WHERE post_id = ANY($1)",
        )
        .bind(as_uuids(posts))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(CommentId::from_uuid).collect())
    }

    async fn delete_entries_in_bookmarks(&self, bookmarks: &[BookmarkId]) -> AuthResult<u64> {
        let deleted =
            sqlx::query("DELETE FROM bookmark_entries WHERE bookmark_id = ANY($1)")
                .bind(as_uuids(bookmarks))
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(deleted)
    }

    async fn delete_bookmarks_owned_by(&self, owner: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM bookmarks WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_entries_for_posts(&self, posts: &[PostId]) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM bookmark_entries WHERE post_id = ANY($1)")
            .bind(as_uuids(posts))
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_replies_owned_by(&self, owner: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM thread_replies WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_replies_on_comments(&self, comments: &[CommentId]) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM thread_replies WHERE comment_id = ANY($1)")
            .bind(as_uuids(comments))
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_comments_owned_by(&self, owner: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM comments WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_comments_on_posts(&self, posts: &[PostId]) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM comments WHERE post_id = ANY($1)")
            .bind(as_uuids(posts))
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_likes_by(&self, owner: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM likes WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_likes_on_posts(&self, posts: &[PostId]) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM likes WHERE post_id = ANY($1)")
            .bind(as_uuids(posts))
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_likes_on_comments(&self, comments: &[CommentId]) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM likes WHERE comment_id = ANY($1)")
            .bind(as_uuids(comments))
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_posts_owned_by(&self, owner: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM posts WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}
