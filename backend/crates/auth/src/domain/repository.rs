//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.
//!
//! The content repository exposes the teardown surface: id snapshots
//! plus bulk deletes-by-filter. Every delete targets "whatever currently
//! matches", so re-running any of them is a no-op once the rows are gone.

use chrono::{DateTime, Utc};
use kernel::id::{BookmarkId, CommentId, PostId, UserId};

use crate::domain::entity::{otp_code::OtpCode, user::User};
use crate::domain::value_object::email::Email;
use crate::error::AuthResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Create a new user
    async fn create(&self, user: &User) -> AuthResult<()>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    /// Find user by email
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    /// Check if email exists
    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool>;

    /// Update user (full row write)
    async fn update(&self, user: &User) -> AuthResult<()>;

    /// Delete the user record
    async fn delete(&self, user_id: &UserId) -> AuthResult<()>;

    /// All currently banned users
    async fn find_banned(&self) -> AuthResult<Vec<User>>;

    /// Clear ban columns on every user whose temporary ban has lapsed
    ///
    /// Returns the number of rows touched. Used by the hourly sweep;
    /// per-request cleanup happens lazily in the ban gate.
    async fn clear_expired_bans(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// One-time code repository trait
#[trait_variant::make(OtpRepository: Send)]
pub trait LocalOtpRepository {
    /// Insert a code record
    async fn insert(&self, otp: &OtpCode) -> AuthResult<()>;

    /// Most recently created code for a user, if any
    async fn find_latest_by_owner(&self, owner: &UserId) -> AuthResult<Option<OtpCode>>;

    /// Delete every code for a user; idempotent
    async fn delete_all_by_owner(&self, owner: &UserId) -> AuthResult<u64>;
}

/// Content repository trait (account teardown surface)
#[trait_variant::make(ContentRepository: Send)]
pub trait LocalContentRepository {
    /// IDs of posts authored by the user
    async fn post_ids_owned_by(&self, owner: &UserId) -> AuthResult<Vec<PostId>>;

    /// IDs of comments authored by the user
    async fn comment_ids_owned_by(&self, owner: &UserId) -> AuthResult<Vec<CommentId>>;

    /// IDs of bookmark collections owned by the user
    async fn bookmark_ids_owned_by(&self, owner: &UserId) -> AuthResult<Vec<BookmarkId>>;

    /// IDs of comments (by anyone) sitting on the given posts
    async fn comment_ids_on_posts(&self, posts: &[PostId]) -> AuthResult<Vec<CommentId>>;

    /// Delete memberships inside the given bookmark collections
    async fn delete_entries_in_bookmarks(&self, bookmarks: &[BookmarkId]) -> AuthResult<u64>;

    /// Delete the user's bookmark collections
    async fn delete_bookmarks_owned_by(&self, owner: &UserId) -> AuthResult<u64>;

    /// Delete memberships (in anyone's bookmarks) pointing at the given posts
    async fn delete_entries_for_posts(&self, posts: &[PostId]) -> AuthResult<u64>;

    /// Delete thread replies authored by the user
    async fn delete_replies_owned_by(&self, owner: &UserId) -> AuthResult<u64>;

    /// Delete thread replies (by anyone) on the given comments
    async fn delete_replies_on_comments(&self, comments: &[CommentId]) -> AuthResult<u64>;

    /// Delete comments authored by the user
    async fn delete_comments_owned_by(&self, owner: &UserId) -> AuthResult<u64>;

    /// Delete comments (by anyone) on the given posts
    async fn delete_comments_on_posts(&self, posts: &[PostId]) -> AuthResult<u64>;

    /// Delete likes cast by the user
    async fn delete_likes_by(&self, owner: &UserId) -> AuthResult<u64>;

    /// Delete likes (by anyone) on the given posts
    async fn delete_likes_on_posts(&self, posts: &[PostId]) -> AuthResult<u64>;

    /// Delete likes (by anyone) on the given comments
    async fn delete_likes_on_comments(&self, comments: &[CommentId]) -> AuthResult<u64>;

    /// Delete the user's posts
    async fn delete_posts_owned_by(&self, owner: &UserId) -> AuthResult<u64>;
}
