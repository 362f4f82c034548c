//! Account Teardown Orchestrator
//!
//! Deletes a user and every record that references them, as a fixed
//! sequence of bulk deletes-by-filter. There is no transaction: each
//! step is independently idempotent (delete whatever currently
//! matches), so a failure partway leaves a retriable state, and
//! re-running the whole sequence converges on the same end state.
//! Dependents always go before the rows they reference, which keeps
//! every intermediate state free of dangling references.

use std::sync::Arc;

use crate::application::step_up::StepUpPass;
use crate::domain::repository::{ContentRepository, OtpRepository, UserRepository};
use crate::error::{AuthError, AuthResult};

/// Rows removed per teardown step, for the audit log and the response
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TeardownSummary {
    pub bookmark_entries: u64,
    pub bookmarks: u64,
    pub thread_replies: u64,
    pub comments: u64,
    pub likes: u64,
    pub posts: u64,
}

/// Account teardown orchestrator
pub struct DeleteAccountUseCase<U, O, C>
where
    U: UserRepository,
    O: OtpRepository,
    C: ContentRepository,
{
    user_repo: Arc<U>,
    otp_repo: Arc<O>,
    content_repo: Arc<C>,
}

impl<U, O, C> DeleteAccountUseCase<U, O, C>
where
    U: UserRepository,
    O: OtpRepository,
    C: ContentRepository,
{
    pub fn new(user_repo: Arc<U>, otp_repo: Arc<O>, content_repo: Arc<C>) -> Self {
        Self {
            user_repo,
            otp_repo,
            content_repo,
        }
    }

    /// Tear down the account behind a step-up pass
    pub async fn execute(&self, pass: StepUpPass) -> AuthResult<TeardownSummary> {
        let user = pass.into_user();
        let uid = user.user_id;
        let mut summary = TeardownSummary::default();

        // Snapshot ownership up front: filters for cross-owner rows
        // (a stranger's comment on my post) key off these ids, and the
        // owning rows are still present at this point.
        let post_ids = self
            .content_repo
            .post_ids_owned_by(&uid)
            .await
            .map_err(|e| AuthError::teardown("snapshot_posts", e))?;
        let comment_ids = self
            .content_repo
            .comment_ids_owned_by(&uid)
            .await
            .map_err(|e| AuthError::teardown("snapshot_comments", e))?;
        let bookmark_ids = self
            .content_repo
            .bookmark_ids_owned_by(&uid)
            .await
            .map_err(|e| AuthError::teardown("snapshot_bookmarks", e))?;

        // Memberships inside the user's bookmark collections, then the
        // collections themselves.
        summary.bookmark_entries += self
            .content_repo
            .delete_entries_in_bookmarks(&bookmark_ids)
            .await
            .map_err(|e| AuthError::teardown("delete_own_bookmark_entries", e))?;
        summary.bookmarks += self
            .content_repo
            .delete_bookmarks_owned_by(&uid)
            .await
            .map_err(|e| AuthError::teardown("delete_bookmarks", e))?;

        // Other users' saves of this user's posts.
        summary.bookmark_entries += self
            .content_repo
            .delete_entries_for_posts(&post_ids)
            .await
            .map_err(|e| AuthError::teardown("delete_entries_for_posts", e))?;

        // Thread replies: authored by the user, then anyone's replies
        // under the user's comments.
        summary.thread_replies += self
            .content_repo
            .delete_replies_owned_by(&uid)
            .await
            .map_err(|e| AuthError::teardown("delete_own_replies", e))?;
        summary.thread_replies += self
            .content_repo
            .delete_replies_on_comments(&comment_ids)
            .await
            .map_err(|e| AuthError::teardown("delete_replies_on_comments", e))?;

        // Likes: cast by the user, then anyone's likes on the user's
        // posts and comments. A like references the comment it sits on,
        // so these go before any comment delete.
        summary.likes += self
            .content_repo
            .delete_likes_by(&uid)
            .await
            .map_err(|e| AuthError::teardown("delete_own_likes", e))?;
        summary.likes += self
            .content_repo
            .delete_likes_on_posts(&post_ids)
            .await
            .map_err(|e| AuthError::teardown("delete_likes_on_posts", e))?;
        summary.likes += self
            .content_repo
            .delete_likes_on_comments(&comment_ids)
            .await
            .map_err(|e| AuthError::teardown("delete_likes_on_comments", e))?;

        // The user's own comments (their reply and like dependents are
        // gone).
        summary.comments += self
            .content_repo
            .delete_comments_owned_by(&uid)
            .await
            .map_err(|e| AuthError::teardown("delete_own_comments", e))?;

        // Everyone's remaining comments under the user's posts, with
        // their reply and like dependents first.
        let foreign_comment_ids = self
            .content_repo
            .comment_ids_on_posts(&post_ids)
            .await
            .map_err(|e| AuthError::teardown("snapshot_comments_on_posts", e))?;
        summary.thread_replies += self
            .content_repo
            .delete_replies_on_comments(&foreign_comment_ids)
            .await
            .map_err(|e| AuthError::teardown("delete_replies_under_posts", e))?;
        summary.likes += self
            .content_repo
            .delete_likes_on_comments(&foreign_comment_ids)
            .await
            .map_err(|e| AuthError::teardown("delete_likes_under_posts", e))?;
        summary.comments += self
            .content_repo
            .delete_comments_on_posts(&post_ids)
            .await
            .map_err(|e| AuthError::teardown("delete_comments_on_posts", e))?;

        // The posts themselves, now dependency-free.
        summary.posts += self
            .content_repo
            .delete_posts_owned_by(&uid)
            .await
            .map_err(|e| AuthError::teardown("delete_posts", e))?;

        // Auth-side dependents, then the user record last.
        self.otp_repo
            .delete_all_by_owner(&uid)
            .await
            .map_err(|e| AuthError::teardown("delete_otp_codes", e))?;
        self.user_repo
            .delete(&uid)
            .await
            .map_err(|e| AuthError::teardown("delete_user", e))?;

        tracing::info!(
            user_id = %uid,
            posts = summary.posts,
            comments = summary.comments,
            thread_replies = summary.thread_replies,
            likes = summary.likes,
            bookmarks = summary.bookmarks,
            bookmark_entries = summary.bookmark_entries,
            "Account deleted"
        );

        Ok(summary)
    }
}
