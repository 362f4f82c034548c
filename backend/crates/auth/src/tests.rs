//! Integration-style tests for the session and trust lifecycle
//!
//! Backed by an in-memory repository so every use case runs end to end
//! without a database. The delivery mock captures plaintext codes; the
//! store itself only ever sees hashes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, header};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use kernel::id::{
    BookmarkEntryId, BookmarkId, CommentId, LikeId, PostId, ThreadReplyId, UserId,
};

use crate::application::{
    AuthConfig, AuthenticateUseCase, BanInput, ChangeEmailUseCase, ChangePasswordUseCase,
    DeleteAccountUseCase, ModerationUseCase, OtpEngine, RefreshSessionUseCase, SignInInput,
    SignInUseCase, SignOutUseCase, SignUpInput, SignUpUseCase, StepUpInput, StepUpPass,
    StepUpUseCase,
};
use crate::domain::delivery::{DeliveryError, OtpDelivery};
use crate::domain::entity::{otp_code::OtpCode, user::User};
use crate::domain::repository::{ContentRepository, OtpRepository, UserRepository};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};
use crate::presentation::handlers::{self, AuthAppState};

// ============================================================================
// In-memory fixtures
// ============================================================================

#[derive(Default)]
struct ContentRows {
    posts: Vec<(PostId, UserId)>,
    comments: Vec<(CommentId, UserId, PostId)>,
    replies: Vec<(ThreadReplyId, UserId, CommentId)>,
    likes: Vec<(LikeId, UserId, Option<PostId>, Option<CommentId>)>,
    bookmarks: Vec<(BookmarkId, UserId)>,
    entries: Vec<(BookmarkEntryId, BookmarkId, PostId)>,
}

#[derive(Default)]
struct InMemoryStore {
    users: Mutex<HashMap<UserId, User>>,
    otps: Mutex<Vec<OtpCode>>,
    content: Mutex<ContentRows>,
    fail_user_updates: AtomicBool,
    fail_comment_deletes: AtomicBool,
}

impl InMemoryStore {
    fn user(&self, id: &UserId) -> User {
        self.users.lock().unwrap().get(id).cloned().expect("user")
    }

    fn seed_post(&self, owner: UserId) -> PostId {
        let id = PostId::new();
        self.content.lock().unwrap().posts.push((id, owner));
        id
    }

    fn seed_comment(&self, owner: UserId, post: PostId) -> CommentId {
        let id = CommentId::new();
        self.content.lock().unwrap().comments.push((id, owner, post));
        id
    }

    fn seed_reply(&self, owner: UserId, comment: CommentId) {
        let id = ThreadReplyId::new();
        self.content.lock().unwrap().replies.push((id, owner, comment));
    }

    fn seed_like(&self, owner: UserId, post: Option<PostId>, comment: Option<CommentId>) {
        let id = LikeId::new();
        self.content.lock().unwrap().likes.push((id, owner, post, comment));
    }

    fn seed_bookmark(&self, owner: UserId, saved: PostId) -> BookmarkId {
        let id = BookmarkId::new();
        let mut rows = self.content.lock().unwrap();
        rows.bookmarks.push((id, owner));
        rows.entries.push((BookmarkEntryId::new(), id, saved));
        id
    }

    /// Every content row that references the user, directly or through
    /// their posts/comments/bookmarks
    fn rows_touching(&self, user: &UserId) -> usize {
        let rows = self.content.lock().unwrap();
        let posts: Vec<PostId> = rows
            .posts
            .iter()
            .filter(|(_, o)| o == user)
            .map(|(p, _)| *p)
            .collect();
        let comments: Vec<CommentId> = rows
            .comments
            .iter()
            .filter(|(_, o, p)| o == user || posts.contains(p))
            .map(|(c, _, _)| *c)
            .collect();
        let bookmarks: Vec<BookmarkId> = rows
            .bookmarks
            .iter()
            .filter(|(_, o)| o == user)
            .map(|(b, _)| *b)
            .collect();

        posts.len()
            + comments.len()
            + bookmarks.len()
            + rows
                .replies
                .iter()
                .filter(|(_, o, c)| o == user || comments.contains(c))
                .count()
            + rows
                .likes
                .iter()
                .filter(|(_, o, p, c)| {
                    o == user
                        || p.is_some_and(|p| posts.contains(&p))
                        || c.is_some_and(|c| comments.contains(&c))
                })
                .count()
            + rows
                .entries
                .iter()
                .filter(|(_, b, p)| bookmarks.contains(b) || posts.contains(p))
                .count()
    }

    /// Rows pointing at a post, comment, or bookmark that no longer
    /// exists. The real schema enforces these as foreign keys, so any
    /// teardown order that would leave one behind aborts on Postgres.
    fn dangling_rows(&self) -> usize {
        let rows = self.content.lock().unwrap();
        let posts: Vec<PostId> = rows.posts.iter().map(|(p, _)| *p).collect();
        let comments: Vec<CommentId> = rows.comments.iter().map(|(c, _, _)| *c).collect();
        let bookmarks: Vec<BookmarkId> = rows.bookmarks.iter().map(|(b, _)| *b).collect();

        rows.comments
            .iter()
            .filter(|(_, _, p)| !posts.contains(p))
            .count()
            + rows
                .replies
                .iter()
                .filter(|(_, _, c)| !comments.contains(c))
                .count()
            + rows
                .likes
                .iter()
                .filter(|(_, _, p, c)| {
                    p.is_some_and(|p| !posts.contains(&p))
                        || c.is_some_and(|c| !comments.contains(&c))
                })
                .count()
            + rows
                .entries
                .iter()
                .filter(|(_, b, p)| !bookmarks.contains(b) || !posts.contains(p))
                .count()
    }
}

impl UserRepository for InMemoryStore {
    async fn create(&self, user: &User) -> AuthResult<()> {
        self.users.lock().unwrap().insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == *email)
            .cloned())
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .any(|u| u.email == *email))
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        if self.fail_user_updates.load(Ordering::SeqCst) {
            return Err(AuthError::Internal("injected update failure".into()));
        }
        self.users.lock().unwrap().insert(user.user_id, user.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &UserId) -> AuthResult<()> {
        self.users.lock().unwrap().remove(user_id);
        Ok(())
    }

    async fn find_banned(&self) -> AuthResult<Vec<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.ban.is_banned)
            .cloned()
            .collect())
    }

    async fn clear_expired_bans(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut users = self.users.lock().unwrap();
        let mut cleared = 0;
        for user in users.values_mut() {
            if user.ban.is_banned && user.ban.expires_at.is_some_and(|t| t <= now) {
                user.lift_ban();
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

impl OtpRepository for InMemoryStore {
    async fn insert(&self, otp: &OtpCode) -> AuthResult<()> {
        self.otps.lock().unwrap().push(otp.clone());
        Ok(())
    }

    async fn find_latest_by_owner(&self, owner: &UserId) -> AuthResult<Option<OtpCode>> {
        Ok(self
            .otps
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.owner == *owner)
            .max_by_key(|o| o.created_at)
            .cloned())
    }

    async fn delete_all_by_owner(&self, owner: &UserId) -> AuthResult<u64> {
        let mut otps = self.otps.lock().unwrap();
        let before = otps.len();
        otps.retain(|o| o.owner != *owner);
        Ok((before - otps.len()) as u64)
    }
}

impl ContentRepository for InMemoryStore {
    async fn post_ids_owned_by(&self, owner: &UserId) -> AuthResult<Vec<PostId>> {
        Ok(self
            .content
            .lock()
            .unwrap()
            .posts
            .iter()
            .filter(|(_, o)| o == owner)
            .map(|(p, _)| *p)
            .collect())
    }

    async fn comment_ids_owned_by(&self, owner: &UserId) -> AuthResult<Vec<CommentId>> {
        Ok(self
            .content
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|(_, o, _)| o == owner)
            .map(|(c, _, _)| *c)
            .collect())
    }

    async fn bookmark_ids_owned_by(&self, owner: &UserId) -> AuthResult<Vec<BookmarkId>> {
        Ok(self
            .content
            .lock()
            .unwrap()
            .bookmarks
            .iter()
            .filter(|(_, o)| o == owner)
            .map(|(b, _)| *b)
            .collect())
    }

    async fn comment_ids_on_posts(&self, posts: &[PostId]) -> AuthResult<Vec<CommentId>> {
        Ok(self
            .content
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|(_, _, p)| posts.contains(p))
            .map(|(c, _, _)| *c)
            .collect())
    }

    async fn delete_entries_in_bookmarks(&self, bookmarks: &[BookmarkId]) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.entries.len();
        rows.entries.retain(|(_, b, _)| !bookmarks.contains(b));
        Ok((before - rows.entries.len()) as u64)
    }

    async fn delete_bookmarks_owned_by(&self, owner: &UserId) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.bookmarks.len();
        rows.bookmarks.retain(|(_, o)| o != owner);
        Ok((before - rows.bookmarks.len()) as u64)
    }

    async fn delete_entries_for_posts(&self, posts: &[PostId]) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.entries.len();
        rows.entries.retain(|(_, _, p)| !posts.contains(p));
        Ok((before - rows.entries.len()) as u64)
    }

    async fn delete_replies_owned_by(&self, owner: &UserId) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.replies.len();
        rows.replies.retain(|(_, o, _)| o != owner);
        Ok((before - rows.replies.len()) as u64)
    }

    async fn delete_replies_on_comments(&self, comments: &[CommentId]) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.replies.len();
        rows.replies.retain(|(_, _, c)| !comments.contains(c));
        Ok((before - rows.replies.len()) as u64)
    }

    async fn delete_comments_owned_by(&self, owner: &UserId) -> AuthResult<u64> {
        if self.fail_comment_deletes.load(Ordering::SeqCst) {
            return Err(AuthError::Internal("injected delete failure".into()));
        }
        let mut rows = self.content.lock().unwrap();
        let before = rows.comments.len();
        rows.comments.retain(|(_, o, _)| o != owner);
        Ok((before - rows.comments.len()) as u64)
    }

    async fn delete_comments_on_posts(&self, posts: &[PostId]) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.comments.len();
        rows.comments.retain(|(_, _, p)| !posts.contains(p));
        Ok((before - rows.comments.len()) as u64)
    }

    async fn delete_likes_by(&self, owner: &UserId) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.likes.len();
        rows.likes.retain(|(_, o, _, _)| o != owner);
        Ok((before - rows.likes.len()) as u64)
    }

    async fn delete_likes_on_posts(&self, posts: &[PostId]) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.likes.len();
        rows.likes
            .retain(|(_, _, p, _)| !p.is_some_and(|p| posts.contains(&p)));
        Ok((before - rows.likes.len()) as u64)
    }

    async fn delete_likes_on_comments(&self, comments: &[CommentId]) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.likes.len();
        rows.likes
            .retain(|(_, _, _, c)| !c.is_some_and(|c| comments.contains(&c)));
        Ok((before - rows.likes.len()) as u64)
    }

    async fn delete_posts_owned_by(&self, owner: &UserId) -> AuthResult<u64> {
        let mut rows = self.content.lock().unwrap();
        let before = rows.posts.len();
        rows.posts.retain(|(_, o)| o != owner);
        Ok((before - rows.posts.len()) as u64)
    }
}

/// Delivery mock; the only place plaintext codes can be observed
#[derive(Default)]
struct CapturingDelivery {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingDelivery {
    fn last_code(&self) -> String {
        self.sent.lock().unwrap().last().expect("code sent").1.clone()
    }
}

impl OtpDelivery for CapturingDelivery {
    async fn send_code(&self, recipient: &Email, code: &str) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.as_str().to_string(), code.to_string()));
        Ok(())
    }
}

// ============================================================================
// Test harness
// ============================================================================

struct Harness {
    store: Arc<InMemoryStore>,
    delivery: Arc<CapturingDelivery>,
    config: Arc<AuthConfig>,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::default()),
            delivery: Arc::new(CapturingDelivery::default()),
            config: Arc::new(AuthConfig::development()),
        }
    }

    fn app_state(&self) -> AuthAppState<InMemoryStore, CapturingDelivery> {
        AuthAppState {
            repo: self.store.clone(),
            delivery: self.delivery.clone(),
            config: self.config.clone(),
        }
    }

    fn cookie_headers(&self, access_token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("{}={}", self.config.access_cookie_name, access_token)
                .parse()
                .expect("cookie header"),
        );
        headers
    }

    async fn register(&self, email: &str, password: &str) -> UserId {
        SignUpUseCase::new(self.store.clone(), self.config.clone())
            .execute(SignUpInput {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .expect("sign up")
            .user_id
    }

    async fn sign_in(&self, email: &str, password: &str) -> (String, String) {
        let out = SignInUseCase::new(self.store.clone(), self.config.clone())
            .execute(SignInInput {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .expect("sign in");
        (out.access_token, out.refresh_token)
    }

    async fn authenticate(&self, token: &str) -> AuthResult<User> {
        AuthenticateUseCase::new(self.store.clone(), self.config.clone())
            .execute(token)
            .await
    }

    fn otp_engine(&self) -> OtpEngine<InMemoryStore, InMemoryStore, CapturingDelivery> {
        OtpEngine::new(self.store.clone(), self.store.clone(), self.delivery.clone())
    }

    async fn step_up(&self, user: User, password: &str, code: &str) -> AuthResult<StepUpPass> {
        StepUpUseCase::new(
            self.store.clone(),
            Arc::new(self.otp_engine()),
            self.config.clone(),
        )
        .execute(
            user,
            StepUpInput {
                current_password: password.to_string(),
                otp_code: code.to_string(),
            },
        )
        .await
    }

    /// Issue and capture a fresh code for the user
    async fn fresh_code(&self, user_id: &UserId) -> String {
        // Clear the throttle window by aging the previous code.
        let mut otps = self.store.otps.lock().unwrap();
        for otp in otps.iter_mut().filter(|o| o.owner == *user_id) {
            otp.created_at -= Duration::minutes(OtpCode::MIN_INTERVAL_MINUTES);
        }
        drop(otps);

        self.otp_engine()
            .generate(&self.store.user(user_id))
            .await
            .expect("generate otp");
        self.delivery.last_code()
    }
}

const PASSWORD: &str = "Correct-Horse-42";

// ============================================================================
// Session lifecycle
// ============================================================================

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_and_authenticate() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let (access, _) = h.sign_in("alice@example.com", PASSWORD).await;

        let user = h.authenticate(&access).await.unwrap();
        assert_eq!(user.user_id, user_id);
    }

    #[tokio::test]
    async fn test_sign_in_does_not_leak_account_existence() {
        let h = Harness::new();
        h.register("alice@example.com", PASSWORD).await;

        let unknown = SignInUseCase::new(h.store.clone(), h.config.clone())
            .execute(SignInInput {
                email: "nobody@example.com".to_string(),
                password: PASSWORD.to_string(),
            })
            .await;
        let wrong_pw = SignInUseCase::new(h.store.clone(), h.config.clone())
            .execute(SignInInput {
                email: "alice@example.com".to_string(),
                password: "not-the-password".to_string(),
            })
            .await;

        assert!(matches!(unknown, Err(AuthError::WrongPassword)));
        assert!(matches!(wrong_pw, Err(AuthError::WrongPassword)));
    }

    #[tokio::test]
    async fn test_garbage_tokens_rejected() {
        let h = Harness::new();
        h.register("alice@example.com", PASSWORD).await;

        assert!(matches!(
            h.authenticate("garbage").await,
            Err(AuthError::TokenMalformed)
        ));

        // Signed with a different secret.
        let other = AuthConfig::development();
        let forged = other.access_codec().issue(uuid::Uuid::new_v4(), 1);
        assert!(matches!(
            h.authenticate(&forged).await,
            Err(AuthError::TokenInvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_refresh_token_never_authenticates() {
        let h = Harness::new();
        h.register("alice@example.com", PASSWORD).await;
        let (_, refresh) = h.sign_in("alice@example.com", PASSWORD).await;

        assert!(matches!(
            h.authenticate(&refresh).await,
            Err(AuthError::TokenInvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_everywhere_revokes_all_tokens() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let (access_a, _) = h.sign_in("alice@example.com", PASSWORD).await;
        let (access_b, refresh_b) = h.sign_in("alice@example.com", PASSWORD).await;

        SignOutUseCase::new(h.store.clone())
            .execute_everywhere(h.store.user(&user_id))
            .await
            .unwrap();

        assert!(matches!(h.authenticate(&access_a).await, Err(AuthError::Revoked)));
        assert!(matches!(h.authenticate(&access_b).await, Err(AuthError::Revoked)));

        let refresh = RefreshSessionUseCase::new(h.store.clone(), h.config.clone())
            .execute(&refresh_b)
            .await;
        assert!(matches!(refresh, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn test_plain_sign_out_only_ends_refresh_chain() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let (access, refresh) = h.sign_in("alice@example.com", PASSWORD).await;

        SignOutUseCase::new(h.store.clone())
            .execute(h.store.user(&user_id))
            .await
            .unwrap();

        // Access token rides out its TTL; the refresh chain is dead.
        assert!(h.authenticate(&access).await.is_ok());
        let result = RefreshSessionUseCase::new(h.store.clone(), h.config.clone())
            .execute(&refresh)
            .await;
        assert!(matches!(result, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn test_sign_out_surfaces_failed_unpin_write() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let (access, _) = h.sign_in("alice@example.com", PASSWORD).await;
        let headers = h.cookie_headers(&access);

        h.store.fail_user_updates.store(true, Ordering::SeqCst);
        let result = handlers::sign_out(State(h.app_state()), headers.clone()).await;
        h.store.fail_user_updates.store(false, Ordering::SeqCst);

        // The refresh chain is still live server-side; the client must
        // not be told the sign-out took.
        assert!(result.is_err());
        assert!(h.store.user(&user_id).refresh_token.is_some());

        // Same request against a healthy store succeeds and unpins.
        assert!(handlers::sign_out(State(h.app_state()), headers).await.is_ok());
        assert!(h.store.user(&user_id).refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_with_dead_token_still_succeeds() {
        let h = Harness::new();
        h.register("alice@example.com", PASSWORD).await;

        // No valid session to end, but the cookies still get cleared.
        let result =
            handlers::sign_out(State(h.app_state()), h.cookie_headers("garbage")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rotation_kills_spent_token() {
        let h = Harness::new();
        h.register("alice@example.com", PASSWORD).await;
        let (_, refresh) = h.sign_in("alice@example.com", PASSWORD).await;

        let use_case = RefreshSessionUseCase::new(h.store.clone(), h.config.clone());
        let rotated = use_case.execute(&refresh).await.unwrap();

        // The new pair works; the spent refresh token does not.
        assert!(h.authenticate(&rotated.access_token).await.is_ok());
        assert!(matches!(
            use_case.execute(&refresh).await,
            Err(AuthError::Revoked)
        ));
        assert!(use_case.execute(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_new_sign_in_unpins_previous_refresh_token() {
        let h = Harness::new();
        h.register("alice@example.com", PASSWORD).await;
        let (_, refresh_old) = h.sign_in("alice@example.com", PASSWORD).await;
        let (_, refresh_new) = h.sign_in("alice@example.com", PASSWORD).await;

        let use_case = RefreshSessionUseCase::new(h.store.clone(), h.config.clone());
        assert!(matches!(
            use_case.execute(&refresh_old).await,
            Err(AuthError::Revoked)
        ));
        assert!(use_case.execute(&refresh_new).await.is_ok());
    }
}

// ============================================================================
// Bans
// ============================================================================

mod ban_tests {
    use super::*;

    #[tokio::test]
    async fn test_ban_blocks_and_logs_out_everywhere() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let (access, _) = h.sign_in("alice@example.com", PASSWORD).await;

        ModerationUseCase::new(h.store.clone())
            .ban(BanInput {
                target: user_id,
                reason: Some("spam".to_string()),
                duration_hours: Some(24),
            })
            .await
            .unwrap();

        // The epoch rotated with the ban, so even the epoch check fires
        // before the ban gate would.
        assert!(matches!(h.authenticate(&access).await, Err(AuthError::Revoked)));

        // A hypothetical token minted under the new epoch still hits the ban.
        let user = h.store.user(&user_id);
        let token = h
            .config
            .access_codec()
            .issue(user.user_id.into_uuid(), user.epoch);
        match h.authenticate(&token).await {
            Err(AuthError::Banned { reason, until }) => {
                assert_eq!(reason, "spam");
                assert!(until.is_some());
            }
            other => panic!("expected Banned, got {:?}", other.map(|u| u.email)),
        }
    }

    #[tokio::test]
    async fn test_banned_user_cannot_refresh() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        h.sign_in("alice@example.com", PASSWORD).await;

        // Ban without epoch rotation, to isolate the ban gate.
        {
            let mut users = h.store.users.lock().unwrap();
            let user = users.get_mut(&user_id).unwrap();
            user.apply_ban(None, None);
        }

        let pinned = h.store.user(&user_id).refresh_token.unwrap();
        let result = RefreshSessionUseCase::new(h.store.clone(), h.config.clone())
            .execute(&pinned)
            .await;
        assert!(matches!(result, Err(AuthError::Banned { .. })));
    }

    #[tokio::test]
    async fn test_expired_ban_clears_lazily_on_access() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;

        {
            let mut users = h.store.users.lock().unwrap();
            let user = users.get_mut(&user_id).unwrap();
            user.apply_ban(Some("old".to_string()), Some(Utc::now() - Duration::hours(1)));
        }

        let user = h.store.user(&user_id);
        let token = h
            .config
            .access_codec()
            .issue(user.user_id.into_uuid(), user.epoch);

        let admitted = h.authenticate(&token).await.unwrap();
        assert!(!admitted.ban.is_banned);

        // The cleanup persisted.
        assert!(!h.store.user(&user_id).ban.is_banned);
    }

    #[tokio::test]
    async fn test_lazy_cleanup_write_failure_does_not_block_access() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;

        {
            let mut users = h.store.users.lock().unwrap();
            let user = users.get_mut(&user_id).unwrap();
            user.apply_ban(None, Some(Utc::now() - Duration::minutes(5)));
        }

        let user = h.store.user(&user_id);
        let token = h
            .config
            .access_codec()
            .issue(user.user_id.into_uuid(), user.epoch);

        h.store.fail_user_updates.store(true, Ordering::SeqCst);
        let admitted = h.authenticate(&token).await.unwrap();
        h.store.fail_user_updates.store(false, Ordering::SeqCst);

        // Admitted despite the failed write; columns still dirty, and
        // the next access converges to the same decision.
        assert!(!admitted.ban.is_banned);
        assert!(h.store.user(&user_id).ban.is_banned);
        assert!(h.authenticate(&token).await.is_ok());
        assert!(!h.store.user(&user_id).ban.is_banned);
    }

    #[tokio::test]
    async fn test_unban_rules() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let moderation = ModerationUseCase::new(h.store.clone());

        assert!(matches!(
            moderation.unban(&user_id).await,
            Err(AuthError::NotBanned)
        ));

        moderation
            .ban(BanInput {
                target: user_id,
                reason: None,
                duration_hours: None,
            })
            .await
            .unwrap();
        assert_eq!(moderation.list_banned().await.unwrap().len(), 1);

        moderation.unban(&user_id).await.unwrap();
        assert!(!h.store.user(&user_id).ban.is_banned);
        assert!(moderation.list_banned().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_clears_only_lapsed_temporary_bans() {
        let h = Harness::new();
        let lapsed = h.register("lapsed@example.com", PASSWORD).await;
        let active = h.register("active@example.com", PASSWORD).await;
        let permanent = h.register("permanent@example.com", PASSWORD).await;

        {
            let mut users = h.store.users.lock().unwrap();
            users
                .get_mut(&lapsed)
                .unwrap()
                .apply_ban(None, Some(Utc::now() - Duration::hours(2)));
            users
                .get_mut(&active)
                .unwrap()
                .apply_ban(None, Some(Utc::now() + Duration::hours(2)));
            users.get_mut(&permanent).unwrap().apply_ban(None, None);
        }

        let cleared = ModerationUseCase::new(h.store.clone())
            .sweep_expired_bans()
            .await
            .unwrap();

        assert_eq!(cleared, 1);
        assert!(!h.store.user(&lapsed).ban.is_banned);
        assert!(h.store.user(&active).ban.is_banned);
        assert!(h.store.user(&permanent).ban.is_banned);
    }
}

// ============================================================================
// One-time codes
// ============================================================================

mod otp_tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_verify_roundtrip_is_single_use() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let code = h.fresh_code(&user_id).await;

        assert_eq!(code.len(), 6);
        h.otp_engine().verify(&user_id, &code).await.unwrap();

        // Spent on success.
        assert!(matches!(
            h.otp_engine().verify(&user_id, &code).await,
            Err(AuthError::OtpNotFound)
        ));
    }

    #[tokio::test]
    async fn test_generation_throttled_inside_window() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let engine = h.otp_engine();

        engine.generate(&h.store.user(&user_id)).await.unwrap();
        assert!(matches!(
            engine.generate(&h.store.user(&user_id)).await,
            Err(AuthError::OtpThrottled)
        ));
    }

    #[tokio::test]
    async fn test_new_code_invalidates_previous() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;

        let first = h.fresh_code(&user_id).await;
        let second = h.fresh_code(&user_id).await;

        assert_eq!(h.store.otps.lock().unwrap().len(), 1);
        if first != second {
            assert!(matches!(
                h.otp_engine().verify(&user_id, &first).await,
                Err(AuthError::OtpMismatch)
            ));
        }
        h.otp_engine().verify(&user_id, &second).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_code_rejected_and_mismatch_does_not_consume() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let code = h.fresh_code(&user_id).await;

        // Mismatch leaves the code live.
        let wrong = if code == "000000" { "000001" } else { "000000" };
        assert!(matches!(
            h.otp_engine().verify(&user_id, wrong).await,
            Err(AuthError::OtpMismatch)
        ));
        assert_eq!(h.store.otps.lock().unwrap().len(), 1);

        // Age it past the TTL.
        {
            let mut otps = h.store.otps.lock().unwrap();
            for otp in otps.iter_mut() {
                otp.expires_at = Utc::now() - Duration::seconds(1);
            }
        }
        assert!(matches!(
            h.otp_engine().verify(&user_id, &code).await,
            Err(AuthError::OtpExpired)
        ));
    }

    #[tokio::test]
    async fn test_verify_with_no_live_code_is_not_found() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;

        // Existence is checked first, whatever the submission looks like.
        for submitted in ["123456", "", "garbage"] {
            assert!(matches!(
                h.otp_engine().verify(&user_id, submitted).await,
                Err(AuthError::OtpNotFound)
            ));
        }
    }

    #[tokio::test]
    async fn test_malformed_codes_mismatch_and_do_not_consume() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let code = h.fresh_code(&user_id).await;

        for bad in ["", "12345", "1234567", "12345a", "abcdef"] {
            assert!(matches!(
                h.otp_engine().verify(&user_id, bad).await,
                Err(AuthError::OtpMismatch)
            ));
        }

        // Still live after every failed attempt.
        h.otp_engine().verify(&user_id, &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_by_email_for_unknown_user() {
        let h = Harness::new();
        let email = Email::new("ghost@example.com").unwrap();
        assert!(matches!(
            h.otp_engine().generate_for_email(&email).await,
            Err(AuthError::UserNotFound)
        ));
    }
}

// ============================================================================
// Step-up and sensitive mutations
// ============================================================================

mod step_up_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_pipeline_passes() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let code = h.fresh_code(&user_id).await;

        let pass = h
            .step_up(h.store.user(&user_id), PASSWORD, &code)
            .await
            .unwrap();
        assert_eq!(pass.user().user_id, user_id);
    }

    #[tokio::test]
    async fn test_wrong_password_rejected_before_code_is_consumed() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let code = h.fresh_code(&user_id).await;

        let result = h
            .step_up(h.store.user(&user_id), "wrong-password", &code)
            .await;
        assert!(matches!(result, Err(AuthError::WrongPassword)));

        // The code survived the failed attempt.
        h.step_up(h.store.user(&user_id), PASSWORD, &code)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_banned_user_rejected_before_password_check() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let code = h.fresh_code(&user_id).await;

        {
            let mut users = h.store.users.lock().unwrap();
            users.get_mut(&user_id).unwrap().apply_ban(None, None);
        }

        let result = h.step_up(h.store.user(&user_id), PASSWORD, &code).await;
        assert!(matches!(result, Err(AuthError::Banned { .. })));
    }

    #[tokio::test]
    async fn test_change_password_revokes_everything() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;
        let (access, refresh) = h.sign_in("alice@example.com", PASSWORD).await;
        let code = h.fresh_code(&user_id).await;

        let new_password = "Brand-New-Secret-9";
        let pass = h
            .step_up(h.store.user(&user_id), PASSWORD, &code)
            .await
            .unwrap();
        ChangePasswordUseCase::new(h.store.clone(), h.config.clone())
            .execute(pass, new_password.to_string())
            .await
            .unwrap();

        // Old tokens dead, old password dead, new password works.
        assert!(matches!(h.authenticate(&access).await, Err(AuthError::Revoked)));
        assert!(matches!(
            RefreshSessionUseCase::new(h.store.clone(), h.config.clone())
                .execute(&refresh)
                .await,
            Err(AuthError::Revoked)
        ));
        assert!(matches!(
            SignInUseCase::new(h.store.clone(), h.config.clone())
                .execute(SignInInput {
                    email: "alice@example.com".to_string(),
                    password: PASSWORD.to_string(),
                })
                .await,
            Err(AuthError::WrongPassword)
        ));
        h.sign_in("alice@example.com", new_password).await;
    }

    #[tokio::test]
    async fn test_change_password_rejects_same_and_weak() {
        let h = Harness::new();
        let user_id = h.register("alice@example.com", PASSWORD).await;

        let code = h.fresh_code(&user_id).await;
        let pass = h
            .step_up(h.store.user(&user_id), PASSWORD, &code)
            .await
            .unwrap();
        let use_case = ChangePasswordUseCase::new(h.store.clone(), h.config.clone());
        assert!(matches!(
            use_case.execute(pass, PASSWORD.to_string()).await,
            Err(AuthError::SamePassword)
        ));

        let code = h.fresh_code(&user_id).await;
        let pass = h
            .step_up(h.store.user(&user_id), PASSWORD, &code)
            .await
            .unwrap();
        assert!(matches!(
            use_case.execute(pass, "short".to_string()).await,
            Err(AuthError::PasswordValidation(_))
        ));
    }

    #[tokio::test]
    async fn test_change_email_enforces_uniqueness() {
        let h = Harness::new();
        let alice = h.register("alice@example.com", PASSWORD).await;
        h.register("bob@example.com", PASSWORD).await;

        let code = h.fresh_code(&alice).await;
        let pass = h.step_up(h.store.user(&alice), PASSWORD, &code).await.unwrap();
        let use_case = ChangeEmailUseCase::new(h.store.clone());
        assert!(matches!(
            use_case.execute(pass, "bob@example.com".to_string()).await,
            Err(AuthError::EmailTaken)
        ));

        let code = h.fresh_code(&alice).await;
        let pass = h.step_up(h.store.user(&alice), PASSWORD, &code).await.unwrap();
        use_case
            .execute(pass, "alice2@example.com".to_string())
            .await
            .unwrap();
        assert_eq!(h.store.user(&alice).email.as_str(), "alice2@example.com");
    }
}

// ============================================================================
// Account teardown
// ============================================================================

mod teardown_tests {
    use super::*;

    /// Alice owns content, bob interacts with it and has his own.
    fn seed_world(h: &Harness, alice: UserId, bob: UserId) {
        let alice_post = h.store.seed_post(alice);
        let bob_post = h.store.seed_post(bob);

        // Comments both ways.
        let alice_comment_on_bob = h.store.seed_comment(alice, bob_post);
        let bob_comment_on_alice = h.store.seed_comment(bob, alice_post);

        // Replies under both comments.
        h.store.seed_reply(bob, alice_comment_on_bob);
        h.store.seed_reply(alice, bob_comment_on_alice);

        // Likes crossing ownership lines, including one on a foreign
        // comment that only exists because it sits under alice's post.
        h.store.seed_like(alice, Some(bob_post), None);
        h.store.seed_like(bob, Some(alice_post), None);
        h.store.seed_like(bob, None, Some(alice_comment_on_bob));
        h.store.seed_like(bob, None, Some(bob_comment_on_alice));

        // Bookmarks: alice saves bob's post, bob saves alice's.
        h.store.seed_bookmark(alice, bob_post);
        h.store.seed_bookmark(bob, alice_post);
    }

    #[tokio::test]
    async fn test_teardown_removes_every_reference() {
        let h = Harness::new();
        let alice = h.register("alice@example.com", PASSWORD).await;
        let bob = h.register("bob@example.com", PASSWORD).await;
        seed_world(&h, alice, bob);
        h.fresh_code(&alice).await;

        let use_case =
            DeleteAccountUseCase::new(h.store.clone(), h.store.clone(), h.store.clone());
        let summary = use_case
            .execute(StepUpPass::issue_for_tests(h.store.user(&alice)))
            .await
            .unwrap();

        assert_eq!(h.store.rows_touching(&alice), 0);
        assert_eq!(h.store.dangling_rows(), 0);
        assert!(h.store.users.lock().unwrap().get(&alice).is_none());
        assert!(h.store.otps.lock().unwrap().is_empty());

        // Bob survives with his untouched content.
        assert!(h.store.users.lock().unwrap().get(&bob).is_some());
        let rows = h.store.content.lock().unwrap();
        assert_eq!(rows.posts.len(), 1);
        assert!(rows.posts.iter().all(|(_, o)| *o == bob));
        drop(rows);

        assert_eq!(summary.posts, 1);
        assert!(summary.comments >= 2);
        assert!(summary.likes >= 4);
        assert_eq!(summary.bookmarks, 1);
    }

    #[tokio::test]
    async fn test_teardown_removes_likes_on_foreign_comments_under_posts() {
        let h = Harness::new();
        let alice = h.register("alice@example.com", PASSWORD).await;
        let bob = h.register("bob@example.com", PASSWORD).await;
        let carol = h.register("carol@example.com", PASSWORD).await;

        // Carol likes bob's comment under alice's post. The only path
        // that reaches this like is through alice's post.
        let alice_post = h.store.seed_post(alice);
        let bob_comment = h.store.seed_comment(bob, alice_post);
        h.store.seed_like(carol, None, Some(bob_comment));

        let summary = DeleteAccountUseCase::new(h.store.clone(), h.store.clone(), h.store.clone())
            .execute(StepUpPass::issue_for_tests(h.store.user(&alice)))
            .await
            .unwrap();

        assert_eq!(summary.likes, 1);
        assert_eq!(summary.comments, 1);
        assert!(h.store.content.lock().unwrap().likes.is_empty());
        assert_eq!(h.store.dangling_rows(), 0);
    }

    #[tokio::test]
    async fn test_teardown_failure_is_tagged_and_retriable() {
        let h = Harness::new();
        let alice = h.register("alice@example.com", PASSWORD).await;
        let bob = h.register("bob@example.com", PASSWORD).await;
        seed_world(&h, alice, bob);

        let use_case =
            DeleteAccountUseCase::new(h.store.clone(), h.store.clone(), h.store.clone());

        h.store.fail_comment_deletes.store(true, Ordering::SeqCst);
        let result = use_case
            .execute(StepUpPass::issue_for_tests(h.store.user(&alice)))
            .await;
        h.store.fail_comment_deletes.store(false, Ordering::SeqCst);

        match result {
            Err(AuthError::TeardownFailed { step, .. }) => {
                assert_eq!(step, "delete_own_comments");
            }
            other => panic!("expected TeardownFailed, got {:?}", other.map(|_| ())),
        }

        // User record untouched, so the whole sequence can rerun and
        // converge despite the earlier steps having already deleted rows.
        let retry = use_case
            .execute(StepUpPass::issue_for_tests(h.store.user(&alice)))
            .await
            .unwrap();
        assert_eq!(h.store.rows_touching(&alice), 0);
        assert_eq!(h.store.dangling_rows(), 0);
        assert!(h.store.users.lock().unwrap().get(&alice).is_none());
        assert_eq!(retry.posts, 1);
    }
}
