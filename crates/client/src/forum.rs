//! Community forum: threads, comments and likes.
//!
//! Likes are applied to the caller's copy of a thread first and sent to the
//! API afterwards. If the request fails the toggle is undone and the thread
//! is refetched so the caller ends up with the server's view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use petverse_core::{Email, ThreadId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::api::{Access, ApiClient, InsertResult, NO_QUERY, decode_each};
use crate::auth::SessionUser;
use crate::error::ApiError;
use crate::notify::{Notifier, Toast};

/// A comment on a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub author_name: String,
    pub author_email: Email,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A forum thread with its comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    #[serde(rename = "_id")]
    pub id: ThreadId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub author_name: String,
    pub author_email: Email,
    #[serde(default)]
    pub author_photo: Option<String>,
    #[serde(default, deserialize_with = "valid_emails")]
    pub likes: Vec<Email>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Likes as stored by the API; entries that are not valid emails are dropped.
fn valid_emails<'de, D>(deserializer: D) -> Result<Vec<Email>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .iter()
        .filter_map(serde_json::Value::as_str)
        .filter_map(|s| Email::parse(s).ok())
        .collect())
}

impl Thread {
    #[must_use]
    pub fn is_liked_by(&self, email: &Email) -> bool {
        self.likes.contains(email)
    }

    #[must_use]
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    /// Flip `email`'s like; returns whether it is now liked.
    pub fn toggle_like(&mut self, email: &Email) -> bool {
        if let Some(pos) = self.likes.iter().position(|e| e == email) {
            self.likes.remove(pos);
            false
        } else {
            self.likes.push(email.clone());
            true
        }
    }
}

/// A thread to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
    pub title: String,
    pub content: String,
    pub category: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateThreadRequest<'a> {
    title: &'a str,
    content: &'a str,
    category: &'a str,
    author_name: &'a str,
    author_email: &'a Email,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_photo: Option<&'a str>,
    likes: &'a [Email],
    comments: &'a [Comment],
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentRequest<'a> {
    author_name: &'a str,
    author_email: &'a Email,
    text: &'a str,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct LikeRequest<'a> {
    email: &'a Email,
}

/// Errors from forum operations.
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("please log in to join the discussion")]
    NotSignedIn,

    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Client for `/threads`.
#[derive(Clone)]
pub struct ForumClient {
    inner: Arc<ForumClientInner>,
}

struct ForumClientInner {
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
}

impl ForumClient {
    #[must_use]
    pub fn new(api: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(ForumClientInner { api, notifier }),
        }
    }

    /// All threads (`GET /threads`), newest first.
    ///
    /// Threads that fail to decode are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn list_threads(&self) -> Result<Vec<Thread>, ForumError> {
        let raw: Vec<serde_json::Value> = self
            .inner
            .api
            .get_json(Access::Public, &["threads"], NO_QUERY)
            .await?;
        let mut threads: Vec<Thread> = decode_each(raw, "thread");
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(threads)
    }

    /// One thread (`GET /threads/:id`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown IDs, or any other API error.
    #[instrument(skip(self), fields(thread_id = %id))]
    pub async fn get_thread(&self, id: &ThreadId) -> Result<Thread, ForumError> {
        Ok(self
            .inner
            .api
            .get_json(Access::Public, &["threads", id.as_str()], NO_QUERY)
            .await?)
    }

    /// Publish a thread as the signed-in user (`POST /threads`).
    ///
    /// # Errors
    ///
    /// Returns [`ForumError::NotSignedIn`], [`ForumError::EmptyField`] for a
    /// blank title or body, or the API error.
    #[instrument(skip(self, thread), fields(title = %thread.title))]
    pub async fn create_thread(&self, thread: &NewThread) -> Result<InsertResult, ForumError> {
        let user = self.require_user()?;
        let title = self.non_empty("title", &thread.title)?;
        let content = self.non_empty("content", &thread.content)?;

        let request = CreateThreadRequest {
            title,
            content,
            category: thread.category.trim(),
            author_name: user.display_name(),
            author_email: &user.email,
            author_photo: user.photo.as_deref(),
            likes: &[],
            comments: &[],
            created_at: Utc::now(),
        };
        match self
            .inner
            .api
            .post_json(Access::Secure, &["threads"], &request)
            .await
        {
            Ok(result) => {
                self.inner.notifier.notify(Toast::success("Thread posted"));
                Ok(result)
            }
            Err(e) => Err(self.fail("post thread", e)),
        }
    }

    /// Comment on a thread (`POST /threads/:id/comment`), then refetch it.
    ///
    /// # Errors
    ///
    /// Returns [`ForumError::NotSignedIn`], [`ForumError::EmptyField`] for a
    /// blank comment, or the API error.
    #[instrument(skip(self, text), fields(thread_id = %id))]
    pub async fn add_comment(&self, id: &ThreadId, text: &str) -> Result<Thread, ForumError> {
        let user = self.require_user()?;
        let text = self.non_empty("comment", text)?;

        let request = CommentRequest {
            author_name: user.display_name(),
            author_email: &user.email,
            text,
            created_at: Utc::now(),
        };
        if let Err(e) = self
            .inner
            .api
            .post(Access::Secure, &["threads", id.as_str(), "comment"], &request)
            .await
        {
            return Err(self.fail("add comment", e));
        }
        self.get_thread(id).await
    }

    /// Like or unlike `thread` as the signed-in user.
    ///
    /// `thread` is updated before the request goes out. On failure the
    /// change is undone and `thread` is replaced by a fresh copy when the
    /// refetch succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ForumError::NotSignedIn`] or the API error of the like
    /// request.
    #[instrument(skip(self, thread), fields(thread_id = %thread.id))]
    pub async fn toggle_like(&self, thread: &mut Thread) -> Result<bool, ForumError> {
        let user = self.require_user()?;
        let liked = thread.toggle_like(&user.email);

        match self
            .inner
            .api
            .patch(
                Access::Secure,
                &["threads", thread.id.as_str(), "like"],
                &LikeRequest { email: &user.email },
            )
            .await
        {
            Ok(()) => Ok(liked),
            Err(e) => {
                thread.toggle_like(&user.email);
                match self.get_thread(&thread.id).await {
                    Ok(fresh) => *thread = fresh,
                    Err(refetch) => {
                        tracing::warn!(error = %refetch, "Could not refetch thread after failed like");
                    }
                }
                Err(self.fail("update like", e))
            }
        }
    }

    fn require_user(&self) -> Result<SessionUser, ForumError> {
        self.inner.api.session().current_user().ok_or_else(|| {
            self.inner
                .notifier
                .notify(Toast::info("Please log in to join the discussion"));
            ForumError::NotSignedIn
        })
    }

    fn non_empty<'a>(&self, field: &'static str, value: &'a str) -> Result<&'a str, ForumError> {
        let value = value.trim();
        if value.is_empty() {
            let err = ForumError::EmptyField(field);
            self.inner.notifier.notify(Toast::error(err.to_string()));
            return Err(err);
        }
        Ok(value)
    }

    fn fail(&self, action: &str, err: ApiError) -> ForumError {
        tracing::error!(error = %err, action, "Forum request failed");
        self.inner
            .notifier
            .notify(Toast::error(format!("Could not {action}: {err}")));
        ForumError::Api(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn thread() -> Thread {
        serde_json::from_str(
            r#"{
                "_id": "t1",
                "title": "Best food for senior dogs?",
                "authorEmail": "pat@example.com",
                "likes": ["lee@example.com"],
                "comments": [{"authorEmail": "lee@example.com", "text": "Ask your vet"}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_deserialize_thread() {
        let thread = thread();
        assert_eq!(thread.like_count(), 1);
        assert_eq!(thread.comments[0].text, "Ask your vet");
        assert!(thread.content.is_empty());
    }

    #[test]
    fn test_invalid_likes_are_dropped() {
        let thread: Thread = serde_json::from_str(
            r#"{
                "_id": "t2",
                "title": "Litter brands",
                "authorEmail": "pat@example.com",
                "likes": ["lee@example.com", "not-an-email", null, "KIM@example.com"]
            }"#,
        )
        .unwrap();
        assert_eq!(thread.like_count(), 2);
        assert!(thread.is_liked_by(&Email::parse("kim@example.com").unwrap()));
    }

    #[test]
    fn test_toggle_like_round_trip() {
        let mut thread = thread();
        let pat = Email::parse("pat@example.com").unwrap();
        let lee = Email::parse("lee@example.com").unwrap();

        assert!(thread.toggle_like(&pat));
        assert!(thread.is_liked_by(&pat));
        assert_eq!(thread.like_count(), 2);

        assert!(!thread.toggle_like(&lee));
        assert!(!thread.is_liked_by(&lee));
        assert_eq!(thread.likes, vec![pat]);
    }
}
