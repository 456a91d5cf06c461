//! Wire types for the forum REST API.
//!
//! Every field the server may omit is `#[serde(default)]` so a partially
//! populated record still deserializes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PostId = i64;
pub type CommentId = i64;
pub type CommunityId = i64;
pub type UserId = i64;

// ============================================================================
// Forum Entities
// ============================================================================

/// Author reference embedded in posts and comments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub id: Option<UserId>,
    pub name: Option<String>,
}

/// A community (subforum) as returned by the directory endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    #[serde(default)]
    pub name: String,
}

/// Category tag attached to a post ("Error", "Doubt", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
}

impl Flag {
    /// Short marker shown next to the flag name in lists.
    pub fn marker(&self) -> &'static str {
        match self.name.as_str() {
            "Error" => "[!]",
            "Doubt" => "[?]",
            "Meme" => "[~]",
            "How To" => "[i]",
            _ => "[#]",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub community: Option<Community>,
    #[serde(default)]
    pub flag: Option<Flag>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comment_count: Option<u32>,
}

impl Post {
    pub fn author_name(&self) -> &str {
        author_display(self.author.as_ref())
    }
}

/// A single comment record.
///
/// Children are not part of the record: the comment tree keeps them
/// separately, keyed by id, so a fetched record stays immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    /// Server-reported number of direct children. Advisory only.
    #[serde(default)]
    pub reply_count: u32,
}

impl Comment {
    pub fn author_name(&self) -> &str {
        author_display(self.author.as_ref())
    }
}

fn author_display(author: Option<&Author>) -> &str {
    author
        .and_then(|a| a.name.as_deref())
        .filter(|n| !n.is_empty())
        .unwrap_or("Anonymous")
}

/// One page of the paginated community directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommunityPage {
    pub content: Vec<Community>,
    pub has_next: bool,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /posts`. Absent optional fields are omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

/// Body of `POST /comments`. `parentId: null` creates a top-level comment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: PostId,
    pub author_id: Option<UserId>,
    pub body: String,
    pub parent_id: Option<CommentId>,
}

// ============================================================================
// Responses
// ============================================================================

/// Login/register response. Failures may arrive as a 2xx with only `message`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthResponse {
    pub token: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub message: Option<String>,
}

// ============================================================================
// Sweet-shop Catalog
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sweet {
    pub id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SweetPage {
    pub items: Vec<Sweet>,
    pub total: u64,
}

/// Body of `POST /sweets/post`. A blank category is sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSweet {
    pub name: String,
    pub category: Option<String>,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_defaults_missing_fields() {
        let c: Comment = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(c.id, 7);
        assert_eq!(c.reply_count, 0);
        assert!(c.parent_id.is_none());
        assert_eq!(c.author_name(), "Anonymous");
    }

    #[test]
    fn test_post_camel_case_fields() {
        let json = r#"{
            "id": 3,
            "title": "Borrow checker",
            "body": "why",
            "author": {"name": "ferris"},
            "community": {"id": 5, "name": "Rust"},
            "flag": {"name": "Doubt"},
            "createdAt": "2024-05-01T10:00:00Z",
            "commentCount": 4
        }"#;
        let p: Post = serde_json::from_str(json).unwrap();
        assert_eq!(p.author_name(), "ferris");
        assert_eq!(p.community.as_ref().map(|c| c.id), Some(5));
        assert_eq!(p.comment_count, Some(4));
        assert_eq!(p.flag.as_ref().map(Flag::marker), Some("[?]"));
        assert!(p.created_at.is_some());
    }

    #[test]
    fn test_new_post_omits_absent_fields() {
        let body = serde_json::to_value(NewPost {
            title: "t".into(),
            body: "b".into(),
            author_id: Some(42),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body["authorId"], 42);
        assert!(body.get("community").is_none());
        assert!(body.get("flag").is_none());
    }

    #[test]
    fn test_new_post_without_session_omits_author() {
        let body = serde_json::to_value(NewPost {
            title: "t".into(),
            body: "b".into(),
            ..Default::default()
        })
        .unwrap();
        assert!(body.get("authorId").is_none());
    }

    #[test]
    fn test_new_comment_serializes_null_parent() {
        let body = serde_json::to_value(NewComment {
            post_id: 1,
            author_id: None,
            body: "hi".into(),
            parent_id: None,
        })
        .unwrap();
        assert!(body["parentId"].is_null());
        assert!(body["authorId"].is_null());
        assert_eq!(body["postId"], 1);
    }

    #[test]
    fn test_community_page_has_next() {
        let page: CommunityPage =
            serde_json::from_str(r#"{"content":[{"id":1,"name":"Go"}],"hasNext":true}"#).unwrap();
        assert!(page.has_next);
        assert_eq!(page.content.len(), 1);
    }
}
