use futures::StreamExt;
use reqwest::redirect::Policy;
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::error::ApiError;
use super::types::{
    AuthResponse, Comment, CommentId, Community, CommunityId, CommunityPage, Flag, LoginRequest,
    NewComment, NewPost, NewSweet, Post, PostId, RegisterRequest, Sweet, SweetPage, UserId,
};
use crate::catalog::SweetQuery;
use crate::session::Session;

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Create a redirect policy with loop detection and limited hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Reject base URLs that would send the bearer token in clear text.
///
/// Plain HTTP is allowed only for localhost/127.0.0.1 (local dev servers, tests).
fn validate_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw).map_err(|e| ApiError::InvalidBaseUrl(e.to_string()))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" => {
            let is_localhost = matches!(
                url.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("[::1]")
            );
            if is_localhost {
                tracing::debug!(base_url = %url, "Using non-HTTPS API base URL (localhost only)");
                Ok(url)
            } else {
                tracing::error!(base_url = %url, "Rejecting non-HTTPS base URL (HTTPS required except for localhost)");
                Err(ApiError::InsecureBaseUrl)
            }
        }
        other => Err(ApiError::InvalidBaseUrl(format!(
            "unsupported scheme '{}'",
            other
        ))),
    }
}

/// JSON client for the forum API.
///
/// Cheap to clone: the connection pool and session are shared. The session
/// is fixed per client; a login produces a new client via [`with_session`].
///
/// [`with_session`]: ApiClient::with_session
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
    session: Option<Arc<Session>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .field("session", &self.session)
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = validate_base_url(base_url)?;

        // Pooled connections with keepalive
        let http = reqwest::Client::builder()
            .redirect(create_redirect_policy())
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            timeout,
            session: None,
        })
    }

    /// Attach (or drop) the session whose token authorizes every request.
    pub fn with_session(mut self, session: Option<Session>) -> Self {
        self.session = session.map(Arc::new);
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let joined = format!("{}{}", self.base.as_str().trim_end_matches('/'), path);
        let mut url = Url::parse(&joined).map_err(|e| ApiError::InvalidBaseUrl(e.to_string()))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Issue a request and return the response body text (`None` when empty).
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<Option<String>, ApiError> {
        let is_mutating = method != Method::GET;
        let mut request = self.http.request(method.clone(), url.clone());

        match &self.session {
            Some(session) => {
                request = request.header(
                    reqwest::header::AUTHORIZATION,
                    format!("Bearer {}", session.token().expose_secret()),
                );
            }
            None if is_mutating => {
                // Enforcement is the server's job; just leave a trace.
                tracing::warn!(path = %url.path(), "No auth token present for request");
            }
            None => {}
        }

        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        tracing::debug!(%method, path = %url.path(), "API request");

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ApiError::Timeout(self.timeout.as_secs()))?
            .map_err(ApiError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let text = read_limited_text(response, MAX_RESPONSE_SIZE).await.ok();
            tracing::debug!(status = status.as_u16(), path = %url.path(), "API request failed");
            return Err(ApiError::from_status(status.as_u16(), text));
        }

        let text = read_limited_text(response, MAX_RESPONSE_SIZE).await?;
        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    async fn get_object<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path, query)?;
        let text = self.send(Method::GET, url, None).await?;
        let text = text.ok_or(ApiError::EmptyResponse)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// GET an object, coercing an empty or malformed body to `T::default()`.
    async fn get_lenient<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path, query)?;
        let text = self.send(Method::GET, url, None).await?;
        Ok(decode_lenient(path, text))
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        self.get_lenient::<Vec<T>>(path, query).await
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Option<String>, ApiError> {
        let url = self.endpoint(path, query)?;
        let payload = body.map(serde_json::to_vec).transpose()?;
        self.send(Method::POST, url, payload).await
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    pub async fn register(&self, request: &RegisterRequest) -> Result<Session, ApiError> {
        let text = self
            .post_json("/auth/register", &[], Some(request))
            .await?;
        session_from_auth(text)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<Session, ApiError> {
        let text = self.post_json("/auth/login", &[], Some(request)).await?;
        session_from_auth(text)
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    pub async fn list_posts(&self, community_id: Option<CommunityId>) -> Result<Vec<Post>, ApiError> {
        let query: Vec<(&str, String)> = community_id
            .map(|id| vec![("communityId", id.to_string())])
            .unwrap_or_default();
        self.get_list("/posts", &query).await
    }

    pub async fn search_posts(&self, q: &str) -> Result<Vec<Post>, ApiError> {
        self.get_list("/search", &[("q", q.to_string())]).await
    }

    pub async fn get_post(&self, id: PostId) -> Result<Post, ApiError> {
        self.get_object(&format!("/posts/{}", id), &[]).await
    }

    /// Create a post. Returns the created record when the server echoes it.
    pub async fn create_post(&self, post: &NewPost) -> Result<Option<Post>, ApiError> {
        let text = self.post_json("/posts", &[], Some(post)).await?;
        Ok(text.and_then(|t| serde_json::from_str(&t).ok()))
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    pub async fn post_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        self.get_list(&format!("/posts/{}/comments", post_id), &[])
            .await
    }

    pub async fn comment_children(&self, comment_id: CommentId) -> Result<Vec<Comment>, ApiError> {
        self.get_list(&format!("/comments/{}/comments", comment_id), &[])
            .await
    }

    pub async fn create_comment(&self, comment: &NewComment) -> Result<(), ApiError> {
        self.post_json("/comments", &[], Some(comment)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Communities and flags
    // ------------------------------------------------------------------

    pub async fn communities(&self) -> Result<Vec<Community>, ApiError> {
        self.get_list("/communities", &[]).await
    }

    pub async fn communities_page(&self, page: u32, size: u32) -> Result<CommunityPage, ApiError> {
        self.get_lenient(
            "/communities/paginated",
            &[("page", page.to_string()), ("size", size.to_string())],
        )
        .await
    }

    pub async fn search_communities(&self, q: &str) -> Result<Vec<Community>, ApiError> {
        self.get_list("/communities/search", &[("q", q.to_string())])
            .await
    }

    pub async fn flags(&self) -> Result<Vec<Flag>, ApiError> {
        self.get_list("/flags", &[]).await
    }

    /// Join the community if not a member, leave it otherwise.
    pub async fn toggle_membership(
        &self,
        community_id: CommunityId,
        user_id: UserId,
    ) -> Result<(), ApiError> {
        self.post_json::<()>(
            &format!("/communities/{}/membership", community_id),
            &[("userId", user_id.to_string())],
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn joined_communities(&self, user_id: UserId) -> Result<Vec<Community>, ApiError> {
        self.get_list(&format!("/users/{}/communities", user_id), &[])
            .await
    }

    // ------------------------------------------------------------------
    // Sweet-shop catalog
    // ------------------------------------------------------------------

    pub async fn sweets(&self, query: &SweetQuery) -> Result<SweetPage, ApiError> {
        self.get_lenient("/sweets/get", &query.to_params()).await
    }

    pub async fn add_sweet(&self, sweet: &NewSweet) -> Result<Option<Sweet>, ApiError> {
        let text = self.post_json("/sweets/post", &[], Some(sweet)).await?;
        Ok(text.and_then(|t| serde_json::from_str(&t).ok()))
    }
}

/// Decode a body, falling back to `T::default()` for empty or malformed input.
fn decode_lenient<T: DeserializeOwned + Default>(path: &str, text: Option<String>) -> T {
    let Some(text) = text else {
        return T::default();
    };
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path, error = %e, "Malformed response, treating as empty");
            T::default()
        }
    }
}

fn session_from_auth(text: Option<String>) -> Result<Session, ApiError> {
    let text = text.ok_or(ApiError::EmptyResponse)?;
    let response: AuthResponse = serde_json::from_str(&text)?;
    match response.token.filter(|t| !t.is_empty()) {
        Some(token) => {
            tracing::info!(
                user = response.name.as_deref().unwrap_or(""),
                role = response.role.as_deref().unwrap_or(""),
                "Authenticated"
            );
            Ok(Session::from_token(token, response.role))
        }
        None => Err(ApiError::Rejected(
            response
                .message
                .unwrap_or_else(|| "Authentication failed".to_string()),
        )),
    }
}

async fn read_limited_text(response: reqwest::Response, limit: usize) -> Result<String, ApiError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Network)?;
        // saturating_add prevents overflow in the size check
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ApiError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_http_base_url_rejected() {
        let result = ApiClient::new("http://forum.example.com/api", Duration::from_secs(5));
        assert!(matches!(result, Err(ApiError::InsecureBaseUrl)));
    }

    #[test]
    fn test_localhost_and_https_base_urls_allowed() {
        assert!(ApiClient::new("http://localhost:8080/api", Duration::from_secs(5)).is_ok());
        assert!(ApiClient::new("http://127.0.0.1:8080/api", Duration::from_secs(5)).is_ok());
        assert!(ApiClient::new("https://forum.example.com/api", Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_garbage_base_url_rejected() {
        let result = ApiClient::new("not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(ApiError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_endpoint_joins_path_and_query() {
        let client = ApiClient::new("http://localhost:8080/api/", Duration::from_secs(5)).unwrap();
        let url = client
            .endpoint("/communities/paginated", &[("page", "0".into()), ("size", "15".into())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/communities/paginated?page=0&size=15"
        );

        let url = client.endpoint("/search", &[("q", "rust & go".into())]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/search?q=rust+%26+go");
    }

    #[tokio::test]
    async fn test_list_posts_with_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/posts"))
            .and(query_param("communityId", "5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"[{"id":1,"title":"a"},{"id":2,"title":"b"}]"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let posts = client_for(&server).list_posts(Some(5)).await.unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_list_coerced_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/flags"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let flags = client_for(&server).flags().await.unwrap();
        assert!(flags.is_empty());
    }

    #[tokio::test]
    async fn test_empty_list_body_coerced_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/communities"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let communities = client_for(&server).communities().await.unwrap();
        assert!(communities.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_carries_body_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/posts"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Title must not be blank"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_post(&NewPost::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "Title must not be blank");
    }

    #[tokio::test]
    async fn test_error_status_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/posts/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).get_post(9).await.unwrap_err();
        assert_eq!(err.to_string(), "Request failed with status 404");
    }

    #[tokio::test]
    async fn test_get_post_empty_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/posts/9"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client_for(&server).get_post(9).await.unwrap_err();
        assert!(matches!(err, ApiError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_bearer_header_attached_with_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/comments"))
            .and(header("authorization", "Bearer a.b.c"))
            .and(body_json(serde_json::json!({
                "postId": 1,
                "authorId": 42,
                "body": "hello",
                "parentId": null
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).with_session(Some(Session::from_token("a.b.c", None)));
        client
            .create_comment(&NewComment {
                post_id: 1,
                author_id: Some(42),
                body: "hello".into(),
                parent_id: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_login_without_token_reports_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"message":"Invalid credentials"}"#),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .login(&LoginRequest {
                email: "a@b.c".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_response_too_large() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(MAX_RESPONSE_SIZE + 1)))
            .mount(&server)
            .await;

        let err = client_for(&server).list_posts(None).await.unwrap_err();
        assert!(matches!(err, ApiError::ResponseTooLarge(_)));
    }
}
