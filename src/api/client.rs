//! REST-backed comments API client.

use crate::api::wire::{CreateCommentBody, EditCommentBody, WireAuthor, WireComment, WireCommentPage};
use crate::api::{ApiError, CommentsApi, Result};
use crate::domain::{Author, Comment, CommentPage, Reply};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::env;
use std::time::Duration;
use tracing::debug;

/// Settings needed to reach the comments API.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub token: Option<SecretString>,
    pub request_timeout: Duration,
}

/// Reads the bearer token from the environment variable named `token_env`.
pub fn token_from_env(token_env: &str) -> Option<SecretString> {
    let token = env::var(token_env).ok()?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(SecretString::from(token.to_owned()))
    }
}

/// Comments API over HTTP with optional bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpCommentsApi {
    http: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpCommentsApi {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            token: settings.token,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Returns the signed-in user, or `None` when no token is configured.
    pub async fn current_user(&self) -> Result<Option<Author>> {
        if self.token.is_none() {
            return Ok(None);
        }

        let author: WireAuthor = self
            .send_json(self.request(Method::GET, "/users/me"))
            .await?;
        Ok(Some(author.into()))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = method.as_str(), url = url.as_str(), "comments api request");

        let builder = self.http.request(method, url);
        match self.token.as_ref() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    fn authed_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        if self.token.is_none() {
            return Err(ApiError::Unauthenticated);
        }
        Ok(self.request(method, path))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(ApiError::from)
    }
}

#[async_trait]
impl CommentsApi for HttpCommentsApi {
    async fn fetch_comments(
        &self,
        thread_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<CommentPage> {
        let builder = self
            .request(Method::GET, &format!("/threads/{thread_id}/comments"))
            .query(&[("page", page), ("per_page", per_page)]);
        let page_data: WireCommentPage = self.send_json(builder).await?;
        Ok(page_data.into_page(page, per_page))
    }

    async fn fetch_replies(&self, comment_id: &str) -> Result<Vec<Reply>> {
        let replies: Vec<WireComment> = self
            .send_json(self.request(Method::GET, &format!("/comments/{comment_id}/replies")))
            .await?;
        Ok(replies
            .into_iter()
            .map(|reply| reply.into_reply(comment_id))
            .collect())
    }

    async fn submit_comment(&self, thread_id: &str, content: &str) -> Result<Comment> {
        let builder = self
            .authed_request(Method::POST, &format!("/threads/{thread_id}/comments"))?
            .json(&CreateCommentBody {
                content,
                parent_id: "",
            });
        let created: WireComment = self.send_json(builder).await?;
        Ok(created.into())
    }

    async fn reply_to_comment(
        &self,
        thread_id: &str,
        parent_id: &str,
        content: &str,
    ) -> Result<Reply> {
        let builder = self
            .authed_request(Method::POST, &format!("/threads/{thread_id}/comments"))?
            .json(&CreateCommentBody { content, parent_id });
        let created: WireComment = self.send_json(builder).await?;
        Ok(created.into_reply(parent_id))
    }

    async fn edit_comment(&self, comment_id: &str, content: &str) -> Result<Comment> {
        let builder = self
            .authed_request(Method::PUT, &format!("/comments/{comment_id}"))?
            .json(&EditCommentBody { content });
        let updated: WireComment = self.send_json(builder).await?;
        Ok(updated.into())
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        let builder = self.authed_request(Method::DELETE, &format!("/comments/{comment_id}"))?;
        self.send(builder).await?;
        Ok(())
    }
}
