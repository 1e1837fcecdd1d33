use crate::models::{SearchSession, SortBy, UploadDate};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("{endpoint} responded with status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("comments are not available for video {0}")]
    CommentsUnavailable(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Which collaborator endpoint a continuation handle must be re-submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationEndpoint {
    Search,
    Next,
}

impl ContinuationEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            ContinuationEndpoint::Search => "search",
            ContinuationEndpoint::Next => "next",
        }
    }
}

/// Opaque paging handle handed out by the platform. The token is passed back verbatim and
/// never built locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub endpoint: ContinuationEndpoint,
    pub token: String,
}

impl Continuation {
    pub fn search(token: impl Into<String>) -> Self {
        Self {
            endpoint: ContinuationEndpoint::Search,
            token: token.into(),
        }
    }

    pub fn comments(token: impl Into<String>) -> Self {
        Self {
            endpoint: ContinuationEndpoint::Next,
            token: token.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchFilters {
    pub upload_date: UploadDate,
    pub sort_by: SortBy,
}

impl From<&SearchSession> for SearchFilters {
    fn from(session: &SearchSession) -> Self {
        Self {
            upload_date: session.upload_date,
            sort_by: session.sort_by,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOrder {
    TopComments,
    NewestFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoNodeKind {
    Video,
    ShortsLockup,
    ReelItem,
    PlaylistPanelVideo,
    WatchCardCompactVideo,
}

/// A count or length that the platform reports either as a number or as display text.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericText {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Keywords {
    List(Vec<String>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeAuthor {
    pub name: String,
    pub id: Option<String>,
}

/// One entry of a search results page, as loosely typed as the platform returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoNode {
    pub kind: VideoNodeKind,
    pub id: Option<String>,
    pub title: Option<String>,
    pub author: Option<NodeAuthor>,
    pub description: Option<String>,
    pub view_count: Option<NumericText>,
    pub duration: Option<NumericText>,
    pub published: Option<String>,
    pub is_live: Option<bool>,
    pub is_upcoming: Option<bool>,
    pub keywords: Option<Keywords>,
}

impl VideoNode {
    pub fn of_kind(kind: VideoNodeKind) -> Self {
        Self {
            kind,
            id: None,
            title: None,
            author: None,
            description: None,
            view_count: None,
            duration: None,
            published: None,
            is_live: None,
            is_upcoming: None,
            keywords: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentNode {
    pub author_name: Option<String>,
    pub content: Option<String>,
    pub comment_id: Option<String>,
    pub published_time: Option<String>,
    pub like_count: Option<String>,
    pub reply_count: Option<String>,
    pub is_liked: Option<bool>,
    pub is_hearted: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub items: Vec<VideoNode>,
    pub continuation: Option<Continuation>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentPage {
    pub comments: Vec<CommentNode>,
    pub continuation: Option<Continuation>,
}

/// The video platform client. Implementations own all protocol work; callers only page
/// through results with the handles they are given.
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    async fn search(&self, query: &str, filters: &SearchFilters)
        -> Result<SearchPage, PlatformError>;

    async fn search_continuation(
        &self,
        continuation: &Continuation,
    ) -> Result<SearchPage, PlatformError>;

    async fn comments(
        &self,
        video_id: &str,
        order: CommentOrder,
    ) -> Result<CommentPage, PlatformError>;

    async fn comments_continuation(
        &self,
        continuation: &Continuation,
    ) -> Result<CommentPage, PlatformError>;
}
