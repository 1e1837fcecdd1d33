use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::Responder;
use rocket::{response, Response};
use serde::Serialize;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadDate {
    Hour,
    Today,
    Week,
    Month,
    Year,
    All,
}

impl FromStr for UploadDate {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(UploadDate::Hour),
            "today" => Ok(UploadDate::Today),
            "week" => Ok(UploadDate::Week),
            "month" => Ok(UploadDate::Month),
            "year" => Ok(UploadDate::Year),
            "all" => Ok(UploadDate::All),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Relevance,
    Rating,
    UploadDate,
    ViewCount,
}

impl FromStr for SortBy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SortBy::Relevance),
            "rating" => Ok(SortBy::Rating),
            "upload_date" => Ok(SortBy::UploadDate),
            "view_count" => Ok(SortBy::ViewCount),
            _ => Err(()),
        }
    }
}

/// Bounds of one run, fixed for its whole duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSession {
    pub query: String,
    pub upload_date: UploadDate,
    pub sort_by: SortBy,
    /// Counted across resumed runs, like `startVideoIndex`.
    pub max_videos: u32,
    pub max_video_comments: u32,
    /// Counted per run.
    pub max_total_comments: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_upcoming: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

impl VideoMetadata {
    /// Placeholder used when a video can only be identified by its id.
    pub fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

/// One exported row: a comment plus a copy of its video's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub video: VideoMetadata,
    pub author: String,
    pub comment: String,
    /// Always 0; reserved for downstream labelling.
    pub label: u8,
    pub comment_id: Option<String>,
    pub published_time: Option<String>,
    pub like_count: Option<String>,
    pub reply_count: Option<String>,
    pub is_liked: Option<bool>,
    pub is_hearted: Option<bool>,
}

/// Where a later run picks up. Round-tripped through the client; field names match the
/// streaming endpoint's query parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeState {
    #[serde(rename = "startVideoIndex")]
    pub last_video_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_video_id: Option<String>,
    /// Comment pages already loaded for `last_video_id`.
    #[serde(rename = "lastCommentIndex")]
    pub comment_page: u32,
    pub comment_offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_continuation: Option<String>,
    #[serde(
        rename = "continuationToken",
        skip_serializing_if = "Option::is_none"
    )]
    pub search_continuation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_offset: Option<usize>,
}

impl ResumeState {
    /// True when `last_video_id` was left with comments still unread.
    pub fn has_unfinished_video(&self) -> bool {
        self.last_video_id.is_some()
            && (self.comment_page > 0
                || self.comment_offset > 0
                || self.comment_continuation.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunStats {
    pub videos_processed: u32,
    pub comments_found: u32,
    pub elapsed_seconds: f64,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stats: RunStats,
    pub resume: Option<ResumeState>,
}

impl RunSummary {
    pub fn can_continue(&self) -> bool {
        self.resume.is_some()
    }
}

/// JSON error body; also the responder for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip)]
    pub status: Status,
}

impl ErrorResponse {
    pub fn bad_request(message: impl fmt::Display) -> Self {
        Self {
            error: "Invalid request".to_string(),
            message: message.to_string(),
            status: Status::BadRequest,
        }
    }

    pub fn no_data() -> Self {
        Self {
            error: "No data found".to_string(),
            message: "No comments could be found for the given search parameters.".to_string(),
            status: Status::NotFound,
        }
    }

    pub fn internal(message: impl fmt::Display) -> Self {
        Self {
            error: "An error occurred while scraping".to_string(),
            message: message.to_string(),
            status: Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for ErrorResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let json = serde_json::to_string(&self).map_err(|_| Status::InternalServerError)?;
        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}
