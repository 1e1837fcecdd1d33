use crate::config::ScraperSettings;
use crate::models::{ResumeState, SearchSession, SortBy, UploadDate};
use crate::services::metadata::{MetadataConfig, MetadataField, DEFAULT_FIELDS};
use rocket::FromForm;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_MAX_VIDEOS: u32 = 20;
const DEFAULT_MAX_VID_COMMENTS: u32 = 100;
const DEFAULT_MAX_COMMENTS: u32 = 500;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("{name} must be a whole number, got '{value}'")]
    NotANumber { name: &'static str, value: String },

    #[error("{name} must be between 1 and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        max: u32,
    },

    #[error("unknown uploadDate '{0}' (expected hour, today, week, month, year or all)")]
    UnknownUploadDate(String),

    #[error("unknown sortBy '{0}' (expected relevance, rating, upload_date or view_count)")]
    UnknownSortBy(String),

    #[error("unknown field '{0}' in {1}")]
    UnknownField(String, &'static str),

    #[error("{0} requires lastVideoId")]
    MissingVideoId(&'static str),
}

/// Raw query string of both endpoints. Values stay strings so that bad input becomes a
/// JSON 400 instead of a routing failure.
#[derive(Debug, Default, FromForm)]
pub struct ScrapeParams {
    pub query: Option<String>,
    #[field(name = "maxVideos")]
    pub max_videos: Option<String>,
    #[field(name = "maxVidComments")]
    pub max_vid_comments: Option<String>,
    #[field(name = "maxComments")]
    pub max_comments: Option<String>,
    #[field(name = "uploadDate")]
    pub upload_date: Option<String>,
    #[field(name = "sortBy")]
    pub sort_by: Option<String>,
    #[field(name = "selectedFields")]
    pub selected_fields: Option<String>,
    #[field(name = "columnOrder")]
    pub column_order: Option<String>,
    #[field(name = "startVideoIndex")]
    pub start_video_index: Option<String>,
    #[field(name = "lastVideoId")]
    pub last_video_id: Option<String>,
    #[field(name = "lastCommentIndex")]
    pub last_comment_index: Option<String>,
    #[field(name = "commentOffset")]
    pub comment_offset: Option<String>,
    #[field(name = "commentContinuation")]
    pub comment_continuation: Option<String>,
    #[field(name = "continuationToken")]
    pub continuation_token: Option<String>,
    #[field(name = "searchOffset")]
    pub search_offset: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRequest {
    pub session: SearchSession,
    pub metadata: MetadataConfig,
    pub resume: Option<ResumeState>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, ValidationError> {
    value.parse::<T>().map_err(|_| ValidationError::NotANumber {
        name,
        value: value.to_string(),
    })
}

/// An omitted position parameter is 0. Values that do not fit `T` are rejected.
fn count<T: FromStr + Default>(name: &'static str, value: &Option<String>) -> Result<T, ValidationError> {
    present(value).map_or(Ok(T::default()), |raw| parse_number(name, raw))
}

fn parse_limit(
    name: &'static str,
    value: &Option<String>,
    default: u32,
    max: u32,
) -> Result<u32, ValidationError> {
    let Some(raw) = present(value) else {
        return Ok(default);
    };
    let value: u64 = parse_number(name, raw)?;
    if value == 0 || value > u64::from(max) {
        return Err(ValidationError::OutOfRange { name, value, max });
    }
    Ok(value as u32)
}

fn parse_fields(
    name: &'static str,
    value: &Option<String>,
) -> Result<Option<Vec<MetadataField>>, ValidationError> {
    let Some(raw) = value.as_deref() else {
        return Ok(None);
    };
    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .parse::<MetadataField>()
                .map_err(|unknown| ValidationError::UnknownField(unknown, name))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

impl ScrapeParams {
    /// Validates every parameter against `settings`, before anything is fetched.
    pub fn into_request(self, settings: &ScraperSettings) -> Result<ScrapeRequest, ValidationError> {
        let query = match self.query.as_deref() {
            None => settings.default_query.clone(),
            Some(query) if query.trim().is_empty() => return Err(ValidationError::EmptyQuery),
            Some(query) => query.trim().to_string(),
        };

        let upload_date = match present(&self.upload_date) {
            None => UploadDate::Week,
            Some(raw) => raw
                .parse()
                .map_err(|_| ValidationError::UnknownUploadDate(raw.to_string()))?,
        };
        let sort_by = match present(&self.sort_by) {
            None => SortBy::ViewCount,
            Some(raw) => raw
                .parse()
                .map_err(|_| ValidationError::UnknownSortBy(raw.to_string()))?,
        };

        let session = SearchSession {
            query,
            upload_date,
            sort_by,
            max_videos: parse_limit(
                "maxVideos",
                &self.max_videos,
                DEFAULT_MAX_VIDEOS,
                settings.max_videos_limit,
            )?,
            max_video_comments: parse_limit(
                "maxVidComments",
                &self.max_vid_comments,
                DEFAULT_MAX_VID_COMMENTS,
                settings.max_vid_comments_limit,
            )?,
            max_total_comments: parse_limit(
                "maxComments",
                &self.max_comments,
                DEFAULT_MAX_COMMENTS,
                settings.max_comments_limit,
            )?,
        };

        let selected = parse_fields("selectedFields", &self.selected_fields)?
            .unwrap_or_else(|| DEFAULT_FIELDS.to_vec());
        let order = parse_fields("columnOrder", &self.column_order)?
            .unwrap_or_else(|| selected.clone());
        let metadata = MetadataConfig::new(selected, order);

        let resume = self.resume_state()?;

        Ok(ScrapeRequest {
            session,
            metadata,
            resume,
        })
    }

    fn resume_state(&self) -> Result<Option<ResumeState>, ValidationError> {
        let resume_params = [
            &self.start_video_index,
            &self.last_video_id,
            &self.last_comment_index,
            &self.comment_offset,
            &self.comment_continuation,
            &self.continuation_token,
            &self.search_offset,
        ];
        if resume_params.iter().all(|value| present(value).is_none()) {
            return Ok(None);
        }

        let state = ResumeState {
            last_video_index: count("startVideoIndex", &self.start_video_index)?,
            last_video_id: present(&self.last_video_id).map(String::from),
            comment_page: count("lastCommentIndex", &self.last_comment_index)?,
            comment_offset: count("commentOffset", &self.comment_offset)?,
            comment_continuation: present(&self.comment_continuation).map(String::from),
            search_continuation: present(&self.continuation_token).map(String::from),
            search_offset: present(&self.search_offset)
                .map(|raw| parse_number::<usize>("searchOffset", raw))
                .transpose()?,
        };

        if state.last_video_id.is_none() {
            if state.comment_page > 0 {
                return Err(ValidationError::MissingVideoId("lastCommentIndex"));
            }
            if state.comment_offset > 0 {
                return Err(ValidationError::MissingVideoId("commentOffset"));
            }
            if state.comment_continuation.is_some() {
                return Err(ValidationError::MissingVideoId("commentContinuation"));
            }
        }

        Ok(Some(state))
    }
}
