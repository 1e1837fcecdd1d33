use crate::models::{ResumeState, SearchSession, SortBy, UploadDate, VideoMetadata};
use crate::services::extractor::extract_video_metadata;
use crate::services::platform::{
    CommentOrder, CommentPage, Continuation, PlatformError, SearchFilters, SearchPage,
    VideoPlatform,
};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::Instant;

/// Cooperative wall-clock budget of a run, checked before every collaborator call.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
    budget: Duration,
}

impl Timer {
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn has_time_left(&self) -> bool {
        self.started.elapsed() < self.budget
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// The search page being traversed and how many of its nodes are consumed.
#[derive(Debug, Clone)]
pub struct SearchPosition {
    pub page: SearchPage,
    /// Handle that fetched `page`; `None` for the first page.
    pub page_token: Option<Continuation>,
    pub offset: usize,
}

impl SearchPosition {
    pub fn first(page: SearchPage) -> Self {
        Self {
            page,
            page_token: None,
            offset: 0,
        }
    }

    pub fn has_more(&self) -> bool {
        self.offset < self.page.items.len() || self.page.continuation.is_some()
    }
}

/// Position inside a video's comment pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentCursor {
    /// Pages loaded before the current one.
    pub page_index: u32,
    /// Nodes of the current page already consumed.
    pub offset: usize,
    /// Handle that fetches the current page; `None` for the first page.
    pub handle: Option<Continuation>,
}

/// A video whose comments were cut off by the budget or the total cap.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingVideo {
    pub video_id: String,
    pub cursor: CommentCursor,
}

/// Fetches the search page a run starts on. A fresh run gets the first page. A resumed run
/// prefers the stored token, then a first-page offset, and otherwise approximates its
/// position by advancing `last_video_index / page_size` pages.
///
/// `Ok(None)` means the budget ran out before the position was reached.
pub async fn position_search(
    platform: &dyn VideoPlatform,
    session: &SearchSession,
    resume: Option<&ResumeState>,
    timer: &Timer,
) -> Result<Option<SearchPosition>, PlatformError> {
    if !timer.has_time_left() {
        return Ok(None);
    }
    let filters = SearchFilters::from(session);

    let Some(state) = resume else {
        let page = platform.search(&session.query, &filters).await?;
        return Ok(Some(SearchPosition::first(page)));
    };

    if let Some(token) = &state.search_continuation {
        let handle = Continuation::search(token.clone());
        let page = platform.search_continuation(&handle).await?;
        let offset = state.search_offset.unwrap_or(0);
        debug!("Resuming search from stored token at offset {offset}");
        return Ok(Some(SearchPosition {
            page,
            page_token: Some(handle),
            offset,
        }));
    }

    let page = platform.search(&session.query, &filters).await?;
    if let Some(offset) = state.search_offset {
        return Ok(Some(SearchPosition {
            offset,
            ..SearchPosition::first(page)
        }));
    }

    let start = state.last_video_index as usize;
    let page_size = page.items.len();
    let mut position = SearchPosition::first(page);
    if start == 0 || page_size == 0 {
        return Ok(Some(position));
    }
    if state.last_video_index >= session.max_videos {
        debug!("Video cap already reached at index {start}; not paging the search");
        return Ok(Some(position));
    }

    let advances = start / page_size;
    info!(
        "No search token to resume from; advancing {advances} page(s) of {page_size} to reach video {start}"
    );
    for _ in 0..advances {
        let Some(next) = position.page.continuation.clone() else {
            break;
        };
        if !timer.has_time_left() {
            return Ok(None);
        }
        let page = platform.search_continuation(&next).await?;
        position = SearchPosition {
            page,
            page_token: Some(next),
            offset: 0,
        };
    }
    position.offset = (start % page_size).min(position.page.items.len());

    Ok(Some(position))
}

/// The video a previous run left unfinished, if any.
pub fn unfinished_video(resume: Option<&ResumeState>) -> Option<PendingVideo> {
    let state = resume.filter(|state| state.has_unfinished_video())?;
    Some(PendingVideo {
        video_id: state.last_video_id.clone()?,
        cursor: CommentCursor {
            page_index: state.comment_page,
            offset: state.comment_offset,
            handle: state
                .comment_continuation
                .clone()
                .map(Continuation::comments),
        },
    })
}

/// Metadata for a video known only by id, looked up through a search for the id. Falls back
/// to a bare record when the lookup fails or finds nothing.
pub async fn lookup_video(platform: &dyn VideoPlatform, video_id: &str) -> VideoMetadata {
    let filters = SearchFilters {
        upload_date: UploadDate::All,
        sort_by: SortBy::Relevance,
    };
    match platform.search(video_id, &filters).await {
        Ok(page) => page
            .items
            .iter()
            .filter_map(extract_video_metadata)
            .find(|metadata| metadata.id == video_id)
            .unwrap_or_else(|| VideoMetadata::bare(video_id)),
        Err(e) => {
            warn!("Could not look up metadata for video {video_id}: {e}");
            VideoMetadata::bare(video_id)
        }
    }
}

/// Re-opens the comment page `cursor` points at: by handle when there is one, otherwise by
/// fetching the first page and following `page_index` continuations.
///
/// `Ok(None)` means the budget ran out on the way.
pub async fn open_comment_page(
    platform: &dyn VideoPlatform,
    video_id: &str,
    cursor: &CommentCursor,
    order: CommentOrder,
    timer: &Timer,
) -> Result<Option<CommentPage>, PlatformError> {
    if !timer.has_time_left() {
        return Ok(None);
    }
    if let Some(handle) = &cursor.handle {
        return platform.comments_continuation(handle).await.map(Some);
    }

    let mut page = platform.comments(video_id, order).await?;
    for _ in 0..cursor.page_index {
        let Some(next) = page.continuation.take() else {
            break;
        };
        if !timer.has_time_left() {
            return Ok(None);
        }
        page = platform.comments_continuation(&next).await?;
    }
    Ok(Some(page))
}

/// What a follow-up run needs, or `None` when the query is exhausted: nothing is resumable
/// unless a video was cut off mid-comments or the search has more to offer below the video
/// cap.
pub fn suspension_state(
    session: &SearchSession,
    videos_processed: u32,
    search: &SearchPosition,
    pending: Option<&PendingVideo>,
) -> Option<ResumeState> {
    let video_cap_hit = videos_processed >= session.max_videos;
    if pending.is_none() && (video_cap_hit || !search.has_more()) {
        return None;
    }

    let consumed_page = search.offset >= search.page.items.len();
    let (search_continuation, search_offset) = match &search.page.continuation {
        Some(next) if consumed_page => (Some(next.token.clone()), Some(0)),
        _ => (
            search.page_token.as_ref().map(|t| t.token.clone()),
            Some(search.offset),
        ),
    };

    let cursor = pending.map(|p| &p.cursor);
    Some(ResumeState {
        last_video_index: videos_processed,
        last_video_id: pending.map(|p| p.video_id.clone()),
        comment_page: cursor.map_or(0, |c| c.page_index),
        comment_offset: cursor.map_or(0, |c| c.offset),
        comment_continuation: cursor
            .and_then(|c| c.handle.as_ref())
            .map(|h| h.token.clone()),
        search_continuation,
        search_offset,
    })
}
