use crate::models::{CommentRecord, ResumeState, RunStats, RunSummary, SearchSession, VideoMetadata};
use crate::services::extractor::{extract_comment, extract_video_metadata, AuthorStyle};
use crate::services::platform::{CommentOrder, CommentPage, PlatformError, VideoPlatform};
use crate::services::tracker::{self, CommentCursor, PendingVideo, SearchPosition, Timer};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Search failed: {0}")]
    Search(#[source] PlatformError),

    #[error("No comments could be found for the given search parameters.")]
    NoData,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub time_budget: Duration,
    pub batch_size: usize,
    /// Comment continuations followed per video within one run.
    pub max_comment_pages: usize,
    pub comment_order: CommentOrder,
    pub author_style: AuthorStyle,
}

/// Lifecycle of a run, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    Started {
        query: String,
        max_videos: u32,
        max_comments: u32,
        resumed: bool,
    },
    Searched {
        total_videos: usize,
    },
    VideoStarted {
        video: VideoMetadata,
        video_number: u32,
    },
    Comments {
        video_id: String,
        records: Vec<CommentRecord>,
    },
    Progress(RunStats),
    /// Non-fatal errors carry the video they concern, if any; a fatal one ends the run.
    Error {
        message: String,
        video_id: Option<String>,
        fatal: bool,
    },
    Completed(RunSummary),
}

#[async_trait]
pub trait EventSink: Send {
    async fn emit(&mut self, event: ScrapeEvent);
}

/// Counters shared by every step of one run.
#[derive(Debug)]
pub struct RunContext {
    pub videos_processed: u32,
    pub comments_found: u32,
    pub timer: Timer,
}

impl RunContext {
    fn new(budget: Duration, videos_processed: u32) -> Self {
        Self {
            videos_processed,
            comments_found: 0,
            timer: Timer::start(budget),
        }
    }

    fn total_cap_reached(&self, session: &SearchSession) -> bool {
        self.comments_found >= session.max_total_comments
    }

    fn should_stop(&self, session: &SearchSession) -> bool {
        self.total_cap_reached(session)
            || self.videos_processed >= session.max_videos
            || !self.timer.has_time_left()
    }

    fn stats(&self) -> RunStats {
        RunStats {
            videos_processed: self.videos_processed,
            comments_found: self.comments_found,
            elapsed_seconds: self.timer.elapsed_secs(),
            timed_out: !self.timer.has_time_left(),
        }
    }

    fn summary(&self, resume: Option<ResumeState>) -> RunSummary {
        RunSummary {
            stats: self.stats(),
            resume,
        }
    }
}

enum VideoStep {
    Finished,
    Failed,
    Suspended(PendingVideo),
    /// The budget ran out before the first comment request.
    NotStarted,
}

/// Drives search -> videos -> comments for one run.
pub struct Scraper {
    platform: Arc<dyn VideoPlatform>,
    options: RunOptions,
}

impl Scraper {
    pub fn new(platform: Arc<dyn VideoPlatform>, options: RunOptions) -> Self {
        Self { platform, options }
    }

    /// Runs until a cap, the budget or the end of the results. Only a failing search ends
    /// the run with an error (after emitting a fatal `Error` event and no `Completed`).
    pub async fn run<S: EventSink + ?Sized>(
        &self,
        session: &SearchSession,
        resume: Option<ResumeState>,
        sink: &mut S,
    ) -> Result<RunSummary, ScrapeError> {
        let start_index = resume.as_ref().map_or(0, |r| r.last_video_index);
        let mut ctx = RunContext::new(self.options.time_budget, start_index);
        info!(
            "Starting run for '{}' (resumed: {}, start index {start_index})",
            session.query,
            resume.is_some()
        );

        sink.emit(ScrapeEvent::Started {
            query: session.query.clone(),
            max_videos: session.max_videos,
            max_comments: session.max_total_comments,
            resumed: resume.is_some(),
        })
        .await;

        let positioned =
            tracker::position_search(self.platform.as_ref(), session, resume.as_ref(), &ctx.timer)
                .await;
        let mut search = match positioned {
            Ok(Some(position)) => position,
            Ok(None) => {
                warn!("Time budget exhausted before the search was positioned");
                let summary = ctx.summary(Some(resume.unwrap_or_default()));
                sink.emit(ScrapeEvent::Completed(summary.clone())).await;
                return Ok(summary);
            }
            Err(e) => {
                error!("Search for '{}' failed: {e}", session.query);
                sink.emit(ScrapeEvent::Error {
                    message: format!("Search failed: {e}"),
                    video_id: None,
                    fatal: true,
                })
                .await;
                return Err(ScrapeError::Search(e));
            }
        };

        sink.emit(ScrapeEvent::Searched {
            total_videos: search.page.items.len(),
        })
        .await;

        let mut pending = None;
        let mut resumed_id = None;
        if let Some(unfinished) = tracker::unfinished_video(resume.as_ref()) {
            resumed_id = Some(unfinished.video_id.clone());
            pending = self
                .resume_video(&mut ctx, session, unfinished, sink)
                .await;
        }
        if pending.is_none() {
            pending = self
                .traverse(&mut ctx, session, &mut search, resumed_id.as_deref(), sink)
                .await;
        }

        let resume_state =
            tracker::suspension_state(session, ctx.videos_processed, &search, pending.as_ref());
        let summary = ctx.summary(resume_state);
        info!(
            "Run for '{}' finished: {} videos, {} comments in {:.1}s (timed out: {}, resumable: {})",
            session.query,
            summary.stats.videos_processed,
            summary.stats.comments_found,
            summary.stats.elapsed_seconds,
            summary.stats.timed_out,
            summary.can_continue()
        );
        sink.emit(ScrapeEvent::Completed(summary.clone())).await;
        Ok(summary)
    }

    /// Finishes the video a previous run was cut off in. Returns it again when it is still
    /// not finished; a failure drops its continuation and moves past it.
    async fn resume_video<S: EventSink + ?Sized>(
        &self,
        ctx: &mut RunContext,
        session: &SearchSession,
        unfinished: PendingVideo,
        sink: &mut S,
    ) -> Option<PendingVideo> {
        if !ctx.timer.has_time_left() {
            return Some(unfinished);
        }
        info!(
            "Resuming comments of video {} at page {}, offset {}",
            unfinished.video_id, unfinished.cursor.page_index, unfinished.cursor.offset
        );
        let video = tracker::lookup_video(self.platform.as_ref(), &unfinished.video_id).await;
        sink.emit(ScrapeEvent::VideoStarted {
            video: video.clone(),
            video_number: ctx.videos_processed + 1,
        })
        .await;

        let opened = tracker::open_comment_page(
            self.platform.as_ref(),
            &video.id,
            &unfinished.cursor,
            self.options.comment_order,
            &ctx.timer,
        )
        .await;

        let step = match opened {
            Ok(Some(page)) => {
                self.drain_comments(ctx, session, &video, page, unfinished.cursor.clone(), sink)
                    .await
            }
            Ok(None) => return Some(unfinished),
            Err(e) => {
                self.report_video_error(
                    &video.id,
                    format!("Error in continuation for video {}: {e}", video.id),
                    sink,
                )
                .await;
                VideoStep::Failed
            }
        };

        match step {
            VideoStep::Suspended(pending) => Some(pending),
            VideoStep::NotStarted => Some(unfinished),
            VideoStep::Finished => {
                ctx.videos_processed += 1;
                sink.emit(ScrapeEvent::Progress(ctx.stats())).await;
                None
            }
            VideoStep::Failed => {
                ctx.videos_processed += 1;
                None
            }
        }
    }

    /// Walks search pages from `search`'s position. Returns the video left unfinished, if
    /// any; `search` is left pointing just past the last consumed node. `done` is a video this
    /// run already finished out of order, and is passed over when the search reaches it.
    async fn traverse<S: EventSink + ?Sized>(
        &self,
        ctx: &mut RunContext,
        session: &SearchSession,
        search: &mut SearchPosition,
        done: Option<&str>,
        sink: &mut S,
    ) -> Option<PendingVideo> {
        loop {
            while search.offset < search.page.items.len() {
                if ctx.should_stop(session) {
                    return None;
                }
                let node = &search.page.items[search.offset];
                search.offset += 1;
                if let Some(id) = done.filter(|id| node.id.as_deref() == Some(*id)) {
                    debug!("Passing over resumed video {id}");
                    continue;
                }
                let Some(video) = extract_video_metadata(node) else {
                    debug!("Skipping result node of kind {:?}", node.kind);
                    continue;
                };

                sink.emit(ScrapeEvent::VideoStarted {
                    video: video.clone(),
                    video_number: ctx.videos_processed + 1,
                })
                .await;

                match self.scrape_video(ctx, session, &video, sink).await {
                    VideoStep::Finished => {
                        ctx.videos_processed += 1;
                        sink.emit(ScrapeEvent::Progress(ctx.stats())).await;
                    }
                    VideoStep::Failed => ctx.videos_processed += 1,
                    VideoStep::Suspended(pending) => return Some(pending),
                    VideoStep::NotStarted => {
                        search.offset -= 1;
                        return None;
                    }
                }
            }

            if ctx.should_stop(session) {
                return None;
            }
            let next = search.page.continuation.clone()?;
            match self.platform.search_continuation(&next).await {
                Ok(page) => {
                    debug!("Fetched next search page with {} results", page.items.len());
                    *search = SearchPosition {
                        page,
                        page_token: Some(next),
                        offset: 0,
                    };
                }
                Err(e) => {
                    warn!("Fetching the next search page failed: {e}");
                    sink.emit(ScrapeEvent::Error {
                        message: format!("Error in search continuation: {e}"),
                        video_id: None,
                        fatal: false,
                    })
                    .await;
                    return None;
                }
            }
        }
    }

    async fn scrape_video<S: EventSink + ?Sized>(
        &self,
        ctx: &mut RunContext,
        session: &SearchSession,
        video: &VideoMetadata,
        sink: &mut S,
    ) -> VideoStep {
        if !ctx.timer.has_time_left() {
            return VideoStep::NotStarted;
        }
        match self
            .platform
            .comments(&video.id, self.options.comment_order)
            .await
        {
            Ok(page) => {
                self.drain_comments(ctx, session, video, page, CommentCursor::default(), sink)
                    .await
            }
            Err(e) => {
                self.report_video_error(
                    &video.id,
                    format!("Error in processing video {}: {e}", video.id),
                    sink,
                )
                .await;
                VideoStep::Failed
            }
        }
    }

    /// Reads comments from `cursor` onwards, following continuations in a bounded loop.
    /// Suspends mid-video when the total cap or the budget is hit with comments left.
    async fn drain_comments<S: EventSink + ?Sized>(
        &self,
        ctx: &mut RunContext,
        session: &SearchSession,
        video: &VideoMetadata,
        mut page: CommentPage,
        mut cursor: CommentCursor,
        sink: &mut S,
    ) -> VideoStep {
        let mut taken: u32 = 0;
        let mut pages_fetched = 0;
        let mut batch = Vec::with_capacity(self.options.batch_size);

        loop {
            while cursor.offset < page.comments.len() {
                if ctx.total_cap_reached(session) || !ctx.timer.has_time_left() {
                    self.flush(&video.id, &mut batch, sink).await;
                    return VideoStep::Suspended(PendingVideo {
                        video_id: video.id.clone(),
                        cursor,
                    });
                }
                if taken >= session.max_video_comments {
                    self.flush(&video.id, &mut batch, sink).await;
                    return VideoStep::Finished;
                }

                let node = &page.comments[cursor.offset];
                cursor.offset += 1;
                if let Some(record) = extract_comment(node, video, self.options.author_style) {
                    taken += 1;
                    ctx.comments_found += 1;
                    batch.push(record);
                    if batch.len() >= self.options.batch_size {
                        self.flush(&video.id, &mut batch, sink).await;
                    }
                }
            }
            self.flush(&video.id, &mut batch, sink).await;

            let Some(next) = page.continuation.take() else {
                return VideoStep::Finished;
            };
            if taken >= session.max_video_comments {
                return VideoStep::Finished;
            }
            let next_cursor = CommentCursor {
                page_index: cursor.page_index + 1,
                offset: 0,
                handle: Some(next.clone()),
            };
            if ctx.total_cap_reached(session) || !ctx.timer.has_time_left() {
                return VideoStep::Suspended(PendingVideo {
                    video_id: video.id.clone(),
                    cursor: next_cursor,
                });
            }
            if pages_fetched >= self.options.max_comment_pages {
                warn!(
                    "Stopping video {} after {pages_fetched} comment continuations",
                    video.id
                );
                return VideoStep::Finished;
            }

            match self.platform.comments_continuation(&next).await {
                Ok(next_page) => {
                    pages_fetched += 1;
                    page = next_page;
                    cursor = next_cursor;
                }
                Err(e) => {
                    self.report_video_error(
                        &video.id,
                        format!("Error in comment continuation for video {}: {e}", video.id),
                        sink,
                    )
                    .await;
                    return VideoStep::Finished;
                }
            }
        }
    }

    async fn flush<S: EventSink + ?Sized>(
        &self,
        video_id: &str,
        batch: &mut Vec<CommentRecord>,
        sink: &mut S,
    ) {
        if batch.is_empty() {
            return;
        }
        sink.emit(ScrapeEvent::Comments {
            video_id: video_id.to_string(),
            records: std::mem::take(batch),
        })
        .await;
    }

    async fn report_video_error<S: EventSink + ?Sized>(
        &self,
        video_id: &str,
        message: String,
        sink: &mut S,
    ) {
        warn!("{message}");
        sink.emit(ScrapeEvent::Error {
            message,
            video_id: Some(video_id.to_string()),
            fatal: false,
        })
        .await;
    }
}

/// Keeps every record in discovery order; error events go to the log.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub records: Vec<CommentRecord>,
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn emit(&mut self, event: ScrapeEvent) {
        match event {
            ScrapeEvent::Comments { records, .. } => self.records.extend(records),
            ScrapeEvent::Error { message, .. } => error!("{message}"),
            _ => {}
        }
    }
}

#[derive(Debug)]
pub struct BufferedResult {
    pub records: Vec<CommentRecord>,
    pub videos_scraped: u32,
}

/// A complete run from the first result, buffered. Zero records is [`ScrapeError::NoData`].
pub async fn collect_comments(
    platform: Arc<dyn VideoPlatform>,
    session: &SearchSession,
    options: RunOptions,
) -> Result<BufferedResult, ScrapeError> {
    let scraper = Scraper::new(platform, options);
    let mut sink = CollectingSink::default();
    let summary = scraper.run(session, None, &mut sink).await?;

    if sink.records.is_empty() {
        return Err(ScrapeError::NoData);
    }
    Ok(BufferedResult {
        records: sink.records,
        videos_scraped: summary.stats.videos_processed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SortBy, UploadDate};
    use crate::services::platform::testing::{comment, comments_for, video, FakePlatform};
    use crate::services::platform::{VideoNode, VideoNodeKind};

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<ScrapeEvent>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn emit(&mut self, event: ScrapeEvent) {
            self.events.push(event);
        }
    }

    impl RecordingSink {
        fn comment_texts(&self) -> Vec<String> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    ScrapeEvent::Comments { records, .. } => Some(records),
                    _ => None,
                })
                .flatten()
                .map(|r| r.comment.clone())
                .collect()
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    ScrapeEvent::Comments { records, .. } => Some(records.len()),
                    _ => None,
                })
                .collect()
        }

        fn errors(&self) -> Vec<(Option<String>, bool)> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    ScrapeEvent::Error {
                        video_id, fatal, ..
                    } => Some((video_id.clone(), *fatal)),
                    _ => None,
                })
                .collect()
        }

        fn completed(&self) -> Option<&RunSummary> {
            self.events.iter().find_map(|e| match e {
                ScrapeEvent::Completed(summary) => Some(summary),
                _ => None,
            })
        }
    }

    fn session(max_videos: u32, max_video_comments: u32, max_total_comments: u32) -> SearchSession {
        SearchSession {
            query: "test".into(),
            upload_date: UploadDate::Week,
            sort_by: SortBy::ViewCount,
            max_videos,
            max_video_comments,
            max_total_comments,
        }
    }

    fn options() -> RunOptions {
        RunOptions {
            time_budget: Duration::from_secs(9),
            batch_size: 5,
            max_comment_pages: 50,
            comment_order: CommentOrder::NewestFirst,
            author_style: AuthorStyle::Handle,
        }
    }

    fn scraper(platform: &Arc<FakePlatform>) -> Scraper {
        Scraper::new(platform.clone(), options())
    }

    #[tokio::test]
    async fn caps_hit_mid_video_suspend_and_resume_picks_up_the_rest() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1")])
                .with_comment_pages("v1", vec![comments_for("v1", 5)]),
        );
        let session = session(1, 3, 3);

        let mut first = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session, None, &mut first)
            .await
            .unwrap();
        assert_eq!(summary.stats.comments_found, 3);
        assert_eq!(first.comment_texts(), vec!["v1-1", "v1-2", "v1-3"]);
        let resume = summary.resume.clone().expect("suspended mid-video");
        assert_eq!(resume.last_video_id.as_deref(), Some("v1"));
        assert_eq!(resume.comment_offset, 3);
        assert_eq!(resume.last_video_index, 0);

        let mut second = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session, Some(resume), &mut second)
            .await
            .unwrap();
        assert_eq!(second.comment_texts(), vec!["v1-4", "v1-5"]);
        assert_eq!(summary.stats.videos_processed, 1);
        assert!(!summary.can_continue());
    }

    #[tokio::test]
    async fn per_video_cap_moves_on_to_the_next_video() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1"), video("v2")])
                .with_comment_pages("v1", vec![comments_for("v1", 4), comments_for("v1", 4)])
                .with_comment_pages("v2", vec![comments_for("v2", 2)]),
        );
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session(10, 3, 100), None, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.comment_texts(), vec!["v1-1", "v1-2", "v1-3", "v2-1", "v2-2"]);
        assert_eq!(summary.stats.videos_processed, 2);
        assert_eq!(platform.count_calls("comments_continuation"), 0);
        assert!(summary.resume.is_none());
    }

    #[tokio::test]
    async fn comments_are_emitted_in_batches_and_page_ends() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1")])
                .with_comment_pages("v1", vec![comments_for("v1", 7), comments_for("v1", 6)]),
        );
        let mut sink = RecordingSink::default();
        scraper(&platform)
            .run(&session(5, 100, 100), None, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.batch_sizes(), vec![5, 2, 5, 1]);
    }

    #[tokio::test]
    async fn unextractable_comments_are_skipped_without_counting() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1")])
                .with_comment_pages(
                    "v1",
                    vec![vec![
                        comment("@a", "first"),
                        comment("@", "no author"),
                        comment("@b", ""),
                        comment("@c", "second"),
                    ]],
                ),
        );
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session(5, 100, 100), None, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.comment_texts(), vec!["first", "second"]);
        assert_eq!(summary.stats.comments_found, 2);
    }

    #[tokio::test]
    async fn invalid_nodes_are_skipped_and_not_counted() {
        let short = VideoNode {
            kind: VideoNodeKind::ShortsLockup,
            ..video("s1")
        };
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![short, video("v1")])
                .with_comment_pages("v1", vec![comments_for("v1", 1)]),
        );
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session(5, 100, 100), None, &mut sink)
            .await
            .unwrap();

        assert_eq!(summary.stats.videos_processed, 1);
        assert_eq!(platform.count_calls("comments:s1"), 0);
        let numbers: Vec<u32> = sink
            .events
            .iter()
            .filter_map(|e| match e {
                ScrapeEvent::VideoStarted { video_number, .. } => Some(*video_number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![1]);
    }

    #[tokio::test]
    async fn failing_video_is_reported_and_skipped() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1"), video("v2")])
                .with_failing_video("v1")
                .with_comment_pages("v2", vec![comments_for("v2", 2)]),
        );
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session(5, 100, 100), None, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.errors(), vec![(Some("v1".to_string()), false)]);
        assert_eq!(sink.comment_texts(), vec!["v2-1", "v2-2"]);
        assert_eq!(summary.stats.videos_processed, 2);
    }

    #[tokio::test]
    async fn failing_comment_continuation_keeps_collected_records() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1"), video("v2")])
                .with_comment_pages("v1", vec![comments_for("v1", 2), comments_for("v1", 2)])
                .with_failing_comment_page("v1", 1)
                .with_comment_pages("v2", vec![comments_for("v2", 1)]),
        );
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session(5, 100, 100), None, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.comment_texts(), vec!["v1-1", "v1-2", "v2-1"]);
        assert_eq!(sink.errors(), vec![(Some("v1".to_string()), false)]);
        assert_eq!(summary.stats.videos_processed, 2);
    }

    #[tokio::test]
    async fn search_failure_is_fatal_and_has_no_completion() {
        let platform = Arc::new(FakePlatform::new().with_failing_search());
        let mut sink = RecordingSink::default();
        let result = scraper(&platform)
            .run(&session(5, 100, 100), None, &mut sink)
            .await;

        assert!(matches!(result, Err(ScrapeError::Search(_))));
        assert_eq!(sink.errors(), vec![(None, true)]);
        assert!(sink.completed().is_none());
    }

    #[tokio::test]
    async fn failing_search_page_ends_the_run_resumably() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1")])
                .with_search_page(vec![video("v2")])
                .with_failing_search_page(1)
                .with_comment_pages("v1", vec![comments_for("v1", 1)]),
        );
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session(5, 100, 100), None, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.errors(), vec![(None, false)]);
        let resume = summary.resume.expect("search still has pages");
        assert_eq!(resume.search_continuation.as_deref(), Some("search-page-1"));
        assert_eq!(resume.search_offset, Some(0));
    }

    #[tokio::test]
    async fn follows_search_pages_until_the_video_cap() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("a"), video("b")])
                .with_search_page(vec![video("c"), video("d")])
                .with_search_page(vec![video("e")]),
        );
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session(3, 100, 100), None, &mut sink)
            .await
            .unwrap();

        assert_eq!(summary.stats.videos_processed, 3);
        assert_eq!(platform.count_calls("comments:"), 3);
        assert_eq!(platform.count_calls("search_continuation"), 1);
        assert!(summary.resume.is_none());
    }

    #[tokio::test]
    async fn total_cap_between_videos_resumes_at_the_next_result() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("a"), video("b"), video("c")])
                .with_comment_pages("a", vec![comments_for("a", 2)])
                .with_comment_pages("b", vec![comments_for("b", 2)]),
        );
        let session = session(10, 100, 2);
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session, None, &mut sink)
            .await
            .unwrap();

        let resume = summary.resume.clone().unwrap();
        assert_eq!(resume.last_video_index, 1);
        assert_eq!(resume.last_video_id, None);
        assert_eq!(resume.search_offset, Some(1));
        assert_eq!(resume.search_continuation, None);

        let mut next = RecordingSink::default();
        scraper(&platform)
            .run(&session, Some(resume), &mut next)
            .await
            .unwrap();
        assert_eq!(next.comment_texts(), vec!["b-1", "b-2"]);
    }

    #[tokio::test]
    async fn failed_resume_of_a_video_moves_past_it() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1"), video("v2")])
                .with_failing_comment_page("v1", 9)
                .with_comment_pages("v2", vec![comments_for("v2", 1)]),
        );
        let resume = ResumeState {
            last_video_index: 0,
            last_video_id: Some("v1".into()),
            comment_page: 1,
            comment_continuation: Some("v1|9".into()),
            search_offset: Some(1),
            ..ResumeState::default()
        };
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session(5, 100, 100), Some(resume), &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.errors(), vec![(Some("v1".to_string()), false)]);
        assert_eq!(sink.comment_texts(), vec!["v2-1"]);
        assert_eq!(summary.stats.videos_processed, 2);
        assert_eq!(platform.count_calls("comments_continuation:v1|9"), 1);
    }

    #[tokio::test]
    async fn counted_resume_does_not_scrape_the_finished_video_again() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1"), video("v2")])
                .with_comment_pages("v1", vec![comments_for("v1", 2), comments_for("v1", 2)])
                .with_comment_pages("v2", vec![comments_for("v2", 1)]),
        );
        let resume = ResumeState {
            last_video_index: 0,
            last_video_id: Some("v1".into()),
            comment_page: 1,
            ..ResumeState::default()
        };
        let mut sink = RecordingSink::default();
        let summary = scraper(&platform)
            .run(&session(5, 100, 100), Some(resume), &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.comment_texts(), vec!["v1-1", "v1-2", "v2-1"]);
        assert_eq!(summary.stats.videos_processed, 2);
        assert_eq!(platform.count_calls("comments:v1"), 1);
        assert_eq!(platform.count_calls("comments:v2"), 1);
    }

    #[tokio::test]
    async fn resumed_video_gets_its_metadata_from_a_lookup() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1")])
                .with_comment_pages(
                    "v1",
                    vec![comments_for("v1", 2), vec![comment("@late", "v1-late")]],
                ),
        );
        let resume = ResumeState {
            last_video_id: Some("v1".into()),
            comment_page: 1,
            comment_continuation: Some("v1|1".into()),
            search_offset: Some(1),
            ..ResumeState::default()
        };
        let mut sink = RecordingSink::default();
        scraper(&platform)
            .run(&session(5, 100, 100), Some(resume), &mut sink)
            .await
            .unwrap();

        let started = sink.events.iter().find_map(|e| match e {
            ScrapeEvent::VideoStarted { video, .. } => Some(video.clone()),
            _ => None,
        });
        assert_eq!(started.map(|v| v.title), Some("Title v1".to_string()));
        assert_eq!(sink.comment_texts(), vec!["v1-late"]);
        assert!(platform.calls().contains(&"search:v1".to_string()));
    }

    #[tokio::test]
    async fn comment_page_cap_bounds_continuations() {
        let pages = (0..10).map(|_| comments_for("v1", 1)).collect();
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1")])
                .with_comment_pages("v1", pages),
        );
        let scraper = Scraper::new(
            platform.clone(),
            RunOptions {
                max_comment_pages: 3,
                ..options()
            },
        );
        let mut sink = RecordingSink::default();
        let summary = scraper
            .run(&session(5, 100, 100), None, &mut sink)
            .await
            .unwrap();

        assert_eq!(platform.count_calls("comments_continuation"), 3);
        assert_eq!(summary.stats.comments_found, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn no_call_starts_after_the_budget_is_spent() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("a"), video("b"), video("c"), video("d")])
                .with_comment_pages("a", vec![comments_for("a", 1), comments_for("a", 1)])
                .with_comment_pages("b", vec![comments_for("b", 1)])
                .with_latency(Duration::from_secs(2)),
        );
        let scraper = Scraper::new(
            platform.clone(),
            RunOptions {
                time_budget: Duration::from_secs(5),
                ..options()
            },
        );
        let mut sink = RecordingSink::default();
        let summary = scraper
            .run(&session(10, 100, 100), None, &mut sink)
            .await
            .unwrap();

        // search ends at 2s, comments:a at 4s, continuation at 6s; nothing after that.
        assert_eq!(
            platform.calls(),
            vec!["search:test", "comments:a", "comments_continuation:a|1"]
        );
        assert!(summary.stats.timed_out);
        assert_eq!(summary.stats.comments_found, 1);
        let resume = summary.resume.expect("budget hit with results left");
        assert_eq!(resume.last_video_index, 0);
        assert_eq!(resume.last_video_id.as_deref(), Some("a"));
        assert_eq!(resume.comment_page, 1);
        assert_eq!(resume.comment_offset, 0);
        assert_eq!(resume.comment_continuation.as_deref(), Some("a|1"));
        assert_eq!(resume.search_offset, Some(1));
    }

    #[tokio::test]
    async fn zero_budget_echoes_the_incoming_state() {
        let platform = Arc::new(FakePlatform::new().with_search_page(vec![video("a")]));
        let scraper = Scraper::new(
            platform.clone(),
            RunOptions {
                time_budget: Duration::ZERO,
                ..options()
            },
        );
        let incoming = ResumeState {
            last_video_index: 4,
            search_continuation: Some("search-page-2".into()),
            ..ResumeState::default()
        };
        let mut sink = RecordingSink::default();
        let summary = scraper
            .run(&session(10, 100, 100), Some(incoming.clone()), &mut sink)
            .await
            .unwrap();

        assert!(platform.calls().is_empty());
        assert_eq!(summary.resume, Some(incoming));
        assert!(summary.stats.timed_out);
    }

    #[tokio::test]
    async fn event_order_of_a_simple_run() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1")])
                .with_comment_pages("v1", vec![comments_for("v1", 1)]),
        );
        let mut sink = RecordingSink::default();
        scraper(&platform)
            .run(&session(5, 100, 100), None, &mut sink)
            .await
            .unwrap();

        let kinds: Vec<&str> = sink
            .events
            .iter()
            .map(|e| match e {
                ScrapeEvent::Started { .. } => "started",
                ScrapeEvent::Searched { .. } => "searched",
                ScrapeEvent::VideoStarted { .. } => "video",
                ScrapeEvent::Comments { .. } => "comments",
                ScrapeEvent::Progress(_) => "progress",
                ScrapeEvent::Error { .. } => "error",
                ScrapeEvent::Completed(_) => "completed",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["started", "searched", "video", "comments", "progress", "completed"]
        );
    }

    #[tokio::test]
    async fn buffered_run_collects_in_discovery_order() {
        let platform: Arc<dyn VideoPlatform> = Arc::new(
            FakePlatform::new()
                .with_search_page(vec![video("v1"), video("v2")])
                .with_comment_pages("v1", vec![comments_for("v1", 2)])
                .with_comment_pages("v2", vec![comments_for("v2", 1)]),
        );
        let result = collect_comments(platform, &session(5, 100, 100), options())
            .await
            .unwrap();

        let texts: Vec<&str> = result.records.iter().map(|r| r.comment.as_str()).collect();
        assert_eq!(texts, vec!["v1-1", "v1-2", "v2-1"]);
        assert_eq!(result.videos_scraped, 2);
        assert_eq!(result.records[0].video.title, "Title v1");
    }

    #[tokio::test]
    async fn buffered_run_without_results_is_no_data() {
        let platform: Arc<dyn VideoPlatform> = Arc::new(FakePlatform::new());
        let result = collect_comments(platform, &session(5, 100, 100), options()).await;
        assert!(matches!(result, Err(ScrapeError::NoData)));
    }
}
