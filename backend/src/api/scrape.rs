use crate::api::params::{ScrapeParams, ScrapeRequest};
use crate::models::{ErrorResponse, ResumeState, VideoMetadata};
use crate::services::metadata::MetadataConfig;
use crate::services::scraper::{EventSink, ScrapeEvent, Scraper};
use crate::AppState;
use async_trait::async_trait;
use log::{debug, info, warn};
use rocket::response::stream::{Event, EventStream};
use rocket::tokio::sync::mpsc;
use rocket::{get, State};
use serde::Serialize;
use serde_json::{Map, Value};

/// One server-sent event, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StreamMessage {
    Info {
        query: String,
        max_videos: u32,
        max_comments: u32,
        resumed: bool,
    },
    Search {
        total_videos: usize,
    },
    Video {
        video: VideoMetadata,
        video_number: u32,
    },
    Comments {
        video_id: String,
        data: Vec<Map<String, Value>>,
    },
    Progress {
        videos_processed: u32,
        comments_found: u32,
        time_elapsed: f64,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        video_id: Option<String>,
        fatal: bool,
    },
    Complete {
        videos_scraped: u32,
        total_comments: u32,
        time_elapsed: f64,
        timed_out: bool,
        can_continue: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        resume: Option<ResumeState>,
    },
}

impl StreamMessage {
    /// Wire form of `event`, with comment records reduced to the selected columns.
    pub fn from_event(event: ScrapeEvent, metadata: &MetadataConfig) -> Self {
        match event {
            ScrapeEvent::Started {
                query,
                max_videos,
                max_comments,
                resumed,
            } => StreamMessage::Info {
                query,
                max_videos,
                max_comments,
                resumed,
            },
            ScrapeEvent::Searched { total_videos } => StreamMessage::Search { total_videos },
            ScrapeEvent::VideoStarted {
                video,
                video_number,
            } => StreamMessage::Video {
                video,
                video_number,
            },
            ScrapeEvent::Comments { video_id, records } => StreamMessage::Comments {
                video_id,
                data: records.iter().map(|r| metadata.select(r)).collect(),
            },
            ScrapeEvent::Progress(stats) => StreamMessage::Progress {
                videos_processed: stats.videos_processed,
                comments_found: stats.comments_found,
                time_elapsed: stats.elapsed_seconds,
            },
            ScrapeEvent::Error {
                message,
                video_id,
                fatal,
            } => StreamMessage::Error {
                message,
                video_id,
                fatal,
            },
            ScrapeEvent::Completed(summary) => StreamMessage::Complete {
                videos_scraped: summary.stats.videos_processed,
                total_comments: summary.stats.comments_found,
                time_elapsed: summary.stats.elapsed_seconds,
                timed_out: summary.stats.timed_out,
                can_continue: summary.can_continue(),
                resume: summary.resume,
            },
        }
    }
}

/// Forwards run events to the response stream.
pub struct ChannelSink {
    sender: mpsc::Sender<StreamMessage>,
    metadata: MetadataConfig,
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&mut self, event: ScrapeEvent) {
        let message = StreamMessage::from_event(event, &self.metadata);
        if self.sender.send(message).await.is_err() {
            debug!("Client disconnected; dropping event");
        }
    }
}

#[get("/scraper?<params..>")]
pub async fn stream_comments(
    params: ScrapeParams,
    state: &State<AppState>,
) -> Result<EventStream![], ErrorResponse> {
    let request = params.into_request(&state.settings).map_err(|e| {
        warn!("Rejected scrape request: {e}");
        ErrorResponse::bad_request(e)
    })?;
    info!(
        "Streaming comments for '{}' (max {} videos, {} comments)",
        request.session.query, request.session.max_videos, request.session.max_total_comments
    );

    let ScrapeRequest {
        session,
        metadata,
        resume,
    } = request;
    let (sender, mut receiver) = mpsc::channel(64);
    let scraper = Scraper::new(state.platform.clone(), state.settings.stream_options());
    let mut sink = ChannelSink { sender, metadata };
    rocket::tokio::spawn(async move {
        // A failed search has already been sent as a fatal error event.
        let _ = scraper.run(&session, resume, &mut sink).await;
    });

    Ok(EventStream! {
        while let Some(message) = receiver.recv().await {
            yield Event::json(&message);
        }
    })
}
