use crate::services::extractor::AuthorStyle;
use crate::services::innertube::{InnertubeClient, InnertubeSettings};
use crate::services::platform::CommentOrder;
use crate::services::scraper::RunOptions;
use crate::AppState;
use anyhow::Result;
use env_logger::Builder;
use lazy_static::lazy_static;
use log::{info, LevelFilter};
use rocket::http::Method;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

lazy_static! {
    pub static ref STREAM_TIME_BUDGET_MS: u64 = env_or("STREAM_TIME_BUDGET_MS", 9_000);
    pub static ref DOWNLOAD_TIME_BUDGET_MS: u64 = env_or("DOWNLOAD_TIME_BUDGET_MS", 29_500);
    pub static ref COMMENT_BATCH_SIZE: usize = env_or("COMMENT_BATCH_SIZE", 5);
    pub static ref MAX_COMMENT_PAGES: usize = env_or("MAX_COMMENT_PAGES", 50);
    pub static ref MAX_VIDEOS_LIMIT: u32 = env_or("MAX_VIDEOS_LIMIT", 200);
    pub static ref MAX_VID_COMMENTS_LIMIT: u32 = env_or("MAX_VID_COMMENTS_LIMIT", 5_000);
    pub static ref MAX_COMMENTS_LIMIT: u32 = env_or("MAX_COMMENTS_LIMIT", 10_000);
    pub static ref DEFAULT_QUERY: String =
        env::var("DEFAULT_QUERY").unwrap_or_else(|_| "berita terkini".to_string());
    pub static ref STRIP_AUTHOR_MARKER: bool = env_or("STRIP_AUTHOR_MARKER", true);
    pub static ref COMMENT_ORDER: String =
        env::var("COMMENT_ORDER").unwrap_or_else(|_| "newest".to_string());
    pub static ref INNERTUBE_BASE_URL: String = env::var("INNERTUBE_BASE_URL")
        .unwrap_or_else(|_| "https://www.youtube.com/youtubei/v1".to_string());
    pub static ref INNERTUBE_CLIENT_VERSION: String = env::var("INNERTUBE_CLIENT_VERSION")
        .unwrap_or_else(|_| "2.20250101.01.00".to_string());
    pub static ref INNERTUBE_HL: String =
        env::var("INNERTUBE_HL").unwrap_or_else(|_| "id".to_string());
    pub static ref INNERTUBE_GL: String =
        env::var("INNERTUBE_GL").unwrap_or_else(|_| "ID".to_string());
    pub static ref REQUEST_TIMEOUT_SECS: u64 = env_or("REQUEST_TIMEOUT_SECS", 10);
    pub static ref CORS_ALLOWED_ORIGIN: String =
        env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:8080".to_string());
}

/// Limits and defaults applied to every request.
#[derive(Debug, Clone)]
pub struct ScraperSettings {
    pub stream_budget: Duration,
    pub download_budget: Duration,
    pub batch_size: usize,
    pub max_comment_pages: usize,
    pub max_videos_limit: u32,
    pub max_vid_comments_limit: u32,
    pub max_comments_limit: u32,
    pub default_query: String,
    pub strip_author_marker: bool,
    pub comment_order: CommentOrder,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            stream_budget: Duration::from_millis(9_000),
            download_budget: Duration::from_millis(29_500),
            batch_size: 5,
            max_comment_pages: 50,
            max_videos_limit: 200,
            max_vid_comments_limit: 5_000,
            max_comments_limit: 10_000,
            default_query: "berita terkini".to_string(),
            strip_author_marker: true,
            comment_order: CommentOrder::NewestFirst,
        }
    }
}

impl ScraperSettings {
    pub fn from_env() -> Self {
        Self {
            stream_budget: Duration::from_millis(*STREAM_TIME_BUDGET_MS),
            download_budget: Duration::from_millis(*DOWNLOAD_TIME_BUDGET_MS),
            batch_size: (*COMMENT_BATCH_SIZE).max(1),
            max_comment_pages: *MAX_COMMENT_PAGES,
            max_videos_limit: *MAX_VIDEOS_LIMIT,
            max_vid_comments_limit: *MAX_VID_COMMENTS_LIMIT,
            max_comments_limit: *MAX_COMMENTS_LIMIT,
            default_query: DEFAULT_QUERY.clone(),
            strip_author_marker: *STRIP_AUTHOR_MARKER,
            comment_order: match COMMENT_ORDER.as_str() {
                "top" => CommentOrder::TopComments,
                _ => CommentOrder::NewestFirst,
            },
        }
    }

    fn run_options(&self, time_budget: Duration) -> RunOptions {
        RunOptions {
            time_budget,
            batch_size: self.batch_size,
            max_comment_pages: self.max_comment_pages,
            comment_order: self.comment_order,
            author_style: if self.strip_author_marker {
                AuthorStyle::Handle
            } else {
                AuthorStyle::Raw
            },
        }
    }

    pub fn stream_options(&self) -> RunOptions {
        self.run_options(self.stream_budget)
    }

    pub fn download_options(&self) -> RunOptions {
        self.run_options(self.download_budget)
    }
}

pub fn init_logger() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
    info!("Starting Rocket backend...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub fn create_innertube_client() -> Result<InnertubeClient> {
    let base_url = &*INNERTUBE_BASE_URL;
    info!("Using Innertube API at: {base_url}");

    let client = InnertubeClient::new(&InnertubeSettings {
        base_url: base_url.clone(),
        client_version: INNERTUBE_CLIENT_VERSION.clone(),
        hl: INNERTUBE_HL.clone(),
        gl: INNERTUBE_GL.clone(),
        timeout: Duration::from_secs(*REQUEST_TIMEOUT_SECS),
    })?;

    Ok(client)
}

pub fn create_app_state() -> Result<AppState> {
    let platform = Arc::new(create_innertube_client()?);
    let settings = ScraperSettings::from_env();
    info!(
        "Time budgets: {:?} streaming, {:?} download",
        settings.stream_budget, settings.download_budget
    );

    Ok(AppState { platform, settings })
}

pub fn create_cors() -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&[CORS_ALLOWED_ORIGIN.as_str()]))
        .allowed_methods(
            vec![Method::Get, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&["Accept", "Content-Type", "Cache-Control"]))
        .allow_credentials(false)
        .to_cors()
        .map_err(|e| anyhow::anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}
