use crate::models::{SortBy, UploadDate};
use crate::services::platform::{
    CommentNode, CommentOrder, CommentPage, Continuation, ContinuationEndpoint, NodeAuthor,
    NumericText, PlatformError, SearchFilters, SearchPage, VideoNode, VideoNodeKind,
    VideoPlatform,
};
use crate::utils::parse_clock_duration;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

const COMMENT_SECTION_ID: &str = "comment-item-section";

#[derive(Debug, Clone)]
pub struct InnertubeSettings {
    pub base_url: String,
    pub client_version: String,
    pub hl: String,
    pub gl: String,
    pub timeout: Duration,
}

/// Client for the platform's private JSON API, as used by its own web player.
pub struct InnertubeClient {
    http: Client,
    base: Url,
    context: Value,
}

impl InnertubeClient {
    pub fn new(settings: &InnertubeSettings) -> Result<Self, PlatformError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("yt-comment-scraper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base = Url::parse(&format!("{}/", settings.base_url.trim_end_matches('/')))?;

        Ok(Self {
            http,
            base,
            context: json!({
                "client": {
                    "clientName": "WEB",
                    "clientVersion": settings.client_version,
                    "hl": settings.hl,
                    "gl": settings.gl,
                }
            }),
        })
    }

    async fn post(&self, endpoint: &str, mut body: Map<String, Value>) -> Result<Value, PlatformError> {
        let mut url = self.base.join(endpoint)?;
        url.query_pairs_mut().append_pair("prettyPrint", "false");
        body.insert("context".to_string(), self.context.clone());

        debug!("POST {endpoint}");
        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<Value>().await?)
    }

    async fn follow(&self, continuation: &Continuation) -> Result<Value, PlatformError> {
        let mut body = Map::new();
        body.insert("continuation".to_string(), continuation.token.clone().into());
        self.post(continuation.endpoint.path(), body).await
    }
}

#[async_trait]
impl VideoPlatform for InnertubeClient {
    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<SearchPage, PlatformError> {
        let mut body = Map::new();
        body.insert("query".to_string(), query.into());
        body.insert("params".to_string(), encode_search_params(filters).into());
        let response = self.post(ContinuationEndpoint::Search.path(), body).await?;
        Ok(parse_search_page(&response))
    }

    async fn search_continuation(
        &self,
        continuation: &Continuation,
    ) -> Result<SearchPage, PlatformError> {
        let response = self.follow(continuation).await?;
        Ok(parse_search_page(&response))
    }

    async fn comments(
        &self,
        video_id: &str,
        order: CommentOrder,
    ) -> Result<CommentPage, PlatformError> {
        let mut body = Map::new();
        body.insert("videoId".to_string(), video_id.into());
        let watch = self.post(ContinuationEndpoint::Next.path(), body).await?;
        let section = find_comment_section_token(&watch)
            .ok_or_else(|| PlatformError::CommentsUnavailable(video_id.to_string()))?;

        let mut response = self.follow(&Continuation::comments(section)).await?;
        if order == CommentOrder::NewestFirst {
            match find_newest_sort_token(&response) {
                Some(token) => response = self.follow(&Continuation::comments(token)).await?,
                None => debug!("No sort menu for video {video_id}; keeping default order"),
            }
        }
        Ok(parse_comment_page(&response))
    }

    async fn comments_continuation(
        &self,
        continuation: &Continuation,
    ) -> Result<CommentPage, PlatformError> {
        let response = self.follow(continuation).await?;
        Ok(parse_comment_page(&response))
    }
}

/// Base64 of the protobuf filter message:
/// `[1: sort] 2: { [1: upload date] 2: type=video }`. Zero-valued fields are omitted.
pub fn encode_search_params(filters: &SearchFilters) -> String {
    let sort = match filters.sort_by {
        SortBy::Relevance => 0u8,
        SortBy::Rating => 1,
        SortBy::UploadDate => 2,
        SortBy::ViewCount => 3,
    };
    let upload_date = match filters.upload_date {
        UploadDate::Hour => Some(1u8),
        UploadDate::Today => Some(2),
        UploadDate::Week => Some(3),
        UploadDate::Month => Some(4),
        UploadDate::Year => Some(5),
        UploadDate::All => None,
    };

    let mut filter = Vec::with_capacity(4);
    if let Some(code) = upload_date {
        filter.extend([0x08, code]);
    }
    filter.extend([0x10, 0x01]);

    let mut message = Vec::with_capacity(8);
    if sort != 0 {
        message.extend([0x08, sort]);
    }
    message.extend([0x12, filter.len() as u8]);
    message.extend(filter);

    STANDARD.encode(message)
}

/// Display text of a `simpleText`, `runs` or `content` text object.
fn text(value: &Value) -> Option<String> {
    if let Some(simple) = value.get("simpleText").and_then(Value::as_str) {
        return Some(simple.to_string());
    }
    if let Some(content) = value.get("content").and_then(Value::as_str) {
        return Some(content.to_string());
    }
    let runs = value.get("runs")?.as_array()?;
    Some(
        runs.iter()
            .filter_map(|run| run.get("text").and_then(Value::as_str))
            .collect(),
    )
}

fn str_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(String::from)
}

/// Token of a `continuationItemRenderer`, whether it is a scroll trigger or a button.
fn continuation_token(renderer: &Value) -> Option<String> {
    str_at(renderer, "/continuationEndpoint/continuationCommand/token")
        .or_else(|| str_at(renderer, "/button/buttonRenderer/command/continuationCommand/token"))
}

/// First object stored under `key` anywhere in `value` that satisfies `accept`.
fn find_object<'a>(value: &'a Value, key: &str, accept: &dyn Fn(&Value) -> bool) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key).filter(|v| accept(v)) {
                return Some(found);
            }
            map.values().find_map(|child| find_object(child, key, accept))
        }
        Value::Array(items) => items.iter().find_map(|item| find_object(item, key, accept)),
        _ => None,
    }
}

pub fn parse_search_page(response: &Value) -> SearchPage {
    let mut page = SearchPage::default();
    collect_search_nodes(response, &mut page);
    page
}

fn collect_search_nodes(value: &Value, page: &mut SearchPage) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let kind = match key.as_str() {
                    "videoRenderer" => {
                        page.items.push(parse_video_renderer(child));
                        continue;
                    }
                    "continuationItemRenderer" => {
                        if let Some(token) = continuation_token(child) {
                            page.continuation = Some(Continuation::search(token));
                        }
                        continue;
                    }
                    "reelItemRenderer" => VideoNodeKind::ReelItem,
                    "shortsLockupViewModel" => VideoNodeKind::ShortsLockup,
                    "playlistPanelVideoRenderer" => VideoNodeKind::PlaylistPanelVideo,
                    "watchCardCompactVideoRenderer" => VideoNodeKind::WatchCardCompactVideo,
                    _ => {
                        collect_search_nodes(child, page);
                        continue;
                    }
                };
                page.items.push(parse_partial_node(kind, child));
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_search_nodes(item, page);
            }
        }
        _ => {}
    }
}

pub fn parse_video_renderer(renderer: &Value) -> VideoNode {
    let owner = renderer
        .get("ownerText")
        .or_else(|| renderer.get("longBylineText"));
    let author = owner.and_then(|owner| {
        Some(NodeAuthor {
            name: text(owner)?,
            id: str_at(owner, "/runs/0/navigationEndpoint/browseEndpoint/browseId"),
        })
    });

    let description = renderer
        .pointer("/detailedMetadataSnippets/0/snippetText")
        .or_else(|| renderer.get("descriptionSnippet"))
        .and_then(text);

    let duration = renderer
        .get("lengthText")
        .and_then(text)
        .map(|length| match parse_clock_duration(&length) {
            Some(seconds) => NumericText::Number(seconds),
            None => NumericText::Text(length),
        });

    let badge_styles: Vec<&str> = renderer
        .get("badges")
        .and_then(Value::as_array)
        .map(|badges| {
            badges
                .iter()
                .filter_map(|b| b.pointer("/metadataBadgeRenderer/style").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    VideoNode {
        id: str_at(renderer, "/videoId"),
        title: renderer.get("title").and_then(text),
        author,
        description,
        view_count: renderer
            .get("viewCountText")
            .and_then(text)
            .map(NumericText::Text),
        duration,
        published: renderer.get("publishedTimeText").and_then(text),
        is_live: Some(badge_styles.contains(&"BADGE_STYLE_TYPE_LIVE_NOW")),
        is_upcoming: Some(renderer.get("upcomingEventData").is_some()),
        ..VideoNode::of_kind(VideoNodeKind::Video)
    }
}

fn parse_partial_node(kind: VideoNodeKind, renderer: &Value) -> VideoNode {
    VideoNode {
        id: str_at(renderer, "/videoId")
            .or_else(|| str_at(renderer, "/navigationEndpoint/watchEndpoint/videoId"))
            .or_else(|| str_at(renderer, "/onTap/innertubeCommand/reelWatchEndpoint/videoId")),
        title: renderer
            .get("title")
            .or_else(|| renderer.get("headline"))
            .and_then(text),
        ..VideoNode::of_kind(kind)
    }
}

/// Token that loads the comment section of a watch page.
pub fn find_comment_section_token(watch: &Value) -> Option<String> {
    let is_comments = |section: &Value| {
        section.get("sectionIdentifier").and_then(Value::as_str) == Some(COMMENT_SECTION_ID)
    };
    let section = find_object(watch, "itemSectionRenderer", &is_comments)?;
    section
        .get("contents")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("continuationItemRenderer"))
        .find_map(continuation_token)
}

/// Token of the "newest first" entry of the comment sort menu.
pub fn find_newest_sort_token(response: &Value) -> Option<String> {
    let menu = find_object(response, "sortFilterSubMenuRenderer", &|_: &Value| true)?;
    str_at(menu, "/subMenuItems/1/serviceEndpoint/continuationCommand/token")
}

pub fn parse_comment_page(response: &Value) -> CommentPage {
    let entities = entity_payloads(response);
    let mut page = CommentPage::default();

    let endpoints = response
        .get("onResponseReceivedEndpoints")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let items = endpoints.iter().filter_map(|endpoint| {
        endpoint
            .pointer("/reloadContinuationItemsCommand/continuationItems")
            .or_else(|| endpoint.pointer("/appendContinuationItemsAction/continuationItems"))
            .and_then(Value::as_array)
    });

    for item in items.flatten() {
        if let Some(thread) = item.get("commentThreadRenderer") {
            let node = match (
                thread.pointer("/comment/commentRenderer"),
                thread.pointer("/commentViewModel/commentViewModel"),
            ) {
                (Some(renderer), _) => Some(parse_comment_renderer(renderer)),
                (None, Some(view_model)) => parse_comment_view_model(view_model, &entities),
                (None, None) => None,
            };
            page.comments.extend(node);
        } else if let Some(token) = item.get("continuationItemRenderer").and_then(continuation_token)
        {
            page.continuation = Some(Continuation::comments(token));
        }
    }

    page
}

fn parse_comment_renderer(renderer: &Value) -> CommentNode {
    CommentNode {
        author_name: renderer.get("authorText").and_then(text),
        content: renderer.get("contentText").and_then(text),
        comment_id: str_at(renderer, "/commentId"),
        published_time: renderer.get("publishedTimeText").and_then(text),
        like_count: renderer.get("voteCount").and_then(text),
        reply_count: renderer
            .get("replyCount")
            .and_then(Value::as_u64)
            .map(|n| n.to_string()),
        is_liked: renderer.get("isLiked").and_then(Value::as_bool),
        is_hearted: renderer
            .pointer("/actionButtons/commentActionButtonsRenderer/creatorHeart/creatorHeartRenderer/isHearted")
            .and_then(Value::as_bool),
    }
}

/// Entity payloads of `frameworkUpdates`, keyed by entity key.
fn entity_payloads(response: &Value) -> HashMap<&str, &Value> {
    let mutations = response
        .pointer("/frameworkUpdates/entityBatchUpdate/mutations")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    mutations
        .iter()
        .filter_map(|mutation| {
            let key = mutation.get("entityKey")?.as_str()?;
            let payload = mutation.get("payload")?;
            Some((key, payload))
        })
        .collect()
}

fn parse_comment_view_model(view_model: &Value, entities: &HashMap<&str, &Value>) -> Option<CommentNode> {
    let lookup = |key: &str, payload: &str| {
        view_model
            .get(key)
            .and_then(Value::as_str)
            .and_then(|entity_key| entities.get(entity_key))
            .and_then(|entity| entity.get(payload))
    };
    let comment = lookup("commentKey", "commentEntityPayload")?;
    let toolbar_state = lookup("toolbarStateKey", "engagementToolbarStateEntityPayload");

    let non_empty = |pointer: &str| str_at(comment, pointer).filter(|v| !v.is_empty());
    Some(CommentNode {
        author_name: str_at(comment, "/author/displayName"),
        content: str_at(comment, "/properties/content/content"),
        comment_id: str_at(comment, "/properties/commentId")
            .or_else(|| str_at(view_model, "/commentId")),
        published_time: str_at(comment, "/properties/publishedTime"),
        like_count: non_empty("/toolbar/likeCountNotliked"),
        reply_count: non_empty("/toolbar/replyCount"),
        is_liked: toolbar_state
            .and_then(|state| state.get("likeState"))
            .and_then(Value::as_str)
            .map(|state| state == "TOOLBAR_LIKE_STATE_LIKED"),
        is_hearted: toolbar_state
            .and_then(|state| state.get("heartState"))
            .and_then(Value::as_str)
            .map(|state| state == "TOOLBAR_HEART_STATE_HEARTED"),
    })
}
