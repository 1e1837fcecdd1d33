use crate::models::{CommentRecord, VideoMetadata};
use crate::services::platform::{CommentNode, Keywords, NumericText, VideoNode, VideoNodeKind};
use crate::utils::parse_digits;

/// How author names are read off comment nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorStyle {
    /// Names carry a leading marker ("@handle"); the first character is dropped.
    Handle,
    Raw,
}

/// Shorts, reels, playlist-panel and watch-card entries lack the fields a video row needs.
pub fn is_valid_video_node(node: &VideoNode) -> bool {
    if node.kind != VideoNodeKind::Video {
        return false;
    }

    let present = |value: Option<&str>| value.is_some_and(|v| !v.is_empty());
    present(node.id.as_deref())
        && present(node.title.as_deref())
        && present(node.author.as_ref().map(|a| a.name.as_str()))
}

fn normalize_count(value: &NumericText) -> u64 {
    match value {
        NumericText::Number(n) => *n,
        NumericText::Text(text) => parse_digits(text),
    }
}

pub fn extract_video_metadata(node: &VideoNode) -> Option<VideoMetadata> {
    if !is_valid_video_node(node) {
        return None;
    }
    let author = node.author.as_ref()?;

    Some(VideoMetadata {
        id: node.id.clone()?,
        title: node.title.clone()?,
        channel: author.name.clone(),
        channel_id: author.id.clone().filter(|id| !id.is_empty()),
        description: node.description.clone().filter(|d| !d.is_empty()),
        view_count: node.view_count.as_ref().map(normalize_count),
        duration: node.duration.as_ref().map(normalize_count),
        upload_date: node.published.clone().filter(|p| !p.is_empty()),
        is_live: node.is_live,
        is_upcoming: node.is_upcoming,
        keywords: node.keywords.as_ref().and_then(|keywords| match keywords {
            Keywords::List(list) if list.is_empty() => None,
            Keywords::List(list) => Some(list.join(", ")),
            Keywords::Text(text) if text.is_empty() => None,
            Keywords::Text(text) => Some(text.clone()),
        }),
    })
}

/// `None` when the author name or text is missing or empty once unwrapped. Such comments
/// are skipped without counting.
pub fn extract_comment(
    node: &CommentNode,
    video: &VideoMetadata,
    style: AuthorStyle,
) -> Option<CommentRecord> {
    let author = node.author_name.as_deref().map(|name| match style {
        AuthorStyle::Handle => name.chars().skip(1).collect::<String>(),
        AuthorStyle::Raw => name.to_string(),
    })?;
    let comment = node.content.clone()?;
    if author.is_empty() || comment.is_empty() {
        return None;
    }

    let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

    Some(CommentRecord {
        video: video.clone(),
        author,
        comment,
        label: 0,
        comment_id: non_empty(&node.comment_id),
        published_time: non_empty(&node.published_time),
        like_count: non_empty(&node.like_count),
        reply_count: non_empty(&node.reply_count),
        is_liked: node.is_liked,
        is_hearted: node.is_hearted,
    })
}
