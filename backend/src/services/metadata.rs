use crate::models::CommentRecord;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Columns a caller can pick for display and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Id,
    Title,
    Channel,
    ChannelId,
    Description,
    ViewCount,
    Duration,
    UploadDate,
    IsLive,
    IsUpcoming,
    Keywords,
    Author,
    Comment,
    PublishedTime,
    LikeCount,
    IsLiked,
    IsHearted,
    ReplyCount,
    CommentId,
    Label,
}

pub const DEFAULT_FIELDS: [MetadataField; 5] = [
    MetadataField::Author,
    MetadataField::Comment,
    MetadataField::Id,
    MetadataField::Channel,
    MetadataField::Title,
];

/// What an empty selection falls back to.
pub const FALLBACK_FIELDS: [MetadataField; 2] = [MetadataField::Author, MetadataField::Comment];

impl MetadataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Id => "id",
            MetadataField::Title => "title",
            MetadataField::Channel => "channel",
            MetadataField::ChannelId => "channel_id",
            MetadataField::Description => "description",
            MetadataField::ViewCount => "view_count",
            MetadataField::Duration => "duration",
            MetadataField::UploadDate => "upload_date",
            MetadataField::IsLive => "is_live",
            MetadataField::IsUpcoming => "is_upcoming",
            MetadataField::Keywords => "keywords",
            MetadataField::Author => "author",
            MetadataField::Comment => "comment",
            MetadataField::PublishedTime => "published_time",
            MetadataField::LikeCount => "like_count",
            MetadataField::IsLiked => "is_liked",
            MetadataField::IsHearted => "is_hearted",
            MetadataField::ReplyCount => "reply_count",
            MetadataField::CommentId => "comment_id",
            MetadataField::Label => "label",
        }
    }

    /// The field's value on `record`, `None` when the platform did not provide it.
    pub fn value_of(&self, record: &CommentRecord) -> Option<Value> {
        let video = &record.video;
        match self {
            MetadataField::Id => Some(video.id.clone().into()),
            MetadataField::Title => Some(video.title.clone().into()),
            MetadataField::Channel => Some(video.channel.clone().into()),
            MetadataField::ChannelId => video.channel_id.clone().map(Value::from),
            MetadataField::Description => video.description.clone().map(Value::from),
            MetadataField::ViewCount => video.view_count.map(Value::from),
            MetadataField::Duration => video.duration.map(Value::from),
            MetadataField::UploadDate => video.upload_date.clone().map(Value::from),
            MetadataField::IsLive => video.is_live.map(Value::from),
            MetadataField::IsUpcoming => video.is_upcoming.map(Value::from),
            MetadataField::Keywords => video.keywords.clone().map(Value::from),
            MetadataField::Author => Some(record.author.clone().into()),
            MetadataField::Comment => Some(record.comment.clone().into()),
            MetadataField::PublishedTime => record.published_time.clone().map(Value::from),
            MetadataField::LikeCount => record.like_count.clone().map(Value::from),
            MetadataField::IsLiked => record.is_liked.map(Value::from),
            MetadataField::IsHearted => record.is_hearted.map(Value::from),
            MetadataField::ReplyCount => record.reply_count.clone().map(Value::from),
            MetadataField::CommentId => record.comment_id.clone().map(Value::from),
            MetadataField::Label => Some(record.label.into()),
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s {
            "id" => MetadataField::Id,
            "title" => MetadataField::Title,
            "channel" => MetadataField::Channel,
            "channel_id" => MetadataField::ChannelId,
            "description" => MetadataField::Description,
            "view_count" => MetadataField::ViewCount,
            "duration" => MetadataField::Duration,
            "upload_date" => MetadataField::UploadDate,
            "is_live" => MetadataField::IsLive,
            "is_upcoming" => MetadataField::IsUpcoming,
            "keywords" => MetadataField::Keywords,
            "author" => MetadataField::Author,
            "comment" => MetadataField::Comment,
            "published_time" => MetadataField::PublishedTime,
            "like_count" => MetadataField::LikeCount,
            "is_liked" => MetadataField::IsLiked,
            "is_hearted" => MetadataField::IsHearted,
            "reply_count" => MetadataField::ReplyCount,
            "comment_id" => MetadataField::CommentId,
            "label" => MetadataField::Label,
            other => return Err(other.to_string()),
        };
        Ok(field)
    }
}

/// Field selection plus display order, as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataConfig {
    selected_fields: Vec<MetadataField>,
    column_order: Vec<MetadataField>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FIELDS.to_vec(), DEFAULT_FIELDS.to_vec())
    }
}

impl MetadataConfig {
    /// Duplicates are dropped; an empty selection becomes [`FALLBACK_FIELDS`].
    pub fn new(selected_fields: Vec<MetadataField>, column_order: Vec<MetadataField>) -> Self {
        let mut selected_fields = dedup(selected_fields);
        if selected_fields.is_empty() {
            selected_fields = FALLBACK_FIELDS.to_vec();
        }
        Self {
            selected_fields,
            column_order: dedup(column_order),
        }
    }

    #[cfg(test)]
    pub fn selected_fields(&self) -> &[MetadataField] {
        &self.selected_fields
    }

    /// `column_order` restricted to the selection, then any selected field the order does
    /// not mention, in selection order.
    pub fn columns(&self) -> Vec<MetadataField> {
        let mut columns: Vec<MetadataField> = self
            .column_order
            .iter()
            .copied()
            .filter(|field| self.selected_fields.contains(field))
            .collect();
        for field in &self.selected_fields {
            if !columns.contains(field) {
                columns.push(*field);
            }
        }
        columns
    }

    /// The record reduced to the effective columns, in column order. Absent values are
    /// left out.
    pub fn select(&self, record: &CommentRecord) -> Map<String, Value> {
        self.columns()
            .into_iter()
            .filter_map(|field| {
                field
                    .value_of(record)
                    .map(|value| (field.as_str().to_string(), value))
            })
            .collect()
    }
}

fn dedup(fields: Vec<MetadataField>) -> Vec<MetadataField> {
    let mut seen = Vec::with_capacity(fields.len());
    for field in fields {
        if !seen.contains(&field) {
            seen.push(field);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::MetadataField::*;
    use super::*;
    use crate::models::VideoMetadata;

    fn record() -> CommentRecord {
        CommentRecord {
            video: VideoMetadata {
                id: "abc".into(),
                title: "A title".into(),
                channel: "A channel".into(),
                view_count: Some(42),
                ..VideoMetadata::default()
            },
            author: "someone".into(),
            comment: "nice".into(),
            label: 0,
            comment_id: None,
            published_time: Some("2 days ago".into()),
            like_count: None,
            reply_count: None,
            is_liked: Some(false),
            is_hearted: None,
        }
    }

    #[test]
    fn column_order_is_filtered_to_the_selection() {
        let config = MetadataConfig::new(
            vec![Comment, Author, Title],
            vec![Title, Id, Author, Comment],
        );
        assert_eq!(config.columns(), vec![Title, Author, Comment]);
    }

    #[test]
    fn selected_fields_missing_from_the_order_go_last() {
        let config = MetadataConfig::new(vec![Author, ViewCount, Comment], vec![Comment, Author]);
        assert_eq!(config.columns(), vec![Comment, Author, ViewCount]);
    }

    #[test]
    fn empty_selection_falls_back_to_author_and_comment() {
        let config = MetadataConfig::new(vec![], vec![Title, Comment, Author]);
        assert_eq!(config.selected_fields(), &FALLBACK_FIELDS);
        assert_eq!(config.columns(), vec![Comment, Author]);
    }

    #[test]
    fn selecting_twice_gives_the_same_columns() {
        let config = MetadataConfig::new(vec![Label, Author, Keywords], vec![Keywords, Label]);
        let once = config.columns();
        let twice = MetadataConfig::new(once.clone(), once.clone()).columns();
        assert_eq!(once, twice);
    }

    #[test]
    fn parses_known_field_names_only() {
        assert_eq!("channel_id".parse::<MetadataField>(), Ok(ChannelId));
        assert_eq!("label".parse::<MetadataField>(), Ok(Label));
        assert_eq!(
            "likes".parse::<MetadataField>(),
            Err("likes".to_string())
        );
    }

    #[test]
    fn select_keeps_order_and_drops_absent_values() {
        let config = MetadataConfig::new(
            vec![ViewCount, CommentId, Author, PublishedTime, IsLiked],
            vec![PublishedTime, Author, ViewCount, CommentId, IsLiked],
        );
        let selected = config.select(&record());
        let keys: Vec<&str> = selected.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["published_time", "author", "view_count", "is_liked"]);
        assert_eq!(selected["view_count"], Value::from(42));
        assert_eq!(selected["is_liked"], Value::from(false));
    }
}
