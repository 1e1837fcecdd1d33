use crate::models::CommentRecord;
use crate::services::metadata::MetadataField;
use serde_json::Value;
use std::borrow::Cow;

/// Quotes `value` only when it holds a comma, a double quote or a line break; inner quotes
/// are doubled. Everything else is written as is.
pub fn escape_csv(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn render(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    }
}

/// Header line of column names, then one line per record in the same column order. Every
/// line ends with `\n`.
pub fn to_csv(records: &[CommentRecord], columns: &[MetadataField]) -> String {
    let header: Vec<&str> = columns.iter().map(MetadataField::as_str).collect();
    let mut csv = header.join(",");
    csv.push('\n');

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|field| escape_csv(&render(field.value_of(record))).into_owned())
            .collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    csv
}
