use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = content_type_for(&name).to_string();
        Self {
            name,
            bytes,
            content_type,
        }
    }
}

/// Object key `{user_id}/{millis}_{name}`. Only the last path segment of
/// `name` is kept.
pub fn object_path(user_id: Uuid, name: &str, now: DateTime<Utc>) -> String {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    format!("{}/{}_{}", user_id, now.timestamp_millis(), file_name)
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_prefixes_owner_and_time() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let path = object_path(Uuid::nil(), "/home/ana/Student ID.png", now);
        assert_eq!(path, "00000000-0000-0000-0000-000000000000/1700000000123_Student ID.png");
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(Attachment::new("card.JPG", vec![]).content_type, "image/jpeg");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }
}
