//! Core data models used throughout page-dump.
//!
//! [`RawRecord`] is the shape of a record as the query provider returns it.
//! [`Vertex`] is the normalized output unit written into the archive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::NormalizeError;

/// Media type of every text-bearing vertex.
pub const MEDIA_TYPE_TEXT: &str = "text/plain";
/// Fallback media type for binary content of unknown kind.
pub const MEDIA_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Reference to another record by its internal numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: i64,
}

/// Raw record as retrieved from the source, before normalization.
///
/// `title` is present on pages, `string` on blocks. `order` is kept as a
/// raw JSON value so the children sort can reject non-integer orders
/// instead of failing at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub uid: String,
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<IdRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<Vec<IdRef>>,
    /// Every other field, carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawRecord {
    /// Keep only the fields named in `include`, dropping null values.
    ///
    /// `uid` and `id` are structural and always kept.
    pub fn pick(self, include: &[String]) -> RawRecord {
        let keep = |name: &str| include.iter().any(|p| p == name);
        RawRecord {
            uid: self.uid,
            id: self.id,
            title: self.title.filter(|_| keep("title")),
            string: self.string.filter(|_| keep("string")),
            order: self.order.filter(|v| keep("order") && !v.is_null()),
            heading: self.heading.filter(|v| keep("heading") && !v.is_null()),
            children: self.children.filter(|_| keep("children")),
            refs: self.refs.filter(|_| keep("refs")),
            extra: self
                .extra
                .into_iter()
                .filter(|(k, v)| keep(k) && !v.is_null())
                .collect(),
        }
    }
}

/// Type of a vertex in the output graph. Every vertex has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexType {
    /// 1-1 with a page record.
    #[serde(rename = "roam/page")]
    Page,
    /// 1-1 with a block record without a heading.
    #[serde(rename = "roam/block-content")]
    BlockContent,
    /// 1-1 with a block record carrying a heading level.
    #[serde(rename = "roam/block-heading")]
    BlockHeading,
    /// A file uploaded to the host store and referenced from block text.
    #[serde(rename = "roam/file")]
    ExternalFile,
}

impl VertexType {
    pub const ALL: [VertexType; 4] = [
        VertexType::Page,
        VertexType::BlockContent,
        VertexType::BlockHeading,
        VertexType::ExternalFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VertexType::Page => "roam/page",
            VertexType::BlockContent => "roam/block-content",
            VertexType::BlockHeading => "roam/block-heading",
            VertexType::ExternalFile => "roam/file",
        }
    }

    /// True for block vertices (content or heading).
    pub fn is_block(&self) -> bool {
        matches!(self, VertexType::BlockContent | VertexType::BlockHeading)
    }
}

impl fmt::Display for VertexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VertexType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VertexType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unrecognized vertex type: '{}'", s))
    }
}

/// How far the host query follows `children` or `refs` links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FollowLinksDirective {
    /// No traversal at all.
    DontFollow,
    /// One hop.
    Shallow,
    /// Transitive closure.
    Deep,
}

impl FollowLinksDirective {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowLinksDirective::DontFollow => "none",
            FollowLinksDirective::Shallow => "shallow",
            FollowLinksDirective::Deep => "deep",
        }
    }
}

impl fmt::Display for FollowLinksDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FollowLinksDirective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "dont-follow" | "dont_follow" => Ok(FollowLinksDirective::DontFollow),
            "shallow" => Ok(FollowLinksDirective::Shallow),
            "deep" => Ok(FollowLinksDirective::Deep),
            other => Err(format!(
                "unknown follow directive: '{}'. Must be none, shallow, or deep.",
                other
            )),
        }
    }
}

impl TryFrom<String> for FollowLinksDirective {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FollowLinksDirective> for String {
    fn from(value: FollowLinksDirective) -> Self {
        value.as_str().to_string()
    }
}

/// Property synthesized after normalization, with no direct source field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntheticProperty {
    VertexType,
    MediaType,
}

impl SyntheticProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntheticProperty::VertexType => "vertex-type",
            SyntheticProperty::MediaType => "media-type",
        }
    }

    /// Parse an ordered list of names, failing on the first unknown one.
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>, NormalizeError> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl FromStr for SyntheticProperty {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vertex-type" => Ok(SyntheticProperty::VertexType),
            "media-type" => Ok(SyntheticProperty::MediaType),
            other => Err(NormalizeError::UnrecognizedProperty(other.to_string())),
        }
    }
}

/// One normalized node of the output graph, keyed by `uid`.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub uid: String,
    pub vertex_type: VertexType,
    pub text: Option<String>,
    pub children: Option<Vec<String>>,
    pub refs: Option<Vec<String>>,
    /// Original URL of an external file.
    pub source: Option<String>,
    pub file_name: Option<String>,
    pub media_type: Option<String>,
    /// Pass-through fields such as `heading`.
    pub extra: Map<String, Value>,
}

impl Vertex {
    /// A text vertex with no fields beyond its identity and media type.
    pub fn text(uid: impl Into<String>, vertex_type: VertexType) -> Self {
        Self {
            uid: uid.into(),
            vertex_type,
            text: None,
            children: None,
            refs: None,
            source: None,
            file_name: None,
            media_type: Some(MEDIA_TYPE_TEXT.to_string()),
            extra: Map::new(),
        }
    }

    /// An unresolved external file vertex.
    pub fn external_file(uid: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            vertex_type: VertexType::ExternalFile,
            text: None,
            children: None,
            refs: None,
            source: Some(source.into()),
            file_name: None,
            media_type: None,
            extra: Map::new(),
        }
    }

    /// Enriched copy of a file vertex once its content has been fetched.
    pub fn resolved(&self, file_name: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            media_type: Some(media_type.into()),
            ..self.clone()
        }
    }

    /// Serialize to the archive JSON shape, attaching `properties` in order.
    pub fn to_value(&self, properties: &[SyntheticProperty]) -> Result<Value, NormalizeError> {
        let mut map = Map::new();
        map.insert("uid".to_string(), Value::String(self.uid.clone()));
        if let Some(text) = &self.text {
            map.insert("text".to_string(), Value::String(text.clone()));
        }
        if let Some(children) = &self.children {
            map.insert("children".to_string(), string_array(children));
        }
        if let Some(refs) = &self.refs {
            map.insert("refs".to_string(), string_array(refs));
        }
        if let Some(source) = &self.source {
            map.insert("source".to_string(), Value::String(source.clone()));
        }
        if let Some(file_name) = &self.file_name {
            map.insert("file-name".to_string(), Value::String(file_name.clone()));
        }
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        for property in properties {
            let value = match property {
                SyntheticProperty::VertexType => self.vertex_type.as_str().to_string(),
                SyntheticProperty::MediaType => self
                    .media_type
                    .clone()
                    .ok_or_else(|| NormalizeError::UnresolvedMediaType {
                        uid: self.uid.clone(),
                    })?,
            };
            map.insert(property.as_str().to_string(), Value::String(value));
        }
        Ok(Value::Object(map))
    }

    /// Parse a vertex back from the archive JSON shape.
    ///
    /// Requires `uid` and `vertex-type`; everything else is optional.
    pub fn from_value(value: &Value) -> Result<Self, NormalizeError> {
        let malformed = |message: String| NormalizeError::MalformedVertex(message);
        let obj = value
            .as_object()
            .ok_or_else(|| malformed(format!("not an object: {}", value)))?;
        let uid = obj
            .get("uid")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(format!("missing uid: {}", value)))?;
        let vertex_type: VertexType = obj
            .get("vertex-type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                malformed(format!(
                    "vertex {}: missing vertex-type; write the dump with \"vertex-type\" in dump.add_properties",
                    uid
                ))
            })?
            .parse()
            .map_err(malformed)?;

        let string_field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        let list_field = |key: &str| -> Result<Option<Vec<String>>, NormalizeError> {
            match obj.get(key) {
                None => Ok(None),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|i| {
                        i.as_str().map(str::to_string).ok_or_else(|| {
                            malformed(format!("vertex {}: {} holds a non-string", uid, key))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Some),
                Some(other) => Err(malformed(format!(
                    "vertex {}: {} is not a list: {}",
                    uid, key, other
                ))),
            }
        };

        const KNOWN: [&str; 8] = [
            "uid",
            "vertex-type",
            "media-type",
            "text",
            "children",
            "refs",
            "source",
            "file-name",
        ];

        Ok(Vertex {
            uid: uid.to_string(),
            vertex_type,
            text: string_field("text"),
            children: list_field("children")?,
            refs: list_field("refs")?,
            source: string_field("source"),
            file_name: string_field("file-name"),
            media_type: string_field("media-type"),
            extra: obj
                .iter()
                .filter(|(k, _)| !KNOWN.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

fn string_array(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

/// Guess a media type from a file name's extension.
pub fn guess_media_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "md" => "text/markdown",
        "txt" => "text/plain",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => MEDIA_TYPE_OCTET_STREAM,
    }
}
