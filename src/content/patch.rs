//! Allow-listed field sets for create payloads and update patches.

use rusqlite::types::Value;
use serde_json::{Map, Value as JsonValue};

use super::NodeKind;
use crate::error::{ContentError, ContentResult};

#[derive(Clone, Copy, Debug)]
enum FieldType {
    /// Non-empty string, never null.
    Title,
    /// String or null; blank strings are stored as NULL.
    OptText,
    /// Non-negative number or null.
    Price,
    Flag,
}

#[derive(Clone, Copy, Debug)]
struct FieldSpec {
    key: &'static str,
    column: &'static str,
    ty: FieldType,
}

const fn field(key: &'static str, column: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { key, column, ty }
}

const COURSE_FIELDS: &[FieldSpec] = &[
    field("title", "title", FieldType::Title),
    field("description", "description", FieldType::OptText),
    field("imageUrl", "image_url", FieldType::OptText),
    field("price", "price", FieldType::Price),
    field("categoryId", "category_id", FieldType::OptText),
];

const CHAPTER_FIELDS: &[FieldSpec] = &[
    field("title", "title", FieldType::Title),
    field("description", "description", FieldType::OptText),
    field("videoUrl", "video_url", FieldType::OptText),
    field("isFree", "is_free", FieldType::Flag),
];

const SECTION_FIELDS: &[FieldSpec] = &[
    field("title", "title", FieldType::Title),
    field("description", "description", FieldType::OptText),
    field("videoUrl", "video_url", FieldType::OptText),
];

const ITEM_FIELDS: &[FieldSpec] = &[
    field("title", "title", FieldType::Title),
    field("content", "content", FieldType::OptText),
    field("url", "url", FieldType::OptText),
    field("language", "language", FieldType::OptText),
];

const POST_FIELDS: &[FieldSpec] = &[
    field("title", "title", FieldType::Title),
    field("description", "description", FieldType::OptText),
    field("imageUrl", "image_url", FieldType::OptText),
    field("categoryId", "category_id", FieldType::OptText),
];

const POST_CHAPTER_FIELDS: &[FieldSpec] = &[
    field("title", "title", FieldType::Title),
    field("description", "description", FieldType::OptText),
    field("isFree", "is_free", FieldType::Flag),
];

fn fields_for(kind: NodeKind) -> &'static [FieldSpec] {
    match kind {
        NodeKind::Course => COURSE_FIELDS,
        NodeKind::Chapter => CHAPTER_FIELDS,
        NodeKind::Section => SECTION_FIELDS,
        NodeKind::Item => ITEM_FIELDS,
        NodeKind::Post => POST_FIELDS,
        NodeKind::PostChapter => POST_CHAPTER_FIELDS,
    }
}

/// Column assignments parsed from a JSON object, in input order.
#[derive(Debug, Default)]
pub struct Assignments {
    pub columns: Vec<&'static str>,
    pub values: Vec<Value>,
}

impl Assignments {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Text value assigned to `column`, if any.
    pub fn text(&self, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| *c == column)?;
        match &self.values[idx] {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Validates `input` against the allow-list of `kind`.
///
/// `skip` lists keys consumed by the caller (e.g. the item `kind` on create).
pub fn parse_assignments(
    kind: NodeKind,
    input: &Map<String, JsonValue>,
    skip: &[&str],
) -> ContentResult<Assignments> {
    let specs = fields_for(kind);
    let mut out = Assignments::default();
    let mut reasons = Vec::new();

    for (k, v) in input {
        if skip.contains(&k.as_str()) {
            continue;
        }
        let Some(spec) = specs.iter().find(|s| s.key == k.as_str()) else {
            reasons.push(match k.as_str() {
                "isPublished" => "not_patchable:isPublished".to_string(),
                "position" => "not_patchable:position".to_string(),
                _ => format!("unknown_field:{}", k),
            });
            continue;
        };
        match parse_value(spec.ty, v) {
            Ok(value) => {
                out.columns.push(spec.column);
                out.values.push(value);
            }
            Err(m) => reasons.push(format!("invalid_field:{}:{}", k, m)),
        }
    }

    if !reasons.is_empty() {
        return Err(ContentError::invalid_with(
            format!("invalid {} fields", kind.label()),
            reasons,
        ));
    }
    Ok(out)
}

fn parse_value(ty: FieldType, v: &JsonValue) -> Result<Value, &'static str> {
    match ty {
        FieldType::Title => {
            let s = v.as_str().ok_or("must be string")?.trim();
            if s.is_empty() {
                return Err("must not be empty");
            }
            Ok(Value::Text(s.to_string()))
        }
        FieldType::OptText => {
            if v.is_null() {
                return Ok(Value::Null);
            }
            let s = v.as_str().ok_or("must be string or null")?.trim();
            if s.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Text(s.to_string()))
            }
        }
        FieldType::Price => {
            if v.is_null() {
                return Ok(Value::Null);
            }
            let n = v.as_f64().ok_or("must be number or null")?;
            if !n.is_finite() || n < 0.0 {
                return Err("must be >= 0");
            }
            Ok(Value::Real(n))
        }
        FieldType::Flag => v
            .as_bool()
            .map(|b| Value::Integer(i64::from(b)))
            .ok_or("must be boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: JsonValue) -> Map<String, JsonValue> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn section_patch_accepts_allowed_fields() {
        let a = parse_assignments(
            NodeKind::Section,
            &obj(json!({ "title": "  Intro ", "videoUrl": "", "description": "d" })),
            &[],
        )
        .expect("valid patch");
        assert_eq!(a.text("title"), Some("Intro"));
        assert!(a.columns.contains(&"video_url"));
        assert!(a.text("video_url").is_none());
        assert_eq!(a.text("description"), Some("d"));
    }

    #[test]
    fn unknown_and_protected_fields_are_rejected_together() {
        let e = parse_assignments(
            NodeKind::Chapter,
            &obj(json!({ "isPublished": true, "position": 3, "courseId": "x", "title": "" })),
            &[],
        )
        .expect_err("rejected");
        match e {
            ContentError::Validation { reasons, .. } => {
                assert!(reasons.contains(&"not_patchable:isPublished".to_string()));
                assert!(reasons.contains(&"not_patchable:position".to_string()));
                assert!(reasons.contains(&"unknown_field:courseId".to_string()));
                assert!(reasons.iter().any(|r| r.starts_with("invalid_field:title")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn price_must_be_non_negative() {
        assert!(parse_assignments(NodeKind::Course, &obj(json!({ "price": -1 })), &[]).is_err());
        let a = parse_assignments(NodeKind::Course, &obj(json!({ "price": 19.5 })), &[])
            .expect("price");
        assert!(a.columns.contains(&"price"));
    }

    #[test]
    fn skipped_keys_are_left_for_the_caller() {
        let a = parse_assignments(
            NodeKind::Item,
            &obj(json!({ "kind": "video", "title": "Clip" })),
            &["kind"],
        )
        .expect("item payload");
        assert_eq!(a.columns, vec!["title"]);
    }
}
