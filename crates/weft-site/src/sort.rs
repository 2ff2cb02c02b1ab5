//! Child ordering directives.
//!
//! A directory configuration may order its children with `sort` (both
//! directories and files), or separately with `sort_dirs` and `sort_files`.
//! A key is a field name, optionally prefixed with `-` to reverse:
//!
//! ```yaml
//! sort: -idea_date
//! sort_dirs: { key: name, reverse: true }
//! ```

use std::cmp::Ordering;
use std::path::Path;

use serde_json::Value;
use weft_renderer::Frame;

use crate::error::ConfigurationError;

/// Field children are ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    LinkName,
    Modified,
    IdeaDate,
}

impl SortField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "link_name" => Some(Self::LinkName),
            "modified" => Some(Self::Modified),
            "idea_date" => Some(Self::IdeaDate),
            _ => None,
        }
    }
}

/// A sort field and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub reverse: bool,
}

impl SortKey {
    /// Parse `"field"`, `"-field"` or `{ key: field, reverse: bool }`.
    pub fn parse(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => {
                let (name, reverse) = match s.strip_prefix('-') {
                    Some(rest) => (rest, true),
                    None => (s.as_str(), false),
                };
                let field = SortField::parse(name).ok_or_else(|| format!("unknown sort key '{name}'"))?;
                Ok(Self { field, reverse })
            }
            Value::Object(map) => {
                let name = map
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "missing string 'key'".to_owned())?;
                let field = SortField::parse(name).ok_or_else(|| format!("unknown sort key '{name}'"))?;
                let reverse = match map.get("reverse") {
                    None => false,
                    Some(Value::Bool(b)) => *b,
                    Some(_) => return Err("'reverse' must be a boolean".to_owned()),
                };
                Ok(Self { field, reverse })
            }
            _ => Err("expected a key name or { key, reverse }".to_owned()),
        }
    }

    /// Apply the direction to an ascending comparison.
    #[must_use]
    pub fn direct(&self, ordering: Ordering) -> Ordering {
        if self.reverse { ordering.reverse() } else { ordering }
    }
}

/// Effective ordering for a directory's children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub dirs: Option<SortKey>,
    pub files: Option<SortKey>,
}

impl SortSpec {
    /// Read sort directives from a frame.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSort`] for malformed values.
    pub fn from_frame(frame: &Frame, origin: &Path) -> Result<Self, ConfigurationError> {
        let key = |name: &str| -> Result<Option<SortKey>, ConfigurationError> {
            frame
                .get(name)
                .map(|value| {
                    SortKey::parse(value).map_err(|message| ConfigurationError::InvalidSort {
                        path: origin.to_path_buf(),
                        key: name.to_owned(),
                        message,
                    })
                })
                .transpose()
        };
        let both = key("sort")?;
        Ok(Self {
            dirs: key("sort_dirs")?.or(both),
            files: key("sort_files")?.or(both),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_and_reversed() {
        assert_eq!(
            SortKey::parse(&json!("name")),
            Ok(SortKey {
                field: SortField::Name,
                reverse: false
            })
        );
        assert_eq!(
            SortKey::parse(&json!("-idea_date")),
            Ok(SortKey {
                field: SortField::IdeaDate,
                reverse: true
            })
        );
    }

    #[test]
    fn test_parse_object() {
        assert_eq!(
            SortKey::parse(&json!({"key": "modified", "reverse": true})),
            Ok(SortKey {
                field: SortField::Modified,
                reverse: true
            })
        );
        assert!(SortKey::parse(&json!({"key": "modified", "reverse": "yes"})).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(SortKey::parse(&json!("size")).is_err());
        assert!(SortKey::parse(&json!(3)).is_err());
    }

    #[test]
    fn test_specific_keys_override_sort() {
        let mut frame = Frame::new();
        frame.insert("sort", "name");
        frame.insert("sort_files", "-idea_date");
        let spec = SortSpec::from_frame(&frame, Path::new("_config.yaml")).unwrap();
        assert_eq!(spec.dirs.map(|k| k.field), Some(SortField::Name));
        assert_eq!(
            spec.files,
            Some(SortKey {
                field: SortField::IdeaDate,
                reverse: true
            })
        );
    }

    #[test]
    fn test_no_directives_keeps_crawl_order() {
        let spec = SortSpec::from_frame(&Frame::new(), Path::new("_config.yaml")).unwrap();
        assert_eq!(spec, SortSpec::default());
    }

    #[test]
    fn test_invalid_value_names_key() {
        let mut frame = Frame::new();
        frame.insert("sort_dirs", json!(["name"]));
        let err = SortSpec::from_frame(&frame, Path::new("blog/_config.yaml")).unwrap_err();
        assert!(err.to_string().contains("sort_dirs"));
    }

    #[test]
    fn test_direct_reverses() {
        let key = SortKey {
            field: SortField::Name,
            reverse: true,
        };
        assert_eq!(key.direct(Ordering::Less), Ordering::Greater);
    }
}
