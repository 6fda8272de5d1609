use chrono::DateTime;
use ng_core::{Error, Result};
use serde_json::Value;
use tracing::{debug, warn};

pub const JSON_LD_SELECTOR: &str = "script[type='application/ld+json']";

/// Fields read from a page's JSON-LD block. Missing or unusable values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredMetadata {
    /// Publication date as `YYYY-MM-DD`.
    pub date_published: Option<String>,
    pub main_entity_of_page: Option<String>,
}

impl StructuredMetadata {
    /// Fill fields that are still empty from `other`.
    pub fn merge(&mut self, other: StructuredMetadata) {
        if self.date_published.is_none() {
            self.date_published = other.date_published;
        }
        if self.main_entity_of_page.is_none() {
            self.main_entity_of_page = other.main_entity_of_page;
        }
    }
}

/// Reformats an RFC 3339 timestamp as a calendar date in its own offset.
///
/// Date and time must be joined by an uppercase `T`; the space and
/// lowercase `t` forms chrono also accepts are rejected.
pub fn publication_date(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.as_bytes().get(10) != Some(&b'T') {
        return Err(Error::Scraping(format!(
            "Invalid datePublished {:?}: expected a 'T' between date and time",
            raw
        )));
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .map_err(|e| Error::Scraping(format!("Invalid datePublished {:?}: {}", raw, e)))
}

/// Parses the text of one JSON-LD script.
///
/// Only malformed JSON is an error. A missing key or an unparseable date
/// leaves the field empty and is logged.
pub fn parse_structured_block(text: &str) -> Result<StructuredMetadata> {
    let json: Value = serde_json::from_str(text.trim())?;
    let candidates = nodes(&json);

    let date_published = match find_string(&candidates, "datePublished") {
        Some(raw) => match publication_date(raw) {
            Ok(date) => Some(date),
            Err(e) => {
                warn!(error = %e, "Error parsing publication date");
                None
            }
        },
        None => {
            debug!("No datePublished in structured data");
            None
        }
    };

    let main_entity_of_page = candidates.iter().find_map(|node| match node.get("mainEntityOfPage") {
        Some(Value::String(url)) => Some(url.clone()),
        Some(Value::Object(obj)) => obj.get("@id").and_then(|id| id.as_str()).map(str::to_string),
        _ => None,
    });

    Ok(StructuredMetadata {
        date_published,
        main_entity_of_page,
    })
}

/// Objects worth inspecting: the top-level object, the elements of a
/// top-level array, and anything under `@graph`.
fn nodes(json: &Value) -> Vec<&Value> {
    let mut found = Vec::new();
    match json {
        Value::Array(items) => {
            for item in items {
                found.extend(nodes(item));
            }
        }
        Value::Object(obj) => {
            found.push(json);
            if let Some(Value::Array(graph)) = obj.get("@graph") {
                found.extend(graph.iter().filter(|v| v.is_object()));
            }
        }
        _ => {}
    }
    found
}

fn find_string<'a>(nodes: &[&'a Value], key: &str) -> Option<&'a str> {
    nodes.iter().find_map(|node| node.get(key).and_then(|v| v.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publication_date() {
        assert_eq!(publication_date("2024-05-01T10:00:00Z").unwrap(), "2024-05-01");
        // the date is taken in the timestamp's own offset
        assert_eq!(publication_date("2024-05-01T23:30:00-05:00").unwrap(), "2024-05-01");
        assert!(publication_date("May 1st, 2024").is_err());
        assert!(publication_date("2024-05-01").is_err());
    }

    #[test]
    fn test_publication_date_requires_t_separator() {
        assert!(publication_date("2024-05-01 10:00:00Z").is_err());
        assert!(publication_date("2024-05-01t10:00:00Z").is_err());
        assert_eq!(publication_date(" 2024-05-01T10:00:00.123+01:00 ").unwrap(), "2024-05-01");

        let metadata = parse_structured_block(r#"{"datePublished": "2024-05-01 10:00:00Z"}"#).unwrap();
        assert_eq!(metadata.date_published, None);
    }

    #[test]
    fn test_parse_structured_block() {
        let metadata = parse_structured_block(
            r#"{
                "@type": "NewsArticle",
                "datePublished": "2024-05-01T10:00:00Z",
                "mainEntityOfPage": "https://www.example.com/news/articles/123"
            }"#,
        )
        .unwrap();
        assert_eq!(metadata.date_published.as_deref(), Some("2024-05-01"));
        assert_eq!(
            metadata.main_entity_of_page.as_deref(),
            Some("https://www.example.com/news/articles/123")
        );
    }

    #[test]
    fn test_unparseable_date_is_left_empty() {
        let metadata = parse_structured_block(
            r#"{"datePublished": "last tuesday", "mainEntityOfPage": "https://example.com/a"}"#,
        )
        .unwrap();
        assert_eq!(metadata.date_published, None);
        assert_eq!(metadata.main_entity_of_page.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn test_missing_keys_and_wrong_types() {
        let metadata = parse_structured_block(r#"{"@type": "WebPage", "datePublished": 20240501}"#)
            .unwrap();
        assert_eq!(metadata, StructuredMetadata::default());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_structured_block("{\"datePublished\": "),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_graph_and_object_entity() {
        let metadata = parse_structured_block(
            r#"{
                "@context": "https://schema.org",
                "@graph": [
                    {"@type": "Organization", "name": "Example News"},
                    {
                        "@type": "NewsArticle",
                        "datePublished": "2024-05-01T10:00:00+02:00",
                        "mainEntityOfPage": {"@type": "WebPage", "@id": "https://example.com/news/articles/9"}
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(metadata.date_published.as_deref(), Some("2024-05-01"));
        assert_eq!(
            metadata.main_entity_of_page.as_deref(),
            Some("https://example.com/news/articles/9")
        );

        let metadata = parse_structured_block(
            r#"[{"@type": "BreadcrumbList"}, {"datePublished": "2023-12-31T23:59:59Z"}]"#,
        )
        .unwrap();
        assert_eq!(metadata.date_published.as_deref(), Some("2023-12-31"));
    }

    #[test]
    fn test_merge_keeps_first_values() {
        let mut metadata = StructuredMetadata {
            date_published: Some("2024-05-01".to_string()),
            main_entity_of_page: None,
        };
        metadata.merge(StructuredMetadata {
            date_published: Some("1999-01-01".to_string()),
            main_entity_of_page: Some("https://example.com/x".to_string()),
        });
        assert_eq!(metadata.date_published.as_deref(), Some("2024-05-01"));
        assert_eq!(metadata.main_entity_of_page.as_deref(), Some("https://example.com/x"));
    }
}
