//! Term and query model at the coordinator/engine boundary.
//!
//! The write path only ever constructs or receives a small set of query
//! shapes: match-all, a single term, a numeric range over the version field,
//! and boolean combinations of those. Full query-DSL parsing belongs to the
//! search side; [`parse`] covers exactly the forms delete-by-query traffic
//! carries.

use serde::{Deserialize, Serialize};

use crate::data::{DataValue, Document};
use crate::error::{ArnicaError, Result};

/// A single field/value pair identifying documents exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    pub field: String,
    pub value: String,
}

impl Term {
    /// Create a new term.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Term {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A query over documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    /// Matches every document.
    MatchAll,

    /// Matches documents whose field equals the term value.
    Term(Term),

    /// Matches documents whose integer field falls inside the bounds.
    /// `None` bounds are open.
    Range {
        field: String,
        lower: Option<i64>,
        upper: Option<i64>,
        include_lower: bool,
        include_upper: bool,
    },

    /// Boolean combination: every `must` clause matches and no `must_not`
    /// clause does.
    Boolean {
        must: Vec<Query>,
        must_not: Vec<Query>,
    },
}

impl Query {
    /// Create a term query.
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Term(Term::new(field, value))
    }

    /// Create a range query matching integer values `>= lower`.
    pub fn at_least(field: impl Into<String>, lower: i64) -> Self {
        Query::Range {
            field: field.into(),
            lower: Some(lower),
            upper: None,
            include_lower: true,
            include_upper: true,
        }
    }

    /// Whether this query matches the entire index.
    pub fn is_match_all(&self) -> bool {
        matches!(self, Query::MatchAll)
    }

    /// Evaluate this query against a single document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Term(term) => term_matches(term, doc),
            Query::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
            } => {
                let Some(value) = doc.get(field).and_then(DataValue::as_integer) else {
                    return false;
                };
                let lower_ok = match lower {
                    Some(l) if *include_lower => value >= *l,
                    Some(l) => value > *l,
                    None => true,
                };
                let upper_ok = match upper {
                    Some(u) if *include_upper => value <= *u,
                    Some(u) => value < *u,
                    None => true,
                };
                lower_ok && upper_ok
            }
            Query::Boolean { must, must_not } => {
                must.iter().all(|q| q.matches(doc)) && !must_not.iter().any(|q| q.matches(doc))
            }
        }
    }
}

fn term_matches(term: &Term, doc: &Document) -> bool {
    if term.field == "id" {
        if let Some(id) = &doc.id {
            if *id == term.value {
                return true;
            }
        }
    }
    match doc.get(&term.field) {
        Some(DataValue::String(s)) | Some(DataValue::Text(s)) => *s == term.value,
        Some(DataValue::Int64(i)) => term.value.parse::<i64>() == Ok(*i),
        Some(DataValue::Bool(b)) => term.value.parse::<bool>() == Ok(*b),
        Some(DataValue::List(items)) => items.iter().any(|v| *v == term.value),
        _ => false,
    }
}

/// Parse a delete query string.
///
/// Supported forms: `*:*`, `field:value`, and `field:[X TO Y]` where either
/// bound may be `*`.
pub fn parse(input: &str) -> Result<Query> {
    let input = input.trim();
    if input == "*:*" {
        return Ok(Query::MatchAll);
    }

    let (field, rest) = input
        .split_once(':')
        .ok_or_else(|| ArnicaError::bad_request(format!("cannot parse query: {input:?}")))?;
    if field.is_empty() || rest.is_empty() {
        return Err(ArnicaError::bad_request(format!(
            "cannot parse query: {input:?}"
        )));
    }

    if let Some(range) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let (lower, upper) = range
            .split_once(" TO ")
            .ok_or_else(|| ArnicaError::bad_request(format!("cannot parse range: {rest:?}")))?;
        return Ok(Query::Range {
            field: field.to_string(),
            lower: parse_bound(lower)?,
            upper: parse_bound(upper)?,
            include_lower: true,
            include_upper: true,
        });
    }

    Ok(Query::term(field, rest))
}

fn parse_bound(text: &str) -> Result<Option<i64>> {
    let text = text.trim();
    if text == "*" {
        return Ok(None);
    }
    text.parse::<i64>()
        .map(Some)
        .map_err(|_| ArnicaError::bad_request(format!("cannot parse range bound: {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_match_all() {
        assert_eq!(parse("*:*").unwrap(), Query::MatchAll);
        assert!(parse("*:*").unwrap().is_match_all());
    }

    #[test]
    fn test_parse_term() {
        let q = parse("category:books").unwrap();
        assert_eq!(q, Query::term("category", "books"));
    }

    #[test]
    fn test_parse_range() {
        let q = parse("price:[10 TO 20]").unwrap();
        assert_eq!(
            q,
            Query::Range {
                field: "price".to_string(),
                lower: Some(10),
                upper: Some(20),
                include_lower: true,
                include_upper: true,
            }
        );

        let q = parse("price:[* TO 100]").unwrap();
        assert_eq!(
            q,
            Query::Range {
                field: "price".to_string(),
                lower: None,
                upper: Some(100),
                include_lower: true,
                include_upper: true,
            }
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse("no-colon-here").is_err());
        assert!(parse(":empty-field").is_err());
        assert!(parse("f:[1 UNTIL 2]").is_err());
        assert!(parse("f:[a TO b]").is_err());
    }

    #[test]
    fn test_term_matching() {
        let doc = Document::new_with_id("doc1")
            .add_keyword("category", "books")
            .add_integer("price", 15)
            .add_field("tags", DataValue::List(vec!["new".into(), "sale".into()]));

        assert!(Query::term("category", "books").matches(&doc));
        assert!(!Query::term("category", "games").matches(&doc));
        assert!(Query::term("price", "15").matches(&doc));
        assert!(Query::term("tags", "sale").matches(&doc));
        assert!(Query::term("id", "doc1").matches(&doc));
        assert!(!Query::term("missing", "x").matches(&doc));
    }

    #[test]
    fn test_range_matching() {
        let doc = Document::new().add_integer("_version_", 10);

        assert!(Query::at_least("_version_", 10).matches(&doc));
        assert!(Query::at_least("_version_", 5).matches(&doc));
        assert!(!Query::at_least("_version_", 11).matches(&doc));

        // Documents without the field never match a range.
        let bare = Document::new().add_text("body", "hello");
        assert!(!Query::at_least("_version_", 0).matches(&bare));
    }

    #[test]
    fn test_boolean_matching() {
        let doc = Document::new_with_id("doc1")
            .add_keyword("category", "books")
            .add_integer("_version_", 7);

        let q = Query::Boolean {
            must: vec![Query::term("category", "books")],
            must_not: vec![Query::at_least("_version_", 10)],
        };
        assert!(q.matches(&doc));

        let q = Query::Boolean {
            must: vec![Query::term("category", "books")],
            must_not: vec![Query::at_least("_version_", 5)],
        };
        assert!(!q.matches(&doc));
    }
}
