use serde::{de::IgnoredAny, Deserialize, Serialize};
use shelf_db::Timestamp;

/// Stored book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    /// Assigned on create, never reused
    pub id: i64,
    pub name: String,
    pub author: String,
    pub description: String,
    pub price: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Set by soft delete; such rows are hidden from default reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
}

/// Request model for creating a new book.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
    pub name: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    pub price: u32,
}

/// Sparse update. `None` (absent or `null`) leaves the stored value alone;
/// `Some` overwrites it, zero and empty values included.
///
/// The immutable columns are accepted only so that attempts to change them
/// can be reported instead of silently dropped. Any other key is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookPatch {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub price: Option<u32>,
    pub created_at: Option<IgnoredAny>,
    pub updated_at: Option<IgnoredAny>,
    pub deleted_at: Option<IgnoredAny>,
}

impl BookPatch {
    /// True when no mutable field is supplied.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.author.is_none()
            && self.description.is_none()
            && self.price.is_none()
    }

    /// First immutable field the patch tries to set, if any.
    pub fn immutable_field(&self, target_id: i64) -> Option<&'static str> {
        if self.id.is_some_and(|id| id != target_id) {
            Some("id")
        } else if self.created_at.is_some() {
            Some("created_at")
        } else if self.updated_at.is_some() {
            Some("updated_at")
        } else if self.deleted_at.is_some() {
            Some("deleted_at")
        } else {
            None
        }
    }

    /// Merge supplied fields into `book`.
    pub fn apply_to(self, book: &mut Book) {
        if let Some(name) = self.name {
            book.name = name;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(description) = self.description {
            book.description = description;
        }
        if let Some(price) = self.price {
            book.price = price;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(json: &str) -> BookPatch {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn absent_and_null_fields_are_not_supplied() {
        let p = patch(r#"{"price": 40, "name": null}"#);
        assert_eq!(p.price, Some(40));
        assert!(p.name.is_none());
        assert!(p.author.is_none());
    }

    #[test]
    fn explicit_zero_is_supplied() {
        let p = patch(r#"{"price": 0}"#);
        assert_eq!(p.price, Some(0));
        assert!(!p.is_empty());
    }

    #[test]
    fn immutable_fields_are_detected() {
        assert_eq!(patch(r#"{"id": 2}"#).immutable_field(1), Some("id"));
        assert_eq!(patch(r#"{"id": 1}"#).immutable_field(1), None);
        assert_eq!(
            patch(r#"{"created_at": "2024-01-01T00:00:00Z"}"#).immutable_field(1),
            Some("created_at")
        );
        assert_eq!(patch(r#"{"deleted_at": 5}"#).immutable_field(1), Some("deleted_at"));
    }

    #[test]
    fn unknown_keys_do_not_parse() {
        assert!(serde_json::from_str::<BookPatch>(r#"{"title": "x"}"#).is_err());
        assert!(serde_json::from_str::<BookPatch>(r#"{"name": "x", "prise": 3}"#).is_err());
    }

    #[test]
    fn negative_price_does_not_parse() {
        assert!(serde_json::from_str::<BookPatch>(r#"{"price": -1}"#).is_err());
        assert!(serde_json::from_str::<NewBook>(
            r#"{"name": "Dune", "author": "H", "price": -1}"#
        )
        .is_err());
    }
}
