use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// --- Domain Errors ---
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid value for field '{field}': {reason}")]
    ValueConstraint { field: &'static str, reason: String },
    #[error("Field '{0}' cannot change once set")]
    ImmutableField(&'static str),
}

// --- Length Bounds ---
pub const TITLE_MIN_LEN: usize = 5;
pub const TITLE_MAX_LEN: usize = 50;
pub const MAGAZINE_NAME_MIN_LEN: usize = 2;
pub const MAGAZINE_NAME_MAX_LEN: usize = 16;

/// Checks that `value` holds between `min` and `max` characters (inclusive).
fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), DomainError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(DomainError::ValueConstraint {
            field,
            reason: format!("must be between {min} and {max} characters, got {len}"),
        });
    }
    Ok(())
}

fn check_not_empty(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::ValueConstraint {
            field,
            reason: "must be at least 1 character long".to_string(),
        });
    }
    Ok(())
}

// --- Identifiers ---

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self::new(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Identity of an author within one catalog.
    AuthorId,
    "author"
);
entity_id!(
    /// Identity of a magazine within one catalog.
    MagazineId,
    "magazine"
);
entity_id!(
    /// Identity of an article within one catalog.
    ArticleId,
    "article"
);

// --- Author ---

/// A writer. The name is fixed at construction; there is no setter.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Author {
    id: AuthorId,
    name: String,
}

impl Author {
    pub fn new(id: AuthorId, name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        check_not_empty("name", &name)?;
        Ok(Self { id, name })
    }

    pub fn id(&self) -> AuthorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// --- Magazine ---

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Magazine {
    id: MagazineId,
    name: String,
    category: String,
}

impl Magazine {
    /// Creates a magazine, validating both name and category.
    pub fn new(
        id: MagazineId,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        let category = category.into();
        Self::validate_name(&name)?;
        Self::validate_category(&category)?;
        Ok(Self { id, name, category })
    }

    pub fn validate_name(name: &str) -> Result<(), DomainError> {
        check_length("name", name, MAGAZINE_NAME_MIN_LEN, MAGAZINE_NAME_MAX_LEN)
    }

    pub fn validate_category(category: &str) -> Result<(), DomainError> {
        check_not_empty("category", category)
    }

    pub fn id(&self) -> MagazineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Renames the magazine. The current name is kept on failure.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), DomainError> {
        let name = name.into();
        Self::validate_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn set_category(&mut self, category: impl Into<String>) -> Result<(), DomainError> {
        let category = category.into();
        Self::validate_category(&category)?;
        self.category = category;
        Ok(())
    }
}

// --- Article ---

/// Joins one author to one magazine under a title.
///
/// The title is set once at construction. The author and magazine references
/// can be reassigned; checking that they resolve to real entities is the job
/// of whoever owns the registries.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Article {
    id: ArticleId,
    author: AuthorId,
    magazine: MagazineId,
    title: String,
}

impl Article {
    pub fn new(
        id: ArticleId,
        author: AuthorId,
        magazine: MagazineId,
        title: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let title = title.into();
        Self::validate_title(&title)?;
        Ok(Self {
            id,
            author,
            magazine,
            title,
        })
    }

    pub fn validate_title(title: &str) -> Result<(), DomainError> {
        check_length("title", title, TITLE_MIN_LEN, TITLE_MAX_LEN)
    }

    pub fn id(&self) -> ArticleId {
        self.id
    }

    pub fn author(&self) -> AuthorId {
        self.author
    }

    pub fn magazine(&self) -> MagazineId {
        self.magazine
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_author(&mut self, author: AuthorId) {
        self.author = author;
    }

    pub fn set_magazine(&mut self, magazine: MagazineId) {
        self.magazine = magazine;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article_with_title(title: &str) -> Result<Article, DomainError> {
        Article::new(
            ArticleId::new(0),
            AuthorId::new(0),
            MagazineId::new(0),
            title,
        )
    }

    #[test]
    fn author_requires_non_empty_name() {
        let author = Author::new(AuthorId::new(1), "Carly Raccoon").unwrap();
        assert_eq!(author.name(), "Carly Raccoon");
        assert_eq!(author.id(), AuthorId::new(1));

        let result = Author::new(AuthorId::new(2), "");
        assert!(matches!(
            result,
            Err(DomainError::ValueConstraint { field: "name", .. })
        ));
    }

    #[test]
    fn title_bounds_are_inclusive() {
        for len in [TITLE_MIN_LEN, 20, TITLE_MAX_LEN] {
            let title = "t".repeat(len);
            let article = article_with_title(&title).unwrap();
            assert_eq!(article.title(), title);
        }
    }

    #[test]
    fn title_outside_bounds_is_rejected() {
        for len in [0, TITLE_MIN_LEN - 1, TITLE_MAX_LEN + 1] {
            let result = article_with_title(&"t".repeat(len));
            assert!(
                matches!(result, Err(DomainError::ValueConstraint { field: "title", .. })),
                "length {len} should be rejected"
            );
        }
    }

    #[test]
    fn title_length_counts_characters_not_bytes() {
        // 5 characters, 10 bytes
        assert!(article_with_title("ééééé").is_ok());
        // 4 characters, 8 bytes
        assert!(article_with_title("éééé").is_err());
    }

    #[test]
    fn magazine_name_bounds_are_inclusive() {
        for len in [MAGAZINE_NAME_MIN_LEN, MAGAZINE_NAME_MAX_LEN] {
            let name = "A".repeat(len);
            let magazine = Magazine::new(MagazineId::new(0), name.as_str(), "Fashion").unwrap();
            assert_eq!(magazine.name(), name);
        }
        for len in [MAGAZINE_NAME_MIN_LEN - 1, MAGAZINE_NAME_MAX_LEN + 1] {
            assert!(
                Magazine::validate_name(&"A".repeat(len)).is_err(),
                "length {len} should be rejected"
            );
        }
        // 16 characters, 32 bytes
        assert!(Magazine::validate_name(&"é".repeat(MAGAZINE_NAME_MAX_LEN)).is_ok());
    }

    #[test]
    fn magazine_name_and_category_are_validated() {
        assert!(Magazine::new(MagazineId::new(0), "Vogue", "Fashion").is_ok());
        assert!(matches!(
            Magazine::new(MagazineId::new(0), "V", "Fashion"),
            Err(DomainError::ValueConstraint { field: "name", .. })
        ));
        assert!(matches!(
            Magazine::new(MagazineId::new(0), "A".repeat(17), "Fashion"),
            Err(DomainError::ValueConstraint { field: "name", .. })
        ));
        assert!(matches!(
            Magazine::new(MagazineId::new(0), "Vogue", ""),
            Err(DomainError::ValueConstraint { field: "category", .. })
        ));
    }

    #[test]
    fn magazine_setters_keep_old_value_on_failure() {
        let mut magazine = Magazine::new(MagazineId::new(0), "Vogue", "Fashion").unwrap();

        magazine.set_name("AutoWeek").unwrap();
        magazine.set_category("Cars").unwrap();
        assert_eq!(magazine.name(), "AutoWeek");
        assert_eq!(magazine.category(), "Cars");

        assert!(magazine.set_name("This name is way too long").is_err());
        assert!(magazine.set_category("").is_err());
        assert_eq!(magazine.name(), "AutoWeek");
        assert_eq!(magazine.category(), "Cars");
    }

    #[test]
    fn article_references_can_be_reassigned() {
        let mut article = article_with_title("How to wear a tutu").unwrap();
        article.set_author(AuthorId::new(7));
        article.set_magazine(MagazineId::new(9));
        assert_eq!(article.author(), AuthorId::new(7));
        assert_eq!(article.magazine(), MagazineId::new(9));
        assert_eq!(article.title(), "How to wear a tutu");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let article = Article::new(
            ArticleId::new(3),
            AuthorId::new(1),
            MagazineId::new(2),
            "Dating life in NYC",
        )
        .unwrap();
        let value = serde_json::to_value(&article).unwrap();
        assert_eq!(
            value,
            json!({ "id": 3, "author": 1, "magazine": 2, "title": "Dating life in NYC" })
        );
        assert_eq!(AuthorId::new(4).to_string(), "author-4");
    }
}
