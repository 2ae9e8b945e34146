use serde::{Deserialize, Serialize};

/// One entry in the shared tag vocabulary. Text is unique; books reference
/// keywords through [`BookKeyword`] associations.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Keyword {
    pub id: i64,
    pub keyword: String,
}

/// A (book, keyword) association. The pair is the primary key, so re-applying
/// an enrichment result cannot duplicate tags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookKeyword {
    pub book_id: i64,
    pub keyword_id: i64,
}
