//! Shared pipeline constants

/// Bounded prefix of extracted PDF text handed to the inference collaborator.
/// Enough for title/author inference without shipping whole books upstream.
pub const TEXT_EXCERPT_CHARS: usize = 1500;

/// Canonical cover size rasterized from page 1.
pub const COVER_WIDTH: u32 = 600;
pub const COVER_HEIGHT: u32 = 900;

/// Upper bound on keywords requested per record.
pub const MAX_KEYWORDS_PER_BOOK: usize = 5;
