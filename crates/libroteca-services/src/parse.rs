use libroteca_core::AppError;

/// A single list element with more words than this is treated as prose
/// rather than a keyword.
const MAX_WORDS_PER_KEYWORD: usize = 4;

/// Parse a model-written keyword list.
///
/// Models asked for a list reply with many shapes: a JSON-ish array
/// (`['fantasy', 'magic']`), a bare comma separated line, or quoted items.
/// Bracket and quote decorations are stripped and the remainder is split on
/// commas. An empty reply is a valid empty list. A reply that collapses to
/// one comma-free element of several words is prose, not a list, and
/// surfaces as [`AppError::KeywordParse`] so the caller can treat the
/// response as unusable instead of storing a sentence as a keyword.
pub fn parse_keyword_list(raw: &str) -> Result<Vec<String>, AppError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '\'' | '"'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<String> = cleaned
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.len() == 1 && items[0].split_whitespace().count() > MAX_WORDS_PER_KEYWORD {
        return Err(AppError::KeywordParse(format!(
            "expected a comma separated list, got prose: '{}'",
            items[0]
        )));
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_bracketed_quoted_list() {
        assert_eq!(
            parse_keyword_list("['fantasy', 'magic', 'dragons']").unwrap(),
            vec!["fantasy", "magic", "dragons"]
        );
        assert_eq!(
            parse_keyword_list(r#"["ciencia ficcion", "espacio"]"#).unwrap(),
            vec!["ciencia ficcion", "espacio"]
        );
    }

    #[test]
    fn test_parses_bare_comma_list() {
        assert_eq!(
            parse_keyword_list("history, war, politics").unwrap(),
            vec!["history", "war", "politics"]
        );
    }

    #[test]
    fn test_empty_reply_is_empty_list() {
        assert_eq!(parse_keyword_list("").unwrap(), Vec::<String>::new());
        assert_eq!(parse_keyword_list("[]").unwrap(), Vec::<String>::new());
        assert_eq!(parse_keyword_list("  \n ").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_single_short_keyword_is_accepted() {
        assert_eq!(
            parse_keyword_list("'science fiction'").unwrap(),
            vec!["science fiction"]
        );
    }

    #[test]
    fn test_prose_reply_is_a_parse_error() {
        let err = parse_keyword_list(
            "I could not find suitable keywords for this book in the provided list",
        )
        .unwrap_err();
        assert!(matches!(err, AppError::KeywordParse(_)));
    }

    #[test]
    fn test_blank_items_are_dropped() {
        assert_eq!(
            parse_keyword_list("poetry, , love,").unwrap(),
            vec!["poetry", "love"]
        );
    }
}
