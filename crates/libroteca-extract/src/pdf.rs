use std::path::Path;

use libroteca_core::constants::TEXT_EXCERPT_CHARS;
use libroteca_core::AppError;
use lopdf::{Document, Object};

/// Structural summary of a stored PDF: page count, a text excerpt for
/// inference, and whatever bibliographic metadata the file itself embeds.
#[derive(Debug, Clone, Default)]
pub struct PdfSummary {
    pub page_count: usize,
    pub excerpt: String,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Parse and summarize the PDF at `path`.
///
/// Files lopdf cannot parse, and files with no pages, are reported as
/// [`AppError::MalformedPdf`] carrying the record id so the caller can
/// blacklist the record instead of retrying a file that will never improve.
pub async fn summarize(path: &Path, book_id: i64) -> Result<PdfSummary, AppError> {
    let path = path.to_owned();
    tokio::task::spawn_blocking(move || summarize_blocking(&path, book_id))
        .await
        .map_err(|e| AppError::Internal(format!("PDF summarize task panicked: {e}")))?
}

fn summarize_blocking(path: &Path, book_id: i64) -> Result<PdfSummary, AppError> {
    let doc = match Document::load(path) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(book_id, error = %e, "Failed to parse PDF");
            return Err(AppError::MalformedPdf { book_id });
        }
    };

    let pages: Vec<u32> = doc.get_pages().keys().cloned().collect();
    if pages.is_empty() {
        tracing::warn!(book_id, "PDF contains no pages");
        return Err(AppError::MalformedPdf { book_id });
    }

    let excerpt = text_excerpt(&doc, &pages, TEXT_EXCERPT_CHARS);
    let title = info_string(&doc, b"Title");
    let author = info_string(&doc, b"Author");

    tracing::debug!(
        book_id,
        pages = pages.len(),
        excerpt_chars = excerpt.chars().count(),
        has_embedded_title = title.is_some(),
        "Summarized PDF"
    );

    Ok(PdfSummary {
        page_count: pages.len(),
        excerpt,
        title,
        author,
    })
}

/// Concatenate page text from the front of the document until `limit`
/// characters are collected. Pages that fail text extraction contribute
/// nothing rather than aborting the summary.
fn text_excerpt(doc: &Document, pages: &[u32], limit: usize) -> String {
    let mut text = String::new();
    for page in pages {
        if text.chars().count() >= limit {
            break;
        }
        let page_text = doc.extract_text(&[*page]).unwrap_or_default();
        text.push_str(&page_text);
    }
    truncate_chars(text.trim(), limit)
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Read a text entry from the document information dictionary.
fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let dict = match info {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            let value = decode_pdf_string(bytes);
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        _ => None,
    }
}

// PDF text strings are UTF-16BE when they carry a BOM, otherwise a one byte
// encoding close enough to Latin-1 to map bytes straight to chars.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Dictionary, Stream};

    /// Create a minimal one-page PDF with the given text content and
    /// optional information dictionary entries.
    fn create_test_pdf(text: &str, title: Option<&str>, author: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let content = format!(
            "BT /F1 12 Tf 100 700 Td ({}) Tj ET",
            text.replace('\\', "\\\\")
                .replace('(', "\\(")
                .replace(')', "\\)")
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });

        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if title.is_some() || author.is_some() {
            let mut info = Dictionary::new();
            if let Some(title) = title {
                info.set("Title", Object::string_literal(title));
            }
            if let Some(author) = author {
                info.set("Author", Object::string_literal(author));
            }
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_summarize_reads_pages_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.pdf");
        std::fs::write(&path, create_test_pdf("Hello World", None, None)).unwrap();

        let summary = summarize_blocking(&path, 1).unwrap();
        assert_eq!(summary.page_count, 1);
        assert!(
            summary.excerpt.contains("Hello") || summary.excerpt.contains("World"),
            "unexpected excerpt: '{}'",
            summary.excerpt
        );
        assert_eq!(summary.title, None);
        assert_eq!(summary.author, None);
    }

    #[test]
    fn test_summarize_reads_embedded_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.pdf");
        std::fs::write(
            &path,
            create_test_pdf("text", Some("Rayuela"), Some("Julio Cortazar")),
        )
        .unwrap();

        let summary = summarize_blocking(&path, 2).unwrap();
        assert_eq!(summary.title.as_deref(), Some("Rayuela"));
        assert_eq!(summary.author.as_deref(), Some("Julio Cortazar"));
    }

    #[test]
    fn test_summarize_garbage_is_malformed_with_record_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = summarize_blocking(&path, 99).unwrap_err();
        assert!(matches!(err, AppError::MalformedPdf { book_id: 99 }));
    }

    #[test]
    fn test_summarize_empty_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        std::fs::File::create(&path).unwrap();

        let err = summarize_blocking(&path, 7).unwrap_err();
        assert!(matches!(err, AppError::MalformedPdf { book_id: 7 }));
    }

    #[tokio::test]
    async fn test_summarize_async_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.pdf");
        std::fs::write(&path, create_test_pdf("async path", None, None)).unwrap();

        let summary = summarize(&path, 5).await.unwrap();
        assert_eq!(summary.page_count, 1);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let text = "ññññ";
        assert_eq!(truncate_chars(text, 2), "ññ");
        assert_eq!(truncate_chars(text, 10), "ññññ");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_decode_pdf_string_utf16be() {
        let bytes = [0xFE, 0xFF, 0x00, 0x41, 0x00, 0x62];
        assert_eq!(decode_pdf_string(&bytes), "Ab");
        assert_eq!(decode_pdf_string(b"plain"), "plain");
    }
}
