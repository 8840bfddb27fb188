//! Offline index construction: Gutenberg text cleanup, chapter extraction,
//! chunking, and embedding. Driven by the `build-index` binary; the server
//! only ever consumes the finished artifact.

use std::path::Path;

use regex::Regex;

use super::{EmbeddingProvider, IndexError, IndexFile, PassageRecord};

/// Project Gutenberg plain-text edition of "The Innocents Abroad".
pub const INNOCENTS_ABROAD_URL: &str = "https://www.gutenberg.org/cache/epub/3176/pg3176.txt";

/// Target chunk size in characters.
pub const CHUNK_SIZE: usize = 1000;

/// Overlap carried from the tail of each chunk into the next.
pub const CHUNK_OVERLAP: usize = 200;

const START_MARKERS: &[&str] = &[
    "*** START OF THE PROJECT GUTENBERG EBOOK",
    "*** START OF THIS PROJECT GUTENBERG EBOOK",
];

const END_MARKERS: &[&str] = &[
    "*** END OF THE PROJECT GUTENBERG EBOOK",
    "*** END OF THIS PROJECT GUTENBERG EBOOK",
    "End of the Project Gutenberg",
];

/// A chapter of the book, as split out of the cleaned text.
#[derive(Debug, Clone)]
pub struct Chapter {
    /// Roman-numeral chapter number, e.g. "XXXI"
    pub number: String,
    pub title: String,
    pub content: String,
}

/// Strip the Project Gutenberg header/footer and normalize whitespace.
pub fn strip_gutenberg_boilerplate(raw: &str) -> String {
    let mut start = 0;
    for marker in START_MARKERS {
        if let Some(pos) = raw.find(marker) {
            // Skip past the marker line itself
            if let Some(line_end) = raw[pos..].find('\n') {
                start = pos + line_end + 1;
            }
            break;
        }
    }

    let mut end = raw.len();
    for marker in END_MARKERS {
        if let Some(pos) = raw.find(marker) {
            end = pos;
            break;
        }
    }
    let end = end.max(start);

    let content = raw[start..end].replace("\r\n", "\n");

    // Collapse runs of blank lines and horizontal whitespace
    let squeezed = Regex::new(r"\n{3,}")
        .map(|re| re.replace_all(&content, "\n\n").into_owned())
        .unwrap_or(content);
    let squeezed = Regex::new(r"[ \t]+")
        .map(|re| re.replace_all(&squeezed, " ").into_owned())
        .unwrap_or(squeezed);

    squeezed.trim().to_string()
}

/// Split the cleaned text into chapters on Roman-numeral headings like
/// "CHAPTER XXXI." or a bare "XXXI." on its own line. The first line after
/// the heading is taken as the chapter title.
pub fn extract_chapters(text: &str) -> Vec<Chapter> {
    let heading = match Regex::new(r"(?m)^(?:CHAPTER\s+)?([IVXLCDM]+)\.\s*$") {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    let matches: Vec<(usize, usize, String)> = heading
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?.as_str().to_string();
            Some((whole.start(), whole.end(), number))
        })
        .collect();

    let mut chapters = Vec::with_capacity(matches.len());
    for (i, (_, body_start, number)) in matches.iter().enumerate() {
        let body_end = matches
            .get(i + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(text.len());

        let body = text[*body_start..body_end].trim();
        let (title, content) = match body.split_once('\n') {
            Some((first, rest)) => (first.trim().to_string(), rest.trim().to_string()),
            None => (String::new(), body.to_string()),
        };

        chapters.push(Chapter {
            number: number.clone(),
            title,
            content,
        });
    }

    chapters
}

/// Split text into overlapping chunks of roughly `size` characters,
/// preferring paragraph boundaries, then line, then word boundaries.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() || size == 0 {
        return Vec::new();
    }

    // Break the text into units no larger than `size`
    let mut units: Vec<&str> = Vec::new();
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if paragraph.chars().count() <= size {
            units.push(paragraph);
        } else {
            for line in paragraph.split('\n') {
                if line.chars().count() <= size {
                    units.push(line);
                } else {
                    units.extend(split_words(line, size));
                }
            }
        }
    }

    // Greedily pack units into chunks, carrying tail overlap forward
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for unit in units {
        let unit_len = unit.chars().count();
        if !current.is_empty() && current.chars().count() + unit_len + 2 > size {
            let tail = char_tail(&current, overlap);
            chunks.push(std::mem::take(&mut current));
            current = tail;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(unit);
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split an overlong line at word boundaries into pieces of at most `size` chars.
fn split_words(line: &str, size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut remaining = line.trim();

    while remaining.chars().count() > size {
        let cut_byte = remaining
            .char_indices()
            .nth(size)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let split_at = match remaining[..cut_byte].rfind(char::is_whitespace) {
            // remaining is trimmed, so a whitespace hit is never at byte 0
            Some(ws) if ws > 0 => ws,
            _ => cut_byte,
        };
        let (piece, rest) = remaining.split_at(split_at);
        pieces.push(piece.trim());
        remaining = rest.trim_start();
    }
    if !remaining.is_empty() {
        pieces.push(remaining);
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

/// Last `n` characters of a string, trimmed to start at a word boundary.
fn char_tail(s: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= n {
        return s.to_string();
    }
    let tail: String = chars[chars.len() - n..].iter().collect();
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim_start().to_string(),
        None => tail,
    }
}

/// Chunk every chapter and embed every chunk, producing the artifact that
/// [`super::PassageIndex::load`] consumes.
pub async fn build_index_file(
    chapters: &[Chapter],
    embedder: &dyn EmbeddingProvider,
) -> Result<IndexFile, IndexError> {
    let mut passages = Vec::new();

    for chapter in chapters {
        for chunk in chunk_text(&chapter.content, CHUNK_SIZE, CHUNK_OVERLAP) {
            let embedding = embedder.embed(&chunk).await?;
            passages.push(PassageRecord {
                id: passages.len(),
                text: chunk,
                chapter_number: chapter.number.clone(),
                chapter_title: chapter.title.clone(),
                embedding,
            });
        }
    }

    tracing::info!(
        chapters = chapters.len(),
        passages = passages.len(),
        "Built passage index"
    );

    Ok(IndexFile {
        embedder: embedder.fingerprint(),
        dimension: embedder.dimension(),
        passages,
    })
}

/// Write the artifact to disk, creating parent directories as needed.
pub fn save_index_file(file: &IndexFile, path: &Path) -> Result<(), IndexError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(file)?;
    std::fs::write(path, json)?;
    Ok(())
}
