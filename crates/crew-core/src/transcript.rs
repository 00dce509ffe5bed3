//! Splitting long transcripts into pieces a crew can analyze one at a time.

/// Paragraphs per chunk when none is configured
pub const DEFAULT_PARAGRAPHS_PER_CHUNK: usize = 4;

/// Split `text` into chunks of roughly `paragraphs` paragraphs.
///
/// Every blank line ends a paragraph; the chunk is emitted (blank line
/// included) once it holds `paragraphs` of them. Whatever is left forms the
/// last chunk. Line breaks are kept as they were.
pub fn split_into_chunks(text: &str, paragraphs: usize) -> Vec<String> {
    let paragraphs = paragraphs.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut count = 0;

    for line in text.split('\n') {
        current.push(line);
        if line.trim().is_empty() {
            count += 1;
            if count >= paragraphs {
                chunks.push(current.join("\n"));
                current.clear();
                count = 0;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }
    chunks
}

/// Header placed before each chunk's analysis in the combined report
pub fn chunk_header(number: usize, total: usize, body: &str) -> String {
    format!("\n\nCHUNK {}/{} ANALYSIS:\n{}", number, total, body)
}
