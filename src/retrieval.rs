//! The retrieval backend seam. Embeddings, chunking, and ranking live
//! behind this trait; the tools only consume ordered matches.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata attached to one indexed chunk of course material.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

/// One ranked hit from the backend.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// What a search returns: matches in relevance order, or an error the
/// backend chose to report as data rather than a transport failure.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub matches: Vec<SearchMatch>,
    pub error: Option<String>,
}

impl SearchResults {
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            matches: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// A lesson as listed in a course outline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonEntry {
    pub number: u32,
    pub title: String,
    pub link: Option<String>,
}

/// A course's structure: title, optional link, ordered lesson list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseOutline {
    pub title: String,
    pub link: Option<String>,
    pub lessons: Vec<LessonEntry>,
}

/// Backend storage trait. Chroma, Qdrant, SQLite+vectors, whatever —
/// implement this and plug it in.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Similarity search over course content, optionally narrowed to one
    /// course and/or one lesson.
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> SearchResults;

    /// Deep link for a (course, lesson) pair, if the backend knows one.
    async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Option<String>;

    /// Resolve a course outline by (possibly partial) course name.
    async fn outline(&self, course_name: &str) -> Option<CourseOutline>;
}

// --- InMemoryBackend ---

/// Keyword-matching backend for tests and demos. Matches come back in
/// insertion order; this is not a ranking implementation.
pub struct InMemoryBackend {
    courses: Vec<CourseOutline>,
    chunks: Vec<SearchMatch>,
    max_results: usize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            courses: Vec::new(),
            chunks: Vec::new(),
            max_results: 5,
        }
    }

    pub fn with_course(mut self, outline: CourseOutline) -> Self {
        self.courses.push(outline);
        self
    }

    pub fn with_chunk(mut self, text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        self.chunks.push(SearchMatch {
            text: text.into(),
            metadata,
        });
        self
    }

    fn course_matches(filter: &str, title: Option<&str>) -> bool {
        match title {
            Some(title) => title.to_lowercase().contains(&filter.to_lowercase()),
            None => false,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RetrievalBackend for InMemoryBackend {
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> SearchResults {
        let query = query.to_lowercase();
        let terms: Vec<&str> = query.split_whitespace().collect();

        let matches = self
            .chunks
            .iter()
            .filter(|chunk| {
                if let Some(filter) = course_name {
                    if !Self::course_matches(filter, chunk.metadata.course_title.as_deref()) {
                        return false;
                    }
                }
                if let Some(n) = lesson_number {
                    if chunk.metadata.lesson_number != Some(n) {
                        return false;
                    }
                }
                let haystack = chunk.text.to_lowercase();
                terms.iter().any(|term| haystack.contains(term))
            })
            .take(self.max_results)
            .cloned()
            .collect();

        SearchResults {
            matches,
            error: None,
        }
    }

    async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Option<String> {
        self.courses
            .iter()
            .find(|c| c.title == course_title)?
            .lessons
            .iter()
            .find(|l| l.number == lesson_number)?
            .link
            .clone()
    }

    async fn outline(&self, course_name: &str) -> Option<CourseOutline> {
        self.courses
            .iter()
            .find(|c| Self::course_matches(course_name, Some(&c.title)))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> InMemoryBackend {
        InMemoryBackend::new()
            .with_course(CourseOutline {
                title: "Intro to MCP".into(),
                link: Some("https://example.com/mcp".into()),
                lessons: vec![
                    LessonEntry {
                        number: 0,
                        title: "Overview".into(),
                        link: Some("https://example.com/mcp/0".into()),
                    },
                    LessonEntry {
                        number: 1,
                        title: "Servers".into(),
                        link: None,
                    },
                ],
            })
            .with_chunk(
                "MCP servers expose tools over a protocol",
                ChunkMetadata {
                    course_title: Some("Intro to MCP".into()),
                    lesson_number: Some(1),
                },
            )
            .with_chunk(
                "Prompt caching reduces latency",
                ChunkMetadata {
                    course_title: Some("Prompting 101".into()),
                    lesson_number: Some(3),
                },
            )
    }

    #[tokio::test]
    async fn search_filters_by_course_and_lesson() {
        let backend = backend();
        let results = backend.search("servers", Some("mcp"), Some(1)).await;
        assert_eq!(results.matches.len(), 1);
        assert_eq!(
            results.matches[0].metadata.course_title.as_deref(),
            Some("Intro to MCP")
        );

        let results = backend.search("servers", Some("mcp"), Some(2)).await;
        assert!(results.matches.is_empty());
    }

    #[tokio::test]
    async fn lesson_link_misses_return_none() {
        let backend = backend();
        assert_eq!(
            backend.lesson_link("Intro to MCP", 0).await.as_deref(),
            Some("https://example.com/mcp/0")
        );
        assert_eq!(backend.lesson_link("Intro to MCP", 1).await, None);
        assert_eq!(backend.lesson_link("No Such Course", 0).await, None);
    }

    #[tokio::test]
    async fn outline_matches_partial_name() {
        let backend = backend();
        let outline = backend.outline("mcp").await.unwrap();
        assert_eq!(outline.title, "Intro to MCP");
        assert_eq!(outline.lessons.len(), 2);
        assert!(backend.outline("biology").await.is_none());
    }
}
