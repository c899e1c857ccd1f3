use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::handler::ToolHandler;
use crate::retrieval::RetrievalBackend;
use crate::types::SourceRecord;

/// Content search over course materials, with optional course and lesson
/// filters. Formats attributed excerpts for the model and records one
/// source per match for end-user display.
pub struct CourseSearchTool {
    store: Arc<dyn RetrievalBackend>,
    sources: Mutex<Vec<SourceRecord>>,
}

impl CourseSearchTool {
    pub fn new(store: Arc<dyn RetrievalBackend>) -> Self {
        Self {
            store,
            sources: Mutex::new(Vec::new()),
        }
    }

    /// The complete JSON tool definition sent to the LLM.
    pub fn definition() -> Value {
        json!({
            "name": "search_course_content",
            "description": "Search course materials with smart course name matching and lesson filtering",
            "input_schema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }
        })
    }

    async fn execute(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> String {
        let results = self.store.search(query, course_name, lesson_number).await;

        // Backend-reported errors go to the model as the tool result, and
        // the source slot stays untouched.
        if let Some(error) = results.error {
            return error;
        }

        if results.matches.is_empty() {
            let mut message = String::from("No relevant content found");
            if let Some(course) = course_name {
                let _ = write!(message, " in course '{course}'");
            }
            if let Some(n) = lesson_number {
                let _ = write!(message, " in lesson {n}");
            }
            message.push('.');
            return message;
        }

        let mut formatted = Vec::with_capacity(results.matches.len());
        let mut sources = Vec::with_capacity(results.matches.len());

        for hit in &results.matches {
            let course_title = hit.metadata.course_title.as_deref().unwrap_or("unknown");
            let label = match hit.metadata.lesson_number {
                Some(n) => format!("{course_title} - Lesson {n}"),
                None => course_title.to_string(),
            };
            let link = match hit.metadata.lesson_number {
                Some(n) => self.store.lesson_link(course_title, n).await,
                None => None,
            };

            formatted.push(format!("[{label}]\n{}", hit.text));
            sources.push(SourceRecord { label, link });
        }

        // Replace, don't append: sources reflect only this batch.
        if let Ok(mut slot) = self.sources.lock() {
            *slot = sources;
        }

        formatted.join("\n\n")
    }
}

#[async_trait]
impl ToolHandler for CourseSearchTool {
    async fn call(&self, input: &Value) -> Result<String, String> {
        let query = input["query"]
            .as_str()
            .ok_or_else(|| "search_course_content requires a 'query' string".to_string())?;
        let course_name = input["course_name"].as_str();
        let lesson_number = match &input["lesson_number"] {
            Value::Null => None,
            value => Some(
                value
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| format!("invalid lesson_number: {value}"))?,
            ),
        };
        Ok(self.execute(query, course_name, lesson_number).await)
    }

    fn last_sources(&self) -> Vec<SourceRecord> {
        self.sources.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn reset_sources(&self) {
        if let Ok(mut slot) = self.sources.lock() {
            slot.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{ChunkMetadata, CourseOutline, SearchMatch, SearchResults};
    use std::collections::HashMap;

    /// Scripted backend: queued search results plus a lesson-link table.
    /// Each search pops the next queued result; the last one repeats.
    struct StubBackend {
        results: std::sync::Mutex<Vec<SearchResults>>,
        links: HashMap<(String, u32), String>,
    }

    impl StubBackend {
        fn returning(results: SearchResults) -> Self {
            Self::sequence(vec![results])
        }

        fn sequence(results: Vec<SearchResults>) -> Self {
            Self {
                results: std::sync::Mutex::new(results),
                links: HashMap::new(),
            }
        }

        fn with_link(mut self, course: &str, lesson: u32, url: &str) -> Self {
            self.links.insert((course.into(), lesson), url.into());
            self
        }
    }

    #[async_trait]
    impl RetrievalBackend for StubBackend {
        async fn search(
            &self,
            _query: &str,
            _course_name: Option<&str>,
            _lesson_number: Option<u32>,
        ) -> SearchResults {
            let Ok(mut queue) = self.results.lock() else {
                return SearchResults::default();
            };
            if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue.first().cloned().unwrap_or_default()
            }
        }

        async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Option<String> {
            self.links
                .get(&(course_title.to_string(), lesson_number))
                .cloned()
        }

        async fn outline(&self, _course_name: &str) -> Option<CourseOutline> {
            None
        }
    }

    fn two_lesson_results() -> SearchResults {
        SearchResults {
            matches: vec![
                SearchMatch {
                    text: "This is the introduction lesson content".into(),
                    metadata: ChunkMetadata {
                        course_title: Some("Course A".into()),
                        lesson_number: Some(0),
                    },
                },
                SearchMatch {
                    text: "In this lesson we dive deeper".into(),
                    metadata: ChunkMetadata {
                        course_title: Some("Course A".into()),
                        lesson_number: Some(1),
                    },
                },
            ],
            error: None,
        }
    }

    fn tool(backend: StubBackend) -> CourseSearchTool {
        CourseSearchTool::new(Arc::new(backend))
    }

    #[tokio::test]
    async fn formats_matches_with_bracketed_headers() {
        let tool = tool(StubBackend::returning(two_lesson_results()));
        let result = tool.execute("testing concepts", None, None).await;

        assert!(result.contains("[Course A - Lesson 0]"));
        assert!(result.contains("[Course A - Lesson 1]"));
        assert!(result.contains("This is the introduction lesson content"));
        assert!(result.contains("In this lesson we dive deeper"));

        let sources = tool.last_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].label, "Course A - Lesson 0");
        assert_eq!(sources[1].label, "Course A - Lesson 1");
    }

    #[tokio::test]
    async fn empty_results_wording_matches_filters() {
        let tool = tool(StubBackend::returning(SearchResults::default()));

        assert_eq!(
            tool.execute("x", None, None).await,
            "No relevant content found."
        );
        assert_eq!(
            tool.execute("x", Some("Test Course"), None).await,
            "No relevant content found in course 'Test Course'."
        );
        assert_eq!(
            tool.execute("x", None, Some(5)).await,
            "No relevant content found in lesson 5."
        );
        assert_eq!(
            tool.execute("x", Some("Test Course"), Some(5)).await,
            "No relevant content found in course 'Test Course' in lesson 5."
        );
        assert!(tool.last_sources().is_empty());
    }

    #[tokio::test]
    async fn backend_error_returned_verbatim() {
        let tool = tool(StubBackend::returning(SearchResults::from_error(
            "Test error message",
        )));
        assert_eq!(tool.execute("x", None, None).await, "Test error message");
        assert!(tool.last_sources().is_empty());
    }

    #[tokio::test]
    async fn lesson_link_resolved_into_source() {
        let results = SearchResults {
            matches: vec![SearchMatch {
                text: "Test content".into(),
                metadata: ChunkMetadata {
                    course_title: Some("Test Course".into()),
                    lesson_number: Some(1),
                },
            }],
            error: None,
        };
        let tool = tool(
            StubBackend::returning(results).with_link("Test Course", 1, "https://example.com/1"),
        );

        tool.execute("x", None, None).await;
        let sources = tool.last_sources();
        assert_eq!(sources[0].label, "Test Course - Lesson 1");
        assert_eq!(sources[0].link.as_deref(), Some("https://example.com/1"));
    }

    #[tokio::test]
    async fn match_without_lesson_number_gets_plain_label() {
        let results = SearchResults {
            matches: vec![SearchMatch {
                text: "Test content without lesson".into(),
                metadata: ChunkMetadata {
                    course_title: Some("Test Course".into()),
                    lesson_number: None,
                },
            }],
            error: None,
        };
        let tool = tool(StubBackend::returning(results));

        let out = tool.execute("x", None, None).await;
        assert!(out.contains("[Test Course]"));
        let sources = tool.last_sources();
        assert_eq!(sources[0].label, "Test Course");
        assert_eq!(sources[0].link, None);
    }

    #[tokio::test]
    async fn missing_course_title_falls_back_to_unknown() {
        let results = SearchResults {
            matches: vec![SearchMatch {
                text: "Test content".into(),
                metadata: ChunkMetadata::default(),
            }],
            error: None,
        };
        let tool = tool(StubBackend::returning(results));

        let out = tool.execute("x", None, None).await;
        assert!(out.contains("[unknown]"));
        assert_eq!(tool.last_sources()[0].label, "unknown");
    }

    #[tokio::test]
    async fn later_search_replaces_sources() {
        let single = SearchResults {
            matches: vec![SearchMatch {
                text: "Single result".into(),
                metadata: ChunkMetadata {
                    course_title: Some("Another Course".into()),
                    lesson_number: Some(3),
                },
            }],
            error: None,
        };
        let tool = tool(StubBackend::sequence(vec![two_lesson_results(), single]));

        tool.execute("first query", None, None).await;
        assert_eq!(tool.last_sources().len(), 2);

        tool.execute("second query", None, None).await;
        let sources = tool.last_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].label, "Another Course - Lesson 3");
    }

    #[tokio::test]
    async fn call_requires_query() {
        let tool = tool(StubBackend::returning(SearchResults::default()));
        let err = tool.call(&json!({})).await.unwrap_err();
        assert!(err.contains("query"));
    }

    #[tokio::test]
    async fn call_rejects_bad_lesson_numbers() {
        let tool = tool(StubBackend::returning(SearchResults::default()));

        // u32 range is the contract; nothing gets truncated into a
        // different lesson filter.
        let err = tool
            .call(&json!({"query": "x", "lesson_number": 4294967296u64}))
            .await
            .unwrap_err();
        assert!(err.contains("lesson_number"));

        let err = tool
            .call(&json!({"query": "x", "lesson_number": "three"}))
            .await
            .unwrap_err();
        assert!(err.contains("lesson_number"));

        // In-range values still reach the filter.
        let out = tool
            .call(&json!({"query": "x", "lesson_number": 5}))
            .await
            .unwrap();
        assert_eq!(out, "No relevant content found in lesson 5.");
    }

    #[test]
    fn definition_declares_only_query_required() {
        let def = CourseSearchTool::definition();
        assert_eq!(def["name"], "search_course_content");
        let schema = &def["input_schema"];
        assert!(schema["properties"]["query"].is_object());
        assert!(schema["properties"]["course_name"].is_object());
        assert!(schema["properties"]["lesson_number"].is_object());
        assert_eq!(schema["required"], json!(["query"]));
    }
}
