use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::handler::ToolHandler;
use crate::retrieval::RetrievalBackend;
use crate::types::SourceRecord;

/// Second tool shape on the same contract: looks up a course's lesson
/// list instead of searching content.
pub struct CourseOutlineTool {
    store: Arc<dyn RetrievalBackend>,
    sources: Mutex<Vec<SourceRecord>>,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<dyn RetrievalBackend>) -> Self {
        Self {
            store,
            sources: Mutex::new(Vec::new()),
        }
    }

    pub fn definition() -> Value {
        json!({
            "name": "get_course_outline",
            "description": "Get course overview with title, link, and complete lesson list",
            "input_schema": {
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    }
                },
                "required": ["course_name"]
            }
        })
    }

    async fn execute(&self, course_name: &str) -> String {
        let Some(outline) = self.store.outline(course_name).await else {
            return format!("No course found matching '{course_name}'.");
        };

        let mut out = format!("Course: {}", outline.title);
        if let Some(link) = &outline.link {
            let _ = write!(out, "\nCourse Link: {link}");
        }
        let _ = write!(out, "\nLessons ({}):", outline.lessons.len());
        for lesson in &outline.lessons {
            let _ = write!(out, "\n{}. {}", lesson.number, lesson.title);
        }

        if let Ok(mut slot) = self.sources.lock() {
            *slot = vec![SourceRecord {
                label: outline.title.clone(),
                link: outline.link.clone(),
            }];
        }

        out
    }
}

#[async_trait]
impl ToolHandler for CourseOutlineTool {
    async fn call(&self, input: &Value) -> Result<String, String> {
        let course_name = input["course_name"]
            .as_str()
            .ok_or_else(|| "get_course_outline requires a 'course_name' string".to_string())?;
        Ok(self.execute(course_name).await)
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
