pub mod handler;
pub mod outline;
pub mod registry;
pub mod search;

pub use handler::{ToolDef, ToolHandler};
pub use outline::CourseOutlineTool;
pub use registry::ToolRegistry;
pub use search::CourseSearchTool;
