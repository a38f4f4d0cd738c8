pub mod activity_tools;
pub mod registry;
pub mod system;
pub mod trait_def;

pub use activity_tools::ToolScope;
pub use registry::ToolRegistry;
pub use system::ToolSystem;
pub use trait_def::{Tool, ToolError};
