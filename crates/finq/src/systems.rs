mod registry;
mod system;
pub mod trading;

pub use registry::{normalize_arguments, ToolRegistry, DEFAULT_TOOL_TIMEOUT};
pub use system::System;
pub use trading::TradingSystem;
