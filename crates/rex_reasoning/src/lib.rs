pub mod maintenance;
pub mod rate_limiter;
pub mod reasoner;
pub mod tool_dispatcher;

pub use maintenance::{MaintenanceStats, MemoryMaintainer};
pub use rate_limiter::RateLimiter;
pub use reasoner::{with_retry, ExternalReasoner, ResponseCache, RetryConfig};
pub use tool_dispatcher::{ParsedTool, ToolDispatcher, ToolResult};
