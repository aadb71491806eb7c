//! Session log reconstruction: decoding, state tracking, costs and grouping.

pub mod entry;
pub mod grouping;
pub mod pricing;
pub mod project_scanner;
pub mod session_parser;
pub mod subagent;
pub mod tail;
pub mod timeline;

pub use grouping::{SubagentStatus, TaskGroup};
pub use pricing::{default_pricing, PricingTable};
pub use project_scanner::{default_claude_dir, session_id_from_path, ProjectScanner};
pub use session_parser::{CompactionKind, SessionParser};
pub use subagent::SubagentResolver;
pub use tail::{replay_file, SessionTail};
pub use timeline::{SessionStats, Timeline, TimelineEntry};
