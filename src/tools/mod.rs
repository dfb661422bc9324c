pub mod dispatcher;
pub mod invocation;
pub mod schema;

pub use dispatcher::{render, Dispatch, ToolDispatcher};
pub use invocation::ToolInvocation;
pub use schema::tool_schemas;
