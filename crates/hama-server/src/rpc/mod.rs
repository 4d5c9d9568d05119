//! Method dispatch: the registry that implements [`ToolExecutor`](crate::ToolExecutor)
//! and the tool catalog served through it.

pub mod registry;
pub mod tools;
