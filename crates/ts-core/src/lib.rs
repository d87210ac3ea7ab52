pub mod command;
pub mod error;
pub mod registry;
pub mod script;
pub mod tree;
pub mod variable;

pub use command::*;
pub use error::TaskScriptError;
pub use registry::*;
pub use script::*;
pub use tree::build_action_tree;
pub use variable::*;
