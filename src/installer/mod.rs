pub mod deps;
pub mod error;
pub mod layout;
pub mod orchestrator;
pub mod process;
pub mod repo_list;
pub mod session;
pub mod toolkit;

pub use session::NodeInstaller;
