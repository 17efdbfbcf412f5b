pub mod config;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod slot;
pub mod supervisor;
pub mod util;
pub mod version;

pub use config::LauncherConfig;
pub use error::Error;
pub use orchestrator::Orchestrator;
pub use slot::{Slot, SlotStore};
