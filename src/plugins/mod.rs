//! System plugins wired before any command.

pub mod dispatcher;
pub mod logger;
pub mod pulse;

pub use dispatcher::CommandDispatcher;
pub use logger::Logger;
pub use pulse::Pulse;
