mod events;
mod ledger;
mod semester;
mod topic;

pub use events::EventCommands;
pub use ledger::{LedgerCommands, LedgerKeyArgs};
pub use semester::{SemesterCommands, SemesterDates};
pub use topic::TopicCommands;
