pub mod dispatch;
pub mod events;
pub mod init;
pub mod ledger;
pub mod semester;
pub mod shared;
pub mod topic;
