pub mod abuse_report;
pub mod block;
pub mod user;

pub use abuse_report::*;
pub use block::*;
pub use user::*;

pub type UserId = i32;
pub type ReportId = i32;
