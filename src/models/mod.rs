pub mod ids;
pub mod record;
pub mod schema;

pub use ids::{Role, TableId};
pub use record::{LogLevel, Record, SettingValue, Status};
pub use schema::{FieldIssue, Rejection};
