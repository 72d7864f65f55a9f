pub mod admin;
pub mod backup;
pub mod health;
pub mod records;
pub mod tables;

pub use admin::admin_stats;
pub use backup::{create_backup, restore_backup};
pub use health::health_check;
pub use records::{chart, get_record, remove_record, toggle_favorite, toggle_lock, update_record};
pub use tables::{
    add_record, clear_table, dashboard, export_records, import_records, list_records,
    put_record, select_options,
};
