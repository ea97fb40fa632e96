mod backup;
mod regenerate_reviews;
mod reset_password;

pub use backup::{cmd_backup_export, cmd_backup_import, cmd_backup_list};
pub use regenerate_reviews::cmd_regenerate_reviews;
pub use reset_password::cmd_reset_password;
