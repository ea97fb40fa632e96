pub mod backup;
pub use backup::{BackupService, ExportOptions, ImportOptions};

pub mod covers;
pub use covers::CoverService;

pub mod lookup;
pub use lookup::{LookupService, Provider};

pub mod markdown;

pub mod scheduler;
pub use scheduler::Scheduler;
