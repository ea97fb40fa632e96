pub mod catalog;
pub mod filters;
pub mod media;
pub mod partial_date;
