pub mod activity;
pub mod agent;
pub mod media;
pub mod saved_view;
pub mod tag;
pub mod user;
