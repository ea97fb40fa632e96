pub mod prelude;

pub mod activities;
pub mod agents;
pub mod media;
pub mod media_contributors;
pub mod media_tags;
pub mod saved_views;
pub mod tags;
pub mod users;
