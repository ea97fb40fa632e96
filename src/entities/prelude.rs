pub use super::activities::Entity as Activities;
pub use super::agents::Entity as Agents;
pub use super::media::Entity as Media;
pub use super::media_contributors::Entity as MediaContributors;
pub use super::media_tags::Entity as MediaTags;
pub use super::saved_views::Entity as SavedViews;
pub use super::tags::Entity as Tags;
pub use super::users::Entity as Users;
