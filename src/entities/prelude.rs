pub use super::collectible_files::Entity as CollectibleFiles;
pub use super::collectibles::Entity as Collectibles;
pub use super::files::Entity as Files;
pub use super::users::Entity as Users;
