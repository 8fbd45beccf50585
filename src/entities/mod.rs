pub mod prelude;

pub mod collectible_files;
pub mod collectibles;
pub mod files;
pub mod users;
