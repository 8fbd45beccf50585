pub mod collectible_service;
pub mod file_service;
pub mod image_service;
pub mod storage;
pub mod user_service;
