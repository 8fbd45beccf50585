pub mod auth;
pub mod password;
pub mod slug;
pub mod validation;
