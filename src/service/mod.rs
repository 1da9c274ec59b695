pub mod auth;
pub mod numbering;
pub mod secret;
pub mod status;
pub mod token;
