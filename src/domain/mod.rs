pub mod auth;
pub mod episode;
pub mod voicing;
