pub mod api;
pub mod auth;
pub mod config;
pub mod observability;
pub mod preview;
pub mod section_decoder;
pub mod view;
pub mod workspace;
