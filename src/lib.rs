pub mod api {
    pub mod documents;
    pub mod errors;
    pub mod events;
    pub mod upload;
}
pub mod app;
pub mod auth;
pub mod config;
pub mod db {
    pub mod memory;
    pub mod models;
    pub mod repository;
}
pub mod demo_seeder;
pub mod error;
pub mod events;
pub mod storage {
    pub mod client;
}
pub mod store;
