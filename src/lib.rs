pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod model;
pub mod provider;
pub mod rating;
pub mod resolver;
pub mod reviews;
pub mod seed;
pub mod social;
