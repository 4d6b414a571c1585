pub mod analytics;
pub mod badges;
pub mod db;
pub mod generation;
pub mod models;
pub mod service;
pub mod streak;
