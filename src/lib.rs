pub mod config;
pub mod db;
pub mod fusion;
pub mod recognition;
pub mod sampling;
pub mod schedule;
