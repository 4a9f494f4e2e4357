pub mod adapter;
pub mod cache;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod controller;
