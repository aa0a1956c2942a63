// src/lib.rs

//! FoodSpider: free-food event crawler library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
