//! 核心模块

pub mod cache;
pub mod error;
pub mod middleware;
