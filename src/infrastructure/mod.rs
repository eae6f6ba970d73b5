//! 基础设施模块

pub mod database;
pub mod logger;
