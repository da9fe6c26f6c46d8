//! # Radiology Core
//!
//! 放射科工作流的核心模块，提供患者/检查/预约数据结构、错误定义和通用工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{RadError, Result};
pub use models::*;
