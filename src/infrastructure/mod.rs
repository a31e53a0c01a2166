//! 基础设施层
//!
//! - 依赖注入容器
//! - 启动与释放协调

pub mod bootstrap;
pub mod container;

// 重新导出API
pub use bootstrap::{launch, BootState, Bootstrap, CloseFailure, Manager};
pub use container::{Container, ContainerStats, Definition, Identity, Injectable, Instance, TypeDescriptor};
