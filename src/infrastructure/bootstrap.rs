//! 启动与释放
//!
//! `Bootstrap` 按顺序启动一组 manager（每个 manager 把自己的构建器注册进容器），
//! 执行应用主体，最后关闭所有启动成功的 manager 并清空容器。

use super::container::{Container, Identity};
use crate::config::{BootstrapConfig, ReleaseOrder};
use crate::errors::{BootError, ContainerError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 负责一个资源的初始化与释放
pub trait Manager: Send + Sync {
    /// 主资源的标识
    fn identity(&self) -> Identity;

    /// 把构建器注册进容器
    ///
    /// 返回链中包含 [`ContainerError::AlreadyRegistered`] 的错误视为资源已存在，不算失败。
    fn start(&self, container: &Container) -> anyhow::Result<()>;

    /// 释放资源
    fn close(&self, container: &Container) -> anyhow::Result<()>;
}

/// 启动状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    /// 未启动
    Idle,
    /// 启动中
    Booting,
    /// 已启动
    Booted,
    /// 已释放
    Released,
}

/// 关闭失败的 manager
#[derive(Debug)]
pub struct CloseFailure {
    pub manager: Identity,
    pub error: anyhow::Error,
}

pub struct Bootstrap {
    container: Container,
    config: BootstrapConfig,
    started: Vec<Arc<dyn Manager>>,
    state: BootState,
}

impl Bootstrap {
    pub fn new(container: Container) -> Self {
        Self::with_config(container, BootstrapConfig::default())
    }

    pub fn with_config(container: Container, config: BootstrapConfig) -> Self {
        Self {
            container,
            config,
            started: Vec::with_capacity(10),
            state: BootState::Idle,
        }
    }

    /// 按输入顺序启动 manager
    ///
    /// 任一 manager 失败时先释放已启动的 manager，再返回 [`BootError`]。
    /// manager 在 start 或预构建中 panic 时同样会先释放，再继续展开。
    /// 是否终止进程由调用方决定。
    pub fn boot<I>(&mut self, managers: I) -> Result<&mut Self, BootError>
    where
        I: IntoIterator<Item = Arc<dyn Manager>>,
    {
        let started_at = Instant::now();
        self.state = BootState::Booting;

        let mut guard = ReleaseOnDrop::new(&mut *self);
        let outcome = guard.bootstrap.start_all(managers);
        guard.armed = false;
        drop(guard);
        outcome?;

        self.state = BootState::Booted;
        info!(
            managers = self.started.len(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "bootstrap completed"
        );
        Ok(self)
    }

    /// 执行应用主体，结束后总是释放资源（包括 panic 展开时）
    ///
    /// 没有任何 manager 启动成功时不执行，返回 `None`。
    pub fn run<F, R>(&mut self, procedure: F) -> Option<R>
    where
        F: FnOnce(&Container) -> R,
    {
        if self.started.is_empty() {
            debug!("no manager started, skipping run");
            return None;
        }

        let guard = ReleaseOnDrop::new(self);
        let output = procedure(&guard.bootstrap.container);
        drop(guard);

        Some(output)
    }

    /// 关闭所有已启动的 manager，清空容器
    ///
    /// 单个 manager 关闭失败不影响其余 manager，失败会记录日志并返回。重复调用是安全的。
    pub fn release(&mut self) -> Vec<CloseFailure> {
        let mut managers = std::mem::take(&mut self.started);
        if self.config.release_order == ReleaseOrder::Reverse {
            managers.reverse();
        }

        let mut failures = Vec::new();
        for manager in &managers {
            let id = manager.identity();
            match manager.close(&self.container) {
                Ok(()) => debug!(manager = %id, "manager closed"),
                Err(error) => {
                    warn!(manager = %id, error = %error, "failed to close manager");
                    failures.push(CloseFailure { manager: id, error });
                }
            }
        }

        self.container.flush_all();
        self.state = BootState::Released;

        if !managers.is_empty() {
            info!(
                closed = managers.len() - failures.len(),
                failed = failures.len(),
                "released managers"
            );
        }
        failures
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    /// 已启动的 manager 标识，按启动顺序
    pub fn started(&self) -> Vec<Identity> {
        self.started.iter().map(|m| m.identity()).collect()
    }

    fn start_all<I>(&mut self, managers: I) -> Result<(), BootError>
    where
        I: IntoIterator<Item = Arc<dyn Manager>>,
    {
        for manager in managers {
            let id = manager.identity();

            match manager.start(&self.container) {
                Ok(()) => {}
                Err(e) if is_already_registered(&e) => {
                    debug!(manager = %id, "resource already registered, skipping");
                    continue;
                }
                Err(e) => return Err(self.abort(id, e)),
            }

            if self.config.eager {
                if let Err(e) = self.container.get_any(&id) {
                    return Err(self.abort(id, e.into()));
                }
            }

            info!(manager = %id, eager = self.config.eager, "manager started");
            self.started.push(manager);
        }
        Ok(())
    }

    fn abort(&mut self, manager: Identity, source: anyhow::Error) -> BootError {
        warn!(manager = %manager, error = %source, "boot failed, releasing started managers");
        self.release();
        BootError { manager, source }
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new(Container::new())
    }
}

/// 离开作用域时释放（包括 panic 展开），`armed` 置为 false 后不再释放
struct ReleaseOnDrop<'a> {
    bootstrap: &'a mut Bootstrap,
    armed: bool,
}

impl<'a> ReleaseOnDrop<'a> {
    fn new(bootstrap: &'a mut Bootstrap) -> Self {
        Self {
            bootstrap,
            armed: true,
        }
    }
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if std::thread::panicking() {
            warn!(state = ?self.bootstrap.state, "unwinding, releasing started managers");
        }
        self.bootstrap.release();
    }
}

fn is_already_registered(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<ContainerError>()
            .is_some_and(ContainerError::is_already_registered)
    })
}

/// 启动并运行应用
///
/// 启动失败以 `Err` 返回，供 `main` 决定退出进程。
pub fn launch<I, F, R>(mut bootstrap: Bootstrap, managers: I, procedure: F) -> anyhow::Result<Option<R>>
where
    I: IntoIterator<Item = Arc<dyn Manager>>,
    F: FnOnce(&Container) -> R,
{
    bootstrap.boot(managers)?;
    Ok(bootstrap.run(procedure))
}
