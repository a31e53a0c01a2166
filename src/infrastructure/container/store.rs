//! 懒加载单例容器
//!
//! 解决以下问题：
//! - 注册不触发构建，第一次 `get` 时才构建并缓存
//! - 按类型解析依赖时，同一类型的第一个注册者为默认实例
//! - 同一标识的并发首次访问只构建一次（每个标识独立的构建锁）

use super::definition::Definition;
use super::injectable::{Injectable, Instance, Resolved, TypeDescriptor};
use super::Identity;
use crate::errors::{BoxError, ContainerError};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// 定义表和类型索引，二者总是在同一把锁下修改
#[derive(Default)]
struct Registry {
    definitions: HashMap<Identity, Arc<Definition>>,
    types: HashMap<TypeId, Vec<Identity>>,
}

impl Registry {
    fn remove_from_bucket(&mut self, type_id: TypeId, id: &Identity) {
        if let Some(bucket) = self.types.get_mut(&type_id) {
            bucket.retain(|existing| existing != id);
            if bucket.is_empty() {
                self.types.remove(&type_id);
            }
        }
    }
}

/// 单个标识的构建槽位
///
/// 已构建的实例无锁读取；`building` 是该标识独立的构建锁。
#[derive(Default)]
struct Slot {
    instance: OnceLock<Instance>,
    building: Mutex<()>,
}

/// 内部统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    builds: AtomicUsize,
}

struct Inner {
    registry: RwLock<Registry>,
    /// 只有在定义存在时才会出现对应槽位
    slots: DashMap<Identity, Arc<Slot>>,
    stats: InnerStats,
}

thread_local! {
    /// 当前线程正在构建的 (容器, 标识)
    static IN_FLIGHT: RefCell<Vec<(usize, Identity)>> = const { RefCell::new(Vec::new()) };
}

/// 在当前线程上标记某个标识正在构建，离开作用域时清除
struct BuildGuard {
    owner: usize,
    id: Identity,
}

impl BuildGuard {
    fn enter(owner: usize, id: &Identity) -> Result<Self, ContainerError> {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|(o, existing)| *o == owner && existing == id) {
                return Err(ContainerError::Unresolvable {
                    id: id.clone(),
                    reason: "it is already being built on this thread (cyclic dependency)",
                });
            }
            stack.push((owner, id.clone()));
            Ok(BuildGuard {
                owner,
                id: id.clone(),
            })
        })
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack
                .iter()
                .rposition(|(o, existing)| *o == self.owner && *existing == self.id)
            {
                stack.remove(pos);
            }
        });
    }
}

/// 依赖注入容器
///
/// 克隆得到的是同一个容器的句柄。容器需要显式传递给使用方，没有全局实例。
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// 创建空容器
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry::default()),
                slots: DashMap::new(),
                stats: InnerStats::default(),
            }),
        }
    }

    /// 注册构建器，标识已存在时返回 `AlreadyRegistered`
    ///
    /// 注册不会调用构建器。
    pub fn register<F, Args>(&self, id: impl Into<Identity>, builder: F) -> Result<(), ContainerError>
    where
        F: Injectable<Args> + Send + Sync + 'static,
        F::Output: Send + Sync + 'static,
        Args: 'static,
    {
        self.add(Definition::new(id, builder))
    }

    /// 注册返回 `Result<T, E>` 的构建器
    pub fn register_fallible<F, Args, T, E>(
        &self,
        id: impl Into<Identity>,
        builder: F,
    ) -> Result<(), ContainerError>
    where
        F: Injectable<Args, Output = Result<T, E>> + Send + Sync + 'static,
        T: Send + Sync + 'static,
        E: Into<BoxError> + 'static,
        Args: 'static,
    {
        self.add(Definition::fallible(id, builder))
    }

    /// 注册已准备好的定义
    pub fn add(&self, definition: Definition) -> Result<(), ContainerError> {
        self.insert(definition, false)
    }

    /// 覆盖注册，丢弃旧定义及其缓存实例
    pub fn replace(&self, definition: Definition) -> Result<(), ContainerError> {
        self.insert(definition, true)
    }

    fn insert(&self, definition: Definition, overwrite: bool) -> Result<(), ContainerError> {
        let mut registry = self.inner.registry.write();
        let id = definition.identity().clone();
        let produces = definition.produces();

        let previous = registry.definitions.get(&id).map(|d| d.produces().id());
        if let Some(previous_type) = previous {
            if !overwrite {
                return Err(ContainerError::AlreadyRegistered(id));
            }
            if previous_type != produces.id() {
                registry.remove_from_bucket(previous_type, &id);
            }
            self.inner.slots.remove(&id);
        }

        let bucket = registry.types.entry(produces.id()).or_default();
        if !bucket.contains(&id) {
            bucket.push(id.clone());
        }
        registry.definitions.insert(id.clone(), Arc::new(definition));

        debug!(
            identity = %id,
            produces = produces.name(),
            replaced = previous.is_some(),
            "registered definition"
        );
        Ok(())
    }

    /// 移除定义和缓存实例，标识不存在时什么也不做
    pub fn unregister(&self, id: impl Into<Identity>) {
        let id = id.into();
        let mut registry = self.inner.registry.write();

        if let Some(definition) = registry.definitions.remove(&id) {
            registry.remove_from_bucket(definition.produces().id(), &id);
            debug!(identity = %id, "unregistered definition");
        }
        self.inner.slots.remove(&id);
    }

    /// 清空所有定义、缓存实例和类型索引
    pub fn flush_all(&self) {
        let mut registry = self.inner.registry.write();
        let count = registry.definitions.len();

        registry.definitions.clear();
        registry.types.clear();
        self.inner.slots.clear();

        debug!(definitions = count, "flushed container");
    }

    /// 获取单例，首次访问时构建并缓存
    pub fn get<T: Send + Sync + 'static>(&self, id: impl Into<Identity>) -> Result<Arc<T>, ContainerError> {
        self.resolve(&id.into())?.downcast::<T>()
    }

    /// 获取类型擦除的单例
    pub fn get_any(&self, id: impl Into<Identity>) -> Result<Instance, ContainerError> {
        self.resolve(&id.into()).map(Resolved::into_instance)
    }

    /// 每次调用构建器创建新实例，不读取也不写入缓存
    pub fn create<T: Send + Sync + 'static>(&self, id: impl Into<Identity>) -> Result<Arc<T>, ContainerError> {
        let id = id.into();
        let definition = self.definition(&id)?;
        let instance = self.create_from(&definition)?;

        Resolved::new(id, definition.produces().name(), instance).downcast::<T>()
    }

    /// 类型擦除版本的 [`Container::create`]
    pub fn create_any(&self, id: impl Into<Identity>) -> Result<Instance, ContainerError> {
        let id = id.into();
        let definition = self.definition(&id)?;
        self.create_from(&definition)
    }

    /// 解析为该类型第一个注册的标识
    pub fn get_by_type<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        let id = self.first_of(TypeDescriptor::of::<T>())?;
        self.get::<T>(id)
    }

    /// 获取单例，任何错误都会 panic
    ///
    /// # Panics
    ///
    /// 标识未注册、构建失败或类型不匹配时 panic，只在调用方已确认标识存在时使用。
    pub fn must_get<T: Send + Sync + 'static>(&self, id: impl Into<Identity>) -> Arc<T> {
        match self.get::<T>(id) {
            Ok(value) => value,
            Err(e) => panic!("{}", e),
        }
    }

    /// 将解析到的值复制到 `target`
    ///
    /// 给出标识时使用第一个标识，否则按 `T` 的类型解析。
    pub fn assign<T>(&self, target: &mut T, ids: &[Identity]) -> Result<(), ContainerError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = match ids.first() {
            Some(id) => self.get::<T>(id)?,
            None => self.get_by_type::<T>()?,
        };

        *target = T::clone(&value);
        Ok(())
    }

    /// 以容器解析的参数调用 `function`
    ///
    /// `ids` 非空时按位置使用显式标识，其余参数按声明类型解析。
    pub fn invoke<F, Args>(&self, function: F, ids: &[Identity]) -> Result<F::Output, ContainerError>
    where
        F: Injectable<Args>,
    {
        let args = self.resolve_arguments(None, &F::parameters(), ids)?;
        function.inject(args)
    }

    /// 调用返回 `Result` 的函数，函数自身的错误原样返回
    pub fn try_invoke<F, Args, T, E>(&self, function: F, ids: &[Identity]) -> Result<T, E>
    where
        F: Injectable<Args, Output = Result<T, E>>,
        E: From<ContainerError>,
    {
        self.invoke(function, ids)?
    }

    /// 检查标识是否已注册
    pub fn contains(&self, id: &str) -> bool {
        self.inner.registry.read().definitions.contains_key(id)
    }

    /// 检查标识是否已构建并缓存
    pub fn is_built(&self, id: &str) -> bool {
        match self.inner.slots.get(id) {
            Some(slot) => slot.instance.get().is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.registry.read().definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有已注册的标识（排序后）
    pub fn identities(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self.inner.registry.read().definitions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 产出类型为 `T` 的标识，按注册顺序
    pub fn identities_of<T: 'static>(&self) -> Vec<Identity> {
        self.inner
            .registry
            .read()
            .types
            .get(&TypeId::of::<T>())
            .cloned()
            .unwrap_or_default()
    }

    /// 获取容器统计信息
    pub fn stats(&self) -> ContainerStats {
        let stats = &self.inner.stats;
        ContainerStats {
            total_resolutions: stats.total_resolutions.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: stats.cache_misses.load(Ordering::Relaxed),
            builds: stats.builds.load(Ordering::Relaxed),
        }
    }

    fn owner(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    fn definition(&self, id: &Identity) -> Result<Arc<Definition>, ContainerError> {
        self.inner
            .registry
            .read()
            .definitions
            .get(id)
            .cloned()
            .ok_or_else(|| ContainerError::NotRegistered(id.clone()))
    }

    fn first_of(&self, ty: TypeDescriptor) -> Result<Identity, ContainerError> {
        self.inner
            .registry
            .read()
            .types
            .get(&ty.id())
            .and_then(|bucket| bucket.first())
            .cloned()
            .ok_or(ContainerError::NoInstanceOfType(ty.name()))
    }

    fn resolve(&self, id: &Identity) -> Result<Resolved, ContainerError> {
        self.inner.stats.total_resolutions.fetch_add(1, Ordering::Relaxed);

        // 定义检查和槽位创建放在同一把读锁下，unregister 无法插在中间
        let (definition, slot) = {
            let registry = self.inner.registry.read();
            let definition = registry
                .definitions
                .get(id)
                .cloned()
                .ok_or_else(|| ContainerError::NotRegistered(id.clone()))?;
            let slot = Arc::clone(self.inner.slots.entry(id.clone()).or_default().value());
            (definition, slot)
        };
        let type_name = definition.produces().name();

        if let Some(instance) = slot.instance.get() {
            self.inner.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Resolved::new(id.clone(), type_name, Arc::clone(instance)));
        }

        let _guard = BuildGuard::enter(self.owner(), id)?;
        let _building = slot.building.lock();

        // 等锁期间可能已由其他线程构建完成
        if let Some(instance) = slot.instance.get() {
            self.inner.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Resolved::new(id.clone(), type_name, Arc::clone(instance)));
        }

        self.inner.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let instance = self.build(&definition)?;
        let _ = slot.instance.set(Arc::clone(&instance));

        Ok(Resolved::new(id.clone(), type_name, instance))
    }

    fn create_from(&self, definition: &Definition) -> Result<Instance, ContainerError> {
        let _guard = BuildGuard::enter(self.owner(), definition.identity())?;
        self.build(definition)
    }

    fn build(&self, definition: &Definition) -> Result<Instance, ContainerError> {
        let id = definition.identity();
        let args = self.resolve_arguments(Some(id), definition.parameters(), definition.dependencies())?;

        self.inner.stats.builds.fetch_add(1, Ordering::Relaxed);
        debug!(identity = %id, produces = definition.produces().name(), "building resource");

        definition.build(args)
    }

    fn resolve_arguments(
        &self,
        owner: Option<&Identity>,
        parameters: &[TypeDescriptor],
        ids: &[Identity],
    ) -> Result<Vec<Resolved>, ContainerError> {
        parameters
            .iter()
            .enumerate()
            .map(|(position, parameter)| {
                let (dependency, resolved) = match ids.get(position) {
                    Some(dep) => (dep.to_string(), self.resolve(dep)),
                    None => (
                        parameter.name().to_string(),
                        self.first_of(*parameter).and_then(|dep| self.resolve(&dep)),
                    ),
                };

                match owner {
                    Some(id) => resolved.map_err(|source| ContainerError::DependencyFailed {
                        id: id.clone(),
                        dependency,
                        source: Box::new(source),
                    }),
                    None => resolved,
                }
            })
            .collect()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStats {
    pub total_resolutions: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub builds: usize,
}

impl ContainerStats {
    /// 获取总解析次数
    pub fn total(&self) -> usize {
        self.total_resolutions
    }

    /// 获取缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total() as f64
        }
    }
}
