//! 资源定义：标识 + 构建器

use super::injectable::{Injectable, Instance, Resolved, TypeDescriptor};
use super::Identity;
use crate::errors::{BoxError, ContainerError};
use std::fmt;
use std::sync::Arc;

type BuildFn = dyn Fn(&Identity, Vec<Resolved>) -> Result<Instance, ContainerError> + Send + Sync;

/// 标识与构建器的组合
///
/// 构建器的参数就是它的依赖：默认按参数类型从类型索引解析，
/// 通过 [`Definition::with_dependencies`] 给出标识列表时按位置改用显式标识。
#[derive(Clone)]
pub struct Definition {
    identity: Identity,
    produces: TypeDescriptor,
    parameters: Vec<TypeDescriptor>,
    dependencies: Vec<Identity>,
    build: Arc<BuildFn>,
}

impl Definition {
    /// 由只返回资源本身的构建器创建定义
    pub fn new<F, Args>(identity: impl Into<Identity>, builder: F) -> Self
    where
        F: Injectable<Args> + Send + Sync + 'static,
        F::Output: Send + Sync + 'static,
        Args: 'static,
    {
        let build = move |_: &Identity, args: Vec<Resolved>| -> Result<Instance, ContainerError> {
            let value = builder.inject(args)?;
            Ok(Arc::new(value) as Instance)
        };

        Self {
            identity: identity.into(),
            produces: TypeDescriptor::of::<F::Output>(),
            parameters: F::parameters(),
            dependencies: Vec::new(),
            build: Arc::new(build),
        }
    }

    /// 由返回 `Result<T, E>` 的构建器创建定义，产出类型为 `T`
    pub fn fallible<F, Args, T, E>(identity: impl Into<Identity>, builder: F) -> Self
    where
        F: Injectable<Args, Output = Result<T, E>> + Send + Sync + 'static,
        T: Send + Sync + 'static,
        E: Into<BoxError> + 'static,
        Args: 'static,
    {
        let build = move |id: &Identity, args: Vec<Resolved>| -> Result<Instance, ContainerError> {
            let value = builder
                .inject(args)?
                .map_err(|e| ContainerError::BuildFailed {
                    id: id.clone(),
                    source: e.into(),
                })?;
            Ok(Arc::new(value) as Instance)
        };

        Self {
            identity: identity.into(),
            produces: TypeDescriptor::of::<T>(),
            parameters: F::parameters(),
            dependencies: Vec::new(),
            build: Arc::new(build),
        }
    }

    /// 按位置指定依赖的标识，取代按类型推断
    pub fn with_dependencies<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Identity>,
    {
        self.dependencies = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn produces(&self) -> TypeDescriptor {
        self.produces
    }

    pub fn parameters(&self) -> &[TypeDescriptor] {
        &self.parameters
    }

    pub fn dependencies(&self) -> &[Identity] {
        &self.dependencies
    }

    pub(crate) fn build(&self, args: Vec<Resolved>) -> Result<Instance, ContainerError> {
        (self.build)(&self.identity, args)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("identity", &self.identity)
            .field("produces", &self.produces)
            .field("parameters", &self.parameters)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Pool {
        size: usize,
    }

    #[test]
    fn test_definition_records_types() {
        let def = Definition::new("pool", |size: Arc<usize>| Pool { size: *size })
            .with_dependencies(["pool.size"]);

        assert_eq!(def.identity().as_str(), "pool");
        assert_eq!(def.produces(), TypeDescriptor::of::<Pool>());
        assert_eq!(def.parameters(), &[TypeDescriptor::of::<usize>()]);
        assert_eq!(def.dependencies(), &[Identity::from("pool.size")]);
    }

    #[test]
    fn test_fallible_definition_produces_ok_type() {
        let def = Definition::fallible("pool", || -> Result<Pool, std::io::Error> {
            Err(std::io::Error::other("no sockets left"))
        });

        assert_eq!(def.produces(), TypeDescriptor::of::<Pool>());

        let err = def.build(Vec::new()).unwrap_err();
        assert!(matches!(err, ContainerError::BuildFailed { ref id, .. } if id.as_str() == "pool"));
        assert!(err.to_string().contains("no sockets left"));
    }

    #[test]
    fn test_build_produces_instance() {
        let def = Definition::new("pool", || Pool { size: 4 });
        let instance = def.build(Vec::new()).unwrap();
        let pool = instance.downcast::<Pool>().unwrap();

        assert_eq!(pool.size, 4);
    }
}
