//! 可注入的调用
//!
//! Rust 没有运行时反射，参数列表在编译期通过 `Injectable<Args>` 描述：
//! 任何 `Fn(Arc<A1>, ..., Arc<An>) -> R`（0 <= n <= 8）都实现了该 trait。
//! 容器根据 `parameters()` 给出的类型描述逐个解析参数，再交给 `inject` 调用。

use super::Identity;
use crate::errors::ContainerError;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// 类型擦除后的实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 运行时类型描述，只在注册和解析的边界使用
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 已解析的参数：实例及其来源标识
#[derive(Clone)]
pub struct Resolved {
    id: Identity,
    type_name: &'static str,
    instance: Instance,
}

impl Resolved {
    pub(crate) fn new(id: Identity, type_name: &'static str, instance: Instance) -> Self {
        Self {
            id,
            type_name,
            instance,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.id
    }

    pub fn into_instance(self) -> Instance {
        self.instance
    }

    /// 向下转型为具体类型
    pub fn downcast<T: Send + Sync + 'static>(self) -> Result<Arc<T>, ContainerError> {
        let Resolved {
            id,
            type_name,
            instance,
        } = self;

        instance
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                id,
                expected: std::any::type_name::<T>(),
                actual: type_name,
            })
    }
}

/// 参数可以由容器解析的调用
pub trait Injectable<Args> {
    type Output;

    /// 声明的参数类型，按位置排列
    fn parameters() -> Vec<TypeDescriptor>;

    /// 以已解析的参数调用
    fn inject(&self, args: Vec<Resolved>) -> Result<Self::Output, ContainerError>;
}

macro_rules! impl_injectable {
    ($($arg:ident),*) => {
        impl<Func, Ret, $($arg,)*> Injectable<($($arg,)*)> for Func
        where
            Func: Fn($(Arc<$arg>),*) -> Ret,
            $($arg: Send + Sync + 'static,)*
        {
            type Output = Ret;

            fn parameters() -> Vec<TypeDescriptor> {
                vec![$(TypeDescriptor::of::<$arg>()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn inject(&self, args: Vec<Resolved>) -> Result<Ret, ContainerError> {
                let expected = <[&str]>::len(&[$(stringify!($arg)),*]);
                let actual = args.len();
                if actual != expected {
                    return Err(ContainerError::ArityMismatch { expected, actual });
                }

                let mut args = args.into_iter();
                $(
                    let $arg = args
                        .next()
                        .ok_or(ContainerError::ArityMismatch { expected, actual })?
                        .downcast::<$arg>()?;
                )*
                Ok((self)($($arg),*))
            }
        }
    };
}

impl_injectable!();
impl_injectable!(A1);
impl_injectable!(A1, A2);
impl_injectable!(A1, A2, A3);
impl_injectable!(A1, A2, A3, A4);
impl_injectable!(A1, A2, A3, A4, A5);
impl_injectable!(A1, A2, A3, A4, A5, A6);
impl_injectable!(A1, A2, A3, A4, A5, A6, A7);
impl_injectable!(A1, A2, A3, A4, A5, A6, A7, A8);
