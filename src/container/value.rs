//! 容器中存储的值与可调用定义
//!
//! - [`Value`]：参数、已解析的服务实例或可调用定义
//! - [`Invocable`]：带生命周期标记的调用句柄，克隆开销很小
//! - [`ServiceProvider`] / [`ServiceExtender`]：两种调用形态，闭包自动实现

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::{Container, ServiceLifetime, WeakContainer};
use crate::errors::Result;

/// 服务定义：以容器为唯一参数
pub trait ServiceProvider: Send + Sync {
    /// 创建服务实例
    fn create(&self, container: &Container) -> Result<Value>;
}

impl<F> ServiceProvider for F
where
    F: Fn(&Container) -> Result<Value> + Send + Sync,
{
    fn create(&self, container: &Container) -> Result<Value> {
        self(container)
    }
}

/// 服务扩展：接收上一个定义的结果和容器
pub trait ServiceExtender: Send + Sync {
    /// 基于已有实例生成新的实例
    fn extend(&self, previous: Value, container: &Container) -> Result<Value>;
}

impl<F> ServiceExtender for F
where
    F: Fn(Value, &Container) -> Result<Value> + Send + Sync,
{
    fn extend(&self, previous: Value, container: &Container) -> Result<Value> {
        self(previous, container)
    }
}

#[derive(Clone)]
enum Body {
    Definition(Arc<dyn ServiceProvider>),
    Extension(Arc<dyn ServiceExtender>),
}

impl Body {
    fn addr(&self) -> *const () {
        match self {
            Body::Definition(p) => Arc::as_ptr(p) as *const (),
            Body::Extension(e) => Arc::as_ptr(e) as *const (),
        }
    }
}

/// 可调用定义
///
/// `protect` / `factory` 返回的是指向同一调用体、但生命周期标记不同的新句柄，
/// 标记随 `set` 记录到条目上。
#[derive(Clone)]
pub struct Invocable {
    body: Body,
    lifetime: ServiceLifetime,
}

impl Invocable {
    /// 从闭包创建服务定义（默认共享）
    pub fn new<F>(definition: F) -> Self
    where
        F: Fn(&Container) -> Result<Value> + Send + Sync + 'static,
    {
        Self::from_provider(definition)
    }

    /// 从闭包创建扩展定义
    pub fn extension<F>(extender: F) -> Self
    where
        F: Fn(Value, &Container) -> Result<Value> + Send + Sync + 'static,
    {
        Self::from_extender(extender)
    }

    /// 从实现了 [`ServiceProvider`] 的对象创建
    pub fn from_provider<P: ServiceProvider + 'static>(provider: P) -> Self {
        Self {
            body: Body::Definition(Arc::new(provider)),
            lifetime: ServiceLifetime::Shared,
        }
    }

    /// 从实现了 [`ServiceExtender`] 的对象创建
    pub fn from_extender<E: ServiceExtender + 'static>(extender: E) -> Self {
        Self {
            body: Body::Extension(Arc::new(extender)),
            lifetime: ServiceLifetime::Shared,
        }
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    pub(crate) fn with_lifetime(mut self, lifetime: ServiceLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// 作为服务定义调用。扩展定义收到 `Value::Null` 作为上一个结果。
    pub fn invoke(&self, container: &Container) -> Result<Value> {
        match &self.body {
            Body::Definition(p) => p.create(container),
            Body::Extension(e) => e.extend(Value::Null, container),
        }
    }

    /// 作为扩展调用。普通定义忽略 `previous`。
    pub fn apply(&self, previous: Value, container: &Container) -> Result<Value> {
        match &self.body {
            Body::Definition(p) => p.create(container),
            Body::Extension(e) => e.extend(previous, container),
        }
    }

    /// 是否指向同一个调用体（忽略生命周期标记）
    pub fn ptr_eq(&self, other: &Invocable) -> bool {
        self.body.addr() == other.body.addr()
    }
}

impl fmt::Debug for Invocable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.body {
            Body::Definition(_) => "definition",
            Body::Extension(_) => "extension",
        };
        f.debug_struct("Invocable")
            .field("shape", &shape)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// 容器中的值
#[derive(Clone)]
pub enum Value {
    /// 显式的空值，`has` 仍然返回 true
    Null,
    /// 普通参数或已解析的服务实例
    Instance(Arc<dyn Any + Send + Sync>),
    /// 可调用定义
    Callable(Invocable),
}

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Value::Instance(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_invocable(&self) -> bool {
        matches!(self, Value::Callable(_))
    }

    pub fn as_invocable(&self) -> Option<&Invocable> {
        match self {
            Value::Callable(inv) => Some(inv),
            _ => None,
        }
    }

    /// 取出共享实例
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Value::Instance(any) => any.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Instance(any) => any.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// 同一性比较：同一个实例或同一个调用体
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Instance(a), Value::Instance(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Instance(_) => f.write_str("Instance(..)"),
            Value::Callable(inv) => f.debug_tuple("Callable").field(inv).finish(),
        }
    }
}

impl From<Invocable> for Value {
    fn from(inv: Invocable) -> Self {
        Value::Callable(inv)
    }
}

/// 注意：把容器存入它自己会形成引用环，容器及其中的服务都不会被释放。
/// 自引用请使用 [`Container::downgrade`]。
impl From<Container> for Value {
    fn from(container: Container) -> Self {
        Value::new(container)
    }
}

impl From<WeakContainer> for Value {
    fn from(container: WeakContainer) -> Self {
        Value::new(container)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::new(s.to_string())
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::new(v)
                }
            }
        )*
    };
}

impl_from_scalar!(String, bool, i32, i64, u32, u64, usize, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversions() {
        let v = Value::from("value");
        assert_eq!(v.downcast_ref::<String>().map(String::as_str), Some("value"));

        let v = Value::from(42i64);
        assert_eq!(v.downcast::<i64>().as_deref(), Some(&42));
        assert!(v.downcast::<i32>().is_none());

        assert!(Value::from(()).is_null());
    }

    #[test]
    fn test_ptr_eq_tracks_identity() {
        let a = Value::new(String::from("same"));
        let b = a.clone();
        let c = Value::new(String::from("same"));

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(Value::Null.ptr_eq(&Value::Null));
        assert!(!a.ptr_eq(&Value::Null));
    }

    #[test]
    fn test_relabelled_invocable_keeps_body() {
        let inv = Invocable::new(|_| Ok(Value::from(1i32)));
        let factory = inv.clone().with_lifetime(ServiceLifetime::Factory);

        assert!(inv.ptr_eq(&factory));
        assert_eq!(inv.lifetime(), ServiceLifetime::Shared);
        assert_eq!(factory.lifetime(), ServiceLifetime::Factory);
        assert!(Value::from(inv).is_invocable());
    }

    #[test]
    fn test_call_shapes() {
        let container = Container::new();

        let ext = Invocable::extension(|prev, _| Ok(Value::from(prev.is_null())));
        let as_definition = ext.invoke(&container).unwrap();
        assert_eq!(as_definition.downcast_ref::<bool>(), Some(&true));

        let def = Invocable::new(|_| Ok(Value::from("fresh")));
        let as_extension = def.apply(Value::from(1i32), &container).unwrap();
        assert_eq!(as_extension.downcast_ref::<String>().map(String::as_str), Some("fresh"));
    }
}
