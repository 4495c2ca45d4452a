//! 依赖注入容器实现
//!
//! 以字符串标识符为键的注册表，值分为三类：
//! - 普通参数：原样返回
//! - 共享服务：首次访问时执行定义，结果缓存，条目随之冻结
//! - 工厂服务：每次访问都重新执行定义
//!
//! 所有操作都在同一把可重入锁内完成，服务定义可以在同一线程内再次访问容器。

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use log::{debug, trace, warn};
use parking_lot::ReentrantMutex;

use super::stats::{ContainerStats, InnerStats};
use super::value::{Invocable, Value};
use super::ServiceLifetime;
use crate::errors::{ContainerError, Result};

/// 单个条目
struct Slot {
    value: Value,
    /// 非可调用值为 None
    lifetime: Option<ServiceLifetime>,
    resolved: bool,
    /// 解析前的原始定义，供 `raw` 使用
    original: Option<Invocable>,
}

impl Slot {
    fn new(value: Value) -> Self {
        let lifetime = value.as_invocable().map(Invocable::lifetime);
        Self {
            value,
            lifetime,
            resolved: false,
            original: None,
        }
    }

    /// 已冻结但定义仍在执行
    fn is_resolving(&self) -> bool {
        self.resolved
            && match (&self.value, &self.original) {
                (Value::Callable(current), Some(original)) => current.ptr_eq(original),
                _ => false,
            }
    }
}

/// 共享服务解析失败（返回错误或 panic）时撤销冻结，成功后需调用 `disarm`
struct FreezeRollback<'a> {
    slots: &'a RefCell<Slots>,
    id: &'a str,
    definition: &'a Invocable,
    armed: bool,
}

impl FreezeRollback<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FreezeRollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.slots.borrow_mut();
        if let Some(slot) = slots.resolving(self.id, self.definition) {
            warn!("Service `{}` failed to resolve, unfreezing", self.id);
            slot.resolved = false;
            slot.original = None;
        }
    }
}

/// 条目表，`order` 保留首次插入顺序
#[derive(Default)]
struct Slots {
    entries: HashMap<String, Slot>,
    order: Vec<String>,
}

impl Slots {
    fn insert(&mut self, id: &str, value: Value) -> Option<Slot> {
        let previous = self.entries.insert(id.to_string(), Slot::new(value));
        if previous.is_none() {
            self.order.push(id.to_string());
        }
        previous
    }

    fn remove(&mut self, id: &str) -> Option<Slot> {
        let slot = self.entries.remove(id)?;
        self.order.retain(|key| key != id);
        Some(slot)
    }

    fn get(&self, id: &str) -> Result<&Slot> {
        self.entries
            .get(id)
            .ok_or_else(|| ContainerError::UndefinedIdentifier(id.to_string()))
    }

    /// 仍在用 `definition` 解析的条目；执行期间条目可能已被移除或替换
    fn resolving(&mut self, id: &str, definition: &Invocable) -> Option<&mut Slot> {
        self.entries.get_mut(id).filter(|slot| {
            slot.is_resolving() && slot.original.as_ref().is_some_and(|o| o.ptr_eq(definition))
        })
    }
}

/// `get` 在锁内决定的下一步
enum Step {
    Ready(Value),
    Fresh(Invocable),
    Resolve(Invocable),
}

struct Inner {
    slots: ReentrantMutex<RefCell<Slots>>,
    stats: InnerStats,
}

/// 依赖注入容器
///
/// 克隆得到的是同一个容器的另一个句柄。
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// 创建空容器
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: ReentrantMutex::new(RefCell::new(Slots::default())),
                stats: InnerStats::default(),
            }),
        }
    }

    /// 用初始映射创建容器
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let container = Self::new();
        {
            let guard = container.inner.slots.lock();
            let mut slots = guard.borrow_mut();
            for (id, value) in values {
                slots.insert(id.as_ref(), value.into());
            }
        }
        container
    }

    /// 注册或替换一个条目，已冻结的条目会被拒绝
    pub fn set(&self, id: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let guard = self.inner.slots.lock();
        let mut slots = guard.borrow_mut();
        if slots.entries.get(id).is_some_and(|slot| slot.resolved) {
            return Err(ContainerError::FrozenService(id.to_string()));
        }
        debug!("Defining `{}` ({:?})", id, value);
        let previous = slots.insert(id, value);
        drop(slots);
        drop(previous);
        Ok(())
    }

    /// 取值。共享服务在首次访问时解析并冻结，工厂服务每次重新执行。
    pub fn get(&self, id: &str) -> Result<Value> {
        let guard = self.inner.slots.lock();
        self.inner.stats.record_lookup();

        let step = {
            let mut slots = guard.borrow_mut();
            let slot = slots
                .entries
                .get_mut(id)
                .ok_or_else(|| ContainerError::UndefinedIdentifier(id.to_string()))?;
            match (&slot.value, slot.lifetime) {
                _ if slot.is_resolving() => Step::Ready(slot.value.clone()),
                _ if slot.resolved => {
                    self.inner.stats.record_cache_hit();
                    trace!("Cache hit for `{}`", id);
                    Step::Ready(slot.value.clone())
                }
                (Value::Callable(definition), Some(ServiceLifetime::Factory)) => {
                    Step::Fresh(definition.clone())
                }
                (Value::Callable(definition), Some(ServiceLifetime::Shared)) => {
                    let definition = definition.clone();
                    slot.resolved = true;
                    slot.original = Some(definition.clone());
                    Step::Resolve(definition)
                }
                _ => Step::Ready(slot.value.clone()),
            }
        };

        match step {
            Step::Ready(value) => Ok(value),
            Step::Fresh(definition) => {
                self.inner.stats.record_factory_invocation();
                trace!("Invoking factory `{}`", id);
                definition.invoke(self)
            }
            Step::Resolve(definition) => {
                debug!("Resolving shared service `{}`", id);
                let mut rollback = FreezeRollback {
                    slots: &*guard,
                    id,
                    definition: &definition,
                    armed: true,
                };
                let value = definition.invoke(self)?;
                rollback.disarm();

                self.inner.stats.record_service_resolution();
                if let Some(slot) = guard.borrow_mut().resolving(id, &definition) {
                    slot.value = value.clone();
                }
                Ok(value)
            }
        }
    }

    /// 取值并转换为具体类型
    pub fn get_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        self.get(id)?
            .downcast::<T>()
            .ok_or_else(|| ContainerError::TypeMismatch {
                id: id.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn has(&self, id: &str) -> bool {
        let guard = self.inner.slots.lock();
        let slots = guard.borrow();
        slots.entries.contains_key(id)
    }

    /// 移除条目，不存在时什么也不做
    pub fn unset(&self, id: &str) {
        let guard = self.inner.slots.lock();
        let removed = guard.borrow_mut().remove(id);
        if removed.is_some() {
            debug!("Removed `{}`", id);
        }
    }

    /// 标记为受保护：存入后原样返回，不会被调用
    pub fn protect(&self, callable: impl Into<Value>) -> Result<Invocable> {
        Self::assert_invocable(callable.into(), "Callable")
            .map(|inv| inv.with_lifetime(ServiceLifetime::Protected))
    }

    /// 标记为工厂：每次访问都重新执行
    pub fn factory(&self, definition: impl Into<Value>) -> Result<Invocable> {
        Self::assert_invocable(definition.into(), "Service definition")
            .map(|inv| inv.with_lifetime(ServiceLifetime::Factory))
    }

    /// 显式标记共享，所有定义默认即为共享
    pub fn share(&self, definition: Invocable) -> Invocable {
        definition
    }

    /// 组合已有定义与扩展，返回新的定义。
    ///
    /// 条目本身不会被修改，调用方需要再 `set` 回去；
    /// 原定义若为工厂，返回的定义同样是工厂。
    pub fn extend(&self, id: &str, extender: impl Into<Value>) -> Result<Invocable> {
        let extender = extender.into();
        let service = {
            let guard = self.inner.slots.lock();
            let slots = guard.borrow();
            let value = slots.get(id)?.value.clone();
            Self::assert_invocable(value, &format!("Identifier `{id}`"))?
        };
        let extender = Self::assert_invocable(extender, "Extension service definition")?;

        let lifetime = match service.lifetime() {
            ServiceLifetime::Factory => ServiceLifetime::Factory,
            _ => ServiceLifetime::Shared,
        };
        debug!("Extending `{}` as {:?}", id, lifetime);

        let extended = Invocable::new(move |container| {
            let previous = service.invoke(container)?;
            extender.apply(previous, container)
        });
        Ok(extended.with_lifetime(lifetime))
    }

    /// 读取原始定义，不触发解析
    pub fn raw(&self, id: &str) -> Result<Value> {
        let guard = self.inner.slots.lock();
        let slots = guard.borrow();
        let slot = slots.get(id)?;
        Ok(match &slot.original {
            Some(original) if slot.resolved => Value::Callable(original.clone()),
            _ => slot.value.clone(),
        })
    }

    /// 按首次插入顺序返回所有标识符
    pub fn keys(&self) -> Vec<String> {
        let guard = self.inner.slots.lock();
        let slots = guard.borrow();
        slots.order.clone()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.slots.lock();
        let slots = guard.borrow();
        slots.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 获取容器统计信息
    pub fn stats(&self) -> ContainerStats {
        self.inner.stats.snapshot()
    }

    /// 获取弱引用句柄，用于在容器内保存容器自身
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// 两个句柄是否指向同一个容器
    pub fn ptr_eq(a: &Container, b: &Container) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    fn assert_invocable(value: Value, context: &str) -> Result<Invocable> {
        match value {
            Value::Callable(inv) => Ok(inv),
            _ => Err(ContainerError::InvalidDefinition(context.to_string())),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        Container::ptr_eq(self, other)
    }
}

impl Eq for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container").field("keys", &self.keys()).finish()
    }
}

/// 容器的弱引用句柄
///
/// 把 `Container` 本身存入容器会形成引用环，容器永远不会被释放；
/// 需要自引用时存入 `WeakContainer`，读取时再 `upgrade`。
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<Inner>,
}

impl WeakContainer {
    /// 容器已释放时返回 None
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContainer")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Container
where
    K: AsRef<str>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::with_values(iter)
    }
}
