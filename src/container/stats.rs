//! 容器统计信息

use std::sync::atomic::{AtomicU64, Ordering};

/// 内部统计计数器（原子）
#[derive(Debug, Default)]
pub(crate) struct InnerStats {
    total_resolutions: AtomicU64,
    cache_hits: AtomicU64,
    service_resolutions: AtomicU64,
    factory_invocations: AtomicU64,
}

impl InnerStats {
    pub(crate) fn record_lookup(&self) {
        self.total_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_service_resolution(&self) {
        self.service_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_factory_invocation(&self) {
        self.factory_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ContainerStats {
        ContainerStats {
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            service_resolutions: self.service_resolutions.load(Ordering::Relaxed),
            factory_invocations: self.factory_invocations.load(Ordering::Relaxed),
        }
    }
}

/// 容器统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// `get` 调用总次数
    pub total_resolutions: u64,
    /// 读取已解析共享服务的次数
    pub cache_hits: u64,
    /// 共享服务定义被执行的次数
    pub service_resolutions: u64,
    /// 工厂定义被执行的次数
    pub factory_invocations: u64,
}

impl ContainerStats {
    /// 共享服务的缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.service_resolutions;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = InnerStats::default();
        assert_eq!(stats.snapshot().hit_rate(), 0.0);

        stats.record_service_resolution();
        for _ in 0..3 {
            stats.record_cache_hit();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hits, 3);
        assert!((snapshot.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
