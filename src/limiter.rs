// src/limiter.rs - 固定窗口限流，计数表由调用方持有（不是进程级全局变量）

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_CAPACITY: usize = 10_000;

/// 时间源，测试里可以手动拨动
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// 每个 key 一个计数窗口；过期在读取时判断。
/// 表满时先清理过期项，仍然满则挤掉最早到期的那一项。
pub struct RateLimiter<K, C = SystemClock> {
    max_requests: u32,
    window: Duration,
    capacity: usize,
    windows: HashMap<K, Window>,
    clock: C,
}

impl<K: Eq + Hash + Clone> RateLimiter<K, SystemClock> {
    pub fn new(max_requests: u32, window: Duration, capacity: usize) -> Self {
        Self::with_clock(max_requests, window, capacity, SystemClock)
    }
}

impl<K: Eq + Hash + Clone> Default for RateLimiter<K, SystemClock> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, DEFAULT_CAPACITY)
    }
}

impl<K: Eq + Hash + Clone, C: Clock> RateLimiter<K, C> {
    pub fn with_clock(max_requests: u32, window: Duration, capacity: usize, clock: C) -> Self {
        Self {
            max_requests,
            window,
            capacity: capacity.max(1),
            windows: HashMap::new(),
            clock,
        }
    }

    /// 记一次请求并给出是否放行
    pub fn check(&mut self, key: &K) -> Decision {
        let now = self.clock.now();

        if let Some(w) = self.windows.get_mut(key) {
            if now < w.reset_at {
                if w.count >= self.max_requests {
                    return Decision::Limited {
                        retry_after: w.reset_at - now,
                    };
                }
                w.count += 1;
                return Decision::Allowed {
                    remaining: self.max_requests - w.count,
                };
            }
            // 窗口已过期，下面重新开一个
            self.windows.remove(key);
        }

        if self.windows.len() >= self.capacity {
            self.purge_expired();
        }
        if self.windows.len() >= self.capacity {
            let oldest = self
                .windows
                .iter()
                .min_by_key(|(_, w)| w.reset_at)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                self.windows.remove(&k);
            }
        }

        self.windows.insert(
            key.clone(),
            Window {
                count: 1,
                reset_at: now + self.window,
            },
        );
        Decision::Allowed {
            remaining: self.max_requests.saturating_sub(1),
        }
    }

    /// 删除所有已过期的窗口，返回删除数量
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, w| now < w.reset_at);
        before - self.windows.len()
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
