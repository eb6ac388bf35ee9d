//! 三态熔断器
//!
//! 状态转换只取决于调用结果和经过的时间。检查与转换在同一把锁内完成，
//! 半开状态下同一时间只放行一个探测调用。探测许可由 [`BreakerPermit`]
//! 持有，许可在未上报结果时被丢弃会归还探测名额。

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::translation::config::{constants, TranslationConfig};

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        write!(f, "{}", name)
    }
}

/// 放行许可类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// 闭合状态下的普通调用
    Normal,
    /// 半开状态下的探测调用
    Probe,
}

/// 熔断器状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// 熔断器
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(
            constants::DEFAULT_FAILURE_THRESHOLD,
            constants::DEFAULT_RESET_TIMEOUT,
        )
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(config.failure_threshold, config.reset_timeout())
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // 持锁期间不会 panic，中毒时数据仍然一致
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure: inner.last_failure,
        }
    }

    /// 申请调用许可，许可在结果上报前一直占用探测名额
    pub fn acquire(self: &Arc<Self>) -> Option<BreakerPermit> {
        self.acquire_at(Instant::now())
    }

    pub fn acquire_at(self: &Arc<Self>, now: Instant) -> Option<BreakerPermit> {
        let kind = self.try_acquire_at(now)?;
        Some(BreakerPermit {
            breaker: Arc::clone(self),
            kind,
            reported: false,
        })
    }

    /// 在给定时刻检查并转换状态
    pub fn try_acquire_at(&self, now: Instant) -> Option<Permit> {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => Some(Permit::Normal),
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map(|at| now.saturating_duration_since(at) > self.reset_timeout)
                    .unwrap_or(true);

                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!("熔断器进入半开状态，放行一次探测调用");
                    Some(Permit::Probe)
                } else {
                    None
                }
            }
            // 探测结果上报或许可归还之前不再放行
            CircuitState::HalfOpen if inner.probe_in_flight => None,
            CircuitState::HalfOpen => {
                inner.probe_in_flight = true;
                Some(Permit::Probe)
            }
        }
    }

    /// 记录成功：回到闭合状态并清零失败计数
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!("熔断器恢复闭合 (之前: {})", inner.state);
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    /// 记录失败。半开状态下的失败直接重新打开
    pub fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure = Some(now);
        inner.probe_in_flight = false;

        let should_open = inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.failure_threshold;

        if should_open && inner.state != CircuitState::Open {
            tracing::warn!(
                "熔断器打开: 连续失败 {} 次",
                inner.consecutive_failures
            );
        }
        if should_open {
            inner.state = CircuitState::Open;
        }
    }

    /// 释放未完成的探测许可，不改变失败计数
    pub fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }
}

/// 熔断器调用许可
///
/// 通过 [`success`](Self::success) 或 [`failure`](Self::failure) 上报结果。
/// 未上报就被丢弃的探测许可会归还名额，状态保持半开。
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    kind: Permit,
    reported: bool,
}

impl BreakerPermit {
    pub fn kind(&self) -> Permit {
        self.kind
    }

    pub fn success(mut self) {
        self.reported = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.reported = true;
        self.breaker.record_failure();
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.reported && self.kind == Permit::Probe {
            tracing::debug!("探测许可未上报结果，归还名额");
            self.breaker.release_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(5, Duration::from_secs(60))
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = breaker();
        let start = Instant::now();

        for _ in 0..4 {
            breaker.record_failure_at(start);
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire_at(start).is_some());

        breaker.record_failure_at(start);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.consecutive_failures(), 5);
        assert!(breaker.try_acquire_at(start + Duration::from_secs(30)).is_none());
    }

    #[test]
    fn test_half_open_after_reset_timeout() {
        let breaker = breaker();
        let start = Instant::now();
        for _ in 0..5 {
            breaker.record_failure_at(start);
        }

        // 恰好等于冷却时间仍然拒绝
        assert!(breaker.try_acquire_at(start + Duration::from_secs(60)).is_none());

        let later = start + Duration::from_secs(61);
        assert_eq!(breaker.try_acquire_at(later), Some(Permit::Probe));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // 探测进行中，其他调用被拒绝
        assert!(breaker.try_acquire_at(later).is_none());
    }

    #[test]
    fn test_success_from_half_open_closes() {
        let breaker = breaker();
        let start = Instant::now();
        for _ in 0..5 {
            breaker.record_failure_at(start);
        }
        breaker.try_acquire_at(start + Duration::from_secs(61));
        breaker.record_success();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.try_acquire_at(Instant::now()), Some(Permit::Normal));
    }

    #[test]
    fn test_failure_from_half_open_reopens() {
        let breaker = breaker();
        let start = Instant::now();
        for _ in 0..5 {
            breaker.record_failure_at(start);
        }
        let probe_time = start + Duration::from_secs(61);
        breaker.try_acquire_at(probe_time);
        breaker.record_failure_at(probe_time);

        assert_eq!(breaker.state(), CircuitState::Open);
        // 失败计时器已重置
        assert!(breaker.try_acquire_at(probe_time + Duration::from_secs(30)).is_none());
        assert!(breaker.try_acquire_at(probe_time + Duration::from_secs(61)).is_some());
    }

    #[test]
    fn test_released_probe_can_be_retaken() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        let start = Instant::now();
        breaker.record_failure_at(start);

        let later = start + Duration::from_secs(61);
        assert!(breaker.try_acquire_at(later).is_some());
        breaker.release_probe();
        assert_eq!(breaker.try_acquire_at(later), Some(Permit::Probe));
    }

    #[test]
    fn test_half_open_permit_blocks_until_dropped() {
        let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(60)));
        let start = Instant::now();
        breaker.record_failure_at(start);

        let probe = breaker.acquire_at(start + Duration::from_secs(61)).unwrap();
        assert_eq!(probe.kind(), Permit::Probe);

        // 探测可能持续数分钟，期间不放行第二个探测
        assert!(breaker.acquire_at(start + Duration::from_secs(125)).is_none());
        assert!(breaker.acquire_at(start + Duration::from_secs(600)).is_none());

        drop(probe);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.acquire_at(start + Duration::from_secs(601)).is_some());
    }

    #[test]
    fn test_permit_reports_outcome() {
        let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(60)));
        let start = Instant::now();
        breaker.record_failure_at(start);

        breaker.acquire_at(start + Duration::from_secs(61)).unwrap().success();
        assert_eq!(breaker.state(), CircuitState::Closed);

        let normal = breaker.acquire().unwrap();
        assert_eq!(normal.kind(), Permit::Normal);
        normal.failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.acquire().is_none());
    }

    #[test]
    fn test_success_resets_counter_while_closed() {
        let breaker = breaker();
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
