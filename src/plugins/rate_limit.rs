use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;

/// 进程内滑动窗口限流器，按客户端网络地址计数。
///
/// 每个 key 保留窗口内的命中时间戳；窗口外的记录在访问时淘汰，
/// 因此单 key 的内存占用上限是 `max` 条记录。每隔一个窗口长度
/// 顺带清扫整张表，闲置 key 的条目随之回收，表的规模只与窗口内
/// 活跃的客户端数量相关。
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    max: u32,
    window: Duration,
    state: Mutex<RateLimiterState>,
}

struct RateLimiterState {
    hits: HashMap<IpAddr, VecDeque<Instant>>,
    last_sweep: Instant,
}

/// 单次限流判定结果
#[derive(Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited {
        /// 窗口内最早一次命中滑出窗口所需的时间
        retry_after: Duration,
    },
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                max,
                window,
                state: Mutex::new(RateLimiterState {
                    hits: HashMap::new(),
                    last_sweep: Instant::now(),
                }),
            }),
        }
    }

    /// 判定 `now` 时刻来自 `key` 的请求是否放行，顺带淘汰窗口外的记录。
    pub fn check(&self, key: IpAddr, now: Instant) -> RateDecision {
        let window = self.inner.window;
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // 整表清扫：最新命中也已滑出窗口的 key 整条移除
        if now.duration_since(state.last_sweep) >= window {
            state
                .hits
                .retain(|_, queue| {
                    queue
                        .back()
                        .is_some_and(|&newest| now.duration_since(newest) < window)
                });
            state.last_sweep = now;
        }

        let queue = state.hits.entry(key).or_default();
        while let Some(&oldest) = queue.front() {
            if now.duration_since(oldest) >= window {
                queue.pop_front();
            } else {
                break;
            }
        }

        if (queue.len() as u32) < self.inner.max {
            queue.push_back(now);
            RateDecision::Allowed
        } else {
            let retry_after = queue
                .front()
                .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(window);
            RateDecision::Limited { retry_after }
        }
    }

    /// 当前被追踪的 key 数量。
    pub fn tracked_keys(&self) -> usize {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .hits
            .len()
    }
}

/// 限流中间件：超限请求折返为 429 故障，由统一错误分类器出响应。
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(key, Instant::now()) {
        RateDecision::Allowed => Ok(next.run(req).await),
        RateDecision::Limited { retry_after } => Err(ApiError::RateLimited {
            retry_after_secs: retry_after.as_secs().max(1),
        }),
    }
}
