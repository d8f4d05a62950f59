//! `chartforge-limiter`: per-class token buckets gating advisor calls.

pub mod rate_limiter;

pub use rate_limiter::{
    AcquirePolicy, Admission, BucketConfig, LimiterConfig, LimiterError, QuotaClass, RateLimiter,
};
