pub mod config;
pub mod ctx;
pub mod ops;

use ctx::LogCtx;

pub fn feed() -> LogCtx<ops::feed::Feed> { LogCtx::new() }
pub fn browse() -> LogCtx<ops::browse::Browse> { LogCtx::new() }
pub fn normalize() -> LogCtx<ops::browse::Normalize> { LogCtx::new() }
