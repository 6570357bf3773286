/// Background task implementations
use crate::{context::AppContext, db, error::ApiResult};

/// Drop idle rate-limiter buckets, returning (evicted, remaining)
pub fn prune_rate_limiter(ctx: &AppContext) -> (usize, usize) {
    let evicted = ctx.rate_limiter.prune();
    (evicted, ctx.rate_limiter.tracked_addresses())
}

/// Health check - verify storage is reachable
pub async fn health_check(ctx: &AppContext) -> ApiResult<()> {
    db::test_connection(&ctx.db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SystemClock,
        config::ServerConfig,
        db::{create_memory_pool, run_migrations},
    };
    use std::sync::Arc;

    async fn context() -> AppContext {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        AppContext::with_pool(
            ServerConfig::for_testing("test-secret-key-for-testing-only-0123456789"),
            pool,
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn test_health_check_passes() {
        let ctx = context().await;
        assert!(health_check(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_prune_reports_remaining() {
        let ctx = context().await;
        assert!(ctx.rate_limiter.allow("10.0.0.1"));

        let (_, remaining) = prune_rate_limiter(&ctx);
        assert!(remaining <= 1);
    }
}
