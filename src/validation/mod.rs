//! Validation test suite for pool backends
//!
//! This module provides a set of check functions that can be used to validate
//! a [`Pool`] built on any implementation of the [`ManageResource`] trait.
//! The checks exercise the pool contract: bounded capacity, identity-preserving
//! reuse, blocking acquisition, invalidation, and teardown.
//!
//! # Usage
//!
//! ```ignore
//! use stinger_pool::validation::*;
//!
//! #[tokio::test]
//! async fn validate_my_backend() {
//!     let pool = Pool::new(PoolConfig::new(2), MyManager::connect());
//!     run_full_pool_validation_suite(&pool).await.unwrap();
//! }
//! ```
//!
//! Each check expects exclusive use of the pool while it runs. The full
//! suite closes the pool as its final step, so hand it a freshly
//! constructed one.

use crate::{ManageResource, Pool, PoolError, PooledResource};
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Check that acquisition hands out a resource
pub async fn test_acquire_returns_resource<M: ManageResource>(
    pool: &Pool<M>,
) -> Result<(), String> {
    let guard = pool
        .acquire()
        .await
        .map_err(|e| format!("Failed to acquire: {}", e))?;
    drop(guard);
    Ok(())
}

/// Check that a released resource is reused rather than re-created
pub async fn test_release_preserves_identity<M: ManageResource>(
    pool: &Pool<M>,
) -> Result<(), String> {
    let first = pool
        .acquire()
        .await
        .map_err(|e| format!("Failed to acquire: {}", e))?;
    let first_id = PooledResource::id(&first);
    drop(first);

    let second = pool
        .acquire()
        .await
        .map_err(|e| format!("Failed to re-acquire: {}", e))?;
    let second_id = PooledResource::id(&second);
    if second_id != first_id {
        return Err(format!(
            "Expected resource #{} to be reused, got #{}",
            first_id, second_id
        ));
    }
    Ok(())
}

/// Check that the pool never hands out more than `max_size` resources
pub async fn test_capacity_is_bounded<M: ManageResource>(pool: &Pool<M>) -> Result<(), String> {
    let max = pool.status().max_size;
    let mut held = Vec::with_capacity(max);
    for n in 0..max {
        held.push(
            pool.acquire()
                .await
                .map_err(|e| format!("Failed to acquire resource {} of {}: {}", n + 1, max, e))?,
        );
    }

    match pool.try_acquire().await {
        Err(PoolError::Timeout) => {}
        Ok(_) => return Err("Acquired a resource beyond max_size".to_string()),
        Err(e) => return Err(format!("Expected a timeout beyond max_size, got: {}", e)),
    }

    let in_use = pool.status().in_use();
    if in_use != max {
        return Err(format!(
            "Expected {} resources in use, status reports {}",
            max, in_use
        ));
    }
    Ok(())
}

/// Check that an invalidated resource is not handed out again
pub async fn test_invalidated_resource_is_replaced<M: ManageResource>(
    pool: &Pool<M>,
) -> Result<(), String> {
    let mut guard = pool
        .acquire()
        .await
        .map_err(|e| format!("Failed to acquire: {}", e))?;
    let broken_id = PooledResource::id(&guard);
    PooledResource::invalidate(&mut guard);
    drop(guard);

    let replacement = pool
        .acquire()
        .await
        .map_err(|e| format!("Failed to acquire a replacement: {}", e))?;
    if PooledResource::id(&replacement) == broken_id {
        return Err(format!(
            "Invalidated resource #{} was handed out again",
            broken_id
        ));
    }
    Ok(())
}

/// Check that a blocked acquire completes once a resource is released
///
/// Saturates the pool, parks a waiter, then releases one resource and
/// verifies the waiter receives exactly that resource.
pub async fn test_blocked_acquire_resumes_on_release<M>(pool: &Pool<M>) -> Result<(), String>
where
    M: ManageResource + 'static,
{
    let max = pool.status().max_size;
    let mut held = Vec::with_capacity(max);
    for _ in 0..max {
        held.push(
            pool.acquire()
                .await
                .map_err(|e| format!("Failed to saturate the pool: {}", e))?,
        );
    }

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|guard| PooledResource::id(&guard)) })
    };

    sleep(Duration::from_millis(20)).await;
    if waiter.is_finished() {
        return Err("Acquire completed while the pool was saturated".to_string());
    }

    let released = held
        .pop()
        .ok_or_else(|| "Pool reports zero capacity".to_string())?;
    let released_id = PooledResource::id(&released);
    drop(released);

    let woken_id = timeout(Duration::from_secs(1), waiter)
        .await
        .map_err(|_| "Blocked acquire did not resume within 1s of release".to_string())?
        .map_err(|e| format!("Waiter task failed: {}", e))?
        .map_err(|e| format!("Blocked acquire failed after release: {}", e))?;

    if woken_id != released_id {
        return Err(format!(
            "Expected the waiter to receive resource #{}, got #{}",
            released_id, woken_id
        ));
    }
    Ok(())
}

/// Check that acquisition is refused after teardown
///
/// Closes the pool; run this last.
pub async fn test_close_rejects_acquire<M: ManageResource>(pool: &Pool<M>) -> Result<(), String> {
    pool.close();
    match pool.acquire().await {
        Err(PoolError::Closed) => Ok(()),
        Ok(_) => Err("Acquired a resource from a closed pool".to_string()),
        Err(e) => Err(format!("Expected a closed-pool error, got: {}", e)),
    }
}

/// Run every check in sequence
///
/// Closes the pool as its final step.
pub async fn run_full_pool_validation_suite<M>(pool: &Pool<M>) -> Result<(), String>
where
    M: ManageResource + 'static,
{
    test_acquire_returns_resource(pool).await?;
    test_release_preserves_identity(pool).await?;
    test_capacity_is_bounded(pool).await?;
    test_invalidated_resource_is_replaced(pool).await?;
    test_blocked_acquire_resumes_on_release(pool).await?;
    test_close_rejects_acquire(pool).await?;
    Ok(())
}
