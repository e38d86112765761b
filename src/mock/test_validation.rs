//! Tests for the mock backend using crate::validation

use crate::mock::MockManager;
use crate::validation::{
    run_full_pool_validation_suite, test_acquire_returns_resource, test_blocked_acquire_resumes_on_release,
    test_capacity_is_bounded, test_close_rejects_acquire, test_invalidated_resource_is_replaced,
    test_release_preserves_identity,
};
use crate::{Pool, PoolConfig};

fn mock_pool(max_size: usize) -> Pool<MockManager> {
    Pool::new(PoolConfig::new(max_size), MockManager::new_default())
}

#[tokio::test]
async fn test_mock_backend_acquire() {
    let pool = mock_pool(2);
    test_acquire_returns_resource(&pool)
        .await
        .expect("Acquire validation failed");
}

#[tokio::test]
async fn test_mock_backend_identity() {
    let pool = mock_pool(2);
    test_release_preserves_identity(&pool)
        .await
        .expect("Identity validation failed");
}

#[tokio::test]
async fn test_mock_backend_capacity() {
    let pool = mock_pool(3);
    test_capacity_is_bounded(&pool)
        .await
        .expect("Capacity validation failed");
}

#[tokio::test]
async fn test_mock_backend_invalidation() {
    let pool = mock_pool(2);
    test_invalidated_resource_is_replaced(&pool)
        .await
        .expect("Invalidation validation failed");
}

#[tokio::test]
async fn test_mock_backend_blocking() {
    let pool = mock_pool(1);
    test_blocked_acquire_resumes_on_release(&pool)
        .await
        .expect("Blocking validation failed");
}

#[tokio::test]
async fn test_mock_backend_close() {
    let pool = mock_pool(2);
    test_close_rejects_acquire(&pool)
        .await
        .expect("Close validation failed");
}

#[tokio::test]
async fn test_mock_backend_full_validation_suite() {
    let pool = mock_pool(2);
    run_full_pool_validation_suite(&pool)
        .await
        .expect("Full pool validation suite failed");
}
