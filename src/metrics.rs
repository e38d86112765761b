use std::time::{Duration, Instant};

/// Bookkeeping attached to every pooled resource
///
/// A copy travels with the resource through the idle set and is readable
/// from the guard via [`PooledResource::metrics`](crate::PooledResource::metrics).
#[derive(Debug, Clone, Copy)]
pub struct ResourceMetrics {
    /// When the resource was created
    pub created: Instant,
    /// When the resource was last handed out
    pub last_acquired: Instant,
    /// How many times the resource has been handed out again after a release
    pub recycle_count: usize,
}

impl ResourceMetrics {
    pub(crate) fn new() -> Self {
        let now = Instant::now();
        Self {
            created: now,
            last_acquired: now,
            recycle_count: 0,
        }
    }

    pub(crate) fn mark_reused(&mut self) {
        self.last_acquired = Instant::now();
        self.recycle_count += 1;
    }

    /// Time since the resource was created
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_metrics() {
        let metrics = ResourceMetrics::new();
        assert_eq!(metrics.recycle_count, 0);
        assert_eq!(metrics.created, metrics.last_acquired);
    }

    #[test]
    fn test_mark_reused() {
        let mut metrics = ResourceMetrics::new();
        std::thread::sleep(Duration::from_millis(5));
        metrics.mark_reused();
        metrics.mark_reused();

        assert_eq!(metrics.recycle_count, 2);
        assert!(metrics.last_acquired > metrics.created);
    }

    #[test]
    fn test_age_grows() {
        let metrics = ResourceMetrics::new();
        std::thread::sleep(Duration::from_millis(5));
        assert!(metrics.age() >= Duration::from_millis(5));
    }
}
