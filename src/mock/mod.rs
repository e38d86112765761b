//! Mock pool backend for testing
//!
//! This module provides [`MockManager`], a [`ManageResource`](crate::ManageResource)
//! implementation producing [`MockTransport`]s: trivial always-available
//! resources that can be used for testing pool-consuming code without
//! requiring an actual broker connection.
//!
//! # Features
//!
//! - Resources are created instantly and never touch the network
//! - Captures every frame sent through a transport for later inspection
//! - Creation failures and health-check rejections can be injected
//! - Counts created and closed transports
//!
//! # Example
//!
//! ```
//! use stinger_pool::{Pool, PoolConfig, mock::MockManager};
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let manager = MockManager::new("test-backend");
//! let pool = Pool::new(PoolConfig::new(2), manager.clone());
//!
//! let transport = pool.acquire().await.unwrap();
//! transport.send(Bytes::from("ping")).unwrap();
//!
//! // Retrieve the last frame sent through the transport
//! assert_eq!(transport.last_frame(), Some(Bytes::from("ping")));
//! # }
//! ```

mod transport;

pub use transport::{MockManager, MockTransport, MockTransportError};

#[cfg(all(test, feature = "validation"))]
mod test_validation;
