//! Example demonstrating the use of MockManager for testing
//!
//! Run this example with:
//! `cargo test --example mock_usage --features mock_transport -- --nocapture`

fn main() {
    env_logger::init();
    println!("This example contains tests demonstrating MockManager usage.");
    println!("Run with: cargo test --example mock_usage --features mock_transport -- --nocapture");
}
