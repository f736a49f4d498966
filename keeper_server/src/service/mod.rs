// SPDX-License-Identifier: MIT OR Apache-2.0
//! gRPC service implementations.

pub mod account;
pub mod health;
pub mod vault;

pub use account::AccountServiceImpl;
pub use health::{HealthServiceImpl, HealthState};
pub use vault::VaultServiceImpl;
