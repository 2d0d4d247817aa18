// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key-store adapters.
//!
//! - [`traits`]: the [`KeyStore`](traits::KeyStore) contract and [`StorageError`](traits::StorageError)
//! - [`redis`]: Redis backend (SCAN / OBJECT IDLETIME / GET / DEL)
//! - [`memory`]: in-process store with idle-time tracking on tokio's clock

pub mod traits;
pub mod memory;
pub mod redis;
