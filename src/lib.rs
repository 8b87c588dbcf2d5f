// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod error;
pub mod password;
pub mod settings;
pub mod store;
pub mod tls;
pub mod types;
pub mod watch;

#[cfg(test)]
pub mod test_utils;
