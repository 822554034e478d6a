// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod app;
pub mod auth;
pub mod chat;
pub mod config;
pub mod distributor;
pub mod error;
pub mod record;
pub mod test_support;
