// SPDX-License-Identifier: AGPL-3.0
// Offload Core - Shared client logic for all frontends
//
// This crate provides:
// - Preferences, ServerProfile, and wire types plus AppError
// - PreferencesStore for persistent mode and server profiles
// - ApiClient for talking to a processing server
//
// Frontend-specific code lives in separate crates.

pub mod client;
pub mod preferences;
pub mod routes;
pub mod types;

// Re-export commonly used items
pub use client::ApiClient;
pub use preferences::PreferencesStore;
pub use types::{
    ApiResponse, AppError, Credentials, DeleteResponse, ErrorDetail, FileItem, Mode, Preferences,
    ServerProfile, Token, User,
};
