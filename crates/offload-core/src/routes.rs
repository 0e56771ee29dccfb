// SPDX-License-Identifier: AGPL-3.0
// Offload Core - Processing server endpoint paths

//! Route constants for the processing server API. Base URLs are resolved
//! per request in [`crate::client`]; these are the paths appended to them.

// User management
pub const TOKEN: &str = "/token";
pub const USERS: &str = "/users/";
pub const USERS_ME: &str = "/users/me";

// System capabilities
pub const CAPABILITIES: &str = "/api/capabilities";

// File management
pub const UPLOAD_FILE: &str = "/api/upload";
pub const LIST_FILES: &str = "/api/files";
pub const DOWNLOAD_FILE: &str = "/api/download-file"; // append /{file_id}
pub const FILE_INFO: &str = "/api/file-info"; // ?filename={filename}
pub const DELETE_FILE: &str = "/api/delete-file"; // ?filename={filename}
pub const PROCESS_FILES: &str = "/api/process";

// Task management (server-driven; not exercised by this crate yet)
pub const TASKS: &str = "/api/tasks"; // DELETE appends /{task_id}
pub const TASK_STATUS: &str = "/api/task-status"; // append /{task_id}

// Real-time progress over WebSocket
pub const WS_PROGRESS: &str = "/ws/progress"; // append /{task_id}
