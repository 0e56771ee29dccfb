// SPDX-License-Identifier: AGPL-3.0
// Offload Core - HTTP client for the processing server
//
// Bare addresses are tried as https first, then http. Connectivity failures
// move on to the next candidate; a reachable server that answers badly
// terminates the attempt with that specific error.

use crate::routes;
use crate::types::{
    normalize_address, ApiResponse, AppError, Credentials, DeleteResponse, ErrorDetail, FileItem,
    Token, User,
};
use bytes::Bytes;
use reqwest::{multipart, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// Stateless client for a user-specified processing server. Every call is
/// parameterized by address and token; nothing is cached between calls.
pub struct ApiClient {
    http_client: Client,
}

/// Resolve the ordered base URLs to try for a user-entered address. An
/// address that already carries a scheme is used as-is.
fn candidate_base_urls(address: &str) -> Result<Vec<String>, AppError> {
    let trimmed = normalize_address(address);
    if trimmed.is_empty() {
        return Err(AppError::InvalidAddress(
            "Server address cannot be empty".to_string(),
        ));
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(vec![trimmed])
    } else {
        Ok(vec![
            format!("https://{}", trimmed),
            format!("http://{}", trimmed),
        ])
    }
}

/// Flatten an error with its source chain into one line.
fn error_chain(err: &reqwest::Error) -> String {
    use std::error::Error as _;

    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

/// Map a transport failure onto the error taxonomy. Only connectivity
/// classes let the caller fall through to the next URL scheme.
fn classify_request_error(err: reqwest::Error, url: &str) -> AppError {
    let detail = error_chain(&err);

    if err.is_builder() {
        AppError::InvalidAddress(detail)
    } else if err.is_connect() {
        if detail.to_lowercase().contains("dns") {
            AppError::DnsResolution(format!("Could not resolve {}: {}", url, detail))
        } else {
            AppError::ConnectionRefused(format!("Cannot connect to {}: {}", url, detail))
        }
    } else if err.is_timeout() {
        AppError::Network(format!("Connection timed out to {}", url))
    } else {
        AppError::Network(format!("Request to {} failed: {}", url, detail))
    }
}

/// Interpret a received response body as JSON of the expected shape.
fn parse_success_json<T: DeserializeOwned>(
    url: String,
    status: u16,
    body: String,
) -> Result<T, AppError> {
    if !(200..300).contains(&status) {
        return Err(AppError::Status { url, status });
    }

    serde_json::from_str(&body).map_err(|_| AppError::UnexpectedResponse { url, status, body })
}

impl ApiClient {
    pub fn new() -> Self {
        let http_client = Client::builder()
            // Uploads can be large; bound stalls rather than total duration
            .read_timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { http_client }
    }

    /// Run one operation against each candidate base URL in order, keeping
    /// the last connectivity error for reporting if every candidate fails.
    async fn with_fallback<T, F, Fut>(&self, address: &str, mut attempt: F) -> Result<T, AppError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut last_error: Option<AppError> = None;

        for base_url in candidate_base_urls(address)? {
            match attempt(base_url.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_connectivity() => {
                    tracing::debug!("Request to {} failed, trying next candidate: {}", base_url, err);
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::Network("Exhausted all connection attempts".to_string())))
    }

    /// Issue an authenticated request and collect status plus raw body.
    async fn send_authenticated(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        token: &str,
    ) -> Result<(u16, String), AppError> {
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| classify_request_error(e, url))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            AppError::Network(format!("Failed to read response from {}: {}", url, e))
        })?;

        Ok((status, body))
    }

    // --- Auth ---

    /// Log in with form-encoded credentials and unwrap the token envelope.
    pub async fn login(
        &self,
        address: &str,
        username: &str,
        password: &str,
    ) -> Result<Token, AppError> {
        self.with_fallback(address, |base_url| {
            let url = format!("{}{}", base_url, routes::TOKEN);
            async move {
                let params = [("username", username), ("password", password)];
                let response = self
                    .http_client
                    .post(&url)
                    .form(&params)
                    .send()
                    .await
                    .map_err(|e| classify_request_error(e, &url))?;

                let status = response.status().as_u16();
                let body = response.text().await.map_err(|e| {
                    AppError::Network(format!("Failed to read response from {}: {}", url, e))
                })?;

                let envelope: ApiResponse<Token> =
                    serde_json::from_str(&body).map_err(|_| AppError::UnexpectedResponse {
                        url: url.clone(),
                        status,
                        body: body.clone(),
                    })?;

                if !envelope.success {
                    return Err(AppError::Api(envelope.message));
                }

                envelope
                    .data
                    .ok_or(AppError::UnexpectedResponse { url, status, body })
            }
        })
        .await
    }

    /// Register a new account. 200 returns the created user, 400 surfaces
    /// the server's validation detail, anything else is a status error.
    pub async fn register(
        &self,
        address: &str,
        credentials: &Credentials,
    ) -> Result<User, AppError> {
        self.with_fallback(address, |base_url| {
            let url = format!("{}{}", base_url, routes::USERS);
            async move {
                let response = self
                    .http_client
                    .post(&url)
                    .json(credentials)
                    .send()
                    .await
                    .map_err(|e| classify_request_error(e, &url))?;

                let status = response.status();
                let status_code = status.as_u16();
                let body = response.text().await.map_err(|e| {
                    AppError::Network(format!("Failed to read response from {}: {}", url, e))
                })?;

                match status {
                    StatusCode::OK => {
                        serde_json::from_str(&body).map_err(|_| AppError::UnexpectedResponse {
                            url,
                            status: status_code,
                            body,
                        })
                    }
                    StatusCode::BAD_REQUEST => {
                        let error: ErrorDetail = serde_json::from_str(&body).map_err(|_| {
                            AppError::UnexpectedResponse {
                                url,
                                status: status_code,
                                body: body.clone(),
                            }
                        })?;
                        Err(AppError::Api(error.detail))
                    }
                    _ => Err(AppError::Status {
                        url,
                        status: status_code,
                    }),
                }
            }
        })
        .await
    }

    /// Fetch the account behind a token.
    pub async fn get_current_user(&self, address: &str, token: &str) -> Result<User, AppError> {
        self.with_fallback(address, |base_url| {
            let url = format!("{}{}", base_url, routes::USERS_ME);
            async move {
                let (status, body) = self
                    .send_authenticated(self.http_client.get(&url), &url, token)
                    .await?;
                parse_success_json(url, status, body)
            }
        })
        .await
    }

    // --- File management ---

    /// List the files stored on the server.
    pub async fn get_files(&self, address: &str, token: &str) -> Result<Vec<FileItem>, AppError> {
        self.with_fallback(address, |base_url| {
            let url = format!("{}{}", base_url, routes::LIST_FILES);
            async move {
                let (status, body) = self
                    .send_authenticated(self.http_client.get(&url), &url, token)
                    .await?;
                parse_success_json(url, status, body)
            }
        })
        .await
    }

    /// Upload a file as multipart form data; the server assigns the id.
    pub async fn upload_file(
        &self,
        address: &str,
        token: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<FileItem, AppError> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();

        self.with_fallback(address, |base_url| {
            let url = format!("{}{}", base_url, routes::UPLOAD_FILE);
            let content = content.clone();
            let mime = mime.clone();
            async move {
                let part = multipart::Part::bytes(content)
                    .file_name(file_name.to_string())
                    .mime_str(mime.essence_str())
                    .map_err(|e| AppError::Serialization(format!("Invalid content type: {}", e)))?;
                let form = multipart::Form::new().part("file", part);

                let (status, body) = self
                    .send_authenticated(self.http_client.post(&url).multipart(form), &url, token)
                    .await?;
                parse_success_json(url, status, body)
            }
        })
        .await
    }

    /// Fetch the server's record for one file.
    pub async fn get_file_info(
        &self,
        address: &str,
        token: &str,
        file_id: &str,
    ) -> Result<FileItem, AppError> {
        self.with_fallback(address, |base_url| {
            let url = format!("{}{}", base_url, routes::FILE_INFO);
            async move {
                let (status, body) = self
                    .send_authenticated(
                        self.http_client.get(&url).query(&[("filename", file_id)]),
                        &url,
                        token,
                    )
                    .await?;
                parse_success_json(url, status, body)
            }
        })
        .await
    }

    /// Download a file's contents.
    pub async fn download_file(
        &self,
        address: &str,
        token: &str,
        file_id: &str,
    ) -> Result<Bytes, AppError> {
        self.with_fallback(address, |base_url| {
            let url = format!("{}{}/{}", base_url, routes::DOWNLOAD_FILE, file_id);
            async move {
                let response = self
                    .http_client
                    .get(&url)
                    .bearer_auth(token)
                    .send()
                    .await
                    .map_err(|e| classify_request_error(e, &url))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(AppError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }

                response.bytes().await.map_err(|e| {
                    AppError::Network(format!("Failed to read file body from {}: {}", url, e))
                })
            }
        })
        .await
    }

    /// Delete a file, identified by the `filename` query parameter.
    pub async fn delete_file(
        &self,
        address: &str,
        token: &str,
        file_id: &str,
    ) -> Result<DeleteResponse, AppError> {
        self.with_fallback(address, |base_url| {
            let url = format!("{}{}", base_url, routes::DELETE_FILE);
            async move {
                let (status, body) = self
                    .send_authenticated(
                        self.http_client.delete(&url).query(&[("filename", file_id)]),
                        &url,
                        token,
                    )
                    .await?;
                parse_success_json(url, status, body)
            }
        })
        .await
    }

    // --- Capabilities ---

    /// Fetch the server's capability report. The payload shape varies by
    /// server version, so it is returned as dynamic JSON.
    pub async fn get_capabilities(
        &self,
        address: &str,
        token: &str,
    ) -> Result<serde_json::Value, AppError> {
        self.with_fallback(address, |base_url| {
            let url = format!("{}{}", base_url, routes::CAPABILITIES);
            async move {
                let (status, body) = self
                    .send_authenticated(self.http_client.get(&url), &url, token)
                    .await?;
                parse_success_json(url, status, body)
            }
        })
        .await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}
