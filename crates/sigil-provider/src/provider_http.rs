//! HTTP-backed provider session.
//!
//! Talks JSON to an account-authentication gate: `auth/send-code`,
//! `auth/sign-in`, `auth/check-password`, `auth/export-session`, and a
//! best-effort `auth/abort` on close. Provider fault codes are classified
//! into the [`ProviderError`] taxonomy; the password-required signal is
//! translated into a regular [`CodeOutcome`] branch rather than an error.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use serde_json::{json, Value};

use crate::provider_errors::{classify_provider_fault, ProviderError};
use crate::provider_session::{
    CodeOutcome, ProviderArtifact, ProviderAuthSession, ProviderConnector,
};

const PASSWORD_REQUIRED_FAULT_CODE: &str = "SESSION_PASSWORD_NEEDED";

#[derive(Debug, Clone)]
/// Connection settings for the provider gate, supplied at startup.
pub struct HttpProviderConfig {
    pub api_base: String,
    pub api_id: i64,
    pub api_hash: String,
    pub http_timeout_ms: u64,
}

#[derive(Debug, Clone)]
/// Factory producing one fresh [`HttpProviderSession`] per conversation.
pub struct HttpProviderConnector {
    config: HttpProviderConfig,
    client: reqwest::Client,
}

impl HttpProviderConnector {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .redirect(Policy::none())
            .build()
            .context("failed to build provider http client")?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ProviderConnector for HttpProviderConnector {
    async fn connect(&self) -> Result<Box<dyn ProviderAuthSession>, ProviderError> {
        Ok(Box::new(HttpProviderSession {
            config: self.config.clone(),
            client: self.client.clone(),
            phone_number: None,
            flow_token: None,
            closed: false,
        }))
    }
}

/// One in-flight flow against the provider gate. The flow token issued by
/// `auth/send-code` scopes every later call; nothing persists across
/// sessions.
pub struct HttpProviderSession {
    config: HttpProviderConfig,
    client: reqwest::Client,
    phone_number: Option<String>,
    flow_token: Option<String>,
    closed: bool,
}

impl HttpProviderSession {
    async fn post_json(&self, endpoint: &str, body: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            endpoint
        );
        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        let body_text = response.text().await?;
        if status.is_success() {
            return serde_json::from_str(&body_text).map_err(|error| ProviderError::Api {
                code: "BAD_RESPONSE".to_string(),
                message: format!("failed to parse provider response: {error}"),
            });
        }
        match serde_json::from_str::<Value>(&body_text) {
            Ok(payload) => {
                let code = payload["error"]["code"].as_str().unwrap_or("UNKNOWN");
                let message = payload["error"]["message"]
                    .as_str()
                    .unwrap_or("provider call failed");
                Err(classify_provider_fault(code, message))
            }
            Err(_) => Err(ProviderError::Api {
                code: format!("HTTP_{}", status.as_u16()),
                message: body_text.chars().take(200).collect(),
            }),
        }
    }

    fn ensure_open(&self) -> Result<(), ProviderError> {
        if self.closed {
            return Err(ProviderError::Api {
                code: "SESSION_CLOSED".to_string(),
                message: "provider session already closed".to_string(),
            });
        }
        Ok(())
    }

    fn require_flow_token(&self) -> Result<String, ProviderError> {
        self.flow_token
            .clone()
            .ok_or_else(|| ProviderError::Api {
                code: "FLOW_NOT_STARTED".to_string(),
                message: "no code request has been made on this session".to_string(),
            })
    }
}

#[async_trait]
impl ProviderAuthSession for HttpProviderSession {
    async fn request_code(&mut self, phone_number: &str) -> Result<(), ProviderError> {
        self.ensure_open()?;
        let payload = self
            .post_json(
                "auth/send-code",
                json!({
                    "api_id": self.config.api_id,
                    "api_hash": self.config.api_hash,
                    "phone_number": phone_number,
                }),
            )
            .await?;
        let flow_token = payload["flow_token"]
            .as_str()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ProviderError::Api {
                code: "BAD_RESPONSE".to_string(),
                message: "send-code response missing flow_token".to_string(),
            })?;
        self.flow_token = Some(flow_token.to_string());
        self.phone_number = Some(phone_number.to_string());
        Ok(())
    }

    async fn submit_code(&mut self, code: &str) -> Result<CodeOutcome, ProviderError> {
        self.ensure_open()?;
        let flow_token = self.require_flow_token()?;
        let result = self
            .post_json(
                "auth/sign-in",
                json!({"flow_token": flow_token, "code": code}),
            )
            .await;
        match result {
            Ok(payload) => match payload["status"].as_str() {
                Some("authorized") => Ok(CodeOutcome::Authorized),
                Some("password_required") => Ok(CodeOutcome::PasswordRequired),
                other => Err(ProviderError::Api {
                    code: "BAD_RESPONSE".to_string(),
                    message: format!("unexpected sign-in status {other:?}"),
                }),
            },
            Err(ProviderError::Api { code, .. }) if code == PASSWORD_REQUIRED_FAULT_CODE => {
                Ok(CodeOutcome::PasswordRequired)
            }
            Err(error) => Err(error),
        }
    }

    async fn submit_password(&mut self, password: &str) -> Result<(), ProviderError> {
        self.ensure_open()?;
        let flow_token = self.require_flow_token()?;
        self.post_json(
            "auth/check-password",
            json!({"flow_token": flow_token, "password": password}),
        )
        .await?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<ProviderArtifact, ProviderError> {
        self.ensure_open()?;
        let flow_token = self.require_flow_token()?;
        let phone_number = self.phone_number.clone().unwrap_or_default();
        let payload = self
            .post_json("auth/export-session", json!({"flow_token": flow_token}))
            .await?;
        let artifact_payload = payload["session_payload"]
            .as_str()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ProviderError::Api {
                code: "BAD_RESPONSE".to_string(),
                message: "export-session response missing session_payload".to_string(),
            })?;
        let account_label = payload["account_label"]
            .as_str()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(ProviderArtifact {
            payload: artifact_payload.to_string(),
            account_label,
            phone_number,
        })
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let Some(flow_token) = self.flow_token.take() else {
            return;
        };
        if let Err(error) = self
            .post_json("auth/abort", json!({"flow_token": flow_token}))
            .await
        {
            tracing::debug!("provider abort failed: {error}");
        }
    }
}
