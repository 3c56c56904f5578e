//! 会话校验
//!
//! 会话由外部身份提供方签发，这里只判断请求是否携带了已配置的会话令牌。
//! 支持三种携带方式：
//! - `Authorization: Bearer <token>`
//! - `x-api-key: <token>`
//! - 会话 Cookie（名称见 `auth.cookie_name`）

use crate::config::AuthConfig;
use crate::server::error::ApiError;
use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;

/// 校验请求是否带有有效会话
///
/// 未配置任何令牌时拒绝所有请求。
pub fn verify_session(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
    if config.session_tokens.is_empty() {
        tracing::warn!("[AUTH] 未配置会话令牌，拒绝请求");
        return Err(ApiError::Unauthorized);
    }

    let candidates = presented_tokens(headers, &config.cookie_name);
    if candidates.is_empty() {
        tracing::debug!("[AUTH] 请求未携带会话令牌");
        return Err(ApiError::Unauthorized);
    }

    let valid = candidates.iter().any(|candidate| {
        config
            .session_tokens
            .iter()
            .any(|token| token_matches(candidate, token))
    });
    if valid {
        Ok(())
    } else {
        tracing::warn!("[AUTH] 会话令牌无效");
        Err(ApiError::Unauthorized)
    }
}

/// 常量时间比较令牌
fn token_matches(candidate: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
}

/// 从请求头中收集所有候选令牌
fn presented_tokens(headers: &HeaderMap, cookie_name: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    if let Some(value) = header_str(headers, header::AUTHORIZATION.as_str()) {
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if !token.is_empty() {
            tokens.push(token.to_string());
        }
    }

    if let Some(value) = header_str(headers, "x-api-key") {
        let value = value.trim();
        if !value.is_empty() {
            tokens.push(value.to_string());
        }
    }

    for cookies in headers.get_all(header::COOKIE) {
        let Ok(cookies) = cookies.to_str() else {
            continue;
        };
        for pair in cookies.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name.trim() == cookie_name && !value.trim().is_empty() {
                    tokens.push(value.trim().to_string());
                }
            }
        }
    }

    tokens
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
