//! Glue between the serverless host and the HTTP layer.
//!
//! The host runs this binary as a custom handler: it picks a local port,
//! exports it as `FUNCTIONS_CUSTOMHANDLER_PORT`, and forwards each HTTP
//! invocation to that port unchanged (paths keep the host's `/api`
//! prefix). Outside the host the configured port is used.

use std::env;

pub const CUSTOM_HANDLER_PORT_VAR: &str = "FUNCTIONS_CUSTOMHANDLER_PORT";

/// Port to listen on: the host's choice when present, else `configured`.
pub fn listen_port(configured: u16) -> u16 {
    platform_port(env::var(CUSTOM_HANDLER_PORT_VAR).ok().as_deref()).unwrap_or(configured)
}

fn platform_port(raw: Option<&str>) -> Option<u16> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(port) => Some(port),
        Err(e) => {
            tracing::warn!(
                value = %raw,
                error = %e,
                "Ignoring invalid {}", CUSTOM_HANDLER_PORT_VAR
            );
            None
        }
    }
}

/// Turns `api`, `/api/` or `/api` into `/api`. Empty and `/` mean no prefix.
pub fn normalize_route_prefix(prefix: Option<&str>) -> Option<String> {
    let trimmed = prefix?.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}
