// ABOUTME: Matrix client initialization and authentication
// ABOUTME: Handles client creation with a per-device sqlite store and login via password or token

use anyhow::{Context, Result};
use matrix_sdk::{
    authentication::{matrix::MatrixSession, SessionTokens},
    ruma::OwnedUserId,
    AuthSession, Client, SessionMeta,
};
use warden_core::paths;

/// Convert a string to a filesystem-safe slug
fn slugify(s: &str) -> String {
    s.trim_start_matches('@')
        .replace(':', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '.' || *c == '-')
        .collect()
}

pub async fn create_client(homeserver: &str, user_id: &str, device_name: &str) -> Result<Client> {
    // State and crypto for one user/device pair live together
    let store_path = paths::matrix_store_dir().join(format!(
        "{}_{}",
        slugify(user_id),
        slugify(device_name)
    ));

    std::fs::create_dir_all(&store_path).context("Failed to create Matrix store directory")?;

    tracing::info!(path = %store_path.display(), "Using Matrix store directory");

    let client = Client::builder()
        .homeserver_url(homeserver)
        .sqlite_store(&store_path, None)
        .build()
        .await
        .context("Failed to create Matrix client")?;

    tracing::info!("Matrix client created successfully");

    Ok(client)
}

pub async fn login(
    client: &Client,
    user_id: &str,
    password: Option<&str>,
    access_token: Option<&str>,
    device_name: &str,
) -> Result<()> {
    if let Some(token) = access_token {
        tracing::info!("Logging in with access token");
        let user_id: OwnedUserId = user_id.parse().context("Invalid matrix.user_id")?;
        let session = AuthSession::Matrix(MatrixSession {
            meta: SessionMeta {
                user_id,
                device_id: device_name.to_string().into(),
            },
            tokens: SessionTokens {
                access_token: token.to_string(),
                refresh_token: None,
            },
        });
        client
            .restore_session(session)
            .await
            .context("Failed to restore session")?;
    } else if let Some(pwd) = password {
        tracing::info!("Logging in with password");
        client
            .matrix_auth()
            .login_username(user_id, pwd)
            .device_id(device_name)
            .initial_device_display_name(device_name)
            .send()
            .await
            .context("Failed to log in")?;
    } else {
        anyhow::bail!("Either MATRIX_PASSWORD or MATRIX_ACCESS_TOKEN is required");
    }

    if let Some(user_id) = client.user_id() {
        tracing::info!(user_id = %user_id, "Logged in successfully");
    } else {
        tracing::warn!("Login succeeded but user_id not available");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_user_and_device() {
        assert_eq!(slugify("@warden:example.org"), "warden_example.org");
        assert_eq!(slugify("warden bot/1"), "wardenbot1");
    }
}
