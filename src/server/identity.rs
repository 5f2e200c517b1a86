// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Validation of the identity a client presents on ActivateSession against the configured
//! users.

use crate::types::{IdentityToken, StatusCode};

use super::config::ServerConfig;

/// Validates the supplied identity token against the server configuration. Returns the id of
/// the matching configured token, or the status the activation should fail with. A failure
/// here is a security rejection, unlike an unknown authentication token.
pub(crate) fn authenticate_identity_token(
    config: &ServerConfig,
    token: &IdentityToken,
) -> Result<String, StatusCode> {
    match token {
        IdentityToken::Anonymous => {
            if config.allow_anonymous {
                Ok(super::config::ANONYMOUS_USER_TOKEN_ID.to_string())
            } else {
                error!("Anonymous identity tokens are not permitted by the configuration");
                Err(StatusCode::BadIdentityTokenRejected)
            }
        }
        IdentityToken::UserName { user, password } => {
            if user.is_empty() {
                return Err(StatusCode::BadIdentityTokenInvalid);
            }
            let matching = config
                .users
                .iter()
                .find(|(_, t)| t.user == *user && t.pass == *password);
            match matching {
                Some((id, _)) => Ok(id.clone()),
                None => {
                    error!("Username identity token for user {} was rejected", user);
                    Err(StatusCode::BadIdentityTokenRejected)
                }
            }
        }
    }
}
