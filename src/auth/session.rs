use tracing::{info, warn};

use super::{AuthError, TokenStore};
use crate::api::{ApiClient, RegisterRequest, TokenPair, UpdateApiKeyRequest, User};

/// Username/password session backed by a [`TokenStore`].
#[derive(Debug)]
pub struct AuthSession<S> {
    api: ApiClient,
    store: S,
}

impl<S: TokenStore> AuthSession<S> {
    pub fn new(api: ApiClient, store: S) -> Self {
        Self { api, store }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Log in, persist the token pair, and fetch the user it belongs to.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let tokens = self.api.login(username, password).await?;
        self.store.save(&tokens)?;
        let user = self.api.current_user(&tokens.access_token).await?;
        info!(user = %user.name, "Logged in");
        Ok(user)
    }

    /// Create an account and immediately log in with the same credentials.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, AuthError> {
        let created = self.api.register(request).await?;
        info!(user = %created.name, "Registered");
        self.login(&request.name, &request.password).await
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.clear()
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Any failure clears the stored tokens.
    pub async fn refresh(&self) -> Result<TokenPair, AuthError> {
        let Some(refresh_token) = self.store.load()?.refresh_token else {
            self.logout()?;
            return Err(AuthError::NotLoggedIn);
        };
        match self.api.refresh(&refresh_token).await {
            Ok(tokens) => {
                self.store.save(&tokens)?;
                Ok(tokens)
            }
            Err(e) => {
                self.logout()?;
                Err(e.into())
            }
        }
    }

    /// The logged-in user.
    ///
    /// If the access token is rejected, refreshes once and retries; a failed
    /// retry logs the session out.
    pub async fn current_user(&self) -> Result<User, AuthError> {
        let access_token = self
            .store
            .load()?
            .access_token
            .ok_or(AuthError::NotLoggedIn)?;

        match self.api.current_user(&access_token).await {
            Ok(user) => Ok(user),
            Err(e) if e.is_unauthorized() => {
                warn!("Access token invalid or expired, attempting refresh");
                let tokens = self.refresh().await?;
                match self.api.current_user(&tokens.access_token).await {
                    Ok(user) => Ok(user),
                    Err(e) => {
                        self.logout()?;
                        Err(e.into())
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Access token for an authenticated call, refreshing first when only a
    /// refresh token is stored. `None` means no session at all.
    pub async fn access_token(&self) -> Result<Option<String>, AuthError> {
        let stored = self.store.load()?;
        if let Some(access_token) = stored.access_token {
            return Ok(Some(access_token));
        }
        if stored.refresh_token.is_some() {
            let tokens = self.refresh().await?;
            return Ok(Some(tokens.access_token));
        }
        Ok(None)
    }

    pub async fn update_api_key(
        &self,
        new_api_key: &str,
        current_password: &str,
    ) -> Result<(), AuthError> {
        let access_token = self.access_token().await?.ok_or(AuthError::NotLoggedIn)?;
        let request = UpdateApiKeyRequest {
            new_api_key: new_api_key.to_string(),
            current_password: current_password.to_string(),
        };
        self.api.update_api_key(&access_token, &request).await?;
        Ok(())
    }
}
