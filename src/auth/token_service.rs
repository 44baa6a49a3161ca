use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{RefreshStore, UserSource};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{Identity, RefreshEntry, Role, TokenPair, UserId};
use crate::proxy::config::GatewayConfig;

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token. `jti` keeps tokens issued within the
/// same second distinct.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: UserId,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub access_ttl: std::time::Duration,
    pub refresh_ttl: std::time::Duration,
}

impl TokenSettings {
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        Ok(Self {
            secret: config.jwt_secret.clone(),
            access_ttl: config.access_token_lifetime()?,
            refresh_ttl: config.refresh_token_lifetime()?,
        })
    }
}

/// Issues, verifies and rotates token pairs
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    store: Arc<dyn RefreshStore>,
    users: Arc<dyn UserSource>,
}

impl TokenService {
    pub fn new(
        settings: &TokenSettings,
        store: Arc<dyn RefreshStore>,
        users: Arc<dyn UserSource>,
    ) -> GatewayResult<Self> {
        if settings.secret.is_empty() {
            return Err(GatewayError::Config(
                "Token signing secret is empty".to_string(),
            ));
        }

        // A lifetime must leave room for `now + ttl` on every later signing
        let to_chrono = |d: std::time::Duration| {
            let ttl = Duration::from_std(d)
                .map_err(|e| GatewayError::Config(format!("Token lifetime out of range: {}", e)))?;
            if Utc::now().checked_add_signed(ttl).is_none() {
                return Err(GatewayError::Config(format!(
                    "Token lifetime out of range: {:?}",
                    d
                )));
            }
            Ok(ttl)
        };

        // Expiry is exact: a token is rejected as soon as `exp` has passed
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            access_ttl: to_chrono(settings.access_ttl)?,
            refresh_ttl: to_chrono(settings.refresh_ttl)?,
            store,
            users,
        })
    }

    /// Look up credentials in the user source
    pub async fn authenticate(&self, email: &str, password: &str) -> GatewayResult<Identity> {
        self.users
            .authenticate(email, password)
            .await
            .ok_or(GatewayError::InvalidLogin)
    }

    /// Sign a new pair for `identity` and register its refresh token
    pub async fn issue(&self, identity: &Identity) -> GatewayResult<TokenPair> {
        self.issue_at(identity, Utc::now()).await
    }

    pub(crate) async fn issue_at(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> GatewayResult<TokenPair> {
        let pair = self.sign_pair(identity, now)?;
        self.store
            .insert(
                pair.refresh_token.clone(),
                RefreshEntry {
                    user_id: identity.id,
                    issued_at: now.timestamp(),
                },
            )
            .await;

        tracing::info!("Issued tokens for user {} ({})", identity.id, identity.role);
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair. The old token is single-use.
    pub async fn rotate(&self, old_refresh_token: &str) -> GatewayResult<TokenPair> {
        if self.store.get(old_refresh_token).await.is_none() {
            return Err(GatewayError::InvalidRefreshToken);
        }

        let claims = decode::<RefreshClaims>(
            old_refresh_token,
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| {
            tracing::debug!("Refresh token rejected: {}", e);
            GatewayError::ExpiredOrTamperedToken
        })?
        .claims;

        let identity = self
            .users
            .find_by_id(claims.sub)
            .await
            .ok_or(GatewayError::UnknownSubject)?;

        // Sign before claiming so a signing failure leaves the old token usable
        let now = Utc::now();
        let pair = self.sign_pair(&identity, now)?;

        // Losing this race means a concurrent rotation already consumed the token
        let entry = self
            .store
            .remove(old_refresh_token)
            .await
            .ok_or(GatewayError::InvalidRefreshToken)?;

        if entry.user_id != claims.sub {
            tracing::warn!(
                "Refresh token owner mismatch: stored {} but signed for {}",
                entry.user_id,
                claims.sub
            );
            return Err(GatewayError::ExpiredOrTamperedToken);
        }

        self.store
            .insert(
                pair.refresh_token.clone(),
                RefreshEntry {
                    user_id: identity.id,
                    issued_at: now.timestamp(),
                },
            )
            .await;

        tracing::info!("Rotated refresh token for user {}", identity.id);
        Ok(pair)
    }

    /// Forget a refresh token. Unknown tokens are ignored.
    pub async fn revoke(&self, refresh_token: &str) {
        if self.store.remove(refresh_token).await.is_some() {
            tracing::info!("Refresh token revoked");
        }
    }

    /// Stateless check of an access token
    pub fn verify_access(&self, token: &str) -> GatewayResult<Identity> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Access token rejected: {}", e);
                GatewayError::InvalidCredential
            })?
            .claims;

        Ok(Identity {
            id: claims.sub,
            display_name: claims.name,
            email: claims.email,
            role: claims.role,
        })
    }

    pub async fn outstanding_refresh_tokens(&self) -> usize {
        self.store.len().await
    }

    fn sign_pair(&self, identity: &Identity, now: DateTime<Utc>) -> GatewayResult<TokenPair> {
        let header = Header::new(Algorithm::HS256);

        let access = AccessClaims {
            sub: identity.id,
            name: identity.display_name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: expiry(now, self.access_ttl)?,
        };
        let refresh = RefreshClaims {
            sub: identity.id,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expiry(now, self.refresh_ttl)?,
        };

        Ok(TokenPair {
            access_token: encode(&header, &access, &self.encoding_key)?,
            refresh_token: encode(&header, &refresh, &self.encoding_key)?,
        })
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> GatewayResult<i64> {
    now.checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or_else(|| GatewayError::Config(format!("Token expiry overflows after {}", now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DemoUserDirectory, MemoryRefreshStore};
    use futures::future::join_all;

    fn settings() -> TokenSettings {
        TokenSettings {
            secret: "test-secret".to_string(),
            access_ttl: std::time::Duration::from_secs(120),
            refresh_ttl: std::time::Duration::from_secs(3600),
        }
    }

    fn service() -> Arc<TokenService> {
        let users = Arc::new(DemoUserDirectory::with_cost(4).unwrap());
        Arc::new(
            TokenService::new(&settings(), Arc::new(MemoryRefreshStore::new()), users).unwrap(),
        )
    }

    fn doctor() -> Identity {
        Identity {
            id: 2,
            display_name: "Test doctor".to_string(),
            email: "doctor@example.com".to_string(),
            role: Role::Doctor,
        }
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let tokens = service();
        let pair = tokens.issue(&doctor()).await.unwrap();

        assert_eq!(tokens.verify_access(&pair.access_token).unwrap(), doctor());
        assert_eq!(tokens.outstanding_refresh_tokens().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let tokens = service();
        let pair = tokens.issue(&doctor()).await.unwrap();

        assert!(matches!(
            tokens.verify_access(&pair.refresh_token),
            Err(GatewayError::InvalidCredential)
        ));
        assert!(matches!(
            tokens.rotate(&pair.access_token).await,
            Err(GatewayError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let tokens = service();
        let pair = tokens.issue(&doctor()).await.unwrap();

        let other = TokenService::new(
            &TokenSettings {
                secret: "another-secret".to_string(),
                ..settings()
            },
            Arc::new(MemoryRefreshStore::new()),
            Arc::new(DemoUserDirectory::from_records(Vec::new())),
        )
        .unwrap();
        assert!(matches!(
            other.verify_access(&pair.access_token),
            Err(GatewayError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn test_expired_access_token_rejected() {
        let tokens = service();
        let issued = Utc::now() - Duration::minutes(10);
        let pair = tokens.issue_at(&doctor(), issued).await.unwrap();

        assert!(matches!(
            tokens.verify_access(&pair.access_token),
            Err(GatewayError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn test_rotate_consumes_old_token() {
        let tokens = service();
        let first = tokens.issue(&doctor()).await.unwrap();

        let second = tokens.rotate(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(tokens.verify_access(&second.access_token).unwrap().id, 2);

        assert!(matches!(
            tokens.rotate(&first.refresh_token).await,
            Err(GatewayError::InvalidRefreshToken)
        ));
        assert_eq!(tokens.outstanding_refresh_tokens().await, 1);

        // The replacement keeps working
        tokens.rotate(&second.refresh_token).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_single_winner() {
        let tokens = service();
        let pair = tokens.issue(&doctor()).await.unwrap();

        let attempts = (0..12).map(|_| {
            let tokens = tokens.clone();
            let old = pair.refresh_token.clone();
            tokio::spawn(async move { tokens.rotate(&old).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, GatewayError::InvalidRefreshToken)));
        assert_eq!(tokens.outstanding_refresh_tokens().await, 1);
    }

    #[tokio::test]
    async fn test_rotate_expired_refresh_token() {
        let tokens = service();
        let issued = Utc::now() - Duration::hours(2);
        let pair = tokens.issue_at(&doctor(), issued).await.unwrap();

        assert!(matches!(
            tokens.rotate(&pair.refresh_token).await,
            Err(GatewayError::ExpiredOrTamperedToken)
        ));
    }

    #[tokio::test]
    async fn test_rotate_tampered_token() {
        let store = Arc::new(MemoryRefreshStore::new());
        let tokens = TokenService::new(
            &settings(),
            store.clone(),
            Arc::new(DemoUserDirectory::with_cost(4).unwrap()),
        )
        .unwrap();
        let pair = tokens.issue(&doctor()).await.unwrap();

        // Flip the first signature character
        let sig_start = pair.refresh_token.rfind('.').unwrap() + 1;
        let original = pair.refresh_token[sig_start..].chars().next().unwrap();
        let mut forged = pair.refresh_token[..sig_start].to_string();
        forged.push(if original == 'A' { 'B' } else { 'A' });
        forged.push_str(&pair.refresh_token[sig_start + 1..]);
        store
            .insert(
                forged.clone(),
                RefreshEntry {
                    user_id: 2,
                    issued_at: Utc::now().timestamp(),
                },
            )
            .await;

        assert!(matches!(
            tokens.rotate(&forged).await,
            Err(GatewayError::ExpiredOrTamperedToken)
        ));
    }

    #[tokio::test]
    async fn test_rotate_unknown_subject_keeps_entry() {
        let tokens = service();
        let ghost = Identity {
            id: 99,
            display_name: "Gone".to_string(),
            email: "gone@example.com".to_string(),
            role: Role::Patient,
        };
        let pair = tokens.issue(&ghost).await.unwrap();

        assert!(matches!(
            tokens.rotate(&pair.refresh_token).await,
            Err(GatewayError::UnknownSubject)
        ));
        assert_eq!(tokens.outstanding_refresh_tokens().await, 1);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let tokens = service();
        let pair = tokens.issue(&doctor()).await.unwrap();

        tokens.revoke(&pair.refresh_token).await;
        tokens.revoke(&pair.refresh_token).await;
        tokens.revoke("never-issued").await;

        assert_eq!(tokens.outstanding_refresh_tokens().await, 0);
        assert!(matches!(
            tokens.rotate(&pair.refresh_token).await,
            Err(GatewayError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn test_oversized_lifetime_rejected() {
        let users = Arc::new(DemoUserDirectory::with_cost(4).unwrap());
        let huge = TokenSettings {
            access_ttl: std::time::Duration::from_secs(86_400 * 1_000_000_000),
            ..settings()
        };
        assert!(matches!(
            TokenService::new(&huge, Arc::new(MemoryRefreshStore::new()), users),
            Err(GatewayError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_issue_past_representable_time_fails() {
        let tokens = service();
        let now = DateTime::<Utc>::MAX_UTC - Duration::seconds(60);

        assert!(matches!(
            tokens.issue_at(&doctor(), now).await,
            Err(GatewayError::Config(_))
        ));
        assert_eq!(tokens.outstanding_refresh_tokens().await, 0);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let tokens = service();
        assert_eq!(
            tokens.authenticate("admin@example.com", "admin").await.unwrap().role,
            Role::Admin
        );
        assert!(matches!(
            tokens.authenticate("admin@example.com", "wrong").await,
            Err(GatewayError::InvalidLogin)
        ));
    }
}
