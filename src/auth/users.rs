use async_trait::async_trait;

use crate::error::{GatewayError, GatewayResult};
use crate::models::{Identity, Role, UserId};

/// Source of user identities. Credential checks live behind this seam.
#[async_trait]
pub trait UserSource: Send + Sync {
    /// Identity for a matching email/password pair, `None` otherwise
    async fn authenticate(&self, email: &str, password: &str) -> Option<Identity>;

    async fn find_by_id(&self, id: UserId) -> Option<Identity>;
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub identity: Identity,
    pub password_hash: String,
}

impl UserRecord {
    pub fn new(identity: Identity, password: &str, cost: u32) -> GatewayResult<Self> {
        let password_hash = bcrypt::hash(password, cost).map_err(|e| {
            GatewayError::Config(format!("Failed to hash password for {}: {}", identity.email, e))
        })?;
        Ok(Self {
            identity,
            password_hash,
        })
    }
}

/// Fixed set of demo accounts, one per role. The password is the role name.
pub struct DemoUserDirectory {
    users: Vec<UserRecord>,
}

impl DemoUserDirectory {
    pub fn new() -> GatewayResult<Self> {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }

    /// Build the demo accounts hashing with the given bcrypt cost
    pub fn with_cost(cost: u32) -> GatewayResult<Self> {
        let seed = [
            (1, "Administrator", "admin@example.com", Role::Admin),
            (2, "Test doctor", "doctor@example.com", Role::Doctor),
            (3, "Test patient", "patient@example.com", Role::Patient),
        ];

        let users = seed
            .into_iter()
            .map(|(id, name, email, role)| {
                UserRecord::new(
                    Identity {
                        id,
                        display_name: name.to_string(),
                        email: email.to_string(),
                        role,
                    },
                    role.as_str(),
                    cost,
                )
            })
            .collect::<GatewayResult<Vec<_>>>()?;

        tracing::info!("Loaded {} demo users", users.len());
        Ok(Self::from_records(users))
    }

    pub fn from_records(users: Vec<UserRecord>) -> Self {
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserSource for DemoUserDirectory {
    async fn authenticate(&self, email: &str, password: &str) -> Option<Identity> {
        let record = self.users.iter().find(|u| u.identity.email == email)?;

        // bcrypt is CPU-bound; run it on the blocking pool
        let password = password.to_string();
        let hash = record.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await;

        match verified {
            Ok(Ok(true)) => Some(record.identity.clone()),
            Ok(Ok(false)) => None,
            Ok(Err(e)) => {
                tracing::warn!("Password check failed for {}: {}", email, e);
                None
            }
            Err(e) => {
                tracing::warn!("Password check for {} did not complete: {}", email, e);
                None
            }
        }
    }

    async fn find_by_id(&self, id: UserId) -> Option<Identity> {
        self.users
            .iter()
            .find(|u| u.identity.id == id)
            .map(|u| u.identity.clone())
    }
}
