use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account kind as reported by the identity provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Organization,
    Individual,
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account uid
    pub account_type: AccountType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize, // expiration time
    pub iat: usize, // issued at
}

/// The caller of a core operation. Passed explicitly to every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub uid: String,
    pub account_type: AccountType,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ActorContext {
    pub fn organization(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            account_type: AccountType::Organization,
            name: None,
            email: None,
        }
    }

    pub fn individual(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            account_type: AccountType::Individual,
            name: None,
            email: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn is_organization(&self) -> bool {
        self.account_type == AccountType::Organization
    }
}

impl From<Claims> for ActorContext {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.sub,
            account_type: claims.account_type,
            name: claims.name,
            email: claims.email,
        }
    }
}
