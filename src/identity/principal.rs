use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Supervisor,
    Admin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// Normalized email; the key into the credential store and access mapping.
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}
