use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Contract owner on the client side. Scoped to its own contracts.
    #[default]
    Client,
    Sales,
    SalesManager,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Sales => "sales",
            Self::SalesManager => "sales_manager",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sales" => Self::Sales,
            "sales_manager" | "manager" => Self::SalesManager,
            _ => Self::Client,
        }
    }

    pub fn is_internal(&self) -> bool {
        !matches!(self, Self::Client)
    }
}

/// Caller of an engine operation. For clients, `id` is the client id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    /// Whether this actor may see contracts owned by `client_id`.
    pub fn can_access(&self, client_id: &str) -> bool {
        self.role.is_internal() || self.id == client_id
    }
}
