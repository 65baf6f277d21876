use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type RoleId = i64;

/// A capability a user may hold. Role assignment is owned by the accounts
/// collaborator; the auction engine only reads it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleKind {
    Buyer,
    Seller,
}

/// The buyer capability of a user, resolved to its role-linked profile.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub role_id: RoleId,
    pub user_id: UserId,
    pub username: String,
    pub shipping_address: String,
}

/// The seller capability of a user.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub role_id: RoleId,
    pub user_id: UserId,
    pub username: String,
    pub collection_address: String,
}
