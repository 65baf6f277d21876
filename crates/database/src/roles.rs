use {
    crate::{RoleId, UserId},
    sqlx::PgConnection,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "RoleKind", rename_all = "lowercase")]
pub enum RoleKind {
    Buyer,
    Seller,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "RoleState", rename_all = "lowercase")]
pub enum RoleState {
    Active,
    Suspended,
}

/// A user's buyer capability joined with its profile and display name. Role
/// assignment is owned by the accounts service; this crate only reads it.
#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct BuyerIdentity {
    pub role_id: RoleId,
    pub user_id: UserId,
    pub username: String,
    pub shipping_address: String,
}

#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct SellerIdentity {
    pub role_id: RoleId,
    pub user_id: UserId,
    pub username: String,
    pub collection_address: String,
}

/// Resolves the ACTIVE buyer capability of a user, if they hold one.
pub async fn active_buyer(
    ex: &mut PgConnection,
    user_id: UserId,
) -> sqlx::Result<Option<BuyerIdentity>> {
    const QUERY: &str = r#"
SELECT r.id AS role_id, r.user_id, u.username, b.shipping_address
FROM roles r
JOIN buyers b ON b.role_id = r.id
JOIN users u ON u.id = r.user_id
WHERE r.user_id = $1 AND r.kind = 'buyer' AND r.state = 'active'
"#;
    sqlx::query_as(QUERY).bind(user_id).fetch_optional(ex).await
}

/// Resolves the ACTIVE seller capability of a user, if they hold one.
pub async fn active_seller(
    ex: &mut PgConnection,
    user_id: UserId,
) -> sqlx::Result<Option<SellerIdentity>> {
    const QUERY: &str = r#"
SELECT r.id AS role_id, r.user_id, u.username, s.collection_address
FROM roles r
JOIN sellers s ON s.role_id = r.id
JOIN users u ON u.id = r.user_id
WHERE r.user_id = $1 AND r.kind = 'seller' AND r.state = 'active'
"#;
    sqlx::query_as(QUERY).bind(user_id).fetch_optional(ex).await
}

/// Test fixtures for crates that need users with capabilities in place.
/// Compiled into the library so dependent crates' postgres tests can reuse it.
pub mod testing {
    use super::*;

    async fn insert_user(ex: &mut PgConnection, username: &str) -> UserId {
        sqlx::query_scalar(
            "INSERT INTO users (username, email) VALUES ($1, $2) RETURNING id;",
        )
        .bind(username)
        .bind(format!("{username}@example.com"))
        .fetch_one(ex)
        .await
        .unwrap()
    }

    async fn insert_role(ex: &mut PgConnection, user_id: UserId, kind: RoleKind) -> RoleId {
        sqlx::query_scalar(
            "INSERT INTO roles (user_id, kind, state) VALUES ($1, $2, 'active') RETURNING id;",
        )
        .bind(user_id)
        .bind(kind)
        .fetch_one(ex)
        .await
        .unwrap()
    }

    /// Creates a user holding an ACTIVE buyer capability, returns the role id.
    pub async fn insert_buyer(ex: &mut PgConnection, username: &str) -> RoleId {
        let user_id = insert_user(ex, username).await;
        let role_id = insert_role(ex, user_id, RoleKind::Buyer).await;
        sqlx::query("INSERT INTO buyers (role_id, shipping_address) VALUES ($1, 'nowhere 1');")
            .bind(role_id)
            .execute(ex)
            .await
            .unwrap();
        role_id
    }

    /// Creates a user holding an ACTIVE seller capability, returns the role id.
    pub async fn insert_seller(ex: &mut PgConnection, username: &str) -> RoleId {
        let user_id = insert_user(ex, username).await;
        let role_id = insert_role(ex, user_id, RoleKind::Seller).await;
        sqlx::query("INSERT INTO sellers (role_id, collection_address) VALUES ($1, 'nowhere 2');")
            .bind(role_id)
            .execute(ex)
            .await
            .unwrap();
        role_id
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::clear_DANGER, sqlx::Connection};

    #[tokio::test]
    #[ignore]
    async fn postgres_capability_lookup() {
        let mut db = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        clear_DANGER(&mut db).await.unwrap();

        let buyer_role = testing::insert_buyer(&mut db, "alice").await;
        let seller_role = testing::insert_seller(&mut db, "bob").await;

        let buyer_user: UserId =
            sqlx::query_scalar("SELECT user_id FROM roles WHERE id = $1;")
                .bind(buyer_role)
                .fetch_one(&mut *db)
                .await
                .unwrap();
        let seller_user: UserId =
            sqlx::query_scalar("SELECT user_id FROM roles WHERE id = $1;")
                .bind(seller_role)
                .fetch_one(&mut *db)
                .await
                .unwrap();

        let buyer = active_buyer(&mut db, buyer_user).await.unwrap().unwrap();
        assert_eq!(buyer.username, "alice");
        // The buyer does not hold the seller capability and vice versa.
        assert!(active_seller(&mut db, buyer_user).await.unwrap().is_none());
        assert!(active_buyer(&mut db, seller_user).await.unwrap().is_none());
    }
}
