//! # User Repository
//!
//! Back-office accounts.
//!
//! ## Account Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create(name, email, password, role)                                    │
//! │       │         └── e-mail taken (active or not) → DuplicateEmail       │
//! │       ▼                                                                 │
//! │   [active] ──deactivate()──► [inactive] ──reactivate()──► [active]      │
//! │                                                                         │
//! │  authenticate(email, password): active + Argon2 or bcrypt match;        │
//! │    a bcrypt match is rehashed to Argon2 on the spot                     │
//! │  set_password(id, password): admin reset, always Argon2                 │
//! │                                                                         │
//! │  Users are never deleted; e-mail and role never change.                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use inaya_core::validation::{validate_email, validate_password, validate_required};
use inaya_core::{CoreError, Role, User};

use super::USER_COLUMNS;
use crate::error::{DbError, DbResult};
use crate::password::{hash_password, needs_rehash, verify_password};

/// Repository for back-office accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates an active account.
    ///
    /// ## Returns
    /// * `Ok(User)` - the stored account
    /// * `Err(DbError::Domain(CoreError::DuplicateEmail))` - e-mail taken
    pub async fn create(&self, name: &str, email: &str, password: &str, role: Role) -> DbResult<User> {
        let name = validate_required("name", name)?;
        let email = validate_email(email)?;
        validate_password(password)?;

        if self.get_by_email(&email).await?.is_some() {
            return Err(CoreError::DuplicateEmail { email }.into());
        }

        let hash = hash_password(password)?;

        let sql = format!(
            "INSERT INTO \"user\" (name, email, password_hash, role, is_active) VALUES (?1, ?2, ?3, ?4, 1) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&name)
            .bind(&email)
            .bind(&hash)
            .bind(role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => CoreError::DuplicateEmail {
                    email: email.clone(),
                }
                .into(),
                other => other,
            })?;

        info!(user_id = user.id, role = %role, "User created");
        Ok(user)
    }

    /// Gets an account by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM \"user\" WHERE id = ?1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Gets an account by e-mail, active or not.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM \"user\" WHERE email = ?1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Every account, active first, then by name.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM \"user\" ORDER BY is_active DESC, name",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Blocks an account from signing in.
    pub async fn deactivate(&self, id: i64) -> DbResult<User> {
        self.set_active(id, false).await
    }

    /// Lets a deactivated account sign in again.
    pub async fn reactivate(&self, id: i64) -> DbResult<User> {
        self.set_active(id, true).await
    }

    async fn set_active(&self, id: i64, active: bool) -> DbResult<User> {
        debug!(user_id = id, active, "Setting user active flag");

        let sql = format!(
            "UPDATE \"user\" SET is_active = ?2 WHERE id = ?1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Replaces an account's password with a fresh Argon2 hash.
    pub async fn set_password(&self, id: i64, password: &str) -> DbResult<()> {
        validate_password(password)?;
        let hash = hash_password(password)?;

        let result = sqlx::query("UPDATE \"user\" SET password_hash = ?2 WHERE id = ?1")
            .bind(id)
            .bind(&hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(user_id = id, "Password reset");
        Ok(())
    }

    /// Checks credentials.
    ///
    /// ## Returns
    /// * `Ok(Some(User))` - active account, password matches
    /// * `Ok(None)` - unknown e-mail, inactive account or wrong password
    pub async fn authenticate(&self, email: &str, password: &str) -> DbResult<Option<User>> {
        let user = match self.get_by_email(email).await? {
            Some(user) if user.is_active => user,
            _ => {
                debug!("Authentication refused: no active account");
                return Ok(None);
            }
        };

        if !verify_password(password, &user.password_hash) {
            debug!(user_id = user.id, "Authentication refused: wrong password");
            return Ok(None);
        }

        if needs_rehash(&user.password_hash) {
            match self.upgrade_hash(user.id, password).await {
                Ok(hash) => {
                    info!(user_id = user.id, "Upgraded legacy password hash");
                    return Ok(Some(User { password_hash: hash, ..user }));
                }
                Err(e) => warn!(user_id = user.id, error = %e, "Password hash upgrade failed"),
            }
        }

        Ok(Some(user))
    }

    /// Replaces a legacy hash with an Argon2 hash of the verified password.
    async fn upgrade_hash(&self, id: i64, password: &str) -> DbResult<String> {
        let hash = hash_password(password)?;
        sqlx::query("UPDATE \"user\" SET password_hash = ?2 WHERE id = ?1")
            .bind(id)
            .bind(&hash)
            .execute(&self.pool)
            .await?;
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use inaya_core::{CoreError, ErrorKind, Role};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = setup().await;
        let users = db.users();

        let first = users
            .create("Bilal", "bilal@inaya.pk", "rider1", Role::DeliveryBoy)
            .await
            .unwrap();
        users.deactivate(first.id).await.unwrap();

        let err = users
            .create("Bilal Two", "bilal@inaya.pk", "rider2", Role::Salesman)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::DuplicateEmail { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_deactivate_reactivate_keeps_identity() {
        let db = setup().await;
        let users = db.users();
        let user = users
            .create("Sara", "sara@inaya.pk", "counter", Role::Salesman)
            .await
            .unwrap();

        let off = users.deactivate(user.id).await.unwrap();
        assert!(!off.is_active);
        assert!(users.authenticate("sara@inaya.pk", "counter").await.unwrap().is_none());

        let on = users.reactivate(user.id).await.unwrap();
        assert!(on.is_active);
        assert_eq!((on.email.as_str(), on.role), ("sara@inaya.pk", Role::Salesman));
        assert!(users.authenticate("sara@inaya.pk", "counter").await.unwrap().is_some());

        let err = users.deactivate(404).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let db = setup().await;

        // Seeded by the migrator.
        let admin = db
            .users()
            .authenticate("admin@inaya.local", "admin123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.role.can_manage_users());

        assert!(db
            .users()
            .authenticate("admin@inaya.local", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(db
            .users()
            .authenticate("nobody@inaya.pk", "admin123")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_password_reset_recovers_legacy_account() {
        let db = setup().await;
        sqlx::query(
            "INSERT INTO \"user\" (name, email, password_hash, role, is_active) VALUES ('Old', 'old@inaya.pk', '$2b$12$legacyhash', 'Salesman', 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let users = db.users();
        assert!(users.authenticate("old@inaya.pk", "secret").await.unwrap().is_none());

        let old = users.get_by_email("old@inaya.pk").await.unwrap().unwrap();
        users.set_password(old.id, "secret").await.unwrap();
        assert!(users.authenticate("old@inaya.pk", "secret").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bcrypt_account_upgraded_on_login() {
        let db = setup().await;
        let legacy = bcrypt::hash("counter9", 4).unwrap();
        sqlx::query(
            "INSERT INTO \"user\" (name, email, password_hash, role, is_active) VALUES ('Nadia', 'nadia@inaya.pk', ?1, 'Salesman', 1)",
        )
        .bind(&legacy)
        .execute(db.pool())
        .await
        .unwrap();

        let users = db.users();
        assert!(users.authenticate("nadia@inaya.pk", "counter8").await.unwrap().is_none());
        let stored = users.get_by_email("nadia@inaya.pk").await.unwrap().unwrap();
        assert_eq!(stored.password_hash, legacy);

        let user = users.authenticate("nadia@inaya.pk", "counter9").await.unwrap().unwrap();
        assert!(user.password_hash.starts_with("$argon2"));

        let stored = users.get_by_email("nadia@inaya.pk").await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("$argon2"));
        assert!(users.authenticate("nadia@inaya.pk", "counter9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_active_first() {
        let db = setup().await;
        let users = db.users();
        let zara = users
            .create("Zara", "zara@inaya.pk", "pw", Role::Salesman)
            .await
            .unwrap();
        users.deactivate(zara.id).await.unwrap();

        let listed = users.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].is_active);
        assert_eq!(listed[1].email, "zara@inaya.pk");
    }
}
