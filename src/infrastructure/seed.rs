use crate::config::AppConfig;
use crate::models::{PersonName, Role};
use crate::services::user_service::{NewUser, UserService};
use sea_orm::DatabaseConnection;
use tracing::info;

/// Creates the administrator account from ADMIN_EMAIL / ADMIN_PASSWORD.
/// Does nothing when either is unset or the account already exists.
pub async fn seed_admin(db: &DatabaseConnection, config: &AppConfig) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    let users = UserService::new(db.clone());
    if users.find_by_email(email).await?.is_some() {
        info!("🔑 Admin account {} already present", email);
        return Ok(());
    }

    info!("🌱 Seeding admin account {}...", email);
    users
        .create(NewUser {
            name: PersonName {
                first: Some("Admin".to_string()),
                ..PersonName::default()
            },
            alias: Some("admin".to_string()),
            email: email.clone(),
            password: password.clone(),
            roles: vec![Role::Admin, Role::User],
            ..NewUser::default()
        })
        .await?;
    info!("✅ Admin account created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::run_migrations;
    use sea_orm::Database;

    #[tokio::test]
    async fn test_seed_admin_is_idempotent() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();
        let config = AppConfig {
            admin_email: Some("root@example.org".to_string()),
            admin_password: Some("hunter22".to_string()),
            ..AppConfig::default()
        };

        seed_admin(&db, &config).await.unwrap();
        seed_admin(&db, &config).await.unwrap();

        let users = UserService::new(db);
        let admin = users.find_by_email("root@example.org").await.unwrap().unwrap();
        assert!(Role::parse_list(&admin.roles).contains(&Role::Admin));
        assert_eq!(users.list(None, 0, 10).await.unwrap().len(), 1);
    }
}
