use std::sync::Arc;

use application::{ChatRepository, PasswordHasher, UserRepository};
use config::{AppConfig, StorageBackend};
use thiserror::Error;

use crate::{
    memory::MemoryStorage,
    migrations::MIGRATOR,
    password::BcryptPasswordHasher,
    repository::{create_pg_pool, PgStorage},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 按配置装配好的外部适配器
#[derive(Clone)]
pub struct Infrastructure {
    pub user_repository: Arc<dyn UserRepository>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
}

impl Infrastructure {
    /// postgres 后端会先建立连接池并执行迁移。
    pub async fn from_config(config: &AppConfig) -> Result<Self, InfrastructureError> {
        let password_hasher = Arc::new(BcryptPasswordHasher::new(config.server.bcrypt_cost));

        match config.database.backend {
            StorageBackend::Postgres => {
                let pool =
                    create_pg_pool(&config.database.url, config.database.max_connections).await?;
                MIGRATOR.run(&pool).await?;
                tracing::info!("connected to postgres, migrations applied");

                let storage = PgStorage::new(pool);
                Ok(Self {
                    user_repository: storage.user_repository,
                    chat_repository: storage.chat_repository,
                    password_hasher,
                })
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage, data is lost on restart");
                Ok(Self::in_memory(password_hasher))
            }
        }
    }

    pub fn in_memory(password_hasher: Arc<dyn PasswordHasher>) -> Self {
        let storage = MemoryStorage::new();
        Self {
            user_repository: Arc::new(storage.clone()),
            chat_repository: Arc::new(storage),
            password_hasher,
        }
    }
}
