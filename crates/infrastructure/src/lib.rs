//! 基础设施层实现。
//!
//! 提供 Postgres 与内存两种持久化网关以及 bcrypt 密码哈希，实现应用层定义的接口。

pub mod builder;
pub mod memory;
pub mod migrations;
pub mod password;
pub mod repository;

pub use builder::{Infrastructure, InfrastructureError};
pub use memory::MemoryStorage;
pub use migrations::MIGRATOR;
pub use password::BcryptPasswordHasher;
pub use repository::{create_pg_pool, PgChatRepository, PgStorage, PgUserRepository};
