//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、成员关系的授权与一致性，
//! 以及对外部适配器（持久化网关、密码哈希）的抽象。

pub mod dto;
pub mod error;
pub mod password;
pub mod repository;
pub mod services;

pub use dto::{ChatDto, UserDto};
pub use error::ApplicationError;
pub use password::{PasswordHasher, PasswordHasherError};
pub use repository::{ChatRepository, UserRepository};
pub use services::{MembershipService, MembershipServiceDependencies, UserService, UserServiceDependencies};
