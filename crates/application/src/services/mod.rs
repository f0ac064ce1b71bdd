mod membership_service;
mod user_service;

pub use membership_service::{
    CreateChatRequest, JoinChatRequest, MembershipService, MembershipServiceDependencies,
    PostMessageRequest,
};
pub use user_service::{
    AuthenticateUserRequest, RegisterUserRequest, UserService, UserServiceDependencies,
};
