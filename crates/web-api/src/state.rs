use std::sync::Arc;

use application::{MembershipService, UserService};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub membership_service: Arc<MembershipService>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        user_service: Arc<UserService>,
        membership_service: Arc<MembershipService>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            user_service,
            membership_service,
            jwt_service,
        }
    }
}
