mod handler;
mod model;

pub use handler::{login, profile, register, update_device_token};
pub use model::{
    DeviceTokenRequest, LoginRequest, LoginResponse, RegisterRequest, Role, User, UserProfile,
};
