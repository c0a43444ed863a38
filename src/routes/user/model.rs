use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::database::{Collection, Database, Entity, Stored};
use crate::error::{AppError, AppResult};
use crate::utils::{generate_token, hash_password, verify_password};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub occupation: String,
    pub emergency_contact: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub device_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// 对外返回的用户信息，不含密码
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub occupation: String,
    pub emergency_contact: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            address: user.address.clone(),
            occupation: user.occupation.clone(),
            emergency_contact: user.emergency_contact.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub emergency_contact: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct DeviceTokenRequest {
    pub device_token: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    pub async fn register(db: &Database, req: RegisterRequest, role: Role) -> AppResult<Self> {
        let (
            Some(first_name),
            Some(last_name),
            Some(email),
            Some(password),
            Some(phone),
            Some(address),
            Some(occupation),
            Some(emergency_contact),
        ) = (
            required(req.first_name),
            required(req.last_name),
            required(req.email),
            req.password.filter(|p| !p.is_empty()),
            required(req.phone),
            required(req.address),
            required(req.occupation),
            required(req.emergency_contact),
        )
        else {
            return Err(AppError::validation("All fields are required"));
        };

        let email = normalize_email(&email);
        if Self::find_by_email(db, &email).await?.is_some() {
            return Err(AppError::conflict("User already exists with this email"));
        }
        if db
            .find_one::<User>(json!({ "phone": phone }))
            .await?
            .is_some()
        {
            return Err(AppError::conflict(
                "User already exists with this phone number",
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            email,
            phone,
            address,
            occupation,
            emergency_contact,
            password_hash: hash_password(&password)?,
            role,
            is_active: true,
            device_token: None,
            created_at: Utc::now(),
        };

        db.insert(&user).await?;
        tracing::info!("User registered: {} ({:?})", user.email, user.role);
        Ok(user)
    }

    /// 邮箱密码登录；`admin_login` 为 true 时只允许管理员
    pub async fn login(
        db: &Database,
        config: &Config,
        req: LoginRequest,
        admin_login: bool,
    ) -> AppResult<LoginResponse> {
        let (Some(email), Some(password)) = (required(req.email), req.password) else {
            return Err(AppError::validation("Email and password are required"));
        };

        let invalid = || AppError::Unauthorized("Invalid credentials".into());

        let user = Self::find_by_email(db, &normalize_email(&email))
            .await?
            .ok_or_else(invalid)?;

        if admin_login && !user.role.is_admin() {
            return Err(AppError::Unauthorized(
                "Invalid credentials or not an admin".into(),
            ));
        }

        if !verify_password(&password, &user.password_hash)? {
            return Err(invalid());
        }

        if !user.is_active {
            return Err(AppError::forbidden("User account is deactivated"));
        }

        tracing::info!("User logged in: {}", user.email);
        user.issue_token(config)
    }

    pub fn issue_token(&self, config: &Config) -> AppResult<LoginResponse> {
        let (token, expires_at) = generate_token(self.id, &self.email, config)?;
        Ok(LoginResponse {
            token,
            expires_at,
            user: UserProfile::from(self),
        })
    }

    pub async fn find_by_id(db: &Database, id: Uuid) -> AppResult<Option<Stored<Self>>> {
        Ok(db.get::<User>(id).await?)
    }

    pub async fn find_by_email(db: &Database, email: &str) -> AppResult<Option<Stored<Self>>> {
        Ok(db
            .find_one::<User>(json!({ "email": normalize_email(email) }))
            .await?)
    }

    pub async fn update_device_token(db: &Database, id: Uuid, token: Option<String>) -> AppResult<()> {
        let token = required(token).ok_or_else(|| AppError::validation("Device token is required"))?;

        let mut user = Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        user.device_token = Some(token);
        db.save(&user).await?;
        Ok(())
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
