use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::{Database, Stored};
use crate::error::{AppError, AppResult};
use crate::routes::group::{Group, GroupStatus, GroupType};
use crate::routes::request::{Request, RequestStatus};
use crate::routes::user::{Role, User, UserProfile};

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub active_equbs: u64,
    pub pending_requests: u64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRoleRequest {
    pub role: Option<String>,
}

impl Role {
    pub fn parse(value: Option<&str>) -> AppResult<Self> {
        match value {
            Some("user") => Ok(Role::User),
            Some("admin") => Ok(Role::Admin),
            Some("superadmin") => Ok(Role::Superadmin),
            _ => Err(AppError::validation("Invalid role")),
        }
    }
}

impl AdminStats {
    pub async fn collect(db: &Database) -> AppResult<Self> {
        Ok(AdminStats {
            total_users: db.count::<User>(json!({})).await?,
            active_equbs: db
                .count::<Group>(json!({ "type": GroupType::Equb, "status": GroupStatus::Active }))
                .await?,
            pending_requests: db
                .count::<Request>(json!({ "status": RequestStatus::Pending }))
                .await?,
        })
    }
}

async fn load_user(db: &Database, id: Uuid) -> AppResult<Stored<User>> {
    User::find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

impl User {
    /// superadmin 可以看到所有用户，admin 只能看到普通用户
    pub async fn list_visible_to(db: &Database, requester: Role) -> AppResult<Vec<UserProfile>> {
        let users = match requester {
            Role::Superadmin => db.all::<User>().await?,
            _ => db.find::<User>(json!({ "role": Role::User })).await?,
        };
        Ok(users.iter().map(|u| UserProfile::from(&u.doc)).collect())
    }

    pub async fn set_active(db: &Database, id: Uuid, is_active: Option<bool>) -> AppResult<UserProfile> {
        let is_active = is_active.ok_or_else(|| AppError::validation("is_active is required"))?;
        let mut user = load_user(db, id).await?;
        user.is_active = is_active;
        db.save(&user).await?;
        tracing::info!("User {} active flag set to {}", id, is_active);
        Ok(UserProfile::from(&user.doc))
    }

    /// 只有 superadmin 可以授予或撤销 superadmin 角色
    pub async fn set_role(
        db: &Database,
        requester: Role,
        id: Uuid,
        role: Option<&str>,
    ) -> AppResult<UserProfile> {
        let role = Role::parse(role)?;
        let mut user = load_user(db, id).await?;
        let touches_superadmin = role == Role::Superadmin || user.role == Role::Superadmin;
        if touches_superadmin && requester != Role::Superadmin {
            return Err(AppError::forbidden(
                "Only a superadmin can grant or revoke superadmin access",
            ));
        }
        user.role = role;
        db.save(&user).await?;
        tracing::info!("User {} role set to {:?} by {:?}", id, role, requester);
        Ok(UserProfile::from(&user.doc))
    }

    pub async fn remove(db: &Database, id: Uuid) -> AppResult<()> {
        load_user(db, id).await?;
        db.delete::<User>(id).await?;
        tracing::info!("User {} deleted", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_accepts_only_known_roles() {
        assert_eq!(Role::parse(Some("superadmin")).unwrap(), Role::Superadmin);
        assert!(matches!(Role::parse(Some("root")), Err(AppError::Validation(_))));
        assert!(matches!(Role::parse(None), Err(AppError::Validation(_))));
    }
}
