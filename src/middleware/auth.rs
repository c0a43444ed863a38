use axum::{
    Extension,
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::routes::user::{Role, User};

/// 当前登录用户，由认证中间件写入请求扩展
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Superadmin)
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Access denied. Admin only."))
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Unauthorized("No token, authorization denied".into()))?;

    let user_id = state.auth.verify(bearer.token()).await?;

    let user = state
        .db
        .get::<User>(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if !user.is_active {
        return Err(AppError::forbidden("User account is deactivated"));
    }

    req.extensions_mut().insert(CurrentUser::from(&*user));
    Ok(next.run(req).await)
}

pub async fn admin_only(
    Extension(user): Extension<CurrentUser>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    user.require_admin()?;
    Ok(next.run(req).await)
}
