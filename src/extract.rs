use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON 请求体；解析失败时返回统一的错误响应
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

/// 路径参数；解析失败时返回统一的错误响应
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);
