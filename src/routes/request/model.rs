use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::{Collection, Database, Entity, Stored, Write};
use crate::error::{AppError, AppResult};
use crate::infrastructure::Notifier;
use crate::routes::group::Group;
use crate::routes::notification::{Notification, NotificationKind, RelatedTo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Join,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn parse_decision(value: Option<&str>) -> AppResult<Self> {
        match value {
            Some("approved") => Ok(RequestStatus::Approved),
            Some("rejected") => Ok(RequestStatus::Rejected),
            _ => Err(AppError::validation("Invalid status")),
        }
    }
}

/// 入群申请
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub user: Uuid,
    pub group: Uuid,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub payment_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Request {
    const COLLECTION: Collection = Collection::Requests;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequestBody {
    pub status: Option<String>,
    pub note: Option<String>,
    pub payment_instructions: Option<String>,
}

fn into_docs(requests: Vec<Stored<Request>>) -> Vec<Request> {
    requests.into_iter().map(Stored::into_inner).collect()
}

impl Request {
    pub async fn create_join(db: &Database, group_id: Uuid, user: Uuid) -> AppResult<Self> {
        let group = Group::find_by_id(db, group_id)
            .await?
            .ok_or_else(|| AppError::not_found("Group not found"))?;

        if group.is_active_member(user) {
            return Err(AppError::conflict("You are already a member of this group"));
        }

        let pending = db
            .find_one::<Request>(json!({
                "user": user,
                "group": group_id,
                "type": RequestType::Join,
                "status": RequestStatus::Pending,
            }))
            .await?;
        if pending.is_some() {
            return Err(AppError::conflict(
                "You already have a pending request to join this group",
            ));
        }

        let request = Request {
            id: Uuid::new_v4(),
            user,
            group: group_id,
            request_type: RequestType::Join,
            status: RequestStatus::Pending,
            processed_by: None,
            processed_at: None,
            note: None,
            payment_instructions: None,
            created_at: Utc::now(),
        };
        db.insert(&request).await?;
        tracing::info!("Join request {} created for group {}", request.id, group_id);
        Ok(request)
    }

    pub async fn list_all(db: &Database) -> AppResult<Vec<Self>> {
        Ok(into_docs(db.all::<Request>().await?))
    }

    pub async fn list_pending(db: &Database) -> AppResult<Vec<Self>> {
        Ok(into_docs(
            db.find::<Request>(json!({ "status": RequestStatus::Pending }))
                .await?,
        ))
    }

    /// 用户自己的申请，最新的在前
    pub async fn list_for_user(db: &Database, user: Uuid) -> AppResult<Vec<Self>> {
        let mut requests = into_docs(db.find::<Request>(json!({ "user": user })).await?);
        requests.reverse();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// 审批申请；通过时把用户加入群组，申请与群组在同一次提交中写入
    pub async fn process(
        db: &Database,
        notifier: &Notifier,
        id: Uuid,
        admin: Uuid,
        body: ProcessRequestBody,
    ) -> AppResult<Self> {
        let decision = RequestStatus::parse_decision(body.status.as_deref())?;

        let mut request = db
            .get::<Request>(id)
            .await?
            .ok_or_else(|| AppError::not_found("Request not found"))?;
        if request.status != RequestStatus::Pending {
            return Err(AppError::invalid_state("Request has already been processed"));
        }

        let now = Utc::now();
        request.status = decision;
        request.processed_by = Some(admin);
        request.processed_at = Some(now);
        if body.note.is_some() {
            request.note = body.note;
        }
        if decision == RequestStatus::Approved {
            request.payment_instructions = body.payment_instructions;
        }

        let mut writes = vec![Write::update(&request)?];
        let group = Group::find_by_id(db, request.group).await?;
        let (group_name, related_to) = group
            .as_ref()
            .map(|g| (g.name.clone(), g.related_to()))
            .unwrap_or_else(|| ("the group".into(), RelatedTo::System));

        if decision == RequestStatus::Approved {
            let mut group = group.ok_or_else(|| AppError::not_found("Group not found"))?;
            group.admit_member(request.user, now);
            writes.push(Write::update(&group)?);
        }

        let notification = match decision {
            RequestStatus::Approved => {
                let mut message = format!("Your request to join {} has been approved", group_name);
                if let Some(instructions) = &request.payment_instructions {
                    message.push_str(&format!(". Payment instructions: {}", instructions));
                }
                Notification::new(
                    request.user,
                    "Join request approved",
                    message,
                    NotificationKind::Success,
                    related_to,
                    Some(request.group),
                )
            }
            _ => Notification::new(
                request.user,
                "Join request rejected",
                format!("Your request to join {} has been rejected", group_name),
                NotificationKind::Error,
                related_to,
                Some(request.group),
            ),
        };
        let notifications = vec![notification];
        writes.extend(Notifier::stage(&notifications)?);

        db.commit(writes).await?;
        notifier.dispatch(&notifications).await;
        tracing::info!("Request {} {:?} by {}", request.id, decision, admin);
        Ok(request.into_inner())
    }
}
