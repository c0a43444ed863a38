use chrono::Utc;
use rand::Rng;
use serde_json::json;
use uuid::Uuid;

use super::model::{
    BenefitRequest, BenefitRequestBody, BenefitStatus, CreateGroupRequest, DrawResult, Group,
    GroupStatus, GroupType, ProcessBenefitRequestBody, UpdateGroupRequest,
};
use crate::database::{Database, Stored, Write};
use crate::error::{AppError, AppResult};
use crate::infrastructure::Notifier;
use crate::middleware::CurrentUser;
use crate::money::Amount;
use crate::routes::notification::{Notification, NotificationKind};

/// 提交群组更新和通知，提交成功后推送
async fn commit_with_notifications(
    db: &Database,
    notifier: &Notifier,
    group: &Stored<Group>,
    notifications: Vec<Notification>,
) -> AppResult<()> {
    let mut writes = vec![Write::update(group)?];
    writes.extend(Notifier::stage(&notifications)?);
    db.commit(writes).await?;
    notifier.dispatch(&notifications).await;
    Ok(())
}

fn newest_first(groups: Vec<Stored<Group>>) -> Vec<Group> {
    let mut groups: Vec<Group> = groups.into_iter().rev().map(Stored::into_inner).collect();
    groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    groups
}

impl Group {
    pub async fn create(db: &Database, req: CreateGroupRequest, creator: Uuid) -> AppResult<Self> {
        let group = Group::new(req, creator, Utc::now())?;
        db.insert(&group).await?;
        tracing::info!(
            "Group created: {} ({:?}, {} rounds) by {}",
            group.name,
            group.group_type,
            group.total_rounds,
            creator
        );
        Ok(group)
    }

    pub async fn find_by_id(db: &Database, id: Uuid) -> AppResult<Option<Stored<Self>>> {
        Ok(db.get::<Group>(id).await?)
    }

    async fn load(db: &Database, id: Uuid) -> AppResult<Stored<Self>> {
        Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| AppError::not_found("Group not found"))
    }

    /// 按类型读取，类型不符视为不存在
    pub async fn find_by_type(db: &Database, id: Uuid, group_type: GroupType) -> AppResult<Self> {
        let not_found = || match group_type {
            GroupType::Equb => AppError::not_found("Equb not found"),
            GroupType::Edir => AppError::not_found("Edir not found"),
        };
        db.get::<Group>(id)
            .await?
            .filter(|g| g.group_type == group_type)
            .map(Stored::into_inner)
            .ok_or_else(not_found)
    }

    pub async fn list_active(db: &Database) -> AppResult<Vec<Self>> {
        let groups = db.find::<Group>(json!({ "status": GroupStatus::Active })).await?;
        Ok(newest_first(groups))
    }

    pub async fn list_active_by_type(db: &Database, group_type: GroupType) -> AppResult<Vec<Self>> {
        let groups = db
            .find::<Group>(json!({ "status": GroupStatus::Active, "type": group_type }))
            .await?;
        Ok(newest_first(groups))
    }

    /// 用户参与或管理的群组
    pub async fn list_for_user(db: &Database, user: Uuid) -> AppResult<Vec<Self>> {
        let mut groups = db
            .find::<Group>(json!({ "members": [{ "user": user }] }))
            .await?;
        let administered = db.find::<Group>(json!({ "admin": user })).await?;
        for group in administered {
            if !groups.iter().any(|g| g.id == group.id) {
                groups.push(group);
            }
        }
        Ok(newest_first(groups))
    }

    /// 用户尚未加入的活跃 edir
    pub async fn available_edirs(db: &Database, user: Uuid) -> AppResult<Vec<Self>> {
        let edirs = Self::list_active_by_type(db, GroupType::Edir).await?;
        Ok(edirs.into_iter().filter(|g| !g.is_member(user)).collect())
    }

    fn require_group_admin(&self, user: Uuid) -> AppResult<()> {
        if self.is_admin(user) {
            Ok(())
        } else {
            Err(AppError::forbidden("Only the group admin can manage this group"))
        }
    }

    pub async fn update(
        db: &Database,
        id: Uuid,
        caller: Uuid,
        req: UpdateGroupRequest,
    ) -> AppResult<Self> {
        let mut group = Self::load(db, id).await?;
        group.require_group_admin(caller)?;

        if let Some(name) = req.name.map(|n| n.trim().to_string()) {
            if name.is_empty() {
                return Err(AppError::validation("Name cannot be empty"));
            }
            group.name = name;
        }
        if let Some(amount) = req.amount {
            group.amount = Amount::new(amount)?.value();
        }
        if let Some(description) = req.description {
            group.description = description;
        }
        if let Some(frequency) = req.frequency {
            group.frequency = frequency;
        }
        if req.rules.is_some() {
            group.rules = req.rules;
        }
        if req.benefits.is_some() {
            group.benefits = req.benefits;
        }
        if req.emergency_contact.is_some() {
            group.emergency_contact = req.emergency_contact;
        }
        group.updated_at = Utc::now();

        db.save(&group).await?;
        tracing::info!("Group {} updated by {}", group.id, caller);
        Ok(group.into_inner())
    }

    pub async fn update_status(
        db: &Database,
        id: Uuid,
        caller: Uuid,
        status: Option<GroupStatus>,
    ) -> AppResult<Self> {
        let status = status.ok_or_else(|| AppError::validation("Invalid status"))?;
        let mut group = Self::load(db, id).await?;
        group.require_group_admin(caller)?;

        group.status = status;
        if status != GroupStatus::Active && group.end_date.is_none() {
            group.end_date = Some(Utc::now());
        }
        group.updated_at = Utc::now();

        db.save(&group).await?;
        tracing::info!("Group {} status set to {:?}", group.id, status);
        Ok(group.into_inner())
    }

    pub async fn delete(db: &Database, id: Uuid, caller: Uuid) -> AppResult<()> {
        let group = Self::load(db, id).await?;
        group.require_group_admin(caller)?;
        db.delete::<Group>(id).await?;
        tracing::info!("Group {} deleted by {}", id, caller);
        Ok(())
    }

    fn join_notification(&self, user: &CurrentUser) -> Notification {
        Notification::new(
            self.admin,
            format!("New {} member", self.label()),
            format!("{} joined {}", user.display_name(), self.name),
            NotificationKind::Info,
            self.related_to(),
            Some(self.id),
        )
    }

    pub async fn join(
        db: &Database,
        notifier: &Notifier,
        id: Uuid,
        user: &CurrentUser,
    ) -> AppResult<Self> {
        let mut group = Self::load(db, id).await?;
        group.add_member(user.id, Utc::now())?;

        let notification = group.join_notification(user);
        commit_with_notifications(db, notifier, &group, vec![notification]).await?;
        tracing::info!("User {} joined group {}", user.id, group.id);
        Ok(group.into_inner())
    }

    pub async fn join_by_code(
        db: &Database,
        notifier: &Notifier,
        code: Option<String>,
        user: &CurrentUser,
    ) -> AppResult<Self> {
        let code = code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::validation("Edir code is required"))?;

        let mut edir = db
            .find_one::<Group>(json!({
                "type": GroupType::Edir,
                "status": GroupStatus::Active,
                "invite_code": code,
            }))
            .await?
            .ok_or_else(|| AppError::not_found("Invalid edir code"))?;

        edir.add_member(user.id, Utc::now())?;

        let notification = edir.join_notification(user);
        commit_with_notifications(db, notifier, &edir, vec![notification]).await?;
        tracing::info!("User {} joined edir {} by code", user.id, edir.id);
        Ok(edir.into_inner())
    }

    pub async fn perform_draw<R: Rng + Send>(
        db: &Database,
        notifier: &Notifier,
        id: Uuid,
        round_number: u32,
        requester: Uuid,
        rng: &mut R,
    ) -> AppResult<DrawResult> {
        let mut group = Self::load(db, id).await?;
        let result = group.draw(round_number, requester, rng, Utc::now())?;

        let notifications = group
            .member_ids()
            .map(|user| {
                if user == result.winner {
                    Notification::new(
                        user,
                        "Congratulations! You won the draw",
                        format!("You won round {} of {}", round_number, group.name),
                        NotificationKind::Success,
                        group.related_to(),
                        Some(group.id),
                    )
                } else {
                    Notification::new(
                        user,
                        "Draw completed",
                        format!("Round {} of {} has been drawn", round_number, group.name),
                        NotificationKind::Info,
                        group.related_to(),
                        Some(group.id),
                    )
                }
            })
            .collect();

        commit_with_notifications(db, notifier, &group, notifications).await?;
        tracing::info!(
            "Draw for group {} round {}: winner {}",
            group.id,
            round_number,
            result.winner
        );
        Ok(result)
    }

    pub async fn request_benefit(
        db: &Database,
        notifier: &Notifier,
        id: Uuid,
        user: &CurrentUser,
        req: BenefitRequestBody,
    ) -> AppResult<BenefitRequest> {
        let reason = req
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let (Some(reason), Some(amount)) = (reason, req.amount) else {
            return Err(AppError::validation("Reason and amount are required"));
        };
        let amount = Amount::new(amount)?;

        let mut group = Self::load(db, id).await?;
        let request =
            group.submit_benefit_request(user.id, reason, amount, req.details, Utc::now())?;

        let notification = Notification::new(
            group.admin,
            "New benefit request",
            format!(
                "{} requested {} from {}: {}",
                user.display_name(),
                request.amount,
                group.name,
                request.reason
            ),
            NotificationKind::Info,
            group.related_to(),
            Some(group.id),
        );
        commit_with_notifications(db, notifier, &group, vec![notification]).await?;
        tracing::info!("Benefit request {} created in group {}", request.id, group.id);
        Ok(request)
    }

    pub async fn process_benefit(
        db: &Database,
        notifier: &Notifier,
        id: Uuid,
        request_id: Uuid,
        admin: Uuid,
        req: ProcessBenefitRequestBody,
    ) -> AppResult<BenefitRequest> {
        let decision = BenefitStatus::parse_decision(req.status.as_deref())?;
        let mut group = Self::load(db, id).await?;
        let resolved =
            group.resolve_benefit_request(request_id, admin, decision, req.note, Utc::now())?;

        let (title, kind) = match decision {
            BenefitStatus::Approved => ("Benefit request approved", NotificationKind::Success),
            _ => ("Benefit request rejected", NotificationKind::Error),
        };
        let notification = Notification::new(
            resolved.user,
            title,
            format!(
                "Your benefit request of {} in {} was {}",
                resolved.amount,
                group.name,
                if decision == BenefitStatus::Approved {
                    "approved"
                } else {
                    "rejected"
                }
            ),
            kind,
            group.related_to(),
            Some(group.id),
        );
        commit_with_notifications(db, notifier, &group, vec![notification]).await?;
        tracing::info!(
            "Benefit request {} in group {} {:?} by {}",
            request_id,
            group.id,
            decision,
            admin
        );
        Ok(resolved)
    }
}
