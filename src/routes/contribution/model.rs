use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::{Collection, Database, Entity, Stored, Write};
use crate::error::{AppError, AppResult};
use crate::money::{Amount, checked_add};
use crate::routes::group::{Group, GroupType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    MobileMoney,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: Uuid,
    pub group: Uuid,
    pub user: Uuid,
    pub amount: Decimal,
    pub round: u32,
    pub status: ContributionStatus,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Contribution {
    const COLLECTION: Collection = Collection::Contributions;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateContributionRequest {
    pub group_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub round: Option<u32>,
    pub payment_method: Option<PaymentMethod>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContributionStatusRequest {
    pub status: Option<ContributionStatus>,
}

fn newest_first(contributions: Vec<Stored<Contribution>>) -> Vec<Contribution> {
    let mut contributions: Vec<Contribution> = contributions
        .into_iter()
        .rev()
        .map(Stored::into_inner)
        .collect();
    contributions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    contributions
}

impl Contribution {
    pub async fn create(
        db: &Database,
        user: Uuid,
        req: CreateContributionRequest,
    ) -> AppResult<Self> {
        let (Some(group_id), Some(round), Some(payment_method)) =
            (req.group_id, req.round, req.payment_method)
        else {
            return Err(AppError::validation("Missing required fields"));
        };
        let amount = Amount::parse(req.amount)?;

        let group = Group::find_by_id(db, group_id)
            .await?
            .ok_or_else(|| AppError::not_found("Group not found"))?;
        if !group.is_member(user) {
            return Err(AppError::forbidden("Not a member of this group"));
        }
        if round == 0 || round > group.total_rounds {
            return Err(AppError::validation("Invalid round"));
        }

        let now = Utc::now();
        let contribution = Contribution {
            id: Uuid::new_v4(),
            group: group_id,
            user,
            amount: amount.value(),
            round,
            status: ContributionStatus::Pending,
            payment_method,
            transaction_id: req.transaction_id,
            notes: req.notes,
            payment_date: now,
            created_at: now,
            updated_at: now,
        };
        db.insert(&contribution).await?;
        tracing::info!(
            "Contribution {} of {} for group {} round {}",
            contribution.id,
            contribution.amount,
            group_id,
            round
        );
        Ok(contribution)
    }

    pub async fn list_for_user(db: &Database, user: Uuid) -> AppResult<Vec<Self>> {
        Ok(newest_first(
            db.find::<Contribution>(json!({ "user": user })).await?,
        ))
    }

    pub async fn list_pending_for_user(db: &Database, user: Uuid) -> AppResult<Vec<Self>> {
        Ok(newest_first(
            db.find::<Contribution>(json!({
                "user": user,
                "status": ContributionStatus::Pending,
            }))
            .await?,
        ))
    }

    pub async fn list_for_group(db: &Database, group: Uuid) -> AppResult<Vec<Self>> {
        Ok(newest_first(
            db.find::<Contribution>(json!({ "group": group })).await?,
        ))
    }

    /// 群组管理员更新状态；首次变为 completed 时同步成员的缴费记录
    pub async fn update_status(
        db: &Database,
        id: Uuid,
        caller: Uuid,
        status: Option<ContributionStatus>,
    ) -> AppResult<Self> {
        let status = status.ok_or_else(|| AppError::validation("Invalid status"))?;

        let mut contribution = db
            .get::<Contribution>(id)
            .await?
            .ok_or_else(|| AppError::not_found("Contribution not found"))?;
        let mut group = Group::find_by_id(db, contribution.group)
            .await?
            .ok_or_else(|| AppError::not_found("Group not found"))?;
        if !group.is_admin(caller) {
            return Err(AppError::forbidden(
                "Not authorized to update contribution status",
            ));
        }

        let now = Utc::now();
        let completing = status == ContributionStatus::Completed
            && contribution.status != ContributionStatus::Completed;
        contribution.status = status;
        contribution.updated_at = now;

        let mut writes = vec![Write::update(&contribution)?];
        if completing {
            group.record_payment(&contribution, now)?;
            writes.push(Write::update(&group)?);
        }
        db.commit(writes).await?;

        tracing::info!("Contribution {} set to {:?} by {}", id, status, caller);
        Ok(contribution.into_inner())
    }
}

impl Group {
    /// 记入成员累计缴费；equb 同时标记该轮已缴
    fn record_payment(
        &mut self,
        contribution: &Contribution,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(member) = self.member_mut(contribution.user) {
            member.total_contributed = checked_add(member.total_contributed, contribution.amount)?;
        }
        if self.group_type == GroupType::Equb {
            if let Some(payer) = self.round_mut(contribution.round).and_then(|round| {
                round
                    .contributing_members
                    .iter_mut()
                    .find(|c| c.user == contribution.user)
            }) {
                payer.has_paid = true;
                payer.payment_date = Some(now);
            }
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::group::CreateGroupRequest;
    use rust_decimal_macros::dec;

    fn equb_with_payment(admin: Uuid, amount: Decimal) -> (Group, Contribution) {
        let group = Group::new(
            CreateGroupRequest {
                name: Some("Weekly".into()),
                group_type: Some(GroupType::Equb),
                amount: Some(dec!(100)),
                total_rounds: Some(2),
                start_date: Some(Utc::now()),
                ..Default::default()
            },
            admin,
            Utc::now(),
        )
        .unwrap();

        let now = Utc::now();
        let contribution = Contribution {
            id: Uuid::new_v4(),
            group: group.id,
            user: admin,
            amount,
            round: 2,
            status: ContributionStatus::Completed,
            payment_method: PaymentMethod::Cash,
            transaction_id: None,
            notes: None,
            payment_date: now,
            created_at: now,
            updated_at: now,
        };
        (group, contribution)
    }

    #[test]
    fn completed_contribution_marks_round_payment() {
        let admin = Uuid::new_v4();
        let (mut group, contribution) = equb_with_payment(admin, dec!(100));
        group.record_payment(&contribution, Utc::now()).unwrap();

        assert_eq!(group.member(admin).unwrap().total_contributed, dec!(100));
        assert!(group.round(2).unwrap().contributing_members[0].has_paid);
        assert!(!group.round(1).unwrap().contributing_members[0].has_paid);
    }

    #[test]
    fn contribution_total_overflow_is_rejected() {
        let admin = Uuid::new_v4();
        let (mut group, contribution) = equb_with_payment(admin, dec!(1));
        group.member_mut(admin).unwrap().total_contributed = Decimal::MAX;

        assert!(matches!(
            group.record_payment(&contribution, Utc::now()),
            Err(AppError::Validation(_))
        ));
        assert_eq!(group.member(admin).unwrap().total_contributed, Decimal::MAX);
        assert!(!group.round(2).unwrap().contributing_members[0].has_paid);
    }

    #[test]
    fn payment_method_uses_snake_case() {
        let method: PaymentMethod = serde_json::from_str("\"bank_transfer\"").unwrap();
        assert_eq!(method, PaymentMethod::BankTransfer);
    }
}
