use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::{Collection, Entity};
use crate::routes::notification::RelatedTo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    Equb,
    Edir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    #[default]
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenefitStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub user: Uuid,
    pub join_date: DateTime<Utc>,
    pub status: MemberStatus,
    pub has_won: bool,
    pub won_in_round: Option<u32>,
    pub total_contributed: Decimal,
    pub benefits_received: Decimal,
}

impl Member {
    pub fn new(user: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user,
            join_date: now,
            status: MemberStatus::Active,
            has_won: false,
            won_in_round: None,
            total_contributed: Decimal::ZERO,
            benefits_received: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributingMember {
    pub user: Uuid,
    pub has_paid: bool,
    pub payment_date: Option<DateTime<Utc>>,
}

impl ContributingMember {
    pub fn unpaid(user: Uuid) -> Self {
        Self {
            user,
            has_paid: false,
            payment_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub round_number: u32,
    pub status: RoundStatus,
    pub winner: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub contributing_members: Vec<ContributingMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenefitRequest {
    pub id: Uuid,
    pub user: Uuid,
    pub reason: String,
    pub amount: Decimal,
    pub details: Option<String>,
    pub status: BenefitStatus,
    pub request_date: DateTime<Utc>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub amount: Decimal,
    pub admin: Uuid,
    pub status: GroupStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub next_draw_date: Option<DateTime<Utc>>,
    pub total_rounds: u32,
    pub current_round: u32,
    pub frequency: Frequency,
    pub members: Vec<Member>,
    pub rounds: Vec<Round>,
    pub rules: Option<String>,
    pub benefits: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub invite_code: Option<String>,
    pub benefit_requests: Vec<BenefitRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Group {
    const COLLECTION: Collection = Collection::Groups;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Group {
    pub fn member(&self, user: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.user == user)
    }

    pub fn member_mut(&mut self, user: Uuid) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.user == user)
    }

    pub fn is_member(&self, user: Uuid) -> bool {
        self.member(user).is_some()
    }

    pub fn is_active_member(&self, user: Uuid) -> bool {
        self.member(user)
            .is_some_and(|m| m.status == MemberStatus::Active)
    }

    pub fn member_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.members.iter().map(|m| m.user)
    }

    /// 第 N 轮存放在下标 N-1
    pub fn round(&self, number: u32) -> Option<&Round> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.rounds.get(index).filter(|r| r.round_number == number)
    }

    pub fn round_mut(&mut self, number: u32) -> Option<&mut Round> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.rounds
            .get_mut(index)
            .filter(|r| r.round_number == number)
    }

    pub fn benefit_request_mut(&mut self, id: Uuid) -> Option<&mut BenefitRequest> {
        self.benefit_requests.iter_mut().find(|r| r.id == id)
    }

    pub fn is_admin(&self, user: Uuid) -> bool {
        self.admin == user
    }

    pub fn related_to(&self) -> RelatedTo {
        match self.group_type {
            GroupType::Equb => RelatedTo::Equb,
            GroupType::Edir => RelatedTo::Edir,
        }
    }

    pub fn label(&self) -> &'static str {
        match self.group_type {
            GroupType::Equb => "Equb",
            GroupType::Edir => "Edir",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateGroupRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub group_type: Option<GroupType>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub total_rounds: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
    pub next_draw_date: Option<DateTime<Utc>>,
    pub frequency: Option<Frequency>,
    pub rules: Option<String>,
    pub benefits: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

/// 可修改的字段，缺失的字段保持不变
#[derive(Debug, Default, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub frequency: Option<Frequency>,
    pub rules: Option<String>,
    pub benefits: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupStatusRequest {
    pub status: Option<GroupStatus>,
}

#[derive(Debug, Deserialize)]
pub struct JoinByCodeRequest {
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BenefitRequestBody {
    pub reason: Option<String>,
    pub amount: Option<Decimal>,
    pub details: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessBenefitRequestBody {
    pub status: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawResult {
    pub winner: Uuid,
    pub round: Round,
}
