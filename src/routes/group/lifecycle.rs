// 群组状态迁移：建组、入会、抽签、edir 互助申请。
// 这里只修改内存中的文档，持久化和通知由 service 负责。

use chrono::{DateTime, Duration, Months, Utc};
use rand::Rng;
use uuid::Uuid;

use super::model::{
    BenefitRequest, BenefitStatus, ContributingMember, CreateGroupRequest, DrawResult, Frequency,
    Group, GroupStatus, GroupType, Member, MemberStatus, Round, RoundStatus,
};
use crate::error::{AppError, AppResult};
use crate::money::{Amount, checked_add, checked_mul};
use crate::utils::generate_invite_code;

impl Frequency {
    pub fn next_draw_after(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Frequency::Daily => from + Duration::days(1),
            Frequency::Weekly => from + Duration::days(7),
            Frequency::Biweekly => from + Duration::days(14),
            Frequency::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or(from + Duration::days(30)),
        }
    }
}

impl BenefitStatus {
    /// 处理结果只能是 approved / rejected
    pub fn parse_decision(value: Option<&str>) -> AppResult<Self> {
        match value {
            Some("approved") => Ok(BenefitStatus::Approved),
            Some("rejected") => Ok(BenefitStatus::Rejected),
            _ => Err(AppError::validation("Invalid status")),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Group {
    pub fn new(req: CreateGroupRequest, creator: Uuid, now: DateTime<Utc>) -> AppResult<Self> {
        let (Some(name), Some(group_type), Some(amount), Some(total_rounds), Some(start_date)) = (
            non_empty(req.name),
            req.group_type,
            req.amount,
            req.total_rounds.filter(|n| *n > 0),
            req.start_date,
        ) else {
            return Err(AppError::validation("Missing required fields"));
        };
        let amount = Amount::new(amount)?.value();

        let rounds = match group_type {
            GroupType::Equb => (1..=total_rounds)
                .map(|number| Round {
                    round_number: number,
                    status: if number == 1 {
                        RoundStatus::Active
                    } else {
                        RoundStatus::Pending
                    },
                    winner: None,
                    amount: None,
                    start_date: (number == 1).then_some(start_date),
                    end_date: None,
                    contributing_members: vec![ContributingMember::unpaid(creator)],
                })
                .collect(),
            GroupType::Edir => Vec::new(),
        };

        let invite_code = (group_type == GroupType::Edir).then(generate_invite_code);

        Ok(Group {
            id: Uuid::new_v4(),
            name,
            description: req.description.unwrap_or_default(),
            group_type,
            amount,
            admin: creator,
            status: GroupStatus::Active,
            start_date,
            end_date: None,
            next_draw_date: req.next_draw_date,
            total_rounds,
            current_round: 1,
            frequency: req.frequency.unwrap_or_default(),
            members: vec![Member::new(creator, now)],
            rounds,
            rules: req.rules,
            benefits: req.benefits,
            emergency_contact: req.emergency_contact,
            invite_code,
            benefit_requests: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// 直接入会：已是成员（任何状态）时冲突
    pub fn add_member(&mut self, user: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        if self.status != GroupStatus::Active {
            return Err(AppError::invalid_state(format!(
                "{} is not active",
                self.label()
            )));
        }
        if self.is_member(user) {
            return Err(AppError::conflict("User is already a member of this group"));
        }
        self.members.push(Member::new(user, now));
        self.enroll_in_open_rounds(user);
        self.updated_at = now;
        Ok(())
    }

    /// 审批通过后入会：已有成员记录则重新激活
    pub fn admit_member(&mut self, user: Uuid, now: DateTime<Utc>) {
        match self.member_mut(user) {
            Some(member) => member.status = MemberStatus::Active,
            None => self.members.push(Member::new(user, now)),
        }
        self.enroll_in_open_rounds(user);
        self.updated_at = now;
    }

    fn enroll_in_open_rounds(&mut self, user: Uuid) {
        if self.group_type != GroupType::Equb {
            return;
        }
        for round in self
            .rounds
            .iter_mut()
            .filter(|r| r.status != RoundStatus::Completed)
        {
            if !round.contributing_members.iter().any(|c| c.user == user) {
                round.contributing_members.push(ContributingMember::unpaid(user));
            }
        }
    }

    /// 抽签：从未中签的活跃成员中等概率选出本轮得主，并推进到下一轮
    pub fn draw<R: Rng + ?Sized>(
        &mut self,
        round_number: u32,
        requester: Uuid,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> AppResult<DrawResult> {
        if !self.is_admin(requester) {
            return Err(AppError::forbidden("Only the group admin can perform draws"));
        }
        if self.group_type != GroupType::Equb {
            return Err(AppError::validation("Draws are only available for equb groups"));
        }

        let round = self
            .round(round_number)
            .ok_or_else(|| AppError::not_found("Round not found"))?;
        if round.status != RoundStatus::Active || round.winner.is_some() {
            return Err(AppError::invalid_state("Round is not open for a draw"));
        }

        let eligible: Vec<Uuid> = self
            .members
            .iter()
            .filter(|m| m.status == MemberStatus::Active && !m.has_won)
            .map(|m| m.user)
            .collect();
        if eligible.is_empty() {
            return Err(AppError::invalid_state("No eligible members for the draw"));
        }

        let winner = eligible[rng.gen_range(0..eligible.len())];
        let pot = checked_mul(self.amount, self.members.len())?;

        if let Some(member) = self.member_mut(winner) {
            member.has_won = true;
            member.won_in_round = Some(round_number);
        }

        let round = self
            .round_mut(round_number)
            .ok_or_else(|| AppError::not_found("Round not found"))?;
        round.status = RoundStatus::Completed;
        round.winner = Some(winner);
        round.amount = Some(pot);
        round.end_date = Some(now);
        let completed = round.clone();

        self.current_round += 1;
        let next_round = self.current_round;
        let frequency = self.frequency;
        if next_round <= self.total_rounds {
            if let Some(next) = self.round_mut(next_round) {
                next.status = RoundStatus::Active;
                next.start_date = Some(now);
            }
            self.next_draw_date = Some(frequency.next_draw_after(now));
        } else {
            self.status = GroupStatus::Completed;
            self.end_date = Some(now);
            self.next_draw_date = None;
        }
        self.updated_at = now;

        Ok(DrawResult {
            winner,
            round: completed,
        })
    }

    pub fn submit_benefit_request(
        &mut self,
        user: Uuid,
        reason: String,
        amount: Amount,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<BenefitRequest> {
        if self.group_type != GroupType::Edir {
            return Err(AppError::validation(
                "Benefit requests are only available for edir groups",
            ));
        }
        if !self.is_member(user) {
            return Err(AppError::forbidden("You are not a member of this edir"));
        }

        let request = BenefitRequest {
            id: Uuid::new_v4(),
            user,
            reason,
            amount: amount.value(),
            details,
            status: BenefitStatus::Pending,
            request_date: now,
            processed_by: None,
            processed_at: None,
            note: None,
        };
        self.benefit_requests.push(request.clone());
        self.updated_at = now;
        Ok(request)
    }

    pub fn resolve_benefit_request(
        &mut self,
        request_id: Uuid,
        admin: Uuid,
        decision: BenefitStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<BenefitRequest> {
        if !self.is_admin(admin) {
            return Err(AppError::forbidden(
                "Only the group admin can process benefit requests",
            ));
        }
        if self.group_type != GroupType::Edir {
            return Err(AppError::validation(
                "Benefit requests are only available for edir groups",
            ));
        }

        let (user, amount) = self
            .benefit_requests
            .iter()
            .find(|r| r.id == request_id)
            .map(|r| (r.user, r.amount, r.status))
            .ok_or_else(|| AppError::not_found("Benefit request not found"))
            .and_then(|(user, amount, status)| {
                if status == BenefitStatus::Pending {
                    Ok((user, amount))
                } else {
                    Err(AppError::invalid_state("Request has already been processed"))
                }
            })?;

        // 先算出新的累计金额，溢出时不改动任何状态
        let received = match (decision, self.member(user)) {
            (BenefitStatus::Approved, Some(member)) => {
                Some(checked_add(member.benefits_received, amount)?)
            }
            _ => None,
        };

        let request = self
            .benefit_request_mut(request_id)
            .ok_or_else(|| AppError::not_found("Benefit request not found"))?;
        request.status = decision;
        request.processed_by = Some(admin);
        request.processed_at = Some(now);
        request.note = note;
        let resolved = request.clone();

        if let (Some(total), Some(member)) = (received, self.member_mut(user)) {
            member.benefits_received = total;
        }
        self.updated_at = now;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap()
    }

    fn request(group_type: GroupType, rounds: u32) -> CreateGroupRequest {
        CreateGroupRequest {
            name: Some("Family".into()),
            group_type: Some(group_type),
            amount: Some(dec!(100)),
            total_rounds: Some(rounds),
            start_date: Some(now()),
            ..Default::default()
        }
    }

    fn equb_with_members(admin: Uuid, others: usize, rounds: u32) -> Group {
        let mut group = Group::new(request(GroupType::Equb, rounds), admin, now()).unwrap();
        for _ in 0..others {
            group.add_member(Uuid::new_v4(), now()).unwrap();
        }
        group
    }

    fn active_rounds(group: &Group) -> usize {
        group
            .rounds
            .iter()
            .filter(|r| r.status == RoundStatus::Active)
            .count()
    }

    #[test]
    fn new_equb_materializes_rounds_with_first_active() {
        let admin = Uuid::new_v4();
        let group = Group::new(request(GroupType::Equb, 3), admin, now()).unwrap();

        assert_eq!(group.rounds.len(), 3);
        assert_eq!(group.rounds[0].status, RoundStatus::Active);
        assert_eq!(group.rounds[1].status, RoundStatus::Pending);
        assert_eq!(group.rounds[2].contributing_members[0].user, admin);
        assert_eq!(group.current_round, 1);
        assert_eq!(group.frequency, Frequency::Monthly);
        assert!(group.invite_code.is_none());
        assert!(group.is_active_member(admin));
    }

    #[test]
    fn new_edir_gets_invite_code_and_no_rounds() {
        let group = Group::new(request(GroupType::Edir, 1), Uuid::new_v4(), now()).unwrap();
        assert!(group.rounds.is_empty());
        assert_eq!(group.invite_code.as_deref().map(str::len), Some(8));
    }

    #[test]
    fn new_group_rejects_missing_fields() {
        let mut req = request(GroupType::Equb, 3);
        req.total_rounds = Some(0);
        assert!(matches!(
            Group::new(req, Uuid::new_v4(), now()),
            Err(AppError::Validation(_))
        ));

        let mut req = request(GroupType::Equb, 3);
        req.amount = Some(dec!(-1));
        assert!(matches!(
            Group::new(req, Uuid::new_v4(), now()),
            Err(AppError::Validation(_))
        ));

        let mut req = request(GroupType::Edir, 3);
        req.name = Some("   ".into());
        assert!(matches!(
            Group::new(req, Uuid::new_v4(), now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn add_member_enrolls_in_open_rounds_and_rejects_duplicates() {
        let admin = Uuid::new_v4();
        let mut group = Group::new(request(GroupType::Equb, 2), admin, now()).unwrap();
        let user = Uuid::new_v4();

        group.add_member(user, now()).unwrap();
        assert!(group.rounds.iter().all(|r| r.contributing_members.len() == 2));
        assert!(matches!(
            group.add_member(user, now()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn add_member_requires_active_group() {
        let mut group = Group::new(request(GroupType::Edir, 1), Uuid::new_v4(), now()).unwrap();
        group.status = GroupStatus::Cancelled;
        assert!(matches!(
            group.add_member(Uuid::new_v4(), now()),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn admit_member_reactivates_existing_member() {
        let mut group = equb_with_members(Uuid::new_v4(), 1, 2);
        let user = group.members[1].user;
        group.members[1].status = MemberStatus::Inactive;

        group.admit_member(user, now());
        assert_eq!(group.members.len(), 2);
        assert!(group.is_active_member(user));
        assert_eq!(group.rounds[0].contributing_members.len(), 2);
    }

    #[test]
    fn full_equb_cycle_draws_every_member_exactly_once() {
        let admin = Uuid::new_v4();
        let mut group = equb_with_members(admin, 2, 3);
        let mut rng = StdRng::seed_from_u64(7);
        let mut winners = Vec::new();

        for number in 1..=3 {
            let result = group.draw(number, admin, &mut rng, now()).unwrap();
            assert_eq!(result.round.round_number, number);
            assert_eq!(result.round.amount, Some(dec!(300)));
            assert!(!winners.contains(&result.winner));
            winners.push(result.winner);
            assert!(active_rounds(&group) <= 1);
            assert_eq!(group.current_round, number + 1);
        }

        assert_eq!(group.status, GroupStatus::Completed);
        assert_eq!(group.end_date, Some(now()));
        assert!(group.members.iter().all(|m| m.has_won));
        for member in &group.members {
            let round = member.won_in_round.unwrap();
            assert_eq!(group.round(round).unwrap().winner, Some(member.user));
        }
    }

    #[test]
    fn draw_advances_next_round_and_schedule() {
        let admin = Uuid::new_v4();
        let mut group = equb_with_members(admin, 2, 3);
        group.frequency = Frequency::Weekly;

        group
            .draw(1, admin, &mut StdRng::seed_from_u64(1), now())
            .unwrap();

        assert_eq!(group.round(1).unwrap().status, RoundStatus::Completed);
        assert_eq!(group.round(2).unwrap().status, RoundStatus::Active);
        assert_eq!(group.next_draw_date, Some(now() + Duration::days(7)));
        assert_eq!(group.status, GroupStatus::Active);
    }

    #[test]
    fn draw_rejections() {
        let admin = Uuid::new_v4();
        let mut group = equb_with_members(admin, 1, 2);
        let mut rng = StdRng::seed_from_u64(3);

        assert!(matches!(
            group.draw(1, Uuid::new_v4(), &mut rng, now()),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            group.draw(9, admin, &mut rng, now()),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            group.draw(2, admin, &mut rng, now()),
            Err(AppError::InvalidState(_))
        ));

        group.draw(1, admin, &mut rng, now()).unwrap();
        assert!(matches!(
            group.draw(1, admin, &mut rng, now()),
            Err(AppError::InvalidState(_))
        ));

        let mut edir = Group::new(request(GroupType::Edir, 1), admin, now()).unwrap();
        assert!(matches!(
            edir.draw(1, admin, &mut rng, now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn draw_without_eligible_members_fails() {
        let admin = Uuid::new_v4();
        let mut group = equb_with_members(admin, 0, 2);
        group.members[0].status = MemberStatus::Suspended;

        assert!(matches!(
            group.draw(1, admin, &mut StdRng::seed_from_u64(5), now()),
            Err(AppError::InvalidState(_))
        ));
        assert_eq!(group.round(1).unwrap().status, RoundStatus::Active);
    }

    #[test]
    fn monthly_schedule_clamps_to_month_end() {
        let next = Frequency::Monthly.next_draw_after(now());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());
        assert_eq!(
            Frequency::Daily.next_draw_after(now()),
            now() + Duration::days(1)
        );
        assert_eq!(
            Frequency::Biweekly.next_draw_after(now()),
            now() + Duration::days(14)
        );
    }

    #[test]
    fn benefit_request_approval_updates_member_and_is_terminal() {
        let admin = Uuid::new_v4();
        let mut group = Group::new(request(GroupType::Edir, 1), admin, now()).unwrap();
        let user = Uuid::new_v4();
        group.add_member(user, now()).unwrap();

        let request = group
            .submit_benefit_request(user, "Funeral".into(), Amount::new(dec!(500)).unwrap(), None, now())
            .unwrap();
        assert_eq!(request.status, BenefitStatus::Pending);

        let resolved = group
            .resolve_benefit_request(request.id, admin, BenefitStatus::Approved, Some("ok".into()), now())
            .unwrap();
        assert_eq!(resolved.processed_by, Some(admin));
        assert_eq!(group.member(user).unwrap().benefits_received, dec!(500));

        assert!(matches!(
            group.resolve_benefit_request(request.id, admin, BenefitStatus::Rejected, None, now()),
            Err(AppError::InvalidState(_))
        ));
        assert_eq!(group.member(user).unwrap().benefits_received, dec!(500));
    }

    #[test]
    fn benefit_request_rejections() {
        let admin = Uuid::new_v4();
        let mut group = Group::new(request(GroupType::Edir, 1), admin, now()).unwrap();
        let amount = Amount::new(dec!(10)).unwrap();

        assert!(matches!(
            group.submit_benefit_request(Uuid::new_v4(), "x".into(), amount, None, now()),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            group.resolve_benefit_request(Uuid::new_v4(), admin, BenefitStatus::Approved, None, now()),
            Err(AppError::NotFound(_))
        ));

        let mut equb = equb_with_members(admin, 0, 1);
        assert!(matches!(
            equb.submit_benefit_request(admin, "x".into(), amount, None, now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn decision_parsing() {
        assert_eq!(
            BenefitStatus::parse_decision(Some("approved")).unwrap(),
            BenefitStatus::Approved
        );
        assert!(BenefitStatus::parse_decision(Some("pending")).is_err());
        assert!(BenefitStatus::parse_decision(None).is_err());
    }

    #[test]
    fn draw_pot_overflow_is_rejected_without_touching_the_round() {
        let admin = Uuid::new_v4();
        let mut group = equb_with_members(admin, 1, 2);
        group.amount = Decimal::MAX;

        assert!(matches!(
            group.draw(1, admin, &mut StdRng::seed_from_u64(9), now()),
            Err(AppError::Validation(_))
        ));
        let round = group.round(1).unwrap();
        assert_eq!(round.status, RoundStatus::Active);
        assert_eq!(round.winner, None);
        assert_eq!(group.current_round, 1);
        assert!(group.members.iter().all(|m| !m.has_won));
    }

    #[test]
    fn benefit_overflow_leaves_request_pending() {
        let admin = Uuid::new_v4();
        let mut group = Group::new(request(GroupType::Edir, 1), admin, now()).unwrap();
        let user = Uuid::new_v4();
        group.add_member(user, now()).unwrap();
        group.member_mut(user).unwrap().benefits_received = Decimal::MAX;

        let request = group
            .submit_benefit_request(user, "Medical".into(), Amount::new(dec!(1)).unwrap(), None, now())
            .unwrap();
        assert!(matches!(
            group.resolve_benefit_request(request.id, admin, BenefitStatus::Approved, None, now()),
            Err(AppError::Validation(_))
        ));
        assert_eq!(group.benefit_requests[0].status, BenefitStatus::Pending);
        assert_eq!(group.member(user).unwrap().benefits_received, Decimal::MAX);

        group
            .resolve_benefit_request(request.id, admin, BenefitStatus::Rejected, None, now())
            .unwrap();
        assert_eq!(group.benefit_requests[0].status, BenefitStatus::Rejected);
    }
}
