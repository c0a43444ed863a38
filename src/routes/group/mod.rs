mod handler;
mod lifecycle;
mod model;
mod service;

pub use handler::{
    available_edirs, create_group, delete_group, get_edir, get_equb, get_group, join_by_code,
    join_group, list_edirs, list_equbs, list_groups, my_groups, perform_draw, process_benefit,
    request_benefit, update_group, update_group_status,
};
pub use model::{
    BenefitRequest, BenefitRequestBody, BenefitStatus, ContributingMember, CreateGroupRequest,
    DrawResult, EmergencyContact, Frequency, Group, GroupStatus, GroupType, Member, MemberStatus,
    ProcessBenefitRequestBody, Round, RoundStatus, UpdateGroupRequest,
};
