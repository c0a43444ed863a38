mod handler;
mod model;

pub use handler::{
    create_join_request, list_requests, pending_requests, process_request, user_requests,
};
pub use model::{ProcessRequestBody, Request, RequestStatus, RequestType};
