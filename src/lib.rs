use std::sync::Arc;

use config::Config;
use database::Database;
use infrastructure::{AuthVerifier, Notifier, PushSender};

pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod infrastructure;
pub mod middleware;
pub mod money;
pub mod routes;
pub mod utils;

pub use routes::build_router;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub auth: Arc<dyn AuthVerifier>,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(
        db: Database,
        config: Config,
        auth: Arc<dyn AuthVerifier>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        let notifier = Notifier::new(db.clone(), push);
        Self {
            db,
            config,
            auth,
            notifier,
        }
    }
}
