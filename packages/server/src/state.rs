use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::admission::AdmissionControl;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub admission: Arc<dyn AdmissionControl>,
}
