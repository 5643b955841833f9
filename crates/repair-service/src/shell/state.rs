use std::sync::Arc;

use crate::application::commands::RepairCommands;
use crate::application::estimator::Estimator;
use crate::core::ports::RepairStore;
use crate::shell::hub::StatusHub;

#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<RepairCommands>,
    pub estimator: Arc<Estimator>,
    pub store: Arc<dyn RepairStore>,
    pub hub: Arc<StatusHub>,
}
