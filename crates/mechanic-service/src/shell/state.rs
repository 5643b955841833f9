use std::sync::Arc;

use crate::application::ops::MechanicOps;

#[derive(Clone)]
pub struct AppState {
    pub ops: Arc<MechanicOps>,
}
