//! Shared state for the HTTP handlers.
//!
//! ## Usage
//!
//! ```ignore
//! let state = AppState::new(ControlApi::from_settings(&settings));
//! let app = routes::router(state);
//! ```

use std::sync::Arc;

use consumption_core::ControlApi;

/// State handed to every handler. Clones share one [`ControlApi`].
#[derive(Clone)]
pub struct AppState {
    api: Arc<ControlApi>,
}

impl AppState {
    pub fn new(api: ControlApi) -> Self {
        Self { api: Arc::new(api) }
    }

    pub fn api(&self) -> &ControlApi {
        &self.api
    }
}
