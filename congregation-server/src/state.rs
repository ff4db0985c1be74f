use std::path::PathBuf;
use std::sync::Arc;

use congregation_core::auth::AccountService;
use congregation_core::backend::Backends;
use congregation_core::service::{CalendarService, EventService, EventSettings, SermonService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<EventService>,
    pub sermons: Arc<SermonService>,
    pub accounts: Arc<AccountService>,
    pub calendar: Arc<CalendarService>,
    /// Served under /files when uploads are kept on local disk
    pub uploads_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(backends: Backends, settings: EventSettings) -> Self {
        let Backends {
            store,
            auth,
            storage,
        } = backends;

        AppState {
            events: Arc::new(EventService::new(store.clone(), storage.clone(), settings)),
            sermons: Arc::new(SermonService::new(
                store.clone(),
                storage.clone(),
                settings.stale_time,
            )),
            accounts: Arc::new(AccountService::new(store.clone(), auth, storage)),
            calendar: Arc::new(CalendarService::new(store, settings.fan_out)),
            uploads_dir: None,
        }
    }

    pub fn with_uploads_dir(mut self, dir: PathBuf) -> Self {
        self.uploads_dir = Some(dir);
        self
    }
}
