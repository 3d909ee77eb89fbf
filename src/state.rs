use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::bookings::BookingService;
use crate::services::catalog::CatalogService;
use crate::services::media::MediaHost;
use crate::services::partners::PartnerService;
use crate::services::users::UserService;
use crate::store::DocumentStore;

pub struct AppState {
    pub config: AppConfig,
    pub bookings: BookingService,
    pub catalog: CatalogService,
    pub partners: PartnerService,
    pub users: UserService,
    pub media: Box<dyn MediaHost>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>, media: Box<dyn MediaHost>) -> Self {
        Self {
            bookings: BookingService::new(Arc::clone(&store), config.transition_policy),
            catalog: CatalogService::new(Arc::clone(&store)),
            partners: PartnerService::new(Arc::clone(&store)),
            users: UserService::new(store),
            config,
            media,
        }
    }
}
