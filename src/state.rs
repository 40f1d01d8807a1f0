use std::sync::Arc;

use crate::auth::broker::PasswordBroker;
use crate::auth::gate::AuthGate;
use crate::auth::verification::EmailVerifier;
use crate::config::Config;
use crate::db::Stores;
use crate::email::Notifier;
use crate::metrics::Metrics;
use crate::rate_limit::{LoginRateLimiter, RequestThrottle};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub broker: PasswordBroker,
    pub verifier: EmailVerifier,
    pub gate: AuthGate,
    pub throttle: RequestThrottle,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config, stores: Stores, notifier: Notifier) -> SharedState {
        let broker = PasswordBroker::new(
            &stores,
            notifier.clone(),
            &config.base_url,
            config.reset_token_ttl,
        );
        let verifier = EmailVerifier::new(
            stores.users.clone(),
            notifier,
            &config.base_url,
            &config.app_key,
            config.verification_ttl,
        );
        let gate = AuthGate::new(stores.users.clone(), LoginRateLimiter::new());

        Arc::new(AppState {
            config,
            stores,
            broker,
            verifier,
            gate,
            throttle: RequestThrottle::verification(),
            metrics: Metrics::new(),
        })
    }
}
