pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::{
    activity_service::{ActivityService, ActivitySink},
    behavior_service::{BehaviorClassifier, OpenAiBehaviorClassifier},
    disqualification_service::{DisqualificationService, DisqualificationStore},
    exam_service::{ExamCatalog, ExamService},
    whitelist_service::{WhitelistLookup, WhitelistService},
};
use crate::session::{Clock, Collaborators, SessionRegistry, TokioClock};
use reqwest::Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub exams: Arc<dyn ExamCatalog>,
    pub whitelist: Arc<dyn WhitelistLookup>,
    pub classifier: Arc<dyn BehaviorClassifier>,
    pub activity: Arc<dyn ActivitySink>,
    pub disqualifications: Arc<dyn DisqualificationStore>,
    pub clock: Arc<dyn Clock>,
    pub sessions: SessionRegistry,
    pub capture_interval: Duration,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> crate::error::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            exams: Arc::new(ExamService::new(pool.clone())),
            whitelist: Arc::new(WhitelistService::new(pool.clone())),
            classifier: Arc::new(OpenAiBehaviorClassifier::new(
                config.openai_api_key.clone(),
                config.classifier_model.clone(),
                http_client,
            )),
            activity: Arc::new(ActivityService::new(pool.clone())),
            disqualifications: Arc::new(DisqualificationService::new(pool.clone())),
            clock: Arc::new(TokioClock::new()),
            sessions: SessionRegistry::new(),
            capture_interval: Duration::from_millis(config.capture_interval_ms.max(1)),
            pool,
        })
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            classifier: self.classifier.clone(),
            activity: self.activity.clone(),
            disqualifications: self.disqualifications.clone(),
            clock: self.clock.clone(),
            capture_interval: self.capture_interval,
        }
    }
}
