//! Composition root: builds the engine from configuration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::adapter::outbound::coingecko::CoinGeckoClient;
use crate::adapter::outbound::file::JsonFileStore;
#[cfg(feature = "telegram")]
use crate::adapter::outbound::notifier::telegram::{TelegramNotifier, TelegramSettings};
use crate::adapter::outbound::sqlite::database::connection::probe;
use crate::adapter::outbound::sqlite::SqliteRecordStore;
use crate::application::intake::Engine;
use crate::application::learning::LearningService;
use crate::application::persistence::{Backend, Persistence};
use crate::application::scheduler::Scheduler;
use crate::application::snapshot::SnapshotWriter;
use crate::application::validation::ValidationService;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::market_data::MarketData;
use crate::port::outbound::notifier::{LogNotifier, Notifier, NotifierRegistry};
use crate::port::outbound::store::RecordStore;

/// Everything a running process needs, wired once at startup.
pub struct App {
    pub config: Config,
    pub persistence: Persistence,
    pub engine: Engine,
    pub scheduler: Arc<Scheduler>,
    pub notifiers: Arc<NotifierRegistry>,
}

impl App {
    /// Wire the production stack: SQLite (or the fallback file), CoinGecko
    /// and the configured notifiers.
    ///
    /// Must be called from within a tokio runtime when Telegram is enabled.
    ///
    /// # Errors
    ///
    /// Fails only when neither the database nor the fallback file can be
    /// opened.
    pub fn build(config: Config) -> Result<Self> {
        let market: Arc<dyn MarketData> =
            Arc::new(CoinGeckoClient::from_config(&config.market_data));
        let notifiers = build_notifier_registry(&config);
        Self::assemble(config, market, notifiers)
    }

    /// Wire the engine around an explicit market data source and notifiers.
    ///
    /// # Errors
    ///
    /// See [`App::build`].
    pub fn assemble(
        config: Config,
        market: Arc<dyn MarketData>,
        notifiers: NotifierRegistry,
    ) -> Result<Self> {
        let (store, backend) = open_store(&config)?;
        let persistence = build_persistence(&config, store, backend);

        let notifiers = Arc::new(notifiers);
        let notifier: Arc<dyn Notifier> = notifiers.clone();
        info!(notifiers = notifiers.len(), "Notifiers initialized");

        let validation = ValidationService::new(
            persistence.clone(),
            market,
            config.evaluation.evaluator(),
            Arc::clone(&notifier),
        );
        let learning = LearningService::new(
            persistence.clone(),
            config.aggregation.aggregator(),
            config.synthesis.synthesizer(),
            Arc::clone(&notifier),
        )
        .with_groupings(config.aggregation.groupings.clone())
        .with_rehearsal(config.aggregation.include_rehearsal);

        let scheduler = Arc::new(Scheduler::new(
            validation,
            learning,
            notifier,
            config.schedule.cadence(),
        ));
        let engine = Engine::new(persistence.clone(), config.mode);

        Ok(Self {
            config,
            persistence,
            engine,
            scheduler,
            notifiers,
        })
    }
}

/// Probe the database and fall back to the JSON file when it is unusable.
///
/// The choice is made once; a fallback process stays on the file until it
/// restarts.
pub(crate) fn open_store(config: &Config) -> Result<(Arc<dyn RecordStore>, Backend)> {
    let url = &config.store.database_url;
    match probe(url, config.store.probe_timeout()) {
        Ok(pool) => {
            info!(database = %url, "Database initialized");
            Ok((Arc::new(SqliteRecordStore::new(pool)), Backend::Primary))
        }
        Err(e) => {
            let path = &config.store.fallback_path;
            warn!(
                database = %url,
                fallback = %path.display(),
                error = %e,
                "Database unavailable, using fallback file store"
            );
            let store = JsonFileStore::open(path)?;
            Ok((Arc::new(store), Backend::Fallback))
        }
    }
}

fn build_persistence(config: &Config, store: Arc<dyn RecordStore>, backend: Backend) -> Persistence {
    let persistence = Persistence::new(store, backend, config.retry.policy());
    match &config.snapshot_dir {
        Some(dir) => {
            let writer = SnapshotWriter::in_dir(dir, backend.as_str());
            info!(path = %writer.path().display(), "Learning snapshot enabled");
            persistence.with_snapshot(writer)
        }
        None => persistence,
    }
}

/// Build notifier registry from configuration.
#[cfg(feature = "telegram")]
pub(crate) fn build_notifier_registry(config: &Config) -> NotifierRegistry {
    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(LogNotifier));

    if config.telegram.enabled {
        match (&config.telegram.bot_token, config.telegram.chat_id) {
            (Some(token), Some(chat_id)) => {
                registry.register(Box::new(TelegramNotifier::new(TelegramSettings {
                    bot_token: token.clone(),
                    chat_id,
                    notify_validations: config.telegram.notify_validations,
                    notify_insights: config.telegram.notify_insights,
                    notify_degraded: config.telegram.notify_degraded,
                })));
                info!("Telegram notifier enabled");
            }
            _ => warn!("Telegram enabled but TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not set"),
        }
    }

    registry
}

/// Build notifier registry from configuration (non-telegram variant).
#[cfg(not(feature = "telegram"))]
pub(crate) fn build_notifier_registry(config: &Config) -> NotifierRegistry {
    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(LogNotifier));
    if config.telegram.enabled {
        warn!("Telegram enabled in config but the telegram feature is not compiled in");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::config::in_dir;

    #[test]
    fn reachable_database_is_primary() {
        let dir = tempfile::tempdir().unwrap();
        let (store, backend) = open_store(&in_dir(dir.path())).unwrap();

        assert_eq!(backend, Backend::Primary);
        assert_eq!(store.backend_name(), "sqlite");
    }

    #[test]
    fn unreachable_database_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = in_dir(dir.path());
        config.store.database_url = dir
            .path()
            .join("missing")
            .join("nested")
            .join("hindsight.db")
            .display()
            .to_string();

        let (store, backend) = open_store(&config).unwrap();

        assert_eq!(backend, Backend::Fallback);
        assert_eq!(store.backend_name(), "json-file");
    }

    #[tokio::test]
    async fn default_registry_logs_only() {
        let registry = build_notifier_registry(&Config::default());
        assert_eq!(registry.len(), 1);
    }
}
