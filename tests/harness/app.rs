use std::path::Path;
use std::sync::Arc;

use hindsight::infrastructure::bootstrap::App;
use hindsight::infrastructure::config::settings::Config;
use hindsight::port::NotifierRegistry;
use hindsight::testkit::config::in_dir;
use hindsight::testkit::market::ScriptedMarketData;
use hindsight::testkit::notifier::RecordingNotifier;
use tempfile::TempDir;

/// A fully wired engine in a temp dir, with scripted prices and a
/// recording notifier in place of CoinGecko and Telegram.
pub struct TestApp {
    pub app: App,
    pub market: Arc<ScriptedMarketData>,
    pub notifier: RecordingNotifier,
    dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Start from the temp-dir config and let `tweak` adjust it.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut config = in_dir(dir.path());
        tweak(&mut config);

        let market = Arc::new(ScriptedMarketData::new());
        let notifier = RecordingNotifier::new();
        let mut registry = NotifierRegistry::new();
        registry.register(Box::new(notifier.clone()));

        let app = App::assemble(config, market.clone(), registry).expect("assemble app");
        Self {
            app,
            market,
            notifier,
            dir,
        }
    }

    /// Like [`TestApp::with_config`] but with a database path that cannot
    /// be opened, forcing the fallback file store.
    pub fn with_unreachable_database() -> Self {
        Self::with_config(|config| {
            let fallback_dir = config
                .store
                .fallback_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            config.store.database_url = fallback_dir
                .join("no-such-dir")
                .join("hindsight.db")
                .display()
                .to_string();
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
