use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::components::{share_target_from_config, GeminiRecognizer, SessionStore};
use crate::config::Config;
use crate::error::{AppResult, Error};
use crate::shutdown;
use crate::utils::{i18n, time::SystemClock};
use crate::web::{self, AppState};

/// Sessions idle for longer than this are forgotten
pub const SESSION_IDLE_LIMIT: Duration = Duration::from_secs(60 * 60);

/// How often idle sessions are looked for
const PRUNE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Wire the production components together
pub fn build_state(config: &Config) -> AppResult<AppState> {
    let recognizer = GeminiRecognizer::from_config(config)?;
    info!("Using Gemini model {}", recognizer.model());

    Ok(AppState {
        sessions: Arc::new(SessionStore::new()),
        recognizer: Arc::new(recognizer),
        share: share_target_from_config(config),
        clock: Arc::new(SystemClock),
    })
}

/// Periodically drop idle sessions
async fn prune_sessions(sessions: Arc<SessionStore>) {
    let mut interval = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        interval.tick().await;
        let removed = sessions.prune(SESSION_IDLE_LIMIT).await;
        if removed > 0 {
            debug!("Pruned {} idle sessions", removed);
        }
    }
}

/// Start the web server and run until a shutdown signal arrives
pub async fn serve(config: Config) -> miette::Result<()> {
    i18n::set_locale(&config.locale);

    let state = build_state(&config)?;
    let pruner = tokio::spawn(prune_sessions(state.sessions.clone()));

    let app = web::router(state, config.upload_limit_bytes);
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await.map_err(Error::from)?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await
        .map_err(Error::from)?;

    pruner.abort();
    info!("Server stopped");
    Ok(())
}
