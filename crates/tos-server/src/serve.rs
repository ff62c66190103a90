use crate::config::TosConfig;
use crate::http::{self, AppState};
use std::sync::Arc;
use std::time::Duration;
use tos_core::{MemorySessionStore, TermsOfService, TermsStore};
use tracing::{info, warn};

pub async fn run(config: TosConfig) -> anyhow::Result<()> {
    info!("Starting TOS gate v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP: {}", config.server.http_addr);
    info!("Data: {:?}", config.server.data_dir);
    config.validate()?;

    // Validate auth config early so we fail fast before opening the database.
    let auth_enabled = config.security.auth_enabled;
    let admin_token = config.security.resolved_token();
    if auth_enabled {
        if admin_token.is_none() {
            return Err(anyhow::anyhow!(
                "[security] auth_enabled = true but no token found. \
                 Set TOS_ADMIN_TOKEN env var or set admin_token in [security] config."
            ));
        }
        info!("Admin bearer token auth: enabled");
    } else {
        warn!("Admin auth disabled, /admin is open to all connections on {}", config.server.http_addr);
    }
    if config.gate.debug {
        warn!("Gate debug mode: missing active terms are tolerated");
    }

    info!("Opening database...");
    let tos = Arc::new(TermsOfService::open(config.db_path(), config.gate.clone())?);
    let stats = tos.store().stats()?;
    info!(
        "Database loaded: {} documents, {} agreements, {} users ({} staff)",
        stats.document_count, stats.agreement_count, stats.user_count, stats.staff_count
    );
    if !stats.has_active_document {
        warn!("No active terms of service; authenticated requests will fail until one is published");
    }

    let version = tos.initialize()?;
    info!("Cache generation {}", version);

    let idle_timeout = config.session_idle_timeout();
    let sessions = MemorySessionStore::new().with_idle_timeout(idle_timeout);
    let state = AppState::with_sessions(tos.clone(), config.server.session_cookie.clone(), sessions);
    state.metrics.cache_version.set(version);

    // Abandoned cache generations and idle sessions are reclaimed by expiry;
    // sweep both periodically
    let sweep_every = config
        .gate
        .cache_ttl()
        .map_or(idle_timeout, |ttl| ttl.min(idle_timeout))
        .max(Duration::from_secs(1));
    let purge_task = {
        let tos = tos.clone();
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_every);
            loop {
                ticker.tick().await;
                match tos.cache().purge_expired() {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Purged {} expired cache entries", n),
                    Err(e) => warn!("Cache purge failed: {}", e),
                }
                match sessions.purge_idle() {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Purged {} idle sessions", n),
                    Err(e) => warn!("Session purge failed: {}", e),
                }
            }
        })
    };

    let app = http::create_router(state, auth_enabled, admin_token);
    let addr = config.server.http_addr;
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("TOS gate ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, terminating...");
        })
        .await?;

    purge_task.abort();
    Ok(())
}
