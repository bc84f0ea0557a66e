//! Application Startup
//!
//! Collaborator selection, component wiring, the two listeners and
//! graceful shutdown.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::application::services::{BridgeConfig, ChatRelay, FanoutBridge, Hub, HubConfig};
use crate::config::Settings;
use crate::domain::{ChatStore, MessageBus};
use crate::infrastructure::pubsub::{self, MemoryBus};
use crate::infrastructure::repositories::{MemoryChatStore, PgChatStore};
use crate::infrastructure::database;
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: ChatRelay,
    pub store: Arc<dyn ChatStore>,
    pub bus: Arc<dyn MessageBus>,
    pub settings: Arc<Settings>,
    /// Flips to `true` once shutdown starts; long-lived responses end on it
    pub shutdown: watch::Receiver<bool>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    rpc_listener: TcpListener,
    router: Router,
    rpc_router: Router,
    relay: ChatRelay,
    shutdown_tx: watch::Sender<bool>,
}

impl Application {
    /// Build the application from settings.
    ///
    /// An empty `database.url` selects the in-memory store and an empty
    /// `redis.url` the in-process bus.
    pub async fn build(settings: Settings) -> Result<Self> {
        let store: Arc<dyn ChatStore> = if settings.database.is_configured() {
            let pool = database::create_pool(&settings.database).await?;
            Arc::new(PgChatStore::new(pool))
        } else {
            info!("No database configured, using in-memory store");
            Arc::new(MemoryChatStore::new())
        };

        let bus: Arc<dyn MessageBus> = if settings.redis.is_configured() {
            Arc::new(pubsub::create_redis_bus(&settings.redis).await?)
        } else {
            info!("No Redis configured, using in-process bus");
            Arc::new(MemoryBus::default())
        };

        Self::with_collaborators(settings, store, bus).await
    }

    /// Build the application around the given store and bus.
    pub async fn with_collaborators(
        settings: Settings,
        store: Arc<dyn ChatStore>,
        bus: Arc<dyn MessageBus>,
    ) -> Result<Self> {
        health::init_server_start();

        let hub = Hub::start(HubConfig {
            command_buffer: settings.hub.command_buffer,
        });
        let bridge = FanoutBridge::start(
            bus.clone(),
            hub.clone(),
            BridgeConfig {
                dedup_window: settings.bridge.dedup_window(),
                dedup_capacity: settings.bridge.dedup_capacity,
                resubscribe_delay: settings.bridge.resubscribe_delay(),
            },
        )
        .await;
        let relay = ChatRelay::new(hub, bridge, store.clone());

        let (shutdown_tx, shutdown) = watch::channel(false);
        let state = AppState {
            relay: relay.clone(),
            store,
            bus,
            settings: Arc::new(settings.clone()),
            shutdown,
        };

        // Build routers with middleware
        let router = routes::create_router(state.clone())
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&settings.cors));
        let rpc_router = routes::create_rpc_router(state).layer(logging::create_trace_layer());

        let listener = TcpListener::bind(settings.server_addr()).await?;
        info!("Listening on {}", listener.local_addr()?);
        let rpc_listener = TcpListener::bind(settings.rpc_addr()).await?;
        info!("RPC gateway listening on {}", rpc_listener.local_addr()?);

        Ok(Self {
            listener,
            rpc_listener,
            router,
            rpc_router,
            relay,
            shutdown_tx,
        })
    }

    /// Run the server until Ctrl-C or SIGTERM
    pub async fn run_until_stopped(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the server until `signal` resolves, then stop the listeners,
    /// the bridge and the registry, in that order.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            rpc_listener,
            router,
            rpc_router,
            relay,
            shutdown_tx,
        } = self;

        let stop = shutdown_tx.subscribe();
        tokio::spawn(async move {
            signal.await;
            info!("Shutdown requested");
            shutdown_tx.send_replace(true);
        });

        let http = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_requested(stop.clone()))
            .into_future();
        let rpc = axum::serve(rpc_listener, rpc_router)
            .with_graceful_shutdown(shutdown_requested(stop))
            .into_future();
        let (http_result, rpc_result) = tokio::join!(http, rpc);
        info!("Listeners stopped");

        relay.bridge().shutdown().await;
        relay.hub().shutdown().await;
        info!("Relay stopped");

        http_result?;
        rpc_result?;
        Ok(())
    }

    /// Router of the public listener
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Router of the RPC listener
    pub fn rpc_router(&self) -> Router {
        self.rpc_router.clone()
    }

    pub fn relay(&self) -> &ChatRelay {
        &self.relay
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Get the bound RPC gateway address
    pub fn rpc_local_addr(&self) -> std::io::Result<SocketAddr> {
        self.rpc_listener.local_addr()
    }
}

/// Resolves once shutdown has been requested.
pub async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    // A dropped sender also means shutdown.
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
