//! Process wiring and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use booking_check_core::{
    Broker, DeliveryDispatcher, DeliveryGateway, FanoutCoordinator, LocalBroker, NatsBroker,
    Publisher, SharedRegistry, SledRegistry, SubscriptionCommands, NOTIFY_TOPIC,
    SCRAPE_RESULT_TOPIC,
};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::telegram::{TelegramBot, UpdateLoop, BOT_DESCRIPTION};
use crate::{create_router, AppState};

/// A fully wired notifier, ready to run.
pub struct NotifierService {
    registry: Arc<SledRegistry>,
    broker: Arc<dyn Broker>,
    publisher: Arc<dyn Publisher>,
    updates: UpdateLoop,
    listener: TcpListener,
}

impl NotifierService {
    /// Open the registry, connect to Telegram, subscribe the handlers and
    /// bind the HTTP listener.
    pub async fn start(config: &ServerConfig) -> Result<Self, Error> {
        tracing::info!(path = %config.db_path.display(), "opening registry");
        let registry = Arc::new(SledRegistry::open(&config.db_path)?);
        if registry.was_recovered() {
            tracing::info!("registry recovered from disk");
        }
        let shared: SharedRegistry = registry.clone();

        let bot = Arc::new(TelegramBot::connect(config).await?);
        let gateway: Arc<dyn DeliveryGateway> = bot.clone();

        let (broker, publisher) = open_broker(config).await?;

        broker
            .subscribe(
                NOTIFY_TOPIC,
                Arc::new(DeliveryDispatcher::new(gateway.clone())),
            )
            .await?;
        broker
            .subscribe(
                SCRAPE_RESULT_TOPIC,
                Arc::new(FanoutCoordinator::new(
                    shared.clone(),
                    publisher.clone(),
                    config.owner_id,
                )),
            )
            .await?;

        let commands = Arc::new(SubscriptionCommands::new(shared, gateway, config.owner_id));
        let updates = UpdateLoop::new(bot, commands);

        let listener = TcpListener::bind(&config.listen_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "http listener bound");

        Ok(Self {
            registry,
            broker,
            publisher,
            updates,
            listener,
        })
    }

    /// Address the HTTP server listens on.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the HTTP server and the bot update loop until a shutdown signal
    /// is sent on `shutdown`, or until either of them stops on its own.
    ///
    /// Fails without serving if the bot profile cannot be published. On the
    /// way out the broker is drained before the registry is flushed.
    pub async fn run_until_shutdown(self, shutdown: &broadcast::Sender<()>) -> Result<(), Error> {
        let Self {
            registry,
            broker,
            publisher,
            updates,
            listener,
        } = self;
        let mut http_shutdown = shutdown.subscribe();
        let updates_shutdown = shutdown.subscribe();

        if let Err(e) = updates.configure(BOT_DESCRIPTION).await {
            tracing::error!(error = %e, "failed to publish bot description and commands");
            broker.shutdown().await;
            registry.flush()?;
            return Err(e);
        }

        let shared: SharedRegistry = registry.clone();
        let app = create_router(AppState::new(shared, publisher));

        let http = async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown.recv().await;
                })
                .await;
            let _ = shutdown.send(());
            result
        };
        let polling = async move {
            let result = updates.run(updates_shutdown).await;
            let _ = shutdown.send(());
            result
        };

        tracing::info!("notifier ready");
        let (http_result, updates_result) = tokio::join!(http, polling);

        broker.shutdown().await;
        registry.flush()?;
        tracing::info!("registry flushed");

        http_result?;
        updates_result
    }
}

/// NATS when a server is configured, otherwise the in-process broker.
async fn open_broker(
    config: &ServerConfig,
) -> Result<(Arc<dyn Broker>, Arc<dyn Publisher>), Error> {
    match &config.nats_url {
        Some(url) => {
            let broker = Arc::new(NatsBroker::connect(url).await?);
            let publisher: Arc<dyn Publisher> = broker.clone();
            let broker: Arc<dyn Broker> = broker;
            Ok((broker, publisher))
        }
        None => {
            tracing::info!("no nats url configured, using in-process broker");
            let broker = Arc::new(LocalBroker::with_capacity(config.queue_capacity));
            let publisher: Arc<dyn Publisher> = broker.clone();
            let broker: Arc<dyn Broker> = broker;
            Ok((broker, publisher))
        }
    }
}
