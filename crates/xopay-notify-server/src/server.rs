//! Service wiring and lifecycle.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use xopay_notify_auth::TokenSigner;
use xopay_notify_currency::{CurrencyScheduler, NbuSource, PrivatBankSource, RateSource};
use xopay_notify_delivery::{AdminReporter, ApiClient, Mailer, SmsGateway, SmtpMailer};
use xopay_notify_engine::{MemoryRuleStore, NotifyEngine, RuleStore};
use xopay_notify_queue::{
    EmailHandler, QueueConsumer, QueueHandler, RequestHandler, SmsHandler, TransactionHandler,
};

use crate::admin::{self, AdminState};
use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("auth setup error: {0}")]
    Auth(#[from] xopay_notify_auth::AuthError),

    #[error("mail transport error: {0}")]
    Mail(#[from] lettre::transport::smtp::Error),

    #[error("engine error: {0}")]
    Engine(#[from] xopay_notify_engine::EngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The assembled service.
///
/// Owns the consumer, the engine, the currency daemon and the admin HTTP
/// surface; [`run`](Self::run) blocks until shutdown.
pub struct Server {
    config: AppConfig,
}

impl Server {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<(), ServerError> {
        let config = self.config;
        let shutdown = CancellationToken::new();

        let signer = TokenSigner::new(&config.auth)?;
        let client = ApiClient::new(signer.clone());
        let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(&config.mail)?);
        let sms = Arc::new(SmsGateway::new());
        let reporter = Arc::new(AdminReporter::new(
            client.clone(),
            mailer.clone(),
            config.urls.admin_base_url.clone(),
        ));

        let store: Arc<dyn RuleStore> = Arc::new(MemoryRuleStore::new());
        let engine = Arc::new(NotifyEngine::new(
            store.clone(),
            client.clone(),
            mailer.clone(),
            config.urls.admin_base_url.clone(),
        ));
        engine.reload().await?;

        let handlers: Vec<Arc<dyn QueueHandler>> = vec![
            Arc::new(TransactionHandler::new(
                config.queues.transaction_status.clone(),
                client.clone(),
                reporter.clone(),
                config.urls.client_base_url.clone(),
                shutdown.clone(),
            )),
            Arc::new(EmailHandler::new(
                config.queues.email.clone(),
                mailer.clone(),
            )),
            Arc::new(SmsHandler::new(config.queues.sms.clone(), sms)),
            Arc::new(RequestHandler::new(
                config.queues.request.clone(),
                engine.clone(),
            )),
        ];
        let consumer = QueueConsumer::new(handlers, config.amqp.clone(), shutdown.clone());

        let sources: Vec<Arc<dyn RateSource>> =
            vec![Arc::new(PrivatBankSource::new()), Arc::new(NbuSource::new())];
        let scheduler = CurrencyScheduler::new(
            sources,
            client.clone(),
            reporter.clone(),
            config.urls.admin_base_url.clone(),
            config.currency.update_hours.clone(),
            config.timezone(),
            shutdown.clone(),
        );

        let consumer_task = tokio::spawn(async move { consumer.run().await });
        let scheduler_task = tokio::spawn(async move { scheduler.run().await });

        let app = admin::router(AdminState {
            store,
            engine,
            signer,
        });
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "admin surface listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown.clone()))
            .await?;

        // The signal handler already cancelled the token; the daemons
        // observe it between sleeps and drain their in-flight work.
        let _ = consumer_task.await;
        let _ = scheduler_task.await;

        Ok(())
    }
}

async fn wait_for_shutdown(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; fall back to the token only.
        shutdown.cancelled().await;
        return;
    }
    tracing::info!("shutdown signal received, stopping");
    shutdown.cancel();
}
