//! Service wiring and shutdown.
//!
//! [`start`] builds the transports and services from a [`ChoreConfig`] and
//! spawns the enabled background loops. Every loop gets a child of one
//! cancellation token owned by the returned [`ServiceHandle`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::channels::{
    ChatIngestLoop, ConnectService, NotificationDispatcher, NotificationSettings, TelegramClient,
    WebhookClient,
};
use crate::chores::TaskLifecycle;
use crate::config::{ChoreConfig, ConfigSeverity, StoreBackend, StoreConfig};
use crate::scheduler::DailySweepScheduler;
use crate::store::{MemoryStore, SqliteStore, Store, StoreError};

/// Open the configured persistence backend.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("using in-memory store, data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.path)?;
            info!(path = %config.path.display(), "opened sqlite store");
            Ok(Arc::new(store))
        }
    }
}

/// Running services plus the handles needed to stop them.
pub struct ServiceHandle {
    pub lifecycle: Arc<TaskLifecycle>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub connect: Arc<ConnectService>,
    pub settings: Arc<NotificationSettings>,
    /// `None` when the scheduler is disabled.
    pub scheduler: Option<Arc<DailySweepScheduler>>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl ServiceHandle {
    /// Number of background loops still running.
    #[must_use]
    pub fn running_loops(&self) -> usize {
        self.tasks.len()
    }

    /// Token cancelled by [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every loop and wait for all of them to exit.
    pub async fn shutdown(mut self) {
        info!("shutting down background loops");
        self.cancel.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "background loop ended abnormally");
            }
        }
        info!("all background loops stopped");
    }
}

/// Build every service and spawn the enabled loops.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Fails when validation reports an error-level issue or a transport
/// cannot be constructed.
pub fn start(config: &ChoreConfig, store: Arc<dyn Store>) -> anyhow::Result<ServiceHandle> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => warn!(id = %issue.id, "{}: {}", issue.title, issue.summary),
            ConfigSeverity::Error => error!(id = %issue.id, "{}: {}", issue.title, issue.summary),
        }
    }
    if let Some(issue) = issues
        .iter()
        .find(|issue| issue.severity == ConfigSeverity::Error)
    {
        anyhow::bail!("invalid configuration: {}: {}", issue.title, issue.summary);
    }

    let public_url = config.notifications.public_url.clone();
    let webhook = WebhookClient::new(Duration::from_secs(
        config.notifications.webhook_timeout_secs,
    ))
    .context("building webhook client")?;
    let mut dispatcher =
        NotificationDispatcher::new(store.clone(), public_url.clone()).with_webhook(Arc::new(webhook));

    let telegram = if config.telegram.enabled {
        let client = Arc::new(
            TelegramClient::from_config(&config.telegram).context("building telegram client")?,
        );
        dispatcher = dispatcher.with_chat(client.clone());
        Some(client)
    } else {
        info!("telegram disabled, only webhook notifications are available");
        None
    };

    let dispatcher = Arc::new(dispatcher);
    let lifecycle = Arc::new(TaskLifecycle::new(
        store.clone(),
        dispatcher.clone(),
        config.calendar(),
    ));
    let connect = Arc::new(ConnectService::new(store.clone(), dispatcher.clone()));
    let settings = Arc::new(NotificationSettings::new(store.clone(), dispatcher.clone()));

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let scheduler = if config.scheduler.enabled {
        let trigger = config
            .trigger_time()
            .context("trigger time out of range")?;
        let scheduler = Arc::new(DailySweepScheduler::new(
            store.clone(),
            lifecycle.clone(),
            dispatcher.clone(),
            trigger,
        ));
        let runner = scheduler.clone();
        let token = cancel.child_token();
        tasks.spawn(async move { runner.run(token).await });
        Some(scheduler)
    } else {
        info!("daily sweep disabled");
        None
    };

    if let Some(chat) = telegram {
        let ingest = ChatIngestLoop::new(
            chat,
            connect.clone(),
            public_url,
            config.ingest_settings(),
        );
        let token = cancel.child_token();
        tasks.spawn(async move { ingest.run(token).await });
    }

    info!(loops = tasks.len(), "chorewheel services started");
    Ok(ServiceHandle {
        lifecycle,
        dispatcher,
        connect,
        settings,
        scheduler,
        cancel,
        tasks,
    })
}
