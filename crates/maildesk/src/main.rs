//! maildesk - email-channel daemon for a multi-tenant support platform.
//!
//! Threads inbound email onto support conversations, composes threaded
//! outbound replies, and reconciles provider delivery callbacks.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod collab;
mod config;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maildesk_core::{
    Database, EmailIngress, ReplyComposer, WebhookPolicy, WorkerOptions, run_worker,
};
use maildesk_transport::HttpMailer;

use collab::{HttpAuthorizer, HttpNotifier};
use config::Config;
use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maildesk=debug,maildesk_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Starting maildesk on {}", config.bind);

    let policy = match (&config.webhook_secret, config.webhook_enforce) {
        (Some(secret), true) => WebhookPolicy::enforcing(secret),
        (None, true) => anyhow::bail!(
            "MAILDESK_WEBHOOK_SECRET must be set unless MAILDESK_WEBHOOK_ENFORCE=false"
        ),
        (_, false) => {
            tracing::warn!("webhook secret enforcement is disabled");
            WebhookPolicy::disabled()
        }
    };

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let db = Database::open(&config.database_path.to_string_lossy())
        .await
        .context("opening database")?;

    let mailer = HttpMailer::new(&config.provider_url, config.provider_api_key.clone())
        .context("building provider client")?;
    let notifier = HttpNotifier::new(&config.platform_url, config.platform_token.clone());
    let authorizer = HttpAuthorizer::new(&config.platform_url, config.platform_token.clone());

    tokio::spawn(run_worker(
        db.clone(),
        mailer,
        notifier,
        WorkerOptions {
            interval: config.worker_interval,
            ..WorkerOptions::default()
        },
    ));

    let state = Arc::new(AppState {
        db,
        ingress: EmailIngress::new(policy.clone(), &config.mail_domain),
        composer: ReplyComposer::new(&config.mail_domain),
        policy,
        authorizer,
        mail_domain: config.mail_domain.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    axum::serve(listener, routes::router(state))
        .await
        .context("serving HTTP")?;

    Ok(())
}
