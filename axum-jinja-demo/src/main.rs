use anyhow::Context as _;
use axum::routing::{any, get};
use axum_jinja::prelude::*;
use clap::Parser;
use std::net::SocketAddr;
use tokio::signal;
use tower_http::trace::TraceLayer;

mod handlers;

/// Small site rendered with axum-jinja
#[derive(Parser)]
#[command(name = "axum-jinja-demo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "AXUM_JINJA_CONFIG", default_value = axum_jinja::config::CONFIG_FILE)]
    config: String,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,
}

const SITE_NAME: &str = "axum-jinja demo";

/// Templates compiled into the binary, used when no template_dir is configured
const EMBEDDED: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("user.html", include_str!("../templates/user.html")),
    ("contact.html", include_str!("../templates/contact.html")),
    (
        "admin/dashboard.html",
        include_str!("../templates/admin/dashboard.html"),
    ),
];

fn with_embedded(mut options: Setup, config: &TemplateConfig) -> Setup {
    if config.template_dir.is_none() {
        for (name, source) in EMBEDDED {
            options = options.template(*name, *source);
        }
    }
    options
}

fn build_app(config: &Config) -> App {
    let mut admin = App::new()
        .with_value("site_name", SITE_NAME)
        .route_named(
            "admin_dashboard",
            "/",
            get(template("admin/dashboard.html").wrap(handlers::dashboard)),
        );
    setup(
        &mut admin,
        with_embedded(Setup::from_config(&config.templates), &config.templates),
    );

    let mut app = App::new()
        .with_value("site_name", SITE_NAME)
        .route_named("index", "/", get(template("index.html").wrap(handlers::index)))
        .route_named(
            "user",
            "/users/{id}",
            get(template("user.html").wrap(handlers::user)),
        )
        .route_named(
            "contact",
            "/contact",
            any(template("contact.html").wrap_view::<handlers::Contact>()),
        )
        .nest("/admin", admin);

    let options = Setup::from_config(&config.templates)
        .context_processor(request_processor)
        .context_processor(handlers::site_processor)
        .static_root_url(
            config
                .templates
                .static_root_url
                .clone()
                .unwrap_or_else(|| "/static".to_string()),
        );
    setup(&mut app, with_embedded(options, &config.templates));

    app.layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    init_tracing(&config.logging)?;

    let router = build_app(&config).into_router();

    let listener = tokio::net::TcpListener::bind(cli.addr)
        .await
        .with_context(|| format!("Failed to bind {}", cli.addr))?;
    tracing::info!("Listening on http://{}", cli.addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
