//! ClawdBot Dashboard
//!
//! Command line access to the bot's config, predictions, trades and
//! metrics, plus the dashboard JSON server.

use clap::{Parser, Subcommand};
use clawdbot_dashboard::{
    client::{ApiClient, DirectReader},
    config::Config,
    dashboard::{start_dashboard, DashboardState, Summary},
    fallback::{DataAccess, OverviewRequest},
    store::FirestoreClient,
    types::{
        BotConfig, Confidence, GatewayMode, Metric, MetricType, Prediction, Trade, TradeSide,
        TradeStatus,
    },
};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clawdbot-dashboard")]
#[command(about = "Dashboard data access for the ClawdBot trading bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the home page overview
    Overview,
    /// Serve the dashboard JSON API
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Read or change the bot configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List recent predictions
    Predictions {
        #[arg(long)]
        market_id: Option<String>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// List recent trades
    Trades {
        /// open, closing or closed
        #[arg(long)]
        status: Option<TradeStatus>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// List recent metric samples
    Metrics {
        /// latency, exposure or win_rate
        #[arg(long = "type")]
        metric_type: Option<MetricType>,
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },
    /// Store a prediction
    RecordPrediction {
        #[arg(long)]
        market_id: String,
        #[arg(long)]
        question: String,
        #[arg(long)]
        edge: f64,
        /// HIGH, MEDIUM or LOW
        #[arg(long)]
        confidence: Confidence,
        #[arg(long)]
        decision: String,
        #[arg(long)]
        source: Option<String>,
        /// Repeat for each source consulted
        #[arg(long = "data-source")]
        data_sources: Vec<String>,
    },
    /// Store a trade (a trade id is generated when omitted)
    RecordTrade {
        #[arg(long)]
        trade_id: Option<String>,
        #[arg(long)]
        market_id: String,
        /// YES or NO
        #[arg(long)]
        side: TradeSide,
        #[arg(long)]
        size: f64,
        #[arg(long)]
        entry_price: f64,
        #[arg(long)]
        exit_price: Option<f64>,
        #[arg(long, default_value = "open")]
        status: TradeStatus,
        #[arg(long, default_value = "0")]
        pnl: f64,
    },
    /// Move a trade to its next status
    Trade {
        #[command(subcommand)]
        action: TradeAction,
    },
    /// Append a metric sample
    RecordMetric {
        #[arg(long = "type")]
        metric_type: MetricType,
        #[arg(long)]
        value: f64,
        #[arg(long)]
        component: Option<String>,
    },
    /// Query the polyclaw trading agent
    Polyclaw {
        #[command(subcommand)]
        action: PolyclawAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current config
    Show,
    /// Push a local JSON bot config file
    Push { file: String },
    /// Save the current config to a local JSON file
    Pull { file: String },
    /// Change gateway mode and/or port
    SetGateway {
        #[arg(long)]
        mode: Option<GatewayMode>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Save the telegram bot token
    SetTelegramToken { token: String },
}

#[derive(Subcommand)]
enum TradeAction {
    /// open -> closing -> closed
    SetStatus {
        trade_id: String,
        status: TradeStatus,
        #[arg(long)]
        exit_price: Option<f64>,
        #[arg(long)]
        pnl: Option<f64>,
    },
}

#[derive(Subcommand)]
enum PolyclawAction {
    Positions {
        agent_id: String,
    },
    Trades {
        agent_id: String,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    Metrics {
        agent_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;
    let access = build_access(&config)?;

    match cli.command {
        Commands::Overview => show_overview(&access, &config).await,
        Commands::Serve { port } => {
            serve(access, &config, port.unwrap_or(config.dashboard.port)).await
        }
        Commands::Config { action } => run_config(&access, action).await,
        Commands::Predictions { market_id, limit } => {
            print_json(&access.predictions(market_id.as_deref(), limit).await?)
        }
        Commands::Trades { status, limit } => print_json(&access.trades(status, limit).await?),
        Commands::Metrics { metric_type, limit } => {
            print_json(&access.metrics(metric_type, limit).await?)
        }
        Commands::RecordPrediction {
            market_id,
            question,
            edge,
            confidence,
            decision,
            source,
            data_sources,
        } => {
            let prediction = Prediction {
                market_id,
                market_question: question,
                edge,
                confidence,
                decision,
                source,
                data_sources,
                timestamp: None,
            };
            let id = access.create_prediction(&prediction).await?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Commands::RecordTrade {
            trade_id,
            market_id,
            side,
            size,
            entry_price,
            exit_price,
            status,
            pnl,
        } => {
            let trade = Trade {
                trade_id,
                market_id,
                side,
                size,
                entry_price,
                exit_price,
                status,
                pnl,
                timestamp: None,
            };
            let id = access.create_trade(&trade).await?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Commands::Trade {
            action:
                TradeAction::SetStatus {
                    trade_id,
                    status,
                    exit_price,
                    pnl,
                },
        } => {
            let id = access
                .transition_trade(&trade_id, status, exit_price, pnl)
                .await?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Commands::RecordMetric {
            metric_type,
            value,
            component,
        } => {
            let metric = Metric {
                metric_type,
                value,
                component,
                timestamp: None,
            };
            let id = access.create_metric(&metric).await?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Commands::Polyclaw { action } => run_polyclaw(access.api(), action).await,
    }
}

fn build_access(config: &Config) -> anyhow::Result<DataAccess<FirestoreClient>> {
    let store = Arc::new(FirestoreClient::new(&config.firestore)?);
    let api = ApiClient::new(&config.api)?;
    Ok(DataAccess::new(DirectReader::new(store), api))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn show_overview(access: &DataAccess<FirestoreClient>, config: &Config) -> anyhow::Result<()> {
    let req = OverviewRequest::recent(
        config.dashboard.recent_limit,
        config.dashboard.trade_status,
        config.dashboard.metric_type,
    );
    let overview = access.load_overview(&req).await?;
    let summary = Summary::from_overview(&overview, &config.dashboard);

    tracing::info!("Overview served by {}", overview.source.badge());
    for alert in &summary.alerts {
        tracing::warn!("[{}] {}", alert.category, alert.message);
    }

    print_json(&serde_json::json!({ "summary": summary, "overview": overview }))
}

async fn serve(
    access: DataAccess<FirestoreClient>,
    config: &Config,
    port: u16,
) -> anyhow::Result<()> {
    let state = Arc::new(DashboardState::new(access, config.dashboard.clone()));
    start_dashboard(state, port)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

async fn run_config(access: &DataAccess<FirestoreClient>, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => print_json(&access.config().await?),
        ConfigAction::Push { file } => {
            let contents = std::fs::read_to_string(expand_path(&file))?;
            let local: BotConfig = serde_json::from_str(&contents)?;

            let ok = access.update_config(&local.sync_patch()).await?;
            report_write("Config push", ok)
        }
        ConfigAction::Pull { file } => {
            let sourced = access.config().await?;
            let Some(current) = sourced.data else {
                anyhow::bail!("no bot configuration stored");
            };
            let path = expand_path(&file);
            std::fs::write(&path, serde_json::to_string_pretty(&current)?)?;
            tracing::info!("Config from {} saved to {}", sourced.source.badge(), path);
            Ok(())
        }
        ConfigAction::SetGateway { mode, port } => {
            if mode.is_none() && port.is_none() {
                anyhow::bail!("nothing to change: pass --mode and/or --port");
            }
            let current = access.config().await?.data.unwrap_or_default();
            let ok = access.api().set_gateway(&current, mode, port).await?;
            report_write("Gateway update", ok)
        }
        ConfigAction::SetTelegramToken { token } => {
            let ok = access.save_telegram_token(&token).await?;
            report_write("Telegram token save", ok)
        }
    }
}

fn expand_path(file: &str) -> String {
    shellexpand::tilde(file).into_owned()
}

fn report_write(what: &str, ok: bool) -> anyhow::Result<()> {
    if ok {
        tracing::info!("{} succeeded", what);
        Ok(())
    } else {
        anyhow::bail!("{} was rejected by the backend", what)
    }
}

async fn run_polyclaw(api: &ApiClient, action: PolyclawAction) -> anyhow::Result<()> {
    let value = match action {
        PolyclawAction::Positions { agent_id } => api.get_polyclaw_positions(&agent_id).await?,
        PolyclawAction::Trades { agent_id, limit } => {
            api.get_polyclaw_trades(&agent_id, limit).await?
        }
        PolyclawAction::Metrics { agent_id } => api.get_polyclaw_metrics(&agent_id).await?,
    };
    print_json(&value)
}
