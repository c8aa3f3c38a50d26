// ============================================================================
// LazyAlert - Point d'entrée
// ============================================================================
// Surveille le prix d'un actif, calcule ses indicateurs et envoie une
// notification unique quand une alerte de baisse se déclenche
//
// Sous-commandes :
// - watch                     : boucle de rafraîchissement jusqu'à Ctrl-C
// - status                    : un cycle, puis affiche les indicateurs
// - alert add|list|delete     : gestion des alertes
// ============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use lazyalert::api::{http_client, BinanceClient, FxRateClient, RelayNotifier};
use lazyalert::app::{fetch_display_spot, CycleOutcome, MarketSnapshot, RefreshLoop};
use lazyalert::config::AppConfig;
use lazyalert::engine::{round_display, AlertEvaluator};
use lazyalert::models::{AlertId, AlertRequest, AlertStatus};
use lazyalert::service::AlertService;
use lazyalert::store::SqliteAlertStore;

// ============================================================================
// Ligne de commande
// ============================================================================

#[derive(Parser)]
#[command(name = "lazyalert", version, about = "Price-drop alerts with RSI / moving-average context")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rafraîchit en continu et déclenche les alertes
    Watch,
    /// Exécute un cycle et affiche les indicateurs
    Status,
    /// Gère les alertes
    #[command(subcommand)]
    Alert(AlertCommand),
}

#[derive(Subcommand)]
enum AlertCommand {
    /// Crée une alerte "le prix passe sous <PRICE>"
    Add {
        /// Seuil en devise d'affichage
        #[arg(long)]
        price: String,
        /// Adresse email du destinataire
        #[arg(long)]
        email: String,
        /// Ne pas inclure la stratégie RSI
        #[arg(long)]
        no_rsi: bool,
        /// Ne pas inclure la stratégie moyenne mobile
        #[arg(long)]
        no_ma: bool,
    },
    /// Liste les alertes
    List,
    /// Supprime une alerte
    Delete {
        id: String,
    },
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// Les logs vont dans un fichier à rotation quotidienne ; la sortie standard
// reste réservée aux messages pour l'utilisateur.
//
// # Utilisation
// ```bash
// tail -f ~/.local/share/lazyalert/logs/lazyalert.log
// RUST_LOG=lazyalert=trace lazyalert watch
// ```
// ============================================================================

fn init_logging(config: &AppConfig) -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = config.log_dir.clone();
    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "lazyalert.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lazyalert=debug,info".into()),
        )
        .try_init()
        .context("Échec de l'initialisation du subscriber tracing")?;

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

// ============================================================================
// Assemblage des collaborateurs
// ============================================================================

struct Wiring {
    config: AppConfig,
    market: Arc<BinanceClient>,
    rates: Arc<FxRateClient>,
    notifier: Arc<RelayNotifier>,
    store: Arc<SqliteAlertStore>,
}

impl Wiring {
    fn build(config: AppConfig) -> Result<Self> {
        let http = http_client(config.http_timeout()).context("Échec de la création du client HTTP")?;
        let store = SqliteAlertStore::open(&config.db_path)
            .with_context(|| format!("Impossible d'ouvrir {}", config.db_path.display()))?;

        Ok(Self {
            market: Arc::new(BinanceClient::new(http.clone(), config.binance_url.clone())),
            rates: Arc::new(FxRateClient::new(http.clone(), config.fx_url.clone())),
            notifier: Arc::new(RelayNotifier::new(http, config.notifier_url.clone())),
            store: Arc::new(store),
            config,
        })
    }

    fn refresh_loop(&self) -> RefreshLoop {
        RefreshLoop::new(
            self.market.clone(),
            self.rates.clone(),
            self.notifier.clone(),
            self.store.clone(),
            AlertEvaluator::new(self.config.trigger_policy()),
            self.config.loop_settings(),
        )
    }

    fn alert_service(&self) -> AlertService {
        AlertService::new(
            self.store.clone(),
            self.notifier.clone(),
            self.config.quote_currency.clone(),
            self.config.confirm_on_create,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    init_logging(&config).unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    info!(symbol = %config.symbol, quote = %config.quote_currency, "LazyAlert starting up");
    let wiring = Wiring::build(config)?;

    let result = match cli.command {
        Command::Watch => watch(&wiring).await,
        Command::Status => status(&wiring).await,
        Command::Alert(cmd) => alert(&wiring, cmd).await,
    };

    match &result {
        Ok(_) => info!("LazyAlert exited normally"),
        Err(e) => error!(error = ?e, "LazyAlert exited with error"),
    }
    result
}

// ============================================================================
// Sous-commandes
// ============================================================================

async fn watch(wiring: &Wiring) -> Result<()> {
    let handle = wiring.refresh_loop().spawn();
    let mut snapshots = handle.snapshots();
    let currency = wiring.config.quote_currency.to_uppercase();

    println!("📊 Surveillance de {} (Ctrl-C pour quitter)\n", wiring.config.symbol);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(snapshot) = snapshots.borrow_and_update().as_ref() {
                    println!("{}", status_line(snapshot, &currency));
                }
            }
        }
    }

    handle.shutdown().await
}

async fn status(wiring: &Wiring) -> Result<()> {
    let mut refresh = wiring.refresh_loop();
    let currency = wiring.config.quote_currency.to_uppercase();

    match refresh.run_cycle().await {
        CycleOutcome::Completed(report) => {
            if let Some(snapshot) = refresh.snapshot() {
                print_snapshot(snapshot, &currency);
            }
            for id in &report.triggered {
                println!("🔔 Alerte {} déclenchée", id);
            }
            for id in &report.failed {
                println!("⚠️  Notification échouée pour l'alerte {}", id);
            }
            Ok(())
        }
        CycleOutcome::Skipped => Ok(()),
        CycleOutcome::Faulted(e) => Err(e).context("Rafraîchissement impossible"),
    }
}

async fn alert(wiring: &Wiring, command: AlertCommand) -> Result<()> {
    let service = wiring.alert_service();
    let currency = wiring.config.quote_currency.to_uppercase();

    match command {
        AlertCommand::Add {
            price,
            email,
            no_rsi,
            no_ma,
        } => {
            let settings = wiring.config.loop_settings();
            let spot = fetch_display_spot(wiring.market.as_ref(), wiring.rates.as_ref(), &settings)
                .await
                .context("Prix courant indisponible")?;

            let mut request = AlertRequest::new(price, email);
            request.use_rsi = !no_rsi;
            request.use_ma = !no_ma;

            match service.create(request, spot).await {
                Ok(alert) => {
                    println!(
                        "✅ Alerte {} créée : {} < {} {} (prix actuel {} {})",
                        alert.id, wiring.config.symbol, currency, alert.threshold_price, currency, spot
                    );
                    Ok(())
                }
                Err(e) if !e.is_recoverable() => {
                    println!("❌ Alerte refusée : {}", e);
                    println!("   Le seuil doit être un nombre positif inférieur au prix actuel ({} {})", currency, spot);
                    Err(e.into())
                }
                Err(e) => {
                    println!("⚠️  {}", e);
                    Err(e.into())
                }
            }
        }
        AlertCommand::List => {
            let alerts = service.list()?;
            if alerts.is_empty() {
                println!("No alert history found.");
            }
            for alert in alerts {
                let status = match alert.status {
                    AlertStatus::Pending => "⏳ pending",
                    AlertStatus::Triggered => "🔔 triggered",
                };
                println!(
                    "{:<18} {} {:>14}  {:<8} {:<12} {}  {}",
                    alert.id,
                    currency,
                    alert.threshold_price,
                    alert.strategies_label(),
                    status,
                    alert.recipient,
                    alert.created_at.format("%Y-%m-%d %H:%M"),
                );
            }
            Ok(())
        }
        AlertCommand::Delete { id } => {
            if service.delete(&AlertId::from(id.clone()))? {
                println!("🗑  Alerte {} supprimée", id);
            } else {
                println!("Aucune alerte {}", id);
            }
            Ok(())
        }
    }
}

// ============================================================================
// Affichage
// ============================================================================

fn status_line(snapshot: &MarketSnapshot, currency: &str) -> String {
    let ind = &snapshot.indicators;
    let arrow = if ind.change24h.is_sign_negative() { "▼" } else { "▲" };
    format!(
        "{}  {} {:>12}  {} {:+}%  RSI {:>6} ({})  MA7 {}",
        snapshot.refreshed_at.format("%H:%M:%S"),
        currency,
        ind.spot,
        arrow,
        ind.change24h,
        round_display(ind.rsi14, 2),
        ind.rsi_zone().label(),
        round_display(ind.sma7, 0),
    )
}

fn print_snapshot(snapshot: &MarketSnapshot, currency: &str) {
    let ind = &snapshot.indicators;
    println!("Prix actuel     : {} {}", currency, ind.spot);
    println!("Variation 24h   : {:+}%", ind.change24h);
    println!("Ouverture       : {} {}", currency, ind.open);
    println!("Plus bas 14j    : {} {}", currency, ind.window_low);
    println!("Plus haut 14j   : {} {}", currency, ind.window_high);
    println!("Moyenne 7j      : {} {}", currency, round_display(ind.sma7, 0));
    println!("RSI (14)        : {} ({})", round_display(ind.rsi14, 2), ind.rsi_zone().label());
    println!("Taux            : {}", ind.rate);

    let history: Vec<String> = ind.price_history.iter().map(|p| p.to_string()).collect();
    println!("7 derniers jours: {}", history.join(" → "));

    if ind.is_good_time_to_buy() {
        println!("\n💡 Bon moment pour acheter (RSI bas, prix sous la moyenne ou forte baisse)");
    }
}
