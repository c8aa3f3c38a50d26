// ============================================================================
// Structure : RefreshLoop
// ============================================================================
// Pilote le cycle de rafraîchissement du moteur
//
//   Idle -> Fetching -> Computing -> Evaluating -> Idle
//               \___________\____ Faulted ____/
//
// PATTERN : un seul conducteur séquentiel
// - Un tick qui arrive pendant un cycle est abandonné (pas de file d'attente)
// - Un cycle en échec (récupération, calcul, stockage) conserve les derniers Indicators
// - Une notification échouée laisse l'alerte Pending (retentée au cycle suivant)
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{MarketDataSource, Notifier, RateSource};
use crate::engine::{convert_display, AlertEvaluator, IndicatorEngine};
use crate::error::{AlertError, AlertResult};
use crate::message;
use crate::models::{AlertId, AlertStatus, CandleSeries, Indicators, Interval, WINDOW};
use crate::store::AlertStore;

// ============================================================================
// Enum : CycleState
// ============================================================================
// CONCEPT RUST : Enums pour state machines
// - Un seul état actif à la fois
// - Faulted est transitoire : on revient toujours à Idle
// ============================================================================

/// États du cycle de rafraîchissement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Computing,
    Evaluating,
    Faulted,
}

/// Paramètres de la boucle (actif suivi, devises, cadence)
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Symbole de l'actif (ex: "BTCUSDT")
    pub symbol: String,

    /// Intervalle des chandelles
    pub interval: Interval,

    /// Devise des prix de marché (ex: "usd")
    pub base_currency: String,

    /// Devise d'affichage (ex: "inr")
    pub quote_currency: String,

    /// Décimales de la devise d'affichage
    pub display_decimals: u32,

    /// Cadence du timer
    pub refresh_every: Duration,
}

/// Dernier état valide publié aux consommateurs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub indicators: Indicators,

    /// Spot en devise de base, tel que reçu
    pub spot_base: Decimal,

    pub refreshed_at: DateTime<Utc>,
}

/// Bilan d'un cycle terminé
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Alertes notifiées puis marquées Triggered
    pub triggered: Vec<AlertId>,

    /// Alertes dont la notification a échoué (restent Pending)
    pub failed: Vec<AlertId>,
}

/// Résultat d'une demande de cycle
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),

    /// Un cycle était déjà en cours : demande abandonnée
    Skipped,

    /// Cycle interrompu, état précédent conservé
    Faulted(AlertError),
}

/// Commandes envoyées à la boucle par ses consommateurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    /// Rafraîchir tout de suite (abandonné si un cycle est en cours)
    Refresh,

    /// Arrêter la boucle
    Shutdown,
}

pub struct RefreshLoop {
    market: Arc<dyn MarketDataSource>,
    rates: Arc<dyn RateSource>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn AlertStore>,
    engine: IndicatorEngine,
    evaluator: AlertEvaluator,
    settings: LoopSettings,
    state: CycleState,
    snapshot: Option<MarketSnapshot>,
    published: watch::Sender<Option<MarketSnapshot>>,
}

impl RefreshLoop {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        rates: Arc<dyn RateSource>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn AlertStore>,
        evaluator: AlertEvaluator,
        settings: LoopSettings,
    ) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            market,
            rates,
            notifier,
            store,
            engine: IndicatorEngine::new(settings.display_decimals),
            evaluator,
            settings,
            state: CycleState::Idle,
            snapshot: None,
            published,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Dernier instantané valide (None avant le premier cycle réussi)
    pub fn snapshot(&self) -> Option<&MarketSnapshot> {
        self.snapshot.as_ref()
    }

    /// Abonnement aux instantanés publiés après chaque cycle réussi
    pub fn subscribe(&self) -> watch::Receiver<Option<MarketSnapshot>> {
        self.published.subscribe()
    }

    /// Exécute un cycle complet si la boucle est Idle
    #[instrument(skip(self), fields(symbol = %self.settings.symbol))]
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if self.state != CycleState::Idle {
            debug!(state = ?self.state, "Cycle already in flight, dropping request");
            return CycleOutcome::Skipped;
        }

        // ========================================
        // 1. FETCHING : chandelles, spot, taux
        // ========================================
        self.state = CycleState::Fetching;
        let (series, spot, rate) = match self.fetch().await {
            Ok(fetched) => fetched,
            Err(e) => return self.fault(e),
        };

        // ========================================
        // 2. COMPUTING : indicateurs + conversion
        // ========================================
        self.state = CycleState::Computing;
        let indicators = match self.engine.compute(&series, spot, rate) {
            Ok(indicators) => indicators,
            Err(e) => return self.fault(e),
        };

        // ========================================
        // 3. EVALUATING : alertes nouvellement vraies
        // ========================================
        self.state = CycleState::Evaluating;
        let report = match self.evaluate(&indicators).await {
            Ok(report) => report,
            Err(e) => return self.fault(e),
        };

        // Commit uniquement en fin de cycle : un Faulted laisse l'instantané intact
        let snapshot = MarketSnapshot {
            indicators,
            spot_base: spot,
            refreshed_at: Utc::now(),
        };
        self.snapshot = Some(snapshot.clone());
        self.published.send_replace(Some(snapshot));

        self.state = CycleState::Idle;
        CycleOutcome::Completed(report)
    }

    async fn fetch(&self) -> AlertResult<(CandleSeries, Decimal, Decimal)> {
        let s = &self.settings;
        // Les trois appels sont indépendants : en parallèle, le premier échec annule le cycle
        tokio::try_join!(
            self.market.fetch_candles(&s.symbol, s.interval, WINDOW),
            self.market.fetch_spot(&s.symbol),
            self.rates.fetch_rate(&s.base_currency, &s.quote_currency),
        )
    }

    async fn evaluate(&self, indicators: &Indicators) -> AlertResult<CycleReport> {
        let alerts = self.store.list()?;
        let triggered = self.evaluator.evaluate(indicators, indicators.spot, &alerts);

        let mut report = CycleReport::default();
        for alert in triggered {
            let (subject, body) =
                message::triggered(&alert, indicators, &self.settings.quote_currency);

            match self.notifier.send(&alert.recipient, &subject, &body).await {
                Ok(()) => {
                    // Le statut n'est persisté qu'après une livraison réussie
                    if self.store.update_status(&alert.id, AlertStatus::Triggered)? {
                        info!(alert_id = %alert.id, threshold = %alert.threshold_price, "Alert triggered");
                    } else {
                        warn!(alert_id = %alert.id, "Alert deleted before it could be marked triggered");
                    }
                    report.triggered.push(alert.id);
                }
                Err(e) => {
                    warn!(alert_id = %alert.id, error = %e, "Notification failed, alert stays pending");
                    report.failed.push(alert.id);
                }
            }
        }

        Ok(report)
    }

    fn fault(&mut self, error: AlertError) -> CycleOutcome {
        self.state = CycleState::Faulted;
        warn!(error = %error, "Refresh cycle aborted, keeping last good state");
        self.state = CycleState::Idle;
        CycleOutcome::Faulted(error)
    }

    // ========================================================================
    // Boucle principale
    // ========================================================================

    /// Tourne jusqu'à Shutdown ou fermeture du canal de commandes
    ///
    /// CONCEPT : tokio::select!
    /// - le timer et les demandes à la volée réveillent la même boucle
    /// - un tick échu pendant un cycle est perdu : le timer repart d'une
    ///   période complète après chaque cycle (reset)
    pub async fn run(mut self, mut commands: mpsc::Receiver<LoopCommand>) {
        let mut ticker = tokio::time::interval(self.settings.refresh_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(every = ?self.settings.refresh_every, "Refresh loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("Timer tick");
                }
                command = commands.recv() => match command {
                    Some(LoopCommand::Refresh) => debug!("On-demand refresh"),
                    Some(LoopCommand::Shutdown) | None => break,
                },
            }

            let outcome = self.run_cycle().await;
            log_outcome(&outcome);
            ticker.reset();

            // Demandes arrivées pendant le cycle : abandonnées, sauf l'arrêt
            while let Ok(command) = commands.try_recv() {
                match command {
                    LoopCommand::Refresh => debug!("Dropping refresh requested mid-cycle"),
                    LoopCommand::Shutdown => {
                        info!("Refresh loop stopped");
                        return;
                    }
                }
            }
        }

        info!("Refresh loop stopped");
    }

    /// Lance la boucle dans une tâche tokio
    pub fn spawn(self) -> RefreshHandle {
        let (tx, rx) = mpsc::channel(8);
        let snapshots = self.subscribe();
        let task = tokio::spawn(self.run(rx));
        RefreshHandle {
            commands: tx,
            snapshots,
            task,
        }
    }
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Completed(report) if !report.failed.is_empty() => {
            warn!(triggered = report.triggered.len(), failed = report.failed.len(), "Cycle completed with failed notifications");
        }
        CycleOutcome::Completed(report) => {
            debug!(triggered = report.triggered.len(), "Cycle completed");
        }
        CycleOutcome::Skipped => debug!("Cycle skipped"),
        CycleOutcome::Faulted(e) => error!(error = %e, "Cycle faulted"),
    }
}

/// Poignée sur une boucle lancée avec `RefreshLoop::spawn`
pub struct RefreshHandle {
    commands: mpsc::Sender<LoopCommand>,
    snapshots: watch::Receiver<Option<MarketSnapshot>>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Demande un rafraîchissement immédiat
    ///
    /// Si la boucle est occupée ou que le canal est plein, la demande est perdue.
    pub fn request_refresh(&self) {
        if self.commands.try_send(LoopCommand::Refresh).is_err() {
            debug!("Refresh request dropped");
        }
    }

    /// Récepteur des instantanés publiés
    pub fn snapshots(&self) -> watch::Receiver<Option<MarketSnapshot>> {
        self.snapshots.clone()
    }

    /// Arrête la boucle et attend la fin de la tâche
    pub async fn shutdown(self) -> anyhow::Result<()> {
        // Canal fermé = boucle déjà terminée
        let _ = self.commands.send(LoopCommand::Shutdown).await;
        self.task.await?;
        Ok(())
    }
}

/// Prix spot courant en devise d'affichage (validation à la création d'alerte)
pub async fn fetch_display_spot(
    market: &dyn MarketDataSource,
    rates: &dyn RateSource,
    settings: &LoopSettings,
) -> AlertResult<Decimal> {
    let (spot, rate) = tokio::try_join!(
        market.fetch_spot(&settings.symbol),
        rates.fetch_rate(&settings.base_currency, &settings.quote_currency),
    )?;
    Ok(convert_display(spot, rate, settings.display_decimals))
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TriggerPolicy;
    use crate::models::{Alert, AlertRequest, Candle};
    use crate::store::MemoryAlertStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeMarket {
        closes: Mutex<Vec<Decimal>>,
        spot: Mutex<Decimal>,
        fail: AtomicBool,
        candle_calls: AtomicUsize,
        // Durée artificielle de fetch_candles
        delay: Option<Duration>,
        // Bloque fetch_candles jusqu'à `release` quand présent
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeMarket {
        fn flat(close: Decimal, count: usize, spot: Decimal) -> Self {
            Self {
                closes: Mutex::new(vec![close; count]),
                spot: Mutex::new(spot),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for FakeMarket {
        async fn fetch_candles(
            &self,
            symbol: &str,
            interval: Interval,
            _count: usize,
        ) -> AlertResult<CandleSeries> {
            self.candle_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some((started, release)) = &self.gate {
                started.notify_one();
                release.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(AlertError::data_unavailable("exchange down"));
            }

            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let candles = self
                .closes
                .lock()
                .unwrap()
                .iter()
                .enumerate()
                .map(|(i, c)| Candle::new(start + chrono::Duration::days(i as i64), *c, *c, *c, *c))
                .collect();
            CandleSeries::closed(symbol.to_string(), interval, candles)
        }

        async fn fetch_spot(&self, _symbol: &str) -> AlertResult<Decimal> {
            Ok(*self.spot.lock().unwrap())
        }
    }

    struct UnitRate;

    #[async_trait]
    impl RateSource for UnitRate {
        async fn fetch_rate(&self, _base: &str, _quote: &str) -> AlertResult<Decimal> {
            Ok(Decimal::ONE)
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        fail: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send(&self, recipient: &str, _subject: &str, _body: &str) -> AlertResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AlertError::notification("relay down"));
            }
            self.sent.lock().unwrap().push(recipient.to_string());
            Ok(())
        }
    }

    /// Stockage qui tombe en panne à la demande
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryAlertStore,
        fail: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> AlertResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AlertError::Storage("disk full".to_string()));
            }
            Ok(())
        }
    }

    impl AlertStore for FlakyStore {
        fn create(&self, alert: Alert) -> AlertResult<Alert> {
            self.check()?;
            self.inner.create(alert)
        }

        fn list(&self) -> AlertResult<Vec<Alert>> {
            self.check()?;
            self.inner.list()
        }

        fn delete(&self, id: &AlertId) -> AlertResult<bool> {
            self.check()?;
            self.inner.delete(id)
        }

        fn update_status(&self, id: &AlertId, status: AlertStatus) -> AlertResult<bool> {
            self.check()?;
            self.inner.update_status(id, status)
        }
    }

    fn settings() -> LoopSettings {
        LoopSettings {
            symbol: "BTCUSDT".to_string(),
            interval: Interval::D1,
            base_currency: "usd".to_string(),
            quote_currency: "usd".to_string(),
            display_decimals: 0,
            refresh_every: Duration::from_secs(3600),
        }
    }

    fn refresh_loop(
        market: Arc<FakeMarket>,
        notifier: Arc<FakeNotifier>,
        store: Arc<MemoryAlertStore>,
    ) -> RefreshLoop {
        RefreshLoop::new(
            market,
            Arc::new(UnitRate),
            notifier,
            store,
            AlertEvaluator::new(TriggerPolicy::ThresholdOnly),
            settings(),
        )
    }

    fn pending_alert(store: &MemoryAlertStore, threshold: &str) -> AlertId {
        let alert = AlertRequest::new(threshold, "me@example.com")
            .validate(dec!(100), Utc::now())
            .unwrap();
        store.create(alert).unwrap().id
    }

    #[tokio::test]
    async fn test_cycle_triggers_once() {
        let market = Arc::new(FakeMarket::flat(dec!(100), 14, dec!(90)));
        let notifier = Arc::new(FakeNotifier::default());
        let store = Arc::new(MemoryAlertStore::new());
        let id = pending_alert(&store, "95");
        let mut refresh = refresh_loop(market, notifier.clone(), store.clone());

        let outcome = refresh.run_cycle().await;
        match outcome {
            CycleOutcome::Completed(report) => assert_eq!(report.triggered, vec![id.clone()]),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(refresh.state(), CycleState::Idle);
        assert_eq!(store.list().unwrap()[0].status, AlertStatus::Triggered);

        // Déjà Triggered : plus jamais renvoyée
        let outcome = refresh.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Completed(r) if r.triggered.is_empty()));
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spot_above_threshold_does_nothing() {
        let market = Arc::new(FakeMarket::flat(dec!(100), 14, dec!(99)));
        let notifier = Arc::new(FakeNotifier::default());
        let store = Arc::new(MemoryAlertStore::new());
        pending_alert(&store, "95");
        let mut refresh = refresh_loop(market, notifier.clone(), store.clone());

        let outcome = refresh.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Completed(r) if r.triggered.is_empty()));
        assert!(store.list().unwrap()[0].is_pending());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_last_snapshot() {
        let market = Arc::new(FakeMarket::flat(dec!(100), 14, dec!(99)));
        let store = Arc::new(MemoryAlertStore::new());
        let mut refresh = refresh_loop(market.clone(), Arc::new(FakeNotifier::default()), store);
        let mut published = refresh.subscribe();

        assert!(matches!(refresh.run_cycle().await, CycleOutcome::Completed(_)));
        let good = refresh.snapshot().cloned().unwrap();
        assert!(published.has_changed().unwrap());
        published.borrow_and_update();

        market.fail.store(true, Ordering::SeqCst);
        let outcome = refresh.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Faulted(AlertError::DataUnavailable(_))));
        assert_eq!(refresh.state(), CycleState::Idle);
        assert_eq!(refresh.snapshot(), Some(&good));
        assert!(!published.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_short_series_faults_without_snapshot() {
        let market = Arc::new(FakeMarket::flat(dec!(100), 9, dec!(90)));
        let store = Arc::new(MemoryAlertStore::new());
        pending_alert(&store, "95");
        let mut refresh = refresh_loop(market, Arc::new(FakeNotifier::default()), store.clone());

        let outcome = refresh.run_cycle().await;

        assert!(matches!(
            outcome,
            CycleOutcome::Faulted(AlertError::InsufficientData { required: 14, actual: 9 })
        ));
        assert!(refresh.snapshot().is_none());
        assert!(store.list().unwrap()[0].is_pending());
    }

    #[tokio::test]
    async fn test_failed_notification_retried_next_cycle() {
        let market = Arc::new(FakeMarket::flat(dec!(100), 14, dec!(90)));
        let notifier = Arc::new(FakeNotifier::default());
        notifier.fail.store(true, Ordering::SeqCst);
        let store = Arc::new(MemoryAlertStore::new());
        let id = pending_alert(&store, "95");
        let mut refresh = refresh_loop(market, notifier.clone(), store.clone());

        match refresh.run_cycle().await {
            CycleOutcome::Completed(report) => {
                assert!(report.triggered.is_empty());
                assert_eq!(report.failed, vec![id.clone()]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(store.list().unwrap()[0].is_pending());

        notifier.fail.store(false, Ordering::SeqCst);
        match refresh.run_cycle().await {
            CycleOutcome::Completed(report) => assert_eq!(report.triggered, vec![id]),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.list().unwrap()[0].status, AlertStatus::Triggered);
    }

    #[tokio::test]
    async fn test_deleted_alert_is_never_evaluated() {
        let market = Arc::new(FakeMarket::flat(dec!(100), 14, dec!(90)));
        let notifier = Arc::new(FakeNotifier::default());
        let store = Arc::new(MemoryAlertStore::new());
        let id = pending_alert(&store, "95");
        store.delete(&id).unwrap();
        let mut refresh = refresh_loop(market, notifier.clone(), store.clone());

        assert!(matches!(refresh.run_cycle().await, CycleOutcome::Completed(r) if r.triggered.is_empty()));
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_loop_publishes_and_shuts_down() {
        let market = Arc::new(FakeMarket::flat(dec!(100), 14, dec!(99)));
        let store = Arc::new(MemoryAlertStore::new());
        let handle = refresh_loop(market.clone(), Arc::new(FakeNotifier::default()), store).spawn();
        let mut snapshots = handle.snapshots();

        // Le premier tick du timer est immédiat
        snapshots.changed().await.unwrap();
        assert_eq!(snapshots.borrow_and_update().as_ref().unwrap().indicators.spot, dec!(99));

        *market.spot.lock().unwrap() = dec!(97);
        // Une demande qui tombe pendant la fin du premier cycle est perdue : on réessaie
        loop {
            handle.request_refresh();
            let wait = tokio::time::timeout(Duration::from_millis(50), snapshots.changed());
            if wait.await.is_ok() {
                break;
            }
        }
        assert_eq!(snapshots.borrow().as_ref().unwrap().indicators.spot, dec!(97));

        handle.shutdown().await.unwrap();
        assert!(market.candle_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_requests_during_cycle_are_dropped() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let market = Arc::new(FakeMarket {
            gate: Some((started.clone(), release.clone())),
            ..FakeMarket::flat(dec!(100), 14, dec!(99))
        });
        let store = Arc::new(MemoryAlertStore::new());
        let handle = refresh_loop(market.clone(), Arc::new(FakeNotifier::default()), store).spawn();

        started.notified().await;
        handle.request_refresh();
        handle.request_refresh();
        handle.request_refresh();
        release.notify_one();

        handle.shutdown().await.unwrap();
        assert_eq!(market.candle_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_last_snapshot() {
        let market = Arc::new(FakeMarket::flat(dec!(100), 14, dec!(99)));
        let store = Arc::new(FlakyStore::default());
        let mut refresh = RefreshLoop::new(
            market.clone(),
            Arc::new(UnitRate),
            Arc::new(FakeNotifier::default()),
            store.clone(),
            AlertEvaluator::default(),
            settings(),
        );
        let mut published = refresh.subscribe();

        assert!(matches!(refresh.run_cycle().await, CycleOutcome::Completed(_)));
        let good = refresh.snapshot().cloned().unwrap();
        published.borrow_and_update();

        *market.spot.lock().unwrap() = dec!(97);
        store.fail.store(true, Ordering::SeqCst);
        let outcome = refresh.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Faulted(AlertError::Storage(_))));
        assert_eq!(refresh.state(), CycleState::Idle);
        assert_eq!(refresh.snapshot(), Some(&good));
        assert!(!published.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_timer_tick_during_cycle_is_dropped() {
        // Cycle de 400 ms, timer de 200 ms : le tick échu à 200 ms tombe en plein cycle
        let market = Arc::new(FakeMarket {
            delay: Some(Duration::from_millis(400)),
            ..FakeMarket::flat(dec!(100), 14, dec!(99))
        });
        let handle = RefreshLoop::new(
            market.clone(),
            Arc::new(UnitRate),
            Arc::new(FakeNotifier::default()),
            Arc::new(MemoryAlertStore::new()),
            AlertEvaluator::default(),
            LoopSettings {
                refresh_every: Duration::from_millis(200),
                ..settings()
            },
        )
        .spawn();

        // Prochain tick attendu à 400 + 200 ms, pas juste après le premier cycle
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(market.candle_calls.load(Ordering::SeqCst), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_display_spot_is_converted() {
        let market = FakeMarket::flat(dec!(100), 14, dec!(90.4));
        let spot = fetch_display_spot(&market, &UnitRate, &settings()).await.unwrap();
        assert_eq!(spot, dec!(90));
    }
}
