// ============================================================================
// AlertEvaluator
// ============================================================================
// Détermine quelles alertes viennent de se déclencher
//
// Condition : spot <= seuil, et l'alerte est encore Pending.
// use_rsi / use_ma sont des informations pour la notification. Le mode
// Strict (optionnel) en fait des conditions supplémentaires.
// ============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Alert, Indicators, RsiZone};

/// Politique de déclenchement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerPolicy {
    /// Seul le seuil compte (comportement par défaut)
    #[default]
    ThresholdOnly,

    /// use_rsi exige RSI < 30, use_ma exige spot < SMA 7
    Strict,
}

/// Évaluateur d'alertes, fonction pure de ses entrées
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertEvaluator {
    policy: TriggerPolicy,
}

impl AlertEvaluator {
    pub fn new(policy: TriggerPolicy) -> Self {
        Self { policy }
    }

    /// Retourne les alertes Pending dont la condition est satisfaite
    ///
    /// # Arguments
    /// * `indicators` - instantané courant
    /// * `spot` - prix spot en devise d'affichage
    /// * `alerts` - contenu actuel de l'AlertStore
    pub fn evaluate(&self, indicators: &Indicators, spot: Decimal, alerts: &[Alert]) -> Vec<Alert> {
        alerts
            .iter()
            .filter(|a| a.is_pending())
            .filter(|a| spot <= a.threshold_price)
            .filter(|a| self.strategies_hold(a, indicators, spot))
            .cloned()
            .collect()
    }

    fn strategies_hold(&self, alert: &Alert, indicators: &Indicators, spot: Decimal) -> bool {
        match self.policy {
            TriggerPolicy::ThresholdOnly => true,
            TriggerPolicy::Strict => {
                let rsi_ok = !alert.use_rsi || indicators.rsi_zone() == RsiZone::Oversold;
                let ma_ok = !alert.use_ma || spot < indicators.sma7;
                rsi_ok && ma_ok
            }
        }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
