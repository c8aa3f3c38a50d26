// ============================================================================
// CurrencyConverter
// ============================================================================
// Conversion devise de base -> devise d'affichage (ex: USD -> INR)
//
// convert() est une pure multiplication. L'arrondi à l'affichage est une
// décision de l'appelant, d'où la fonction séparée round_display().
// ============================================================================

use rust_decimal::{Decimal, RoundingStrategy};

/// Convertit un montant de la devise de base vers la devise d'affichage
pub fn convert(amount_in_base: Decimal, rate: Decimal) -> Decimal {
    amount_in_base * rate
}

/// Arrondit à `decimals` décimales, moitié vers le haut (comme Math.round)
///
/// CONCEPT : RoundingStrategy
/// - Decimal::round() utilise l'arrondi bancaire (2.5 -> 2)
/// - Pour des prix affichés on veut 2.5 -> 3
pub fn round_display(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Convertit puis arrondit pour l'affichage
pub fn convert_display(amount_in_base: Decimal, rate: Decimal, decimals: u32) -> Decimal {
    round_display(convert(amount_in_base, rate), decimals)
}
