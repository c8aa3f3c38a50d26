// ============================================================================
// Module : engine
// ============================================================================
// Cœur de calcul : indicateurs, conversion de devise, évaluation des alertes.
// Aucun I/O ici, uniquement des fonctions pures.
// ============================================================================

pub mod convert;
pub mod evaluator;
pub mod indicator;

pub use convert::{convert, convert_display, round_display};
pub use evaluator::{AlertEvaluator, TriggerPolicy};
pub use indicator::{IndicatorEngine, SMA_PERIOD};
