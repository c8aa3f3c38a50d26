// ============================================================================
// LazyAlert - Library
// ============================================================================
// Moteur d'indicateurs (RSI 14, moyenne 7 jours, variation 24h) et
// d'alertes de baisse de prix pour un actif unique
// ============================================================================

pub mod api;     // Sources de marché, taux de change, notifications
pub mod app;     // Boucle de rafraîchissement (state machine)
pub mod config;  // Configuration (variables d'environnement)
pub mod engine;  // Calcul des indicateurs et évaluation des alertes
pub mod error;   // Taxonomie d'erreurs
pub mod message; // Contenu des notifications
pub mod models;  // Structures de données
pub mod service; // Création / liste / suppression d'alertes
pub mod store;   // Stockage des alertes
