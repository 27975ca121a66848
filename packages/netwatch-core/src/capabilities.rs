//! # Capability Registry
//!
//! Reports which algorithms this build supports. The list is built once per
//! process on first use and never changes afterwards.

use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::crypto::{Algorithm, KeyPurpose};

/// One supported algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capability {
    /// Algorithm identifier
    pub algorithm: Algorithm,
    /// Short name (`AES`, `RSA`, `EC`)
    pub name: &'static str,
    /// Parameter summary (e.g. `AES-256-GCM`)
    pub parameters: &'static str,
    /// Operations keys of this algorithm support
    pub operations: Vec<&'static str>,
    /// Whether keys live in dedicated hardware
    pub hardware_backed: bool,
}

static REGISTRY: OnceCell<Vec<Capability>> = OnceCell::new();

fn build() -> Vec<Capability> {
    let registry: Vec<Capability> = Algorithm::ALL
        .iter()
        .map(|algorithm| Capability {
            algorithm: *algorithm,
            name: algorithm.name(),
            parameters: algorithm.parameters(),
            operations: algorithm
                .supported_purposes()
                .iter()
                .map(|purpose: KeyPurpose| purpose.name())
                .collect(),
            hardware_backed: false,
        })
        .collect();

    tracing::debug!(count = registry.len(), "Capability registry built");
    registry
}

/// Every supported algorithm, in the order AES, RSA, EC
pub fn list_capabilities() -> &'static [Capability] {
    REGISTRY.get_or_init(build)
}

/// Short names of every supported algorithm
pub fn capability_names() -> Vec<String> {
    list_capabilities()
        .iter()
        .map(|capability| capability.name.to_string())
        .collect()
}
