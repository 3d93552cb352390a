//! Flavor dispatch and batch validation.

use crate::bracket::validate_bracket;
use crate::error::{ValidationError, ValidationResult};
use crate::trigger::validate_trigger;
use dhan_core::{OrderIntent, OrderKind, RawOrder};
use tracing::debug;

/// Decide the flavor of a raw order.
///
/// An explicit `kind` wins; otherwise a present `trigger_price` selects the
/// trigger flavor and everything else is treated as a bracket.
pub fn resolve_kind(raw: &RawOrder) -> ValidationResult<OrderKind> {
    match raw.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(kind) => kind.parse::<OrderKind>().map_err(|_| {
            ValidationError::invalid("kind", format!("unsupported order kind '{kind}'"))
        }),
        None if raw.trigger_price.is_some() => Ok(OrderKind::Trigger),
        None => Ok(OrderKind::Bracket),
    }
}

/// Validate a raw order of either flavor.
pub fn validate(raw: &RawOrder) -> ValidationResult<OrderIntent> {
    match resolve_kind(raw)? {
        OrderKind::Bracket => validate_bracket(raw).map(OrderIntent::Bracket),
        OrderKind::Trigger => validate_trigger(raw).map(OrderIntent::Trigger),
    }
}

/// Outcome of validating a batch. Indices refer to positions in the input slice.
#[derive(Debug, Default)]
pub struct BatchValidation {
    pub intents: Vec<(usize, OrderIntent)>,
    pub errors: Vec<(usize, ValidationError)>,
}

impl BatchValidation {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate every order, collecting failures instead of stopping at the first.
pub fn validate_batch(rows: &[RawOrder]) -> BatchValidation {
    let mut out = BatchValidation::default();
    for (idx, raw) in rows.iter().enumerate() {
        match validate(raw) {
            Ok(intent) => out.intents.push((idx, intent)),
            Err(e) => out.errors.push((idx, e)),
        }
    }
    debug!(
        rows = rows.len(),
        valid = out.intents.len(),
        invalid = out.errors.len(),
        "Batch validated"
    );
    out
}
