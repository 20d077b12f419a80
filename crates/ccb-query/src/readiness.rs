//! Query readiness

use ccb_slots::{Slot, SlotConfig};

/// Whether every required slot has at least one column
///
/// A required config with no matching slot counts as unfilled. Non-required
/// slots never influence the result.
#[must_use]
pub fn is_ready(slots: &[Slot], configs: &[SlotConfig]) -> bool {
    configs.iter().filter(|c| c.is_required).all(|config| {
        slots
            .iter()
            .any(|slot| slot.name == config.name && slot.is_filled())
    })
}

/// Whether any slot holds a column
#[must_use]
pub fn has_any_content(slots: &[Slot]) -> bool {
    slots.iter().any(Slot::is_filled)
}

/// Names of required slots that are still empty, in config order
#[must_use]
pub fn missing_required(slots: &[Slot], configs: &[SlotConfig]) -> Vec<String> {
    configs
        .iter()
        .filter(|c| c.is_required)
        .filter(|config| {
            !slots
                .iter()
                .any(|slot| slot.name == config.name && slot.is_filled())
        })
        .map(|c| c.name.clone())
        .collect()
}
