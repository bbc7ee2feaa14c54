//! System-wide shortcut interception.

use std::sync::Arc;

use tracing::{info, warn};

use crate::shortcuts::{self, ShortcutRegistrar};

/// Claims the global shortcut set for the lifetime of a lockdown and
/// releases it on the way out.
///
/// Claiming is best effort per chord. The OS may refuse some of them,
/// notably `Ctrl+Alt+Delete` on most platforms, and a partially claimed
/// set still blunts the common escape routes, so refusals are logged and
/// skipped rather than treated as failure.
pub struct ShortcutInterceptor {
    registrar: Arc<dyn ShortcutRegistrar>,
    engaged: bool,
}

impl ShortcutInterceptor {
    pub fn new(registrar: Arc<dyn ShortcutRegistrar>) -> Self {
        Self {
            registrar,
            engaged: false,
        }
    }

    /// Claim every chord in the global set.
    pub fn engage(&mut self) {
        if self.engaged {
            return;
        }
        let mut claimed = 0;
        for &shortcut in shortcuts::global_set() {
            match self.registrar.register(shortcut) {
                Ok(()) => claimed += 1,
                Err(e) => warn!(shortcut = %shortcut, error = %e, "Could not claim shortcut"),
            }
        }
        info!(
            claimed,
            total = shortcuts::global_set().len(),
            "Shortcut interception engaged"
        );
        self.engaged = true;
    }

    /// Release everything claimed. Safe to call when nothing is.
    pub fn release(&mut self) {
        if !self.engaged {
            return;
        }
        self.registrar.unregister_all();
        self.engaged = false;
        info!("Shortcut interception released");
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}
