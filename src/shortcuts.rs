//! Shortcut catalog and the registrar seam.
//!
//! Two fixed sets of key chords matter to the engine: the system-wide set
//! claimed through the OS registrar while a lockdown is active, and the
//! capture set a surface filters out of its own input stream. Both are
//! closed catalogs. Nothing in the engine constructs chords at runtime.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::error::Result;

/// A key chord the engine suppresses, named by what the chord normally does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shortcut {
    /// Windows close.
    AltF4,
    /// Mac quit.
    CmdQ,
    /// Close tab or window.
    CtrlW,
    /// Task manager, limited effectiveness.
    CtrlAltDelete,
    /// Task manager.
    CtrlShiftEsc,
    /// Mac app switcher.
    CmdTab,
    /// Windows app switcher.
    AltTab,
    /// Mac minimize.
    CmdM,
    /// Mac hide.
    CmdH,
    /// Toggle fullscreen.
    F11,
    /// General escape.
    Escape,
    /// Refresh.
    F5,
    /// Refresh.
    CtrlR,
    /// Mac refresh.
    CmdR,
    /// Devtools.
    F12,
    /// Devtools inspector.
    CtrlShiftI,
    /// Devtools console.
    CtrlShiftJ,
    /// Devtools element picker.
    CtrlShiftC,
}

impl Shortcut {
    /// Registrar identifier for this chord.
    pub fn id(&self) -> &'static str {
        match self {
            Self::AltF4 => "Alt+F4",
            Self::CmdQ => "Cmd+Q",
            Self::CtrlW => "Ctrl+W",
            Self::CtrlAltDelete => "Ctrl+Alt+Delete",
            Self::CtrlShiftEsc => "Ctrl+Shift+Esc",
            Self::CmdTab => "Cmd+Tab",
            Self::AltTab => "Alt+Tab",
            Self::CmdM => "Cmd+M",
            Self::CmdH => "Cmd+H",
            Self::F11 => "F11",
            Self::Escape => "Escape",
            Self::F5 => "F5",
            Self::CtrlR => "Ctrl+R",
            Self::CmdR => "Cmd+R",
            Self::F12 => "F12",
            Self::CtrlShiftI => "Ctrl+Shift+I",
            Self::CtrlShiftJ => "Ctrl+Shift+J",
            Self::CtrlShiftC => "Ctrl+Shift+C",
        }
    }

    /// Whether this chord opens developer tooling rather than escaping the
    /// surface. These stay usable under a profile with `allow_dev_tools`.
    pub fn is_devtools(&self) -> bool {
        matches!(
            self,
            Self::F12 | Self::CtrlShiftI | Self::CtrlShiftJ | Self::CtrlShiftC
        )
    }
}

impl std::fmt::Display for Shortcut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Chords claimed system-wide for the duration of a lockdown.
pub fn global_set() -> &'static [Shortcut] {
    &[
        Shortcut::AltF4,
        Shortcut::CmdQ,
        Shortcut::CtrlW,
        Shortcut::CtrlAltDelete,
        Shortcut::CtrlShiftEsc,
        Shortcut::CmdTab,
        Shortcut::AltTab,
        Shortcut::CmdM,
        Shortcut::CmdH,
        Shortcut::F11,
        Shortcut::Escape,
    ]
}

/// Chords a surface filters from its own input stream. Devtools chords are
/// left out when the profile allows developer tooling.
pub fn capture_set(allow_dev_tools: bool) -> Vec<Shortcut> {
    let all = [
        Shortcut::F5,
        Shortcut::CtrlR,
        Shortcut::CmdR,
        Shortcut::F11,
        Shortcut::F12,
        Shortcut::AltTab,
        Shortcut::CtrlW,
        Shortcut::CtrlShiftI,
        Shortcut::CtrlShiftJ,
        Shortcut::CtrlShiftC,
    ];
    all.into_iter()
        .filter(|s| !(allow_dev_tools && s.is_devtools()))
        .collect()
}

/// System facility that claims key chords globally.
///
/// Registration is best effort per chord; a chord the OS refuses leaves the
/// rest of the set in place. Release is all-or-nothing by contract.
pub trait ShortcutRegistrar: Send + Sync {
    /// Claim a single chord system-wide.
    fn register(&self, shortcut: Shortcut) -> Result<()>;

    /// Release every chord this process has claimed.
    fn unregister_all(&self);
}

/// In-memory registrar double with per-chord failure injection.
#[derive(Default)]
pub struct MemoryRegistrar {
    inner: Mutex<MemoryRegistrarState>,
}

#[derive(Default)]
struct MemoryRegistrarState {
    registered: Vec<Shortcut>,
    failing: HashSet<Shortcut>,
    release_calls: usize,
}

impl MemoryRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future `register` calls for `shortcut` fail.
    pub fn fail_registration(&self, shortcut: Shortcut) {
        self.inner.lock().failing.insert(shortcut);
    }

    /// Chords currently held, in registration order.
    pub fn registered(&self) -> Vec<Shortcut> {
        self.inner.lock().registered.clone()
    }

    /// How many times `unregister_all` has been called.
    pub fn release_calls(&self) -> usize {
        self.inner.lock().release_calls
    }
}

impl ShortcutRegistrar for MemoryRegistrar {
    fn register(&self, shortcut: Shortcut) -> Result<()> {
        let mut state = self.inner.lock();
        if state.failing.contains(&shortcut) {
            return Err(crate::error::WardenError::ShortcutRegistration {
                id: shortcut.id(),
                message: "registration refused".to_string(),
            });
        }
        state.registered.push(shortcut);
        Ok(())
    }

    fn unregister_all(&self) {
        let mut state = self.inner.lock();
        state.registered.clear();
        state.release_calls += 1;
    }
}
