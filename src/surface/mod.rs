//! Display surface abstraction.
//!
//! The engine never talks to a windowing system directly. It drives a
//! [`SurfaceProvider`] that owns the real surfaces and reports their
//! lifecycle back over an event channel. Production embeds a provider
//! backed by the host shell; tests use [`MemorySurface`].

mod memory;

pub use memory::{MemorySurface, SurfaceOp};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::{Profile, ProfileKind};
use crate::error::Result;
use crate::shortcuts::{self, Shortcut};

/// Opaque handle to one live surface. Handles are never reused within a
/// provider's lifetime, so a stale handle fails loudly instead of acting
/// on a successor surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Creation-time shape of a surface.
///
/// Everything here is fixed at creation; the engine never mutates a live
/// surface's geometry flags, it destroys and recreates instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub fullscreen: bool,
    pub frameless: bool,
    pub always_on_top: bool,
    pub resizable: bool,
    pub movable: bool,
    pub minimizable: bool,
    pub maximizable: bool,
    pub closable: bool,
    pub skip_taskbar: bool,
    pub kiosk: bool,
    pub open_dev_tools: bool,
    /// Chords the surface filters from its own input stream.
    pub capture: Vec<Shortcut>,
}

impl SurfaceOptions {
    /// Derive the surface shape for a profile.
    ///
    /// Under `dev` the surface is an ordinary window so the machine stays
    /// usable; under `prod` it is a pinned fullscreen kiosk.
    pub fn for_profile(profile: &Profile) -> Self {
        let relaxed = matches!(profile.kind, ProfileKind::Dev);
        Self {
            fullscreen: !relaxed,
            frameless: true,
            always_on_top: !relaxed,
            resizable: relaxed,
            movable: relaxed,
            minimizable: relaxed,
            maximizable: relaxed,
            closable: profile.allow_close,
            skip_taskbar: false,
            kiosk: !relaxed,
            open_dev_tools: profile.open_dev_tools,
            capture: shortcuts::capture_set(profile.allow_dev_tools),
        }
    }
}

/// Lifecycle notification from the provider.
///
/// Only `Closed` drives engine behavior. The rest are informational; the
/// focus guard corrects by polling, not by reacting to these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface no longer exists, whether destroyed by the engine or
    /// torn down behind its back.
    Closed { id: SurfaceId },
    /// The surface lost input focus.
    Blurred { id: SurfaceId },
    /// The surface was minimized.
    Minimized { id: SurfaceId },
    /// The surface became hidden.
    Hidden { id: SurfaceId },
}

/// Host facility that owns real surfaces.
///
/// All methods taking a [`SurfaceId`] fail with `SurfaceGone` when the
/// handle does not name a live surface. The engine treats most of these
/// failures as recoverable and logs them; only `create` is load-bearing.
#[async_trait]
pub trait SurfaceProvider: Send + Sync {
    /// Create a surface and return its handle.
    async fn create(&self, options: &SurfaceOptions) -> Result<SurfaceId>;

    /// Destroy a surface. The provider emits [`SurfaceEvent::Closed`] for
    /// every destruction, engine-initiated or not.
    async fn destroy(&self, id: SurfaceId) -> Result<()>;

    async fn show(&self, id: SurfaceId) -> Result<()>;

    async fn hide(&self, id: SurfaceId) -> Result<()>;

    /// Give the surface input focus.
    async fn focus(&self, id: SurfaceId) -> Result<()>;

    /// Raise the surface above every other window.
    async fn raise(&self, id: SurfaceId) -> Result<()>;

    /// Pin or unpin the surface above normal windows.
    async fn pin(&self, id: SurfaceId, on: bool) -> Result<()>;

    /// Start or stop the attention cue on the surface.
    async fn set_attention(&self, id: SurfaceId, on: bool) -> Result<()>;

    /// Whether the surface currently holds input focus.
    async fn is_focused(&self, id: SurfaceId) -> Result<bool>;

    /// Subscribe to lifecycle events. Each subscriber receives every
    /// event from subscription time onward.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SurfaceEvent>;
}
