//! Window management using winit.
//!
//! The window owns its event loop and pumps it on demand instead of handing
//! control to `EventLoop::run_app`. This keeps the render loop in the caller:
//!
//! ```no_run
//! use trigon_platform::Window;
//!
//! let mut window = Window::create(800, 600, "Vulkan App").expect("window");
//! while !window.should_close() {
//!     window.poll_events();
//!     // draw a frame
//! }
//! ```
//!
//! winit allows a single event loop per process. The first window initializes
//! it; dropping a window parks the loop in a thread-local slot so a later
//! window on the same thread can reuse it.

use std::cell::RefCell;
use std::time::Duration;

use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::error::OsError;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window as WinitWindow, WindowAttributes, WindowId};

use trigon_core::{Error, Result};

/// Upper bound on event loop iterations spent waiting for the window to appear.
const MAX_STARTUP_PUMPS: usize = 200;

/// Per-iteration timeout while waiting for the window to appear.
const STARTUP_PUMP_TIMEOUT: Duration = Duration::from_millis(5);

thread_local! {
    static PARKED_EVENT_LOOP: RefCell<Option<EventLoop<()>>> = const { RefCell::new(None) };
}

/// Exclusive use of the thread's event loop for the lifetime of one window.
///
/// Dropped after the winit window, so its drop marks the window as gone.
struct EventLoopLease {
    event_loop: Option<EventLoop<()>>,
    holds_window: bool,
}

impl EventLoopLease {
    fn acquire() -> Result<Self> {
        let parked = PARKED_EVENT_LOOP
            .try_with(|slot| slot.borrow_mut().take())
            .ok()
            .flatten();

        let event_loop = match parked {
            Some(event_loop) => {
                debug!("Reusing parked windowing backend");
                event_loop
            }
            None => {
                let event_loop =
                    EventLoop::new().map_err(|e| Error::PlatformInit(e.to_string()))?;
                info!("Windowing backend initialized");
                event_loop
            }
        };

        Ok(Self {
            event_loop: Some(event_loop),
            holds_window: false,
        })
    }

    /// Runs one non-blocking pass over the backend event queue.
    ///
    /// Returns `true` once the event loop has exited.
    fn pump(&mut self, state: &mut WindowState, timeout: Duration) -> bool {
        match self.event_loop.as_mut() {
            Some(event_loop) => matches!(
                event_loop.pump_app_events(Some(timeout), state),
                PumpStatus::Exit(_)
            ),
            None => true,
        }
    }
}

impl Drop for EventLoopLease {
    fn drop(&mut self) {
        if self.holds_window {
            info!("Window destroyed");
        }

        if let Some(event_loop) = self.event_loop.take() {
            let parked = PARKED_EVENT_LOOP.try_with(|slot| {
                *slot.borrow_mut() = Some(event_loop);
            });
            if parked.is_ok() {
                debug!("Windowing backend parked");
            }
        }
    }
}

/// Event handler driven by [`EventLoopLease::pump`].
struct WindowState {
    attributes: WindowAttributes,
    created: Option<WinitWindow>,
    window_id: Option<WindowId>,
    creation_error: Option<OsError>,
    close_requested: bool,
}

impl WindowState {
    fn new(attributes: WindowAttributes) -> Self {
        Self {
            attributes,
            created: None,
            window_id: None,
            creation_error: None,
            close_requested: false,
        }
    }

    fn create_pending(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_id.is_some() || self.creation_error.is_some() {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                self.window_id = Some(window.id());
                self.created = Some(window);
            }
            Err(e) => self.creation_error = Some(e),
        }
    }

    fn is_settled(&self) -> bool {
        self.created.is_some() || self.creation_error.is_some()
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.create_pending(event_loop);
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        // Events for windows destroyed earlier on a reused loop are ignored.
        if self.window_id != Some(id) {
            return;
        }

        if let WindowEvent::CloseRequested = event {
            info!("Close requested");
            self.close_requested = true;
        }
    }

    // A parked loop never sees `resumed` again.
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.create_pending(event_loop);
    }
}

/// Builds the attributes for a fixed-size, non-resizable window.
fn window_attributes(width: u32, height: u32, title: &str) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(width, height))
        .with_resizable(false)
}

/// A native window that provides raw handles for Vulkan surface creation,
/// its framebuffer extent and a close signal.
///
/// Fields drop in declaration order: the winit window goes before the event
/// loop lease parks the loop.
pub struct Window {
    window: WinitWindow,
    state: WindowState,
    event_loop: EventLoopLease,
}

impl Window {
    /// Create a new non-resizable window with the given dimensions and title.
    ///
    /// winit never attaches a rendering context to the window.
    ///
    /// # Errors
    ///
    /// - [`Error::PlatformInit`] if the windowing backend cannot be initialized
    /// - [`Error::WindowCreate`] if the window cannot be allocated
    pub fn create(width: u32, height: u32, title: &str) -> Result<Self> {
        let mut event_loop = EventLoopLease::acquire()?;
        let mut state = WindowState::new(window_attributes(width, height, title));

        for _ in 0..MAX_STARTUP_PUMPS {
            if state.is_settled() || event_loop.pump(&mut state, STARTUP_PUMP_TIMEOUT) {
                break;
            }
        }

        if let Some(e) = state.creation_error.take() {
            return Err(Error::WindowCreate(e.to_string()));
        }

        let window = state.created.take().ok_or_else(|| {
            Error::WindowCreate("event loop never became ready for window creation".to_string())
        })?;

        info!("Window created: {}x{} '{}'", width, height, title);
        event_loop.holds_window = true;

        Ok(Self {
            window,
            state,
            event_loop,
        })
    }

    /// Processes the backend event queue once without blocking.
    pub fn poll_events(&mut self) {
        if self.event_loop.pump(&mut self.state, Duration::ZERO) {
            warn!("Event loop exited, treating as close request");
            self.state.close_requested = true;
        }
    }

    /// Whether the user asked to close the window.
    #[inline]
    pub fn should_close(&self) -> bool {
        self.state.close_requested
    }

    /// Current framebuffer size in pixels; `(0, 0)` while minimized on some platforms.
    pub fn framebuffer_extent(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}

impl HasWindowHandle for Window {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for Window {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}
