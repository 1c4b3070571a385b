//! Media playback and native event delivery.
//!
//! A [`MediaController`] plays one data source. On creation it registers one
//! native callback per event category (timestamp, stream, PelcoData); each
//! callback fans out to the handlers of the matching [`EventBridge`].
//!
//! # Callback context
//!
//! The native layer gets a raw pointer produced by `Arc::into_raw` on the
//! controller's shared state. That raw reference is only reclaimed after all
//! three native registrations have been cleared. Each delivery holds its own
//! strong reference while handlers run, so a handler may drop the controller
//! that is calling it. Deliveries are counted while they run; drop waits for
//! them before the native controller is released. A drop from inside a
//! handler hands the release to a helper thread that waits for the delivery
//! to return.
//!
//! # Example
//!
//! ```no_run
//! # use vxsdk::{Filters, MediaController, VxSystem};
//! # fn run(system: &VxSystem) -> Result<(), vxsdk::Error> {
//! let source = system.try_get_data_sources(&Filters::new())?.remove(0);
//! let controller = MediaController::new(&source)?;
//! controller.on_timestamp(|event| println!("frame at {:?}", event.time()));
//! controller.play(1.0)?;
//! # Ok(())
//! # }
//! ```

use std::{
    cell::RefCell,
    fmt,
    os::raw::c_void,
    panic::{self, AssertUnwindSafe},
    ptr, slice,
    sync::{
        atomic::{AtomicPtr, AtomicU8, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use tracing::{debug, error, warn};

use crate::{
    event::{EventBridge, SubscriptionId},
    resource::DataSource,
    runtime::SdkInner,
    sys, Error, Result,
};

/// How long drop waits for deliveries still running on native threads.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

thread_local! {
    /// Controllers whose handlers are running on this thread.
    static DELIVERING: RefCell<Vec<*const Shared>> = const { RefCell::new(Vec::new()) };
}

/// A playback position reported by the native player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampEvent {
    /// Milliseconds since the Unix epoch.
    pub unix_time_ms: u64,
}

impl TimestampEvent {
    fn from_raw(raw: &sys::VxTimestampEvent) -> Self {
        Self {
            unix_time_ms: raw.unix_time_ms,
        }
    }

    pub fn time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.unix_time_ms)
    }
}

/// Stream state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum StreamEventKind {
    #[num_enum(default)]
    Unknown = sys::VX_STREAM_UNKNOWN,
    Started = sys::VX_STREAM_STARTED,
    Paused = sys::VX_STREAM_PAUSED,
    Resumed = sys::VX_STREAM_RESUMED,
    Ended = sys::VX_STREAM_ENDED,
    /// The connection to the stream was lost.
    Interrupted = sys::VX_STREAM_INTERRUPTED,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEvent {
    pub kind: StreamEventKind,
}

impl StreamEvent {
    fn from_raw(raw: &sys::VxStreamEvent) -> Self {
        Self {
            kind: StreamEventKind::from_primitive(raw.event_type),
        }
    }
}

/// Pelco serial data carried in the stream, copied out of the native buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PelcoDataEvent {
    pub data: Vec<u8>,
}

impl PelcoDataEvent {
    /// # Safety
    ///
    /// `raw.data` must be null or valid for `raw.data_size` bytes.
    unsafe fn from_raw(raw: &sys::VxPelcoDataEvent) -> Self {
        let data = if raw.data.is_null() || raw.data_size <= 0 {
            Vec::new()
        } else {
            slice::from_raw_parts(raw.data, raw.data_size as usize).to_vec()
        };
        Self { data }
    }
}

/// Lifecycle of a controller's native registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ControllerState {
    /// Callbacks are being registered; events are not delivered yet.
    Uninitialized = 0,
    Active = 1,
    /// Callbacks are cleared; late native calls are ignored.
    TornDown = 2,
}

/// State reachable from the native callbacks.
struct Shared {
    timestamp: EventBridge<TimestampEvent>,
    stream: EventBridge<StreamEvent>,
    pelco_data: EventBridge<PelcoDataEvent>,
    state: AtomicU8,
    in_flight: AtomicUsize,
}

impl Shared {
    fn new() -> Self {
        Self {
            timestamp: EventBridge::new(),
            stream: EventBridge::new(),
            pelco_data: EventBridge::new(),
            state: AtomicU8::new(ControllerState::Uninitialized.into()),
            in_flight: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> ControllerState {
        ControllerState::try_from(self.state.load(Ordering::SeqCst))
            .unwrap_or(ControllerState::TornDown)
    }

    /// Delivers one event if the controller is active.
    ///
    /// The in-flight count is raised before the state is checked, so a
    /// dropping controller either waits for this delivery or this delivery
    /// sees the teardown.
    fn deliver<E>(
        &self,
        category: &'static str,
        bridge: &EventBridge<E>,
        make: impl FnOnce() -> E,
    ) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.state() == ControllerState::Active {
            let _marker = DeliveryMarker::enter(self);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| bridge.fire_with(make)));
            if outcome.is_err() {
                error!(
                    category,
                    "Media event handler panicked; remaining handlers for this event were skipped"
                );
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn is_delivering_on_current_thread(&self) -> bool {
        let this = self as *const Shared;
        DELIVERING.with(|delivering| delivering.borrow().contains(&this))
    }

    fn wait_for_deliveries(&self) {
        let start = Instant::now();
        let mut spin_count = 0;
        let mut sleep_ms = 1;
        const MAX_SPIN: u32 = 100;
        const MAX_SLEEP_MS: u64 = 10;

        while self.in_flight.load(Ordering::SeqCst) > 0 {
            if start.elapsed() > DRAIN_TIMEOUT {
                warn!(
                    in_flight = self.in_flight.load(Ordering::SeqCst),
                    "Media events still being delivered at release"
                );
                return;
            }
            if spin_count < MAX_SPIN {
                thread::yield_now();
                spin_count += 1;
            } else {
                thread::sleep(Duration::from_millis(sleep_ms));
                sleep_ms = (sleep_ms * 2).min(MAX_SLEEP_MS);
            }
        }
    }

    fn clear_handlers(&self) {
        self.timestamp.clear();
        self.stream.clear();
        self.pelco_data.clear();
    }
}

/// Records a running delivery on the current thread until dropped.
struct DeliveryMarker(*const Shared);

impl DeliveryMarker {
    fn enter(shared: &Shared) -> Self {
        let this = shared as *const Shared;
        DELIVERING.with(|delivering| delivering.borrow_mut().push(this));
        Self(this)
    }
}

impl Drop for DeliveryMarker {
    fn drop(&mut self) {
        DELIVERING.with(|delivering| {
            let mut delivering = delivering.borrow_mut();
            if let Some(pos) = delivering.iter().rposition(|&p| p == self.0) {
                delivering.remove(pos);
            }
        });
    }
}

/// Takes a strong reference to the callback context for one delivery.
///
/// # Safety
///
/// `user_data` must be the context registered by `MediaController::new`,
/// still owned by a live registration.
unsafe fn context(user_data: *mut c_void) -> Arc<Shared> {
    let raw = user_data as *const Shared;
    Arc::increment_strong_count(raw);
    Arc::from_raw(raw)
}

unsafe extern "C" fn on_timestamp(event: *const sys::VxTimestampEvent, user_data: *mut c_void) {
    if event.is_null() || user_data.is_null() {
        return;
    }
    // SAFETY: user_data stays alive until after the registration is cleared.
    let shared = context(user_data);
    shared.deliver("timestamp", &shared.timestamp, || TimestampEvent::from_raw(&*event));
}

unsafe extern "C" fn on_stream(event: *const sys::VxStreamEvent, user_data: *mut c_void) {
    if event.is_null() || user_data.is_null() {
        return;
    }
    let shared = context(user_data);
    shared.deliver("stream", &shared.stream, || StreamEvent::from_raw(&*event));
}

unsafe extern "C" fn on_pelco_data(event: *const sys::VxPelcoDataEvent, user_data: *mut c_void) {
    if event.is_null() || user_data.is_null() {
        return;
    }
    let shared = context(user_data);
    shared.deliver("pelco data", &shared.pelco_data, || PelcoDataEvent::from_raw(&*event));
}

/// A native controller waiting to be released.
struct NativeRelease {
    sdk: Arc<SdkInner>,
    raw: sys::VxHandle,
}

// SAFETY: the handle is only used once, by whichever thread runs the release.
unsafe impl Send for NativeRelease {}

impl NativeRelease {
    fn run(self) {
        let result =
            Error::check("VxMediaRelease", unsafe { self.sdk.api.media_release(self.raw) });
        if let Err(err) = result {
            error!("Failed to release media controller: {err}");
        }
    }
}

/// Plays a data source and delivers its events.
///
/// Handlers run synchronously on the native delivery thread, in subscription
/// order. A panicking handler is caught and logged.
pub struct MediaController {
    sdk: Arc<SdkInner>,
    raw: sys::VxHandle,
    shared: Arc<Shared>,
    /// Raw `Arc<Shared>` reference owned by the native registrations.
    context: AtomicPtr<c_void>,
}

impl fmt::Debug for MediaController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaController")
            .field("raw", &self.raw)
            .field("state", &self.state())
            .field("in_flight", &self.shared.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl MediaController {
    /// Creates a controller for `source` and registers its event callbacks.
    ///
    /// # Errors
    ///
    /// Returns the native result if `VxMediaCreate` or any callback
    /// registration fails. After a registration failure every registration is
    /// cleared and the native controller is released before returning.
    pub fn new(source: &DataSource) -> Result<Self> {
        let sdk = Arc::clone(source.handle().sdk());

        let mut raw: sys::VxHandle = ptr::null_mut();
        Error::check("VxMediaCreate", unsafe {
            sdk.api.media_create(source.as_raw(), &mut raw)
        })?;
        if raw.is_null() {
            return Err(Error::NullPointer("VxMediaCreate".into()));
        }

        let shared = Arc::new(Shared::new());
        let context = Arc::into_raw(Arc::clone(&shared)) as *mut c_void;
        // From here on, dropping the controller undoes everything.
        let controller = Self {
            sdk,
            raw,
            shared,
            context: AtomicPtr::new(context),
        };

        controller.register(context)?;
        controller
            .shared
            .state
            .store(ControllerState::Active.into(), Ordering::SeqCst);
        debug!(source = %source, "media controller created");
        Ok(controller)
    }

    fn register(&self, context: *mut c_void) -> Result<()> {
        let api = &self.sdk.api;
        unsafe {
            Error::check(
                "VxMediaSetTimestampCallback",
                api.media_set_timestamp_callback(self.raw, Some(on_timestamp), context),
            )?;
            Error::check(
                "VxMediaSetStreamCallback",
                api.media_set_stream_callback(self.raw, Some(on_stream), context),
            )?;
            Error::check(
                "VxMediaSetPelcoDataCallback",
                api.media_set_pelco_data_callback(self.raw, Some(on_pelco_data), context),
            )?;
        }
        Ok(())
    }

    fn unregister(&self) -> Result<()> {
        let api = &self.sdk.api;
        let results = unsafe {
            [
                Error::check(
                    "VxMediaSetTimestampCallback",
                    api.media_set_timestamp_callback(self.raw, None, ptr::null_mut()),
                ),
                Error::check(
                    "VxMediaSetStreamCallback",
                    api.media_set_stream_callback(self.raw, None, ptr::null_mut()),
                ),
                Error::check(
                    "VxMediaSetPelcoDataCallback",
                    api.media_set_pelco_data_callback(self.raw, None, ptr::null_mut()),
                ),
            ]
        };

        let mut first = None;
        for result in results {
            if let Err(err) = result {
                error!("Failed to clear media callback: {err}");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Clears every native registration and every handler.
    ///
    /// Calling it again does nothing. Events arriving afterwards are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first failed unregistration. The callback context is then
    /// kept alive for the rest of the process, since the native side may still
    /// hold it.
    pub fn teardown(&self) -> Result<()> {
        let previous = self
            .shared
            .state
            .swap(ControllerState::TornDown.into(), Ordering::SeqCst);
        if previous == u8::from(ControllerState::TornDown) {
            return Ok(());
        }

        let result = self.unregister();
        self.shared.clear_handlers();

        let context = self.context.swap(ptr::null_mut(), Ordering::AcqRel);
        if result.is_ok() && !context.is_null() {
            // SAFETY: created by Arc::into_raw in `new`; the native side no
            // longer holds it.
            unsafe { drop(Arc::from_raw(context as *const Shared)) };
        } else if result.is_err() {
            warn!("Media callbacks still registered; leaking their context");
        }

        debug!(raw = ?self.raw, "media controller torn down");
        result
    }

    pub fn state(&self) -> ControllerState {
        self.shared.state()
    }

    pub fn timestamp_event(&self) -> &EventBridge<TimestampEvent> {
        &self.shared.timestamp
    }

    pub fn stream_event(&self) -> &EventBridge<StreamEvent> {
        &self.shared.stream
    }

    pub fn pelco_data_event(&self) -> &EventBridge<PelcoDataEvent> {
        &self.shared.pelco_data
    }

    pub fn on_timestamp<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&TimestampEvent) + Send + Sync + 'static,
    {
        self.shared.timestamp.subscribe(handler)
    }

    pub fn on_stream<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.shared.stream.subscribe(handler)
    }

    pub fn on_pelco_data<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PelcoDataEvent) + Send + Sync + 'static,
    {
        self.shared.pelco_data.subscribe(handler)
    }

    /// Starts or resumes playback. `1.0` is real time; negative plays backwards.
    pub fn play(&self, speed: f32) -> Result<()> {
        Error::check("VxMediaPlay", unsafe { self.sdk.api.media_play(self.raw, speed) })
    }

    pub fn pause(&self) -> Result<()> {
        Error::check("VxMediaPause", unsafe { self.sdk.api.media_pause(self.raw) })
    }

    pub fn stop(&self) -> Result<()> {
        Error::check("VxMediaStop", unsafe { self.sdk.api.media_stop(self.raw) })
    }

    /// Jumps to recorded video at `time` and plays at `speed`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `time` precedes the Unix
    /// epoch, or the native result of `VxMediaSeek`.
    pub fn seek(&self, time: SystemTime, speed: f32) -> Result<()> {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::InvalidConfiguration("Seek time precedes the Unix epoch".into()))?;
        let unix_time_ms = u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX);
        Error::check("VxMediaSeek", unsafe {
            self.sdk.api.media_seek(self.raw, unix_time_ms, speed)
        })
    }
}

impl Drop for MediaController {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            error!("Media controller teardown failed: {err}");
        }
        let release = NativeRelease {
            sdk: Arc::clone(&self.sdk),
            raw: self.raw,
        };

        if !self.shared.is_delivering_on_current_thread() {
            self.shared.wait_for_deliveries();
            release.run();
            return;
        }

        // Dropped by one of its own handlers: the native callback is still
        // on this thread's stack.
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("vxsdk-media-release".into())
            .spawn(move || {
                shared.wait_for_deliveries();
                release.run();
            });
        if let Err(err) = spawned {
            error!("Failed to defer media controller release; leaking it: {err}");
        }
    }
}

// SAFETY: the controller can move between threads; callbacks only touch the
// `Send + Sync` shared state.
unsafe impl Send for MediaController {}

impl DataSource {
    /// Creates a media controller playing this data source.
    pub fn media_controller(&self) -> Result<MediaController> {
        MediaController::new(self)
    }
}
