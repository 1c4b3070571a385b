//! In-process fake of the VxSdk native library.
//!
//! Every native object is a [`FakeNode`] or [`FakeController`] kept alive by an
//! `Arc` in the test; the handle given to the crate is the `Arc`'s pointer, so
//! the fake entry points recover their state from the handle alone and work on
//! any thread.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    ffi::CStr,
    os::raw::{c_char, c_int, c_void},
    ptr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, Once,
    },
};

use once_cell::sync::Lazy;
use vxsdk::{sys, LoginOptions, SdkOptions, VxSdk, VxSdkApi, VxSdkTable};

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: Once = Once::new();

pub fn init_tracing() {
    LOG_ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_test_writer()
            .try_init();
    });
}

pub static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static SHUTDOWN_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static LOG_LEVELS: Mutex<Vec<c_int>> = Mutex::new(Vec::new());
pub static LOG_PATHS: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Systems reachable through `VxSubmitLogin`, by username.
static SYSTEMS: Lazy<Mutex<HashMap<String, Arc<FakeNode>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// One native `VxGetCollection` call as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionCall {
    pub relation: c_int,
    pub buffer_null: bool,
    pub capacity: c_int,
    pub filters: Vec<(c_int, String)>,
}

/// A native resource.
pub struct FakeNode {
    pub id: String,
    pub name: String,
    pub resource_type: c_int,
    children: Mutex<HashMap<c_int, Vec<Arc<FakeNode>>>>,
    /// Every collection call made with this node as parent.
    pub calls: Mutex<Vec<CollectionCall>>,
    /// Answer every collection call with this code instead.
    pub forced_result: Mutex<Option<sys::VxResult>>,
    /// Added to the relation between the probe and the first fetch.
    pub grow_before_fetch: Mutex<Option<(c_int, Arc<FakeNode>)>>,
    /// Always report growth on fetch, so the collection never settles.
    pub grow_forever: AtomicBool,
    /// Return a null handle in the second slot of a fetch.
    pub null_in_fetch: AtomicBool,
    pub releases: AtomicUsize,
    /// Fail `VxMediaSetStreamCallback` registrations on controllers of this node.
    pub fail_stream_registration: AtomicBool,
    pub controller: Mutex<Option<Arc<FakeController>>>,
}

impl FakeNode {
    pub fn new(resource_type: c_int, id: &str, name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            name: name.into(),
            resource_type,
            children: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            forced_result: Mutex::new(None),
            grow_before_fetch: Mutex::new(None),
            grow_forever: AtomicBool::new(false),
            null_in_fetch: AtomicBool::new(false),
            releases: AtomicUsize::new(0),
            fail_stream_registration: AtomicBool::new(false),
            controller: Mutex::new(None),
        })
    }

    /// A system node that `VxSubmitLogin` returns for `username`.
    pub fn system(username: &str) -> Arc<Self> {
        let node = Self::new(sys::VX_RESOURCE_SYSTEM, "system-1", "Main System");
        SYSTEMS
            .lock()
            .unwrap()
            .insert(username.to_owned(), Arc::clone(&node));
        node
    }

    /// Appends children of `resource_type` under `relation`, in order.
    pub fn add_children(
        &self,
        relation: c_int,
        resource_type: c_int,
        entries: &[(&str, &str)],
    ) -> Vec<Arc<FakeNode>> {
        let created: Vec<Arc<FakeNode>> = entries
            .iter()
            .map(|(id, name)| FakeNode::new(resource_type, id, name))
            .collect();
        self.children
            .lock()
            .unwrap()
            .entry(relation)
            .or_default()
            .extend(created.iter().cloned());
        created
    }

    pub fn handle(self: &Arc<Self>) -> sys::VxHandle {
        Arc::as_ptr(self) as sys::VxHandle
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<CollectionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn controller(&self) -> Arc<FakeController> {
        self.controller
            .lock()
            .unwrap()
            .clone()
            .expect("no media controller created")
    }
}

unsafe fn node<'a>(handle: sys::VxHandle) -> &'a FakeNode {
    &*(handle as *const FakeNode)
}

type Registration<F> = Mutex<Option<(F, usize)>>;

/// A native media controller.
pub struct FakeController {
    timestamp: Registration<sys::VxTimestampCallback>,
    stream: Registration<sys::VxStreamCallback>,
    pelco_data: Registration<sys::VxPelcoDataCallback>,
    /// Last stream registration, kept after it is cleared.
    retained_stream: Registration<sys::VxStreamCallback>,
    fail_stream_registration: bool,
    pub released: AtomicBool,
    /// Callbacks currently running, as seen from the native side.
    delivering: AtomicUsize,
    released_during_delivery: AtomicBool,
    pub playback: Mutex<Vec<String>>,
}

impl FakeController {
    pub fn has_timestamp_callback(&self) -> bool {
        self.timestamp.lock().unwrap().is_some()
    }

    pub fn has_stream_callback(&self) -> bool {
        self.stream.lock().unwrap().is_some()
    }

    pub fn has_pelco_data_callback(&self) -> bool {
        self.pelco_data.lock().unwrap().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn playback(&self) -> Vec<String> {
        self.playback.lock().unwrap().clone()
    }

    /// Invokes the registered timestamp callback. Returns false if none is set.
    pub fn fire_timestamp(&self, unix_time_ms: u64) -> bool {
        let registration = *self.timestamp.lock().unwrap();
        match registration {
            Some((callback, user_data)) => {
                let event = sys::VxTimestampEvent { unix_time_ms };
                self.deliver(|| unsafe { callback(&event, user_data as *mut c_void) });
                true
            }
            None => false,
        }
    }

    pub fn fire_stream(&self, event_type: c_int) -> bool {
        let registration = *self.stream.lock().unwrap();
        match registration {
            Some((callback, user_data)) => {
                let event = sys::VxStreamEvent { event_type };
                self.deliver(|| unsafe { callback(&event, user_data as *mut c_void) });
                true
            }
            None => false,
        }
    }

    pub fn fire_pelco_data(&self, data: &[u8]) -> bool {
        let registration = *self.pelco_data.lock().unwrap();
        match registration {
            Some((callback, user_data)) => {
                let event = sys::VxPelcoDataEvent {
                    data: data.as_ptr(),
                    data_size: data.len() as c_int,
                };
                self.deliver(|| unsafe { callback(&event, user_data as *mut c_void) });
                true
            }
            None => false,
        }
    }

    /// Invokes the last stream registration even if it was cleared, as a
    /// native thread that raced the unregistration would.
    ///
    /// Only valid while the Rust controller is still alive.
    pub fn fire_retained_stream(&self, event_type: c_int) {
        let registration = *self.retained_stream.lock().unwrap();
        let (callback, user_data) = registration.expect("stream callback was never registered");
        let event = sys::VxStreamEvent { event_type };
        self.deliver(|| unsafe { callback(&event, user_data as *mut c_void) });
    }

    /// True if the controller was released while one of its callbacks ran.
    pub fn released_during_delivery(&self) -> bool {
        self.released_during_delivery.load(Ordering::SeqCst)
    }

    fn deliver(&self, invoke: impl FnOnce()) {
        self.delivering.fetch_add(1, Ordering::SeqCst);
        invoke();
        self.delivering.fetch_sub(1, Ordering::SeqCst);
    }

    /// Invokes the stream callback with a null event pointer.
    pub fn fire_null_stream(&self) {
        let registration = *self.stream.lock().unwrap();
        if let Some((callback, user_data)) = registration {
            unsafe { callback(ptr::null(), user_data as *mut c_void) };
        }
    }
}

unsafe fn controller<'a>(handle: sys::VxHandle) -> &'a FakeController {
    &*(handle as *const FakeController)
}

unsafe extern "C" fn fake_init(_license_key: *const c_char) -> sys::VxResult {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    sys::VX_OK
}

unsafe extern "C" fn fake_shutdown() {
    SHUTDOWN_CALLS.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn fake_version() -> *const c_char {
    b"7.1.0-fake\0".as_ptr().cast()
}

unsafe extern "C" fn fake_set_log_level(level: c_int) -> sys::VxResult {
    LOG_LEVELS.lock().unwrap().push(level);
    sys::VX_OK
}

unsafe extern "C" fn fake_set_log_path(path: *const c_char) -> sys::VxResult {
    if path.is_null() {
        return sys::VX_INVALID_PARAMETER;
    }
    let path = CStr::from_ptr(path).to_string_lossy().into_owned();
    LOG_PATHS.lock().unwrap().push(path);
    sys::VX_OK
}

unsafe extern "C" fn fake_submit_login(
    info: *const sys::VxLoginInfo,
    system: *mut sys::VxHandle,
) -> sys::VxResult {
    if info.is_null() || system.is_null() || (*info).username.is_null() {
        return sys::VX_INVALID_PARAMETER;
    }
    let username = CStr::from_ptr((*info).username).to_string_lossy().into_owned();
    match SYSTEMS.lock().unwrap().get(&username) {
        Some(node) => {
            *system = node.handle();
            sys::VX_OK
        }
        None => sys::VX_UNAUTHORIZED,
    }
}

unsafe fn read_filters(request: &sys::VxCollection) -> Vec<(c_int, String)> {
    if request.filters.is_null() {
        return Vec::new();
    }
    std::slice::from_raw_parts(request.filters, request.filter_size as usize)
        .iter()
        .map(|filter| {
            let value = CStr::from_ptr(filter.value.as_ptr()).to_string_lossy().into_owned();
            (filter.key, value)
        })
        .collect()
}

unsafe extern "C" fn fake_get_collection(
    parent: sys::VxHandle,
    relation: c_int,
    collection: *mut sys::VxCollection,
) -> sys::VxResult {
    if parent.is_null() || collection.is_null() {
        return sys::VX_INVALID_PARAMETER;
    }
    let parent = node(parent);
    let request = &mut *collection;
    let filters = read_filters(request);
    let is_fetch = !request.collection.is_null();

    parent.calls.lock().unwrap().push(CollectionCall {
        relation,
        buffer_null: !is_fetch,
        capacity: request.collection_size,
        filters: filters.clone(),
    });

    if let Some(code) = *parent.forced_result.lock().unwrap() {
        return code;
    }

    if is_fetch {
        let grow = parent.grow_before_fetch.lock().unwrap().take();
        if let Some((grow_relation, child)) = grow {
            parent
                .children
                .lock()
                .unwrap()
                .entry(grow_relation)
                .or_default()
                .push(child);
        }
    }

    let children: Vec<Arc<FakeNode>> = parent
        .children
        .lock()
        .unwrap()
        .get(&relation)
        .cloned()
        .unwrap_or_default();
    let matching: Vec<Arc<FakeNode>> = children
        .into_iter()
        .filter(|child| {
            filters.iter().all(|(key, value)| match *key {
                sys::VX_FILTER_NAME => child.name == *value,
                sys::VX_FILTER_ID => child.id == *value,
                _ => true,
            })
        })
        .collect();
    let count = matching.len() as c_int;

    if !is_fetch {
        request.collection_size = count;
        return if count == 0 {
            sys::VX_OK
        } else {
            sys::VX_INSUFFICIENT_SIZE
        };
    }

    if parent.grow_forever.load(Ordering::SeqCst) {
        request.collection_size += 1;
        return sys::VX_INSUFFICIENT_SIZE;
    }

    if count > request.collection_size {
        request.collection_size = count;
        return sys::VX_INSUFFICIENT_SIZE;
    }

    let null_in_fetch = parent.null_in_fetch.load(Ordering::SeqCst);
    for (index, child) in matching.iter().enumerate() {
        let handle = if null_in_fetch && index == 1 {
            ptr::null_mut()
        } else {
            child.handle()
        };
        *request.collection.add(index) = handle;
    }
    request.collection_size = count;
    sys::VX_OK
}

fn copy_fixed(dst: &mut [c_char], src: &str) {
    let max = dst.len() - 1;
    for (d, s) in dst.iter_mut().zip(src.bytes().take(max)) {
        *d = s as c_char;
    }
}

unsafe extern "C" fn fake_get_resource_info(
    handle: sys::VxHandle,
    resource_type: c_int,
    info: *mut sys::VxResourceInfo,
) -> sys::VxResult {
    if handle.is_null() || info.is_null() {
        return sys::VX_INVALID_PARAMETER;
    }
    let node = node(handle);
    if node.resource_type != resource_type {
        return sys::VX_INVALID_PARAMETER;
    }
    let info = &mut *info;
    copy_fixed(&mut info.id, &node.id);
    copy_fixed(&mut info.name, &node.name);
    sys::VX_OK
}

unsafe extern "C" fn fake_release(handle: sys::VxHandle, resource_type: c_int) -> sys::VxResult {
    if handle.is_null() {
        return sys::VX_INVALID_PARAMETER;
    }
    let node = node(handle);
    if node.resource_type != resource_type {
        return sys::VX_INVALID_PARAMETER;
    }
    node.releases.fetch_add(1, Ordering::SeqCst);
    sys::VX_OK
}

unsafe extern "C" fn fake_media_create(
    data_source: sys::VxHandle,
    out: *mut sys::VxHandle,
) -> sys::VxResult {
    if data_source.is_null() || out.is_null() {
        return sys::VX_INVALID_PARAMETER;
    }
    let source = node(data_source);
    let controller = Arc::new(FakeController {
        timestamp: Mutex::new(None),
        stream: Mutex::new(None),
        pelco_data: Mutex::new(None),
        retained_stream: Mutex::new(None),
        fail_stream_registration: source.fail_stream_registration.load(Ordering::SeqCst),
        released: AtomicBool::new(false),
        delivering: AtomicUsize::new(0),
        released_during_delivery: AtomicBool::new(false),
        playback: Mutex::new(Vec::new()),
    });
    *out = Arc::as_ptr(&controller) as sys::VxHandle;
    *source.controller.lock().unwrap() = Some(controller);
    sys::VX_OK
}

unsafe extern "C" fn fake_media_release(handle: sys::VxHandle) -> sys::VxResult {
    let controller = controller(handle);
    if controller.delivering.load(Ordering::SeqCst) > 0 {
        controller.released_during_delivery.store(true, Ordering::SeqCst);
    }
    controller.released.store(true, Ordering::SeqCst);
    sys::VX_OK
}

fn record(handle: sys::VxHandle, action: String) -> sys::VxResult {
    let controller = unsafe { controller(handle) };
    if controller.is_released() {
        return sys::VX_NOT_FOUND;
    }
    controller.playback.lock().unwrap().push(action);
    sys::VX_OK
}

unsafe extern "C" fn fake_media_play(handle: sys::VxHandle, speed: f32) -> sys::VxResult {
    record(handle, format!("play {speed}"))
}

unsafe extern "C" fn fake_media_pause(handle: sys::VxHandle) -> sys::VxResult {
    record(handle, "pause".into())
}

unsafe extern "C" fn fake_media_stop(handle: sys::VxHandle) -> sys::VxResult {
    record(handle, "stop".into())
}

unsafe extern "C" fn fake_media_seek(
    handle: sys::VxHandle,
    unix_time_ms: u64,
    speed: f32,
) -> sys::VxResult {
    record(handle, format!("seek {unix_time_ms} {speed}"))
}

unsafe extern "C" fn fake_set_timestamp_callback(
    handle: sys::VxHandle,
    callback: Option<sys::VxTimestampCallback>,
    user_data: *mut c_void,
) -> sys::VxResult {
    let controller = controller(handle);
    *controller.timestamp.lock().unwrap() = callback.map(|cb| (cb, user_data as usize));
    sys::VX_OK
}

unsafe extern "C" fn fake_set_stream_callback(
    handle: sys::VxHandle,
    callback: Option<sys::VxStreamCallback>,
    user_data: *mut c_void,
) -> sys::VxResult {
    let controller = controller(handle);
    if callback.is_some() && controller.fail_stream_registration {
        return sys::VX_NOT_ALLOWED;
    }
    let registration = callback.map(|cb| (cb, user_data as usize));
    if registration.is_some() {
        *controller.retained_stream.lock().unwrap() = registration;
    }
    *controller.stream.lock().unwrap() = registration;
    sys::VX_OK
}

unsafe extern "C" fn fake_set_pelco_data_callback(
    handle: sys::VxHandle,
    callback: Option<sys::VxPelcoDataCallback>,
    user_data: *mut c_void,
) -> sys::VxResult {
    let controller = controller(handle);
    *controller.pelco_data.lock().unwrap() = callback.map(|cb| (cb, user_data as usize));
    sys::VX_OK
}

/// Function table backed by the fake.
pub fn table() -> VxSdkTable {
    VxSdkTable {
        init: fake_init,
        shutdown: fake_shutdown,
        version: fake_version,
        set_log_level: fake_set_log_level,
        set_log_path: fake_set_log_path,
        submit_login: fake_submit_login,
        get_collection: fake_get_collection,
        get_resource_info: fake_get_resource_info,
        release: fake_release,
        media_create: fake_media_create,
        media_release: fake_media_release,
        media_play: fake_media_play,
        media_pause: fake_media_pause,
        media_stop: fake_media_stop,
        media_seek: fake_media_seek,
        media_set_timestamp_callback: fake_set_timestamp_callback,
        media_set_stream_callback: fake_set_stream_callback,
        media_set_pelco_data_callback: fake_set_pelco_data_callback,
    }
}

static API: Lazy<Arc<VxSdkApi>> = Lazy::new(|| {
    // SAFETY: every fake entry point follows the native contract and is a
    // plain function that lives for the whole test process.
    Arc::new(unsafe { VxSdkApi::from_table(table()) })
});

pub fn api() -> Arc<VxSdkApi> {
    Arc::clone(&API)
}

/// A runtime over the fake with default options.
pub fn sdk() -> VxSdk {
    init_tracing();
    VxSdk::new(api(), SdkOptions::default()).expect("fake runtime starts")
}

pub fn login_options(username: &str) -> LoginOptions {
    LoginOptions::builder()
        .address("127.0.0.1")
        .username(username)
        .password("secret")
        .build()
        .expect("valid login options")
}
