// ABOUTME: Live presentation server for the showtell application
// ABOUTME: Holds the rendered document, rerenders on demand and serves it with livereload and a bus

use crate::bus::{self, MessageBus};
use crate::errors::{Result, ShowError};
use crate::html;
use crate::livereload::{self, LivereloadHub};
use crate::parser::ParserRegistry;
use crate::presentation::Presentation;
use crate::resources::RevealAssets;
use crate::slides;
use crate::utils;
use actix_web::dev::{Server, ServerHandle};
use actix_web::web::{self, Bytes};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, middleware};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The last composed document together with the presentation it was
/// rendered from.
///
/// Both live behind one lock and are swapped together, so a reader never
/// sees a partially written document or a document from another render
/// than the presentation next to it.
#[derive(Debug, Default)]
pub struct DocumentSlot {
    current: Mutex<Rendered>,
}

#[derive(Debug, Clone, Default)]
struct Rendered {
    document: Bytes,
    presentation: Arc<Presentation>,
}

impl DocumentSlot {
    /// A slot holding `presentation` and an empty document
    pub fn new(presentation: Presentation) -> Self {
        Self {
            current: Mutex::new(Rendered {
                document: Bytes::new(),
                presentation: Arc::new(presentation),
            }),
        }
    }

    pub fn load(&self) -> Bytes {
        self.current.lock().document.clone()
    }

    pub fn presentation(&self) -> Arc<Presentation> {
        Arc::clone(&self.current.lock().presentation)
    }

    /// The document and the presentation it was rendered from
    pub fn snapshot(&self) -> (Bytes, Arc<Presentation>) {
        let current = self.current.lock();
        (current.document.clone(), Arc::clone(&current.presentation))
    }

    pub fn replace(&self, document: Bytes, presentation: Presentation) {
        *self.current.lock() = Rendered {
            document,
            presentation: Arc::new(presentation),
        };
    }
}

/// Everything a presentation server needs besides the presentation itself.
pub struct ServerOptions {
    pub registry: ParserRegistry,
    pub assets: RevealAssets,
    pub heartbeat_interval: Duration,
    pub shutdown_timeout: Duration,
    pub bus_queue_size: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            registry: ParserRegistry::with_defaults(),
            assets: RevealAssets::empty(),
            heartbeat_interval: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(15),
            bus_queue_size: bus::DEFAULT_QUEUE_SIZE,
        }
    }
}

/// State shared by the request handlers of one presentation server.
pub struct ServerState {
    slide_root: PathBuf,
    registry: ParserRegistry,
    assets: RevealAssets,
    document: DocumentSlot,
    livereload: LivereloadHub,
    bus: MessageBus,
    heartbeat_interval: Duration,
    cancel: CancellationToken,
}

impl ServerState {
    /// Must be called from within a tokio runtime, the message bus spawns
    /// its dispatcher here.
    pub fn new(
        cancel: CancellationToken,
        presentation: Presentation,
        slide_root: &Path,
        options: ServerOptions,
    ) -> Self {
        Self {
            slide_root: slide_root.to_path_buf(),
            registry: options.registry,
            assets: options.assets,
            document: DocumentSlot::new(presentation),
            livereload: LivereloadHub::new(),
            bus: MessageBus::new(options.bus_queue_size),
            heartbeat_interval: options.heartbeat_interval.max(livereload::MIN_HEARTBEAT),
            cancel,
        }
    }

    /// Rebuild the slide tree, compose the document and swap it in, then
    /// queue a reload notice for every livereload connection.
    ///
    /// No lock is held while building. On failure the previous document
    /// stays in place.
    pub fn rerender(&self) -> Result<()> {
        let result = self.render();
        let notified = self.livereload.notify_reload();
        debug!("Queued reload notice for {} livereload connections", notified);
        result
    }

    fn render(&self) -> Result<()> {
        let mut next = self.document.presentation().detached();
        next.slides = slides::build_tree(&next, &self.registry, &self.slide_root)?;
        let document = html::compose(&next);

        self.document.replace(Bytes::from(document), next);
        info!("Rendered presentation from {:?}", self.slide_root);
        Ok(())
    }

    pub fn document(&self) -> Bytes {
        self.document.load()
    }

    /// The presentation including its latest slide tree
    pub fn presentation(&self) -> Arc<Presentation> {
        self.document.presentation()
    }

    /// The served document and the presentation it was rendered from
    pub fn snapshot(&self) -> (Bytes, Arc<Presentation>) {
        self.document.snapshot()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn livereload(&self) -> &LivereloadHub {
        &self.livereload
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn assets(&self) -> &RevealAssets {
        &self.assets
    }
}

/// Serves one presentation over HTTP and keeps viewers in sync with the
/// slide folder.
pub struct PresentationServer {
    state: web::Data<ServerState>,
    address: String,
    shutdown_timeout: Duration,
    handle: Mutex<Option<ServerHandle>>,
    local_addrs: Mutex<Vec<SocketAddr>>,
}

impl PresentationServer {
    /// Render the presentation once and prepare the server. Fails with the
    /// render error if the first render fails.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(
        cancel: CancellationToken,
        presentation: Presentation,
        slide_root: &Path,
        address: &str,
        options: ServerOptions,
    ) -> Result<Self> {
        let shutdown_timeout = options.shutdown_timeout;
        let state = ServerState::new(cancel, presentation, slide_root, options);
        state.rerender()?;

        Ok(Self {
            state: web::Data::new(state),
            address: utils::normalize_address(address),
            shutdown_timeout,
            handle: Mutex::new(None),
            local_addrs: Mutex::new(Vec::new()),
        })
    }

    pub fn rerender(&self) -> Result<()> {
        self.state.rerender()
    }

    pub fn serve_document(&self) -> Bytes {
        self.state.document()
    }

    pub fn state(&self) -> web::Data<ServerState> {
        self.state.clone()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The first address the listener is bound to, once `run` succeeded.
    /// Differs from `address` when binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addrs.lock().first().copied()
    }

    /// Bind the listener and return the running server. The caller drives
    /// the returned future, usually by spawning it.
    pub fn run(&self) -> Result<Server> {
        let state = self.state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .wrap(middleware::Logger::default())
                .app_data(state.clone())
                .configure(routes)
        })
        .shutdown_timeout(self.shutdown_timeout.as_secs())
        .disable_signals()
        .bind(&self.address)
        .map_err(|e| {
            ShowError::ServerError(format!("Failed to bind {}: {}", self.address, e))
        })?;

        let addrs = server.addrs();
        let server = server.run();

        *self.handle.lock() = Some(server.handle());
        info!("Serving presentation on {:?}", addrs);
        *self.local_addrs.lock() = addrs;
        Ok(server)
    }

    /// Stop heartbeats and socket loops, then shut the listener down,
    /// giving in-flight requests up to the shutdown timeout to finish.
    pub async fn close(&self) {
        self.state.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            info!("Shutting down presentation server");
            handle.stop(true).await;
        }
    }
}

/// Register the presentation routes on an actix app
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(serve_index))
        .route("/livereload", web::get().to(livereload_handler))
        .route("/messagebus", web::get().to(messagebus_handler))
        .route("/{group}/{path:.*}", web::get().to(serve_asset));
}

async fn serve_index(state: web::Data<ServerState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(state.document())
}

async fn serve_asset(
    state: web::Data<ServerState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (group, asset) = path.into_inner();
    match state.assets().read(&group, &asset) {
        Ok(data) => HttpResponse::Ok()
            .content_type(utils::content_type_for(&asset))
            .body(data),
        Err(ShowError::AssetNotFound(_)) | Err(ShowError::InvalidAssetPath(_)) => {
            debug!("Asset not found: {}/{}", group, asset);
            HttpResponse::NotFound().body("404 Not Found")
        }
        Err(e) => {
            error!("Failed to read asset {}/{}: {}", group, asset, e);
            HttpResponse::InternalServerError().body(format!("Failed to read asset: {}", e))
        }
    }
}

async fn livereload_handler(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<ServerState>,
) -> std::result::Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, body).map_err(|e| {
        error!("Failed to start livereload websocket connection: {}", e);
        e
    })?;
    debug!("Livereload connection from {:?}", req.peer_addr());

    let (id, events) = state.livereload().register();
    let heartbeat = state.heartbeat_interval;
    let cancel = state.cancel.child_token();
    actix_web::rt::spawn(async move {
        livereload::run_connection(session, msg_stream, events, heartbeat, cancel).await;
        state.livereload().unregister(id);
    });

    Ok(response)
}

async fn messagebus_handler(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<ServerState>,
) -> std::result::Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, body).map_err(|e| {
        error!("Failed to start message bus websocket connection: {}", e);
        e
    })?;
    debug!("Message bus connection from {:?}", req.peer_addr());

    let bus = state.bus().clone();
    let cancel = state.cancel.child_token();
    actix_web::rt::spawn(bus::run_connection(session, msg_stream, bus, cancel));

    Ok(response)
}
