//! WebAssembly bindings for LinkCleaner
//!
//! Runs the core engine against the live page: a sweep of every `<body>` once
//! the document is parsed, then a `MutationObserver` per body that feeds each
//! batch back through the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use lc_core::{
    observer::{observe_options, CONTAINER_TAG},
    DocumentTree, ElementKind, LinkCleaner, MutationRecord, ObserveOptions, Rewriter, Stats,
    TargetTable, ADDRESS_ATTRIBUTE,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, MutationObserver, MutationObserverInit, Node};

static TARGETS: OnceLock<TargetTable> = OnceLock::new();
static STARTED: AtomicBool = AtomicBool::new(false);

fn targets() -> &'static TargetTable {
    TARGETS.get_or_init(TargetTable::builtin)
}

// =============================================================================
// Console Logger
// =============================================================================

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("LinkCleaner: {}", record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            _ => web_sys::console::log_1(&line),
        }
    }

    fn flush(&self) {}
}

// =============================================================================
// DOM Adapter
// =============================================================================

/// The live document, seen through the core's tree seam.
struct WebDom;

impl DocumentTree for WebDom {
    type Node = Node;

    fn kind(&self, node: &Node) -> ElementKind {
        if node.node_type() == Node::ELEMENT_NODE {
            ElementKind::from_node_name(&node.node_name())
        } else {
            ElementKind::Other
        }
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            if let Err(e) = element.set_attribute(name, value) {
                log::warn!("failed to set {}: {:?}", name, e);
            }
        }
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let element = match node.dyn_ref::<Element>() {
            Some(element) => element,
            None => return Vec::new(),
        };
        let children = element.children();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .map(Node::from)
            .collect()
    }
}

fn node_list(list: &web_sys::NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}

fn convert_record(record: &web_sys::MutationRecord) -> Option<MutationRecord<Node>> {
    match record.type_().as_str() {
        "attributes" => Some(MutationRecord::Attributes {
            target: record.target()?,
            name: record.attribute_name().unwrap_or_default(),
        }),
        "childList" => Some(MutationRecord::ChildList {
            target: record.target()?,
            added: node_list(&record.added_nodes()),
            removed: node_list(&record.removed_nodes()),
        }),
        _ => None,
    }
}

fn observer_init(options: ObserveOptions) -> MutationObserverInit {
    let init = MutationObserverInit::new();
    init.set_subtree(options.contains(ObserveOptions::SUBTREE));
    init.set_child_list(options.contains(ObserveOptions::CHILD_LIST));
    init.set_attributes(options.contains(ObserveOptions::ATTRIBUTES));
    let filter = js_sys::Array::of1(&JsValue::from_str(ADDRESS_ATTRIBUTE));
    init.set_attribute_filter(&filter);
    init
}

// =============================================================================
// Startup
// =============================================================================

fn log_stats(what: &str, started_ms: f64, stats: Stats) {
    log::info!(
        "{} finished in {}ms ({} visited, {} rewritten, {} failed)",
        what,
        js_sys::Date::now() - started_ms,
        stats.visited,
        stats.rewritten,
        stats.failed,
    );
}

fn observe_bodies(document: &Document, cleaner: &LinkCleaner<'static>) -> Result<Vec<Node>, JsValue> {
    let bodies = document.get_elements_by_tag_name(CONTAINER_TAG);
    let bodies: Vec<Node> = (0..bodies.length())
        .filter_map(|i| bodies.item(i))
        .map(Node::from)
        .collect();

    let batch_cleaner = cleaner.clone();
    let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |mutations: js_sys::Array, _observer: MutationObserver| {
            let started = js_sys::Date::now();
            let records: Vec<MutationRecord<Node>> = mutations
                .iter()
                .filter_map(|entry| entry.dyn_into::<web_sys::MutationRecord>().ok())
                .filter_map(|record| convert_record(&record))
                .collect();
            let stats = batch_cleaner.process_records(&mut WebDom, &records);
            log_stats("mutation batch", started, stats);
        },
    );

    let init = observer_init(observe_options());
    for body in &bodies {
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        observer.observe_with_options(body, &init)?;
    }
    // Lives as long as the page
    callback.forget();

    Ok(bodies)
}

fn run(document: &Document, cleaner: &LinkCleaner<'static>) -> Result<(), JsValue> {
    let started = js_sys::Date::now();
    let bodies = observe_bodies(document, cleaner)?;

    let mut stats = Stats::default();
    for body in &bodies {
        stats += cleaner.sweep(&mut WebDom, body);
    }
    log_stats("initial sweep", started, stats);
    Ok(())
}

/// Run `setup` and mark `started` only once it succeeds. A failed setup
/// leaves the flag clear so the caller can retry.
fn claim_start<T, E>(
    started: &AtomicBool,
    already: impl FnOnce() -> E,
    setup: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    if started.load(Ordering::SeqCst) {
        return Err(already());
    }
    let value = setup()?;
    if started.swap(true, Ordering::SeqCst) {
        return Err(already());
    }
    Ok(value)
}

/// Start cleaning the current page. Runs at most once per page.
#[wasm_bindgen]
pub fn start() -> Result<(), JsValue> {
    let (document, host) = claim_start(
        &STARTED,
        || JsValue::from_str("Already started. Reload the page to restart."),
        || {
            let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
            let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
            let host = window.location().hostname()?;
            Ok((document, host))
        },
    )?;

    // Another logger may already be installed by the embedder
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }

    let cleaner = LinkCleaner::new(Rewriter::new(targets(), &host));

    if document.ready_state() == "loading" {
        let loaded_document = document.clone();
        let on_loaded = Closure::once_into_js(move || {
            if let Err(e) = run(&loaded_document, &cleaner) {
                web_sys::console::error_1(&e);
            }
        });
        document.add_event_listener_with_callback("DOMContentLoaded", on_loaded.unchecked_ref())?;
        Ok(())
    } else {
        run(&document, &cleaner)
    }
}

#[wasm_bindgen]
pub fn is_started() -> bool {
    STARTED.load(Ordering::SeqCst)
}

/// Unwrap a single address as if it appeared on a page served from `host`.
/// Returns `None` when the address cannot be decoded.
#[wasm_bindgen]
pub fn clean_url(url: &str, host: &str) -> Option<String> {
    Rewriter::new(targets(), host).clean(url).ok().map(|cleaned| cleaned.url)
}

#[wasm_bindgen]
pub fn target_count() -> u32 {
    targets().len() as u32
}
