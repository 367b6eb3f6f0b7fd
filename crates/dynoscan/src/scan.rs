//! Segmented parallel scan.
//!
//! A scan splits the table into `N` segments and runs one worker task per
//! segment. Each worker pages through its segment with
//! [`Store::partial_scan`](crate::store::Store::partial_scan) and pushes
//! every item into one bounded queue shared by all workers. The queue gives
//! backpressure: when it is full every worker stalls until the consumer
//! drains it.
//!
//! Errors go through a first-error latch in front of a single-slot stream.
//! Only the first failure is delivered; later ones are logged and dropped, so
//! a failing worker never blocks. A failed segment stops, its siblings keep
//! going, and the enumeration is then possibly incomplete.
//!
//! A supervisor task joins every worker and then drops the last senders, so
//! both streams close only once nothing is producing anymore. Every blocking
//! point of a worker races the cancellation token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::{ConfigError, Error, Result};
use crate::store::{Filter, PartialScan};
use crate::table::{TableHandle, TableResolver};
use crate::types::{AttributeMap, Cursor};

/// Default capacity of the item queue.
pub const DEFAULT_BUFFER_SIZE: usize = 5000;

/// Default label recorded on the scan's log events.
pub const DEFAULT_LABEL: &str = "dynoscan";

/// Table items per segment used by [`segment_count`].
pub const ITEMS_PER_SEGMENT: u64 = 100_000;

/// Fewest segments [`segment_count`] picks.
pub const MIN_SEGMENTS: usize = 2;

/// Most segments [`segment_count`] picks.
pub const MAX_AUTO_SEGMENTS: usize = 16;

/// Upper bound for an explicit segment count.
pub const MAX_SEGMENTS: usize = 1024;

/// Number of segments for a table with `item_count` items.
///
/// One segment per [`ITEMS_PER_SEGMENT`] items, clamped to
/// `MIN_SEGMENTS..=MAX_AUTO_SEGMENTS`. The count comes from the table
/// description and may be stale; it only sizes parallelism.
pub fn segment_count(item_count: u64) -> usize {
    let wanted = item_count.div_ceil(ITEMS_PER_SEGMENT);
    usize::try_from(wanted)
        .unwrap_or(MAX_AUTO_SEGMENTS)
        .clamp(MIN_SEGMENTS, MAX_AUTO_SEGMENTS)
}

/// Caller-facing scan options.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Share of provisioned throughput the scan may consume, as a percent.
    /// `0` leaves it to the store. Passed through as a hint.
    pub max_throughput_percent: u8,
    /// Capacity of the item queue.
    pub buffer_size: usize,
    /// Recorded as `label` on every log event of the scan.
    pub label: String,
    /// Explicit segment count; `None` uses [`segment_count`].
    pub segments: Option<usize>,
    /// Store-side filters. Empty scans everything.
    pub filters: Vec<Filter>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_throughput_percent: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            label: DEFAULT_LABEL.to_string(),
            segments: None,
            filters: Vec::new(),
        }
    }
}

/// Validated, immutable scan parameters.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    max_throughput_percent: u8,
    buffer_size: usize,
    label: String,
    segments: Option<usize>,
    filters: Vec<Filter>,
}

impl ScanRequest {
    pub fn new(options: ScanOptions) -> std::result::Result<Self, ConfigError> {
        if options.max_throughput_percent > 100 {
            return Err(ConfigError::InvalidThroughput(options.max_throughput_percent));
        }
        if options.buffer_size == 0 {
            return Err(ConfigError::InvalidBufferSize);
        }
        if options.label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        if let Some(n) = options
            .segments
            .filter(|n| !(1..=MAX_SEGMENTS).contains(n))
        {
            return Err(ConfigError::InvalidSegments {
                max: MAX_SEGMENTS,
                actual: n,
            });
        }
        Ok(Self {
            max_throughput_percent: options.max_throughput_percent,
            buffer_size: options.buffer_size,
            label: options.label,
            segments: options.segments,
            filters: options.filters,
        })
    }

    pub fn max_throughput_percent(&self) -> u8 {
        self.max_throughput_percent
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn segments(&self) -> Option<usize> {
        self.segments
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }
}

/// One scanned row: the raw attributes plus a decoder bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanItem {
    attributes: AttributeMap,
    segment: usize,
    table: Arc<str>,
}

impl ScanItem {
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Segment that produced this item.
    pub fn segment(&self) -> usize {
        self.segment
    }

    /// Logical name of the scanned table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Decode the attributes into an application type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.attributes.clone())).map_err(|source| {
            Error::Decode {
                table: self.table.to_string(),
                source,
            }
        })
    }

    pub fn into_attributes(self) -> AttributeMap {
        self.attributes
    }
}

/// Output of [`Scan::next`].
#[derive(Debug)]
pub enum ScanEvent {
    Item(ScanItem),
    Error(Error),
}

/// Everything a scan produced, from [`Scan::collect`].
#[derive(Debug)]
pub struct ScanOutcome {
    pub items: Vec<ScanItem>,
    /// The first error, if any. When set, `items` may be incomplete.
    pub error: Option<Error>,
}

impl ScanOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// A running scan.
///
/// Both streams close once every worker has returned, whether the scan
/// finished, failed or was cancelled. Dropping the `Scan` cancels the
/// workers.
pub struct Scan {
    items: mpsc::Receiver<ScanItem>,
    errors: mpsc::Receiver<Error>,
    items_open: bool,
    errors_open: bool,
    item_count: u64,
    segments: usize,
    guard: DropGuard,
}

impl Scan {
    /// Item count reported by the table description when the scan started.
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Number of segments (and workers) of this scan.
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Next item or error. `None` once both streams are closed.
    pub async fn next(&mut self) -> Option<ScanEvent> {
        loop {
            tokio::select! {
                item = self.items.recv(), if self.items_open => match item {
                    Some(item) => return Some(ScanEvent::Item(item)),
                    None => self.items_open = false,
                },
                err = self.errors.recv(), if self.errors_open => match err {
                    Some(err) => return Some(ScanEvent::Error(err)),
                    None => self.errors_open = false,
                },
                else => return None,
            }
        }
    }

    /// Drain the scan into memory.
    pub async fn collect(mut self) -> ScanOutcome {
        let mut items = Vec::new();
        let mut error = None;
        while let Some(event) = self.next().await {
            match event {
                ScanEvent::Item(item) => items.push(item),
                ScanEvent::Error(err) => {
                    error.get_or_insert(err);
                }
            }
        }
        ScanOutcome { items, error }
    }

    /// Take the raw streams. The workers are then only stopped by the
    /// caller's token or by dropping both receivers.
    pub fn into_streams(self) -> (mpsc::Receiver<ScanItem>, mpsc::Receiver<Error>) {
        let _ = self.guard.disarm();
        (self.items, self.errors)
    }
}

/// First-error-wins latch in front of the single-slot error stream.
struct ErrorLatch {
    tripped: AtomicBool,
    tx: mpsc::Sender<Error>,
}

impl ErrorLatch {
    fn new(tx: mpsc::Sender<Error>) -> Self {
        Self {
            tripped: AtomicBool::new(false),
            tx,
        }
    }

    /// Deliver `err` if no error was delivered before. Never blocks.
    fn offer(&self, err: Error) -> bool {
        if self
            .tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(error = %err, "dropping scan error, an earlier error was already reported");
            return false;
        }
        // Only one offer ever gets here and the slot holds one error.
        self.tx.try_send(err).is_ok()
    }
}

/// Start a scan of the logical table `table`.
///
/// Options are validated and the table resolved before any task is spawned;
/// failures there are returned directly.
pub async fn start(
    resolver: &TableResolver,
    cancel: CancellationToken,
    table: &str,
    options: ScanOptions,
) -> Result<Scan> {
    let request = Arc::new(ScanRequest::new(options)?);
    let (handle, item_count) = resolver.resolve(table).await?;
    let segments = request
        .segments()
        .unwrap_or_else(|| segment_count(item_count));

    let (items_tx, items_rx) = mpsc::channel(request.buffer_size());
    let (errors_tx, errors_rx) = mpsc::channel(1);
    let latch = Arc::new(ErrorLatch::new(errors_tx));
    let cancel = cancel.child_token();

    let logical: Arc<str> = Arc::from(handle.logical_name.as_str());

    info!(
        label = %request.label(),
        table = %logical,
        physical = %handle.name(),
        segments,
        item_count,
        "scan starting"
    );

    let mut workers = JoinSet::new();
    for segment in 0..segments {
        let span = info_span!(
            "scan_segment",
            label = %request.label(),
            table = %logical,
            segment
        );
        let worker = SegmentWorker {
            segment,
            total_segments: segments,
            handle: handle.clone(),
            table: Arc::clone(&logical),
            request: Arc::clone(&request),
            items: items_tx.clone(),
            latch: Arc::clone(&latch),
            cancel: cancel.clone(),
        };
        workers.spawn(worker.run().instrument(span));
    }

    tokio::spawn(supervise(workers, items_tx, latch, handle));

    Ok(Scan {
        items: items_rx,
        errors: errors_rx,
        items_open: true,
        errors_open: true,
        item_count,
        segments,
        guard: cancel.drop_guard(),
    })
}

/// Join every worker, then close both streams by dropping the last senders.
async fn supervise(
    mut workers: JoinSet<()>,
    items: mpsc::Sender<ScanItem>,
    latch: Arc<ErrorLatch>,
    handle: TableHandle,
) {
    let table = handle.logical_name.as_str();
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(table = %table, error = %e, "scan worker aborted");
            latch.offer(Error::SegmentAborted {
                table: table.to_string(),
                physical: handle.name().to_string(),
                reason: e.to_string(),
            });
        }
    }
    drop(items);
    drop(latch);
    debug!(table = %table, "scan streams closed");
}

struct SegmentWorker {
    segment: usize,
    total_segments: usize,
    handle: TableHandle,
    table: Arc<str>,
    request: Arc<ScanRequest>,
    items: mpsc::Sender<ScanItem>,
    latch: Arc<ErrorLatch>,
    cancel: CancellationToken,
}

impl SegmentWorker {
    async fn run(self) {
        info!("scan segment starting");
        let mut cursor: Option<Cursor> = None;
        let mut scanned: u64 = 0;

        loop {
            let request = PartialScan {
                segment: self.segment,
                total_segments: self.total_segments,
                exclusive_start_key: cursor.take(),
                filters: self.request.filters().to_vec(),
                max_throughput_percent: self.request.max_throughput_percent(),
            };

            let page = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(items = scanned, "scan segment cancelled");
                    return;
                }
                page = self.handle.store.partial_scan(&self.handle.schema, request) => page,
            };

            let page = match page {
                Ok(page) => page,
                Err(source) => {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    self.latch.offer(Error::Segment {
                        table: self.table.to_string(),
                        physical: self.handle.name().to_string(),
                        segment: self.segment,
                        source,
                    });
                    return;
                }
            };

            debug!(
                items = page.items.len(),
                has_more = page.last_evaluated_key.is_some(),
                "scan page"
            );

            for attributes in page.items {
                let item = ScanItem {
                    attributes,
                    segment: self.segment,
                    table: Arc::clone(&self.table),
                };
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        warn!(items = scanned, "scan segment cancelled");
                        return;
                    }
                    sent = self.items.send(item) => {
                        if sent.is_err() {
                            debug!(items = scanned, "scan consumer went away");
                            return;
                        }
                    }
                }
                scanned += 1;
            }

            match page.last_evaluated_key {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(items = scanned, "scan segment done");
    }
}
