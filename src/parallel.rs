//! Channel-pipeline processing: a reader thread splits the dump into pages,
//! worker threads build Words, and the main thread writes them back in dump
//! order.

use crate::{write_word, Engine, Stats};

use std::collections::BTreeMap;
use std::io::{BufRead, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, warn};
use wikidict::dump;
use wikidict::Word;

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Channel buffer size for pipeline processing
    pub channel_buffer: usize,
    /// Number of worker threads for pipeline
    pub num_workers: usize,
    /// Stop reading after this many pages
    pub page_limit: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism().map(|p| p.get()).unwrap_or(4);
        Self {
            channel_buffer: 10000,
            num_workers: cpus.saturating_sub(1).max(1),
            page_limit: None,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// Not a main-namespace article.
    Special,
    Redirect,
    /// Parsed, but nothing worth writing.
    Empty,
    Word(Word),
}

/// Result of page processing. Every page read produces one, so the writer's
/// reorder buffer never waits on a page that was dropped.
#[derive(Debug)]
pub struct ProcessedPage {
    pub page_id: usize,
    pub title: String,
    pub outcome: Outcome,
}

pub fn process_page(page_xml: &str, page_id: usize, engine: &Engine) -> ProcessedPage {
    let raw = match dump::extract_page(page_xml, page_id) {
        Some(raw) => raw,
        None => {
            return ProcessedPage {
                page_id,
                title: String::new(),
                outcome: Outcome::Special,
            }
        }
    };

    let outcome = if raw.redirect {
        Outcome::Redirect
    } else {
        let word = engine.parse(&raw);
        if word.is_empty() {
            Outcome::Empty
        } else {
            Outcome::Word(word)
        }
    };

    ProcessedPage {
        page_id,
        title: raw.title,
        outcome,
    }
}

/// Producer thread reads XML, worker threads process pages, writer collects
/// results. Results are buffered and sorted by page_id so the output order
/// matches the sequential strategy.
pub fn process_channel_pipeline<W: Write + Send + 'static>(
    reader: impl BufRead + Send + 'static,
    writer: W,
    engine: Arc<Engine>,
    config: &ParallelConfig,
) -> std::io::Result<Stats> {
    let (page_tx, page_rx): (SyncSender<(usize, String)>, Receiver<(usize, String)>) =
        sync_channel(config.channel_buffer);
    let (result_tx, result_rx): (SyncSender<ProcessedPage>, Receiver<ProcessedPage>) =
        sync_channel(config.channel_buffer);

    let stop = Arc::new(AtomicBool::new(false));
    let start_time = Instant::now();

    let reader_stop = Arc::clone(&stop);
    let page_limit = config.page_limit;
    let reader_handle = thread::spawn(move || read_pages_to_channel(reader, page_tx, page_limit, &reader_stop));

    let page_rx = Arc::new(Mutex::new(page_rx));
    let worker_handles: Vec<JoinHandle<()>> = (0..config.num_workers)
        .map(|_| {
            let rx = Arc::clone(&page_rx);
            let tx = result_tx.clone();
            let engine = Arc::clone(&engine);
            let stop = Arc::clone(&stop);
            thread::spawn(move || process_pages_worker(rx, tx, &engine, &stop))
        })
        .collect();

    // Drop extra sender so channel closes when workers finish
    drop(result_tx);

    let written = write_results_sorted(result_rx, writer);
    if written.is_err() {
        stop.store(true, Ordering::SeqCst);
    }

    match reader_handle.join() {
        Ok(Ok(pages)) => debug!(pages, "reader finished"),
        Ok(Err(err)) => return Err(err),
        Err(_) => warn!("reader thread panicked"),
    }
    for handle in worker_handles {
        if handle.join().is_err() {
            warn!("worker thread panicked");
        }
    }

    let mut stats = written?;
    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

fn read_pages_to_channel(
    reader: impl BufRead,
    tx: SyncSender<(usize, String)>,
    page_limit: Option<usize>,
    stop: &AtomicBool,
) -> std::io::Result<usize> {
    let mut page_id: usize = 0;

    dump::scan_pages(reader, |page_xml| {
        if stop.load(Ordering::Relaxed) || page_limit.is_some_and(|l| page_id >= l) {
            return false;
        }
        if tx.send((page_id, page_xml)).is_err() {
            return false;
        }
        page_id += 1;
        true
    })?;

    Ok(page_id)
}

fn process_pages_worker(
    rx: Arc<Mutex<Receiver<(usize, String)>>>,
    tx: SyncSender<ProcessedPage>,
    engine: &Engine,
    stop: &AtomicBool,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        // Try to get next page from shared receiver
        let item = {
            let lock = rx.lock().ok();
            lock.and_then(|guard| guard.recv().ok())
        };

        match item {
            Some((page_id, xml)) => {
                if tx.send(process_page(&xml, page_id, engine)).is_err() {
                    break;
                }
            }
            None => break,
        }
    }
}

fn record(result: ProcessedPage, stats: &mut Stats, writer: &mut impl Write) -> std::io::Result<()> {
    stats.pages_processed += 1;
    match result.outcome {
        Outcome::Special => stats.special += 1,
        Outcome::Redirect => stats.redirects += 1,
        Outcome::Empty => stats.skipped += 1,
        Outcome::Word(word) => write_word(writer, stats, &result.title, &word)?,
    }
    Ok(())
}

/// Write results in deterministic order using a streaming reorder buffer.
///
/// In-order results are written immediately; only results that arrive
/// before their predecessors wait in the buffer.
fn write_results_sorted<W: Write>(rx: Receiver<ProcessedPage>, writer: W) -> std::io::Result<Stats> {
    let mut writer = BufWriter::with_capacity(256 * 1024, writer);
    let mut stats = Stats::default();

    let mut pending: BTreeMap<usize, ProcessedPage> = BTreeMap::new();
    let mut next_expected: usize = 0;

    for result in rx {
        if result.page_id != next_expected {
            pending.insert(result.page_id, result);
            continue;
        }
        record(result, &mut stats, &mut writer)?;
        next_expected += 1;

        while let Some(buffered) = pending.remove(&next_expected) {
            record(buffered, &mut stats, &mut writer)?;
            next_expected += 1;
        }
    }

    // Only reachable when a worker died mid-run and left a gap.
    for (_, result) in std::mem::take(&mut pending) {
        record(result, &mut stats, &mut writer)?;
    }

    writer.flush()?;
    Ok(stats)
}
