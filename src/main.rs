use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wikidict::dump::{self, RawPage};
use wikidict::place::{CachedRenderer, Offline, RenderCache};
use wikidict::call::has_sentinel;
use wikidict::{parse_word, Edition, Services, Word};

mod parallel;
use parallel::{process_channel_pipeline, ParallelConfig};

/// Processing strategy for parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// One page at a time on the main thread
    Sequential,
    /// Reader thread, worker threads, order-preserving writer
    ChannelPipeline,
}

#[derive(Parser)]
#[command(name = "wikidict")]
#[command(about = "Render a Wiktionary dump into one JSON dictionary entry per headword")]
struct Args {
    /// Input XML file (.xml or .xml.bz2)
    input: PathBuf,

    /// Output JSONL file
    output: PathBuf,

    /// Edition: a bundled locale (fr, sv, zh) or a path to an edition YAML file
    #[arg(short, long, default_value = "fr")]
    edition: String,

    /// Processing strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::ChannelPipeline)]
    strategy: Strategy,

    /// Number of threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Channel buffer size for channel-pipeline strategy
    #[arg(long, default_value_t = 10000)]
    channel_buffer: usize,

    /// Limit number of words to write (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Limit number of pages to scan (for testing with raw dumps)
    #[arg(long)]
    page_limit: Option<usize>,

    /// Rendered `place` macros (.json.bz2); only cached entries render
    #[arg(long)]
    place_cache: Option<PathBuf>,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,
}

/// Everything a worker needs to turn page text into a Word.
pub struct Engine {
    pub edition: Edition,
    pub services: Services,
}

impl Engine {
    pub fn parse(&self, raw: &RawPage) -> Word {
        parse_word(&raw.title, &raw.text, &self.edition, &self.services)
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub pages_processed: usize,
    pub words_written: usize,
    pub variants: usize,
    pub unresolved: usize,
    pub redirects: usize,
    pub special: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

/// One output line: the headword followed by the entry's fields.
#[derive(Serialize)]
pub struct Entry<'a> {
    pub word: &'a str,
    #[serde(flatten)]
    pub entry: &'a Word,
}

/// Serialize a non-empty word as one JSONL line and count it.
pub fn write_word(writer: &mut impl Write, stats: &mut Stats, title: &str, word: &Word) -> std::io::Result<()> {
    let json = serde_json::to_string(&Entry { word: title, entry: word })?;
    writeln!(writer, "{}", json)?;
    stats.words_written += 1;
    if word.is_variant {
        stats.variants += 1;
    }
    if has_sentinel(&json) {
        stats.unresolved += 1;
    }
    Ok(())
}

/// Run sequential processing
fn run_sequential(
    reader: impl BufRead,
    writer: &mut BufWriter<File>,
    engine: &Engine,
    limit: Option<usize>,
    page_limit: Option<usize>,
    quiet: bool,
) -> std::io::Result<Stats> {
    let start_time = Instant::now();
    let mut stats = Stats::default();

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            pb.set_style(style);
        }
        pb
    };

    let mut limit_reached = false;
    let mut write_error = None;

    dump::scan_pages(reader, |page_xml| {
        if page_limit.is_some_and(|l| stats.pages_processed >= l) {
            return false;
        }

        let page_id = stats.pages_processed;
        stats.pages_processed += 1;

        if !quiet && stats.pages_processed % 1000 == 0 {
            let elapsed = start_time.elapsed().as_secs_f64();
            let rate = stats.pages_processed as f64 / elapsed;
            pb.set_message(format!(
                "Pages: {} | Words: {} | Rate: {:.0} pg/s",
                stats.pages_processed, stats.words_written, rate
            ));
        }

        let raw = match dump::extract_page(&page_xml, page_id) {
            Some(raw) => raw,
            None => {
                stats.special += 1;
                return true;
            }
        };

        if raw.redirect {
            stats.redirects += 1;
            return true;
        }

        let word = engine.parse(&raw);
        if word.is_empty() {
            stats.skipped += 1;
            return true;
        }

        if let Err(err) = write_word(&mut *writer, &mut stats, &raw.title, &word) {
            write_error = Some(err);
            return false;
        }

        if limit.is_some_and(|l| stats.words_written >= l) {
            limit_reached = true;
            return false;
        }

        true
    })?;

    if let Some(err) = write_error {
        return Err(err);
    }
    writer.flush()?;

    match limit {
        Some(l) if limit_reached && !quiet => pb.finish_with_message(format!("Reached limit of {} words", l)),
        _ => pb.finish_and_clear(),
    }

    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

fn print_stats(stats: &Stats, strategy_name: &str) {
    println!();
    println!("============================================================");
    println!("Strategy: {}", strategy_name);
    println!("Pages processed: {}", stats.pages_processed);
    println!("Words written: {}", stats.words_written);
    println!("Variant-only words: {}", stats.variants);
    println!("Words with unresolved macros: {}", stats.unresolved);
    println!("------------------------------------------------------------");
    println!("Special pages: {}", stats.special);
    println!("Redirects: {}", stats.redirects);
    println!("Empty: {}", stats.skipped);
    println!("Time: {}m {}s", stats.elapsed.as_secs() / 60, stats.elapsed.as_secs() % 60);
    println!("Rate: {:.0} pages/sec", stats.pages_processed as f64 / stats.elapsed.as_secs_f64().max(f64::EPSILON));
    println!("============================================================");
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let edition = match Edition::load(&args.edition) {
        Ok(edition) => edition,
        Err(e) => {
            let bundled: Vec<&str> = Edition::bundled_locales().collect();
            eprintln!("Error loading edition {}: {} (bundled: {})", args.edition, e, bundled.join(", "));
            std::process::exit(1);
        }
    };

    let mut services = Services::default();
    if let Some(path) = &args.place_cache {
        let cache = RenderCache::load(path)?;
        info!(entries = cache.len(), path = %path.display(), "loaded place cache");
        services = services.with_renderer(CachedRenderer::new(Arc::new(cache), Offline));
    }
    let engine = Arc::new(Engine { edition, services });

    // Validate: --limit requires sequential mode for efficient early termination
    if args.limit.is_some() && args.strategy != Strategy::Sequential {
        eprintln!(
            "Error: --limit requires --strategy sequential for efficient early termination.\n\
             Parallel strategies must process pages out of order and reorder results,\n\
             which means they cannot stop early when the limit is reached."
        );
        std::process::exit(1);
    }

    let mut config = ParallelConfig::default();
    if args.threads > 0 {
        config.num_workers = args.threads.saturating_sub(1).max(1);
    }
    config.channel_buffer = args.channel_buffer;
    config.page_limit = args.page_limit;

    if !args.quiet {
        println!("Parsing: {}", args.input.display());
        println!("Output: {}", args.output.display());
        println!("Edition: {}", engine.edition.locale());
        println!("Strategy: {:?}", args.strategy);
        if args.strategy != Strategy::Sequential {
            println!("Workers: {}", config.num_workers);
        }
        if let Some(limit) = args.limit {
            println!("Limit: {} words", limit);
        }
        if let Some(limit) = args.page_limit {
            println!("Page limit: {}", limit);
        }
        println!();
    }

    info!(input = %args.input.display(), strategy = ?args.strategy, "starting");
    let reader = dump::open(&args.input)?;
    let output = File::create(&args.output)?;

    let stats = match args.strategy {
        Strategy::Sequential => {
            let mut writer = BufWriter::with_capacity(256 * 1024, output);
            run_sequential(reader, &mut writer, &engine, args.limit, args.page_limit, args.quiet)?
        }
        Strategy::ChannelPipeline => process_channel_pipeline(reader, output, Arc::clone(&engine), &config)?,
    };
    info!(pages = stats.pages_processed, words = stats.words_written, "finished");

    if !args.quiet {
        print_stats(&stats, &format!("{:?}", args.strategy));
    }

    Ok(())
}
