use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use trip_finder::artifacts::ArtifactStore;
use trip_finder::cache::{CacheConfig, CachedRouteService};
use trip_finder::domain::{Airport, Flight, Iata};
use trip_finder::pipeline::{
    DEFAULT_BATCH_SIZE, DEFAULT_CAPACITY, DEFAULT_WORKERS, PipelineConfig, SqliteStore,
    TripPipeline,
};
use trip_finder::planner::{
    DEFAULT_CUTOFF, DEFAULT_PARALLEL_FACTOR, DateWindow, Discovery, Planner, SearchConfig,
    Strategy,
};
use trip_finder::report::{summarize, summarize_one_way, summarize_round_trips};
use trip_finder::routes::{
    BookingLinks, DEFAULT_FLIGHT_PAGE_URL, RouteService, RyanairClient, RyanairConfig,
    ServiceError, StaticRouteService,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Find cheap multi-city round trips")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search, rank and write trips as JSON.
    Batch {
        #[command(flatten)]
        search: SearchArgs,

        /// Expansion strategy: walk or backtrack.
        #[arg(long, default_value_t = Strategy::GraphWalk)]
        strategy: Strategy,

        /// Keep only the cheapest N trips.
        #[arg(long)]
        limit: Option<usize>,

        /// Output file (stdout if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Cheapest direct one-way fares from the origin.
    OneWay {
        #[command(flatten)]
        search: SearchArgs,

        /// Keep only the cheapest N fares.
        #[arg(long)]
        limit: Option<usize>,

        /// Output file (stdout if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Cheapest direct out-and-back pairs, staying --min-nights to
    /// --max-nights.
    RoundTrip {
        #[command(flatten)]
        search: SearchArgs,

        /// Keep only the cheapest N pairs.
        #[arg(long)]
        limit: Option<usize>,

        /// Output file (stdout if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Search and persist every trip found into SQLite as it is found.
    Stream {
        #[command(flatten)]
        search: SearchArgs,

        /// SQLite database file.
        #[arg(long, default_value = "trips.db")]
        db: PathBuf,

        /// Append to an existing database instead of recreating its tables.
        #[arg(long)]
        keep_existing: bool,

        /// Storage worker threads, each with its own connection.
        #[arg(long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,

        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Queued trips beyond this are dropped.
        #[arg(long, default_value_t = DEFAULT_CAPACITY)]
        queue_capacity: usize,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Home airport, e.g. TRS.
    #[arg(long)]
    origin: Iata,

    /// Only consider these airports, e.g. "BGY|STN|CIA".
    #[arg(long)]
    dests: Option<String>,

    /// First departure day (YYYY-MM-DD).
    #[arg(long)]
    from_date: NaiveDate,

    /// Last departure day (YYYY-MM-DD).
    #[arg(long)]
    to_date: NaiveDate,

    #[arg(long, default_value_t = 0)]
    min_nights: u32,

    #[arg(long, default_value_t = 7)]
    max_nights: u32,

    /// Maximum number of flights per multi-city trip.
    #[arg(long, default_value_t = DEFAULT_CUTOFF)]
    cutoff: usize,

    /// Drop fares above this price.
    #[arg(long, default_value_t = 30.0)]
    max_price: f64,

    /// Keep fares of any price.
    #[arg(long, conflicts_with = "max_price")]
    no_price_limit: bool,

    /// Concurrent requests per CPU.
    #[arg(long, default_value_t = DEFAULT_PARALLEL_FACTOR)]
    parallel_factor: usize,

    /// Directory for cached intermediate results.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Read airports, routes and fares from a JSON fixture instead of the network.
    #[arg(long)]
    fixture: Option<PathBuf>,

    #[arg(long)]
    promo_code: Option<String>,

    /// How long airport and route lists stay cached, in minutes.
    #[arg(long, default_value_t = 360)]
    cache_ttl_minutes: u64,
}

impl SearchArgs {
    fn config(&self) -> SearchConfig {
        let max_price = (!self.no_price_limit).then_some(self.max_price);
        SearchConfig::default()
            .with_cutoff(self.cutoff)
            .with_nights(self.min_nights, self.max_nights)
            .with_max_price(max_price)
            .with_parallel_factor(self.parallel_factor)
    }

    fn allow_list(&self) -> Result<Option<BTreeSet<Iata>>> {
        let Some(dests) = &self.dests else {
            return Ok(None);
        };
        let codes = dests
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Iata::parse)
            .collect::<Result<BTreeSet<_>, _>>()
            .context("invalid --dests")?;
        Ok(Some(codes))
    }

    fn window(&self) -> Result<DateWindow> {
        Ok(DateWindow::new(self.from_date, self.to_date)?)
    }

    fn service(&self) -> Result<CachedRouteService<Source>> {
        let source = match &self.fixture {
            Some(path) => Source::Fixture(
                StaticRouteService::from_fixture(path)
                    .with_context(|| format!("failed to load fixture {}", path.display()))?,
            ),
            None => {
                let mut config = RyanairConfig::default();
                if let Some(code) = &self.promo_code {
                    config = config.with_promo_code(code);
                }
                Source::Live(RyanairClient::new(config).context("failed to create fare client")?)
            }
        };
        let ttl = Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60));
        let cache = CacheConfig::default().with_ttl(ttl);
        Ok(CachedRouteService::new(source, &cache))
    }

    fn links(&self) -> Result<BookingLinks> {
        let links = BookingLinks::new(DEFAULT_FLIGHT_PAGE_URL)?;
        Ok(match &self.promo_code {
            Some(code) => links.with_promo_code(code),
            None => links,
        })
    }
}

/// The route service selected on the command line.
enum Source {
    Fixture(StaticRouteService),
    Live(RyanairClient),
}

impl RouteService for Source {
    async fn list_airports(&self) -> Result<Vec<Airport>, ServiceError> {
        match self {
            Self::Fixture(s) => s.list_airports().await,
            Self::Live(s) => s.list_airports().await,
        }
    }

    async fn list_destinations(&self, origin: &Iata) -> Result<Vec<Iata>, ServiceError> {
        match self {
            Self::Fixture(s) => s.list_destinations(origin).await,
            Self::Live(s) => s.list_destinations(origin).await,
        }
    }

    async fn list_fares(
        &self,
        origin: &Iata,
        destinations: &[Iata],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Flight>, ServiceError> {
        match self {
            Self::Fixture(s) => s.list_fares(origin, destinations, from, to).await,
            Self::Live(s) => s.list_fares(origin, destinations, from, to).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Batch {
            search,
            strategy,
            limit,
            output,
        } => handle_batch(&search, strategy, limit, output.as_deref()).await,
        Command::OneWay {
            search,
            limit,
            output,
        } => handle_one_way(&search, limit, output.as_deref()).await,
        Command::RoundTrip {
            search,
            limit,
            output,
        } => handle_round_trip(&search, limit, output.as_deref()).await,
        Command::Stream {
            search,
            db,
            keep_existing,
            workers,
            batch_size,
            queue_capacity,
        } => {
            let config = PipelineConfig::default()
                .with_batch_size(batch_size)
                .with_capacity(queue_capacity);
            handle_stream(&search, &db, keep_existing, workers, config).await
        }
    }
}

async fn discover<S: RouteService>(
    planner: &Planner<'_, S>,
    search: &SearchArgs,
) -> Result<Discovery> {
    let allow = search.allow_list()?;
    let window = search.window()?;
    let discovery = planner
        .discover(search.origin, allow.as_ref(), window)
        .await
        .with_context(|| format!("discovery from {} failed", search.origin))?;
    Ok(discovery)
}

fn planner_for<'a, S: RouteService>(
    service: &'a S,
    search: &SearchArgs,
    config: SearchConfig,
) -> Result<Planner<'a, S>> {
    let mut planner = Planner::new(service, config)?;
    if let Some(dir) = &search.data_dir {
        planner = planner.with_artifacts(ArtifactStore::new(dir));
    }
    Ok(planner)
}

async fn handle_batch(
    search: &SearchArgs,
    strategy: Strategy,
    limit: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let service = search.service()?;
    let config = search.config().with_max_results(limit);
    let planner = planner_for(&service, search, config)?;

    let discovery = discover(&planner, search).await?;
    let trips = tokio::task::block_in_place(|| planner.find_trips(&discovery, strategy))?;

    write_json(&summarize(&trips), output)
}

async fn handle_one_way(
    search: &SearchArgs,
    limit: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let service = search.service()?;
    let planner = planner_for(&service, search, search.config().with_max_results(limit))?;
    let fares = planner
        .one_way_fares(search.origin, search.allow_list()?.as_ref(), search.window()?)
        .await
        .with_context(|| format!("one-way search from {} failed", search.origin))?;
    write_json(&summarize_one_way(&fares, &search.links()?), output)
}

async fn handle_round_trip(
    search: &SearchArgs,
    limit: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let service = search.service()?;
    let planner = planner_for(&service, search, search.config().with_max_results(limit))?;
    let pairs = planner
        .round_trip_fares(search.origin, search.allow_list()?.as_ref(), search.window()?)
        .await
        .with_context(|| format!("round-trip search from {} failed", search.origin))?;
    write_json(&summarize_round_trips(&pairs, &search.links()?), output)
}

fn write_json<T: Serialize>(rows: &[T], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.flush()?;
            info!(rows = rows.len(), path = %path.display(), "wrote results");
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, rows)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

async fn handle_stream(
    search: &SearchArgs,
    db: &Path,
    keep_existing: bool,
    workers: usize,
    pipeline_config: PipelineConfig,
) -> Result<()> {
    if workers == 0 {
        bail!("--workers must be at least 1");
    }

    let service = search.service()?;
    let planner = planner_for(&service, search, search.config())?;
    let discovery = discover(&planner, search).await?;

    // The first connection resets the schema before the others open.
    let stores = (0..workers)
        .map(|i| SqliteStore::open(db, i == 0 && !keep_existing))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to open {}", db.display()))?;

    let pipeline = TripPipeline::start(pipeline_config, stores)?;
    let handle = pipeline.handle();
    let stop = pipeline.stop_flag();

    let interrupt = stop_on_signal(Arc::clone(&stop));

    let emitted = tokio::task::block_in_place(|| {
        planner.stream_trips(&discovery, &stop, &|trip| {
            handle.submit(trip);
        })
    });
    interrupt.abort();

    let report = pipeline.shutdown();
    let emitted = emitted?;

    let store = SqliteStore::open(db, false)?;
    println!(
        "Found {emitted} trips: {} saved, {} dropped, {} lost in {:.1}s",
        report.saved,
        report.dropped,
        report.lost,
        report.elapsed.as_secs_f64()
    );
    println!("Database {} now holds {} trips", db.display(), store.trip_count()?);
    for path in store.cheapest_paths(5)? {
        let legs = store.path_flight_keys(path.path_id)?;
        println!("  {:>8.2}  {}", path.total_cost, legs.join(" -> "));
    }
    Ok(())
}

/// Set `stop` once a shutdown signal arrives.
fn stop_on_signal(stop: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("stopping search and draining queue");
        stop.store(true, Ordering::Release);
    })
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(?err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(?err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("interrupt received"),
        () = terminate => info!("terminate signal received"),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
