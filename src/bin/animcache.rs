use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use animcache::{
    AnimationBackend, AnimationFactory, AnimationInformation, AnimationOpts, Bitmap,
    CachingStrategy, DrawableBackend, FactoryParts, FrameListener, FrameRenderer, FrameType,
    HeapAllocatorOpts, HeapBitmapAllocator, PixelFormat, RayonExecutor, SnapshotCanvas,
    SystemClock, ThreadScheduler,
};

#[derive(Parser, Debug)]
#[command(name = "animcache", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a synthetic animation through the cache and print statistics.
    Simulate(SimulateArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    NoCache,
    SharedPool,
    SharedPoolNoReuse,
    KeepLast,
}

impl From<StrategyArg> for CachingStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::NoCache => CachingStrategy::NoCache,
            StrategyArg::SharedPool => CachingStrategy::SharedPool,
            StrategyArg::SharedPoolNoReuse => CachingStrategy::SharedPoolNoReuse,
            StrategyArg::KeepLast => CachingStrategy::KeepLast,
        }
    }
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Options JSON. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame cache strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Frames to prepare ahead (0 disables preparation).
    #[arg(long)]
    prepare: Option<usize>,

    /// Override rayon worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Number of frames in the animation.
    #[arg(long, default_value_t = 24)]
    frames: u32,

    /// Frame width in pixels.
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Display duration of each frame.
    #[arg(long, default_value_t = 40)]
    frame_ms: u32,

    /// Loops to play.
    #[arg(long, default_value_t = 2)]
    loops: u32,

    /// Sleep for each frame's duration while playing.
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Stay idle this long after playback, so the inactivity watchdog can release frames.
    #[arg(long, default_value_t = 0)]
    idle_ms: u64,

    /// Frame to write as PNG after playback (needs --out).
    #[arg(long, requires = "out")]
    dump_frame: Option<u32>,

    /// Output PNG path.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
    }
}

/// Draws a moving diagonal gradient; every frame differs.
struct GradientRenderer {
    frames: u32,
}

impl FrameRenderer for GradientRenderer {
    fn render_frame(&self, frame: u32, bitmap: &mut Bitmap) -> bool {
        let desc = bitmap.desc();
        if desc.format != PixelFormat::Rgba8888 {
            return false;
        }
        let shift = (u64::from(frame) * 255 / u64::from(self.frames.max(1))) as u8;
        let (w, h) = (u64::from(desc.width.max(1)), u64::from(desc.height.max(1)));
        let row = desc.row_bytes();
        for (y, line) in bitmap.pixels_mut().chunks_exact_mut(row).enumerate() {
            for (x, px) in line.chunks_exact_mut(4).enumerate() {
                let r = (x as u64 * 255 / w) as u8;
                let g = (y as u64 * 255 / h) as u8;
                px.copy_from_slice(&[r.wrapping_add(shift), g, shift, 255]);
            }
        }
        true
    }

    fn intrinsic_width(&self) -> Option<u32> {
        None
    }

    fn intrinsic_height(&self) -> Option<u32> {
        None
    }
}

#[derive(Default)]
struct DrawTally {
    by_type: Mutex<BTreeMap<String, u64>>,
    dropped: Mutex<u64>,
}

impl FrameListener for DrawTally {
    fn on_draw_frame_start(&self, _frame: u32) {}

    fn on_frame_drawn(&self, _frame: u32, frame_type: FrameType) {
        *self
            .by_type
            .lock()
            .entry(format!("{frame_type:?}").to_lowercase())
            .or_default() += 1;
    }

    fn on_frame_dropped(&self, _frame: u32) {
        *self.dropped.lock() += 1;
    }
}

#[derive(serde::Serialize)]
struct Report {
    strategy: CachingStrategy,
    frames_to_prepare: usize,
    loop_ms: u64,
    draws: u64,
    drawn_by_type: BTreeMap<String, u64>,
    dropped: u64,
    elapsed_ms: u128,
    cache_bytes: usize,
    store_entries: usize,
    store_bytes: usize,
    store_evictions: u64,
    live_bitmaps: u64,
    total_allocs: u64,
    failed_allocs: u64,
    cache_bytes_after_idle: Option<usize>,
}

fn load_opts(args: &SimulateArgs) -> anyhow::Result<AnimationOpts> {
    let mut opts = match &args.config {
        Some(path) => {
            let s = std::fs::read_to_string(path)
                .with_context(|| format!("read config '{}'", path.display()))?;
            AnimationOpts::from_json_str(&s)?
        }
        None => AnimationOpts::default(),
    };
    if let Some(s) = args.strategy {
        opts.caching_strategy = s.into();
    }
    if let Some(n) = args.prepare {
        opts.frames_to_prepare = n;
    }
    if args.threads.is_some() {
        opts.preparer_threads = args.threads;
    }
    opts.validate()?;
    Ok(opts)
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let opts = load_opts(&args)?;

    let allocator = HeapBitmapAllocator::new(HeapAllocatorOpts {
        max_live_bytes: opts.allocator_max_bytes,
    });
    let parts = FactoryParts {
        allocator: Arc::new(allocator.clone()),
        executor: Arc::new(RayonExecutor::new(opts.preparer_threads)?),
        clock: Arc::new(SystemClock::new()),
        scheduler: Arc::new(ThreadScheduler::new()?),
    };
    let factory = AnimationFactory::with_parts(opts.clone(), parts)?;

    let info = AnimationInformation {
        frame_count: args.frames,
        frame_durations_ms: vec![args.frame_ms],
        loop_count: Some(args.loops),
        width: args.width,
        height: args.height,
    };
    let backend = factory.create_backend(
        "synthetic://gradient",
        info,
        Arc::new(GradientRenderer {
            frames: args.frames,
        }),
    )?;
    let tally = Arc::new(DrawTally::default());
    backend.inner().set_frame_listener(Some(tally.clone()));

    let started = Instant::now();
    let mut canvas = SnapshotCanvas::new();
    for _ in 0..args.loops {
        for frame in 0..args.frames {
            backend.draw_frame(&mut canvas, frame);
            if args.realtime {
                let ms = backend.animation_info().frame_duration_ms(frame);
                std::thread::sleep(Duration::from_millis(u64::from(ms)));
            }
        }
    }
    let elapsed_ms = started.elapsed().as_millis();

    if let (Some(frame), Some(out)) = (args.dump_frame, &args.out) {
        dump_frame(&*backend, frame, out)?;
    }

    let cache_bytes = backend.size_in_bytes();
    let cache_bytes_after_idle = (args.idle_ms > 0).then(|| {
        std::thread::sleep(Duration::from_millis(args.idle_ms));
        backend.size_in_bytes()
    });

    let store = factory.store().stats();
    let alloc = allocator.stats();
    let drawn_by_type = tally.by_type.lock().clone();
    let dropped = *tally.dropped.lock();
    let report = Report {
        strategy: opts.caching_strategy,
        frames_to_prepare: opts.frames_to_prepare,
        loop_ms: backend.animation_info().loop_duration_ms(),
        draws: canvas.draws(),
        drawn_by_type,
        dropped,
        elapsed_ms,
        cache_bytes,
        store_entries: store.entries,
        store_bytes: store.bytes,
        store_evictions: store.evictions,
        live_bitmaps: alloc.live_bitmaps,
        total_allocs: alloc.total_allocs,
        failed_allocs: alloc.failed_allocs,
        cache_bytes_after_idle,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn dump_frame(backend: &dyn DrawableBackend, frame: u32, out: &Path) -> anyhow::Result<()> {
    anyhow::ensure!(
        frame < backend.frame_count(),
        "frame {frame} out of range (animation has {} frames)",
        backend.frame_count()
    );
    let mut canvas = SnapshotCanvas::new();
    anyhow::ensure!(
        backend.draw_frame(&mut canvas, frame),
        "frame {frame} could not be drawn"
    );
    let Some((_, bitmap)) = canvas.last() else {
        anyhow::bail!("frame {frame} produced no pixels");
    };
    anyhow::ensure!(
        bitmap.desc().format == PixelFormat::Rgba8888,
        "only rgba8888 frames can be written as PNG"
    );

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        out,
        bitmap.pixels(),
        bitmap.width(),
        bitmap.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))?;

    eprintln!("wrote {}", out.display());
    Ok(())
}
