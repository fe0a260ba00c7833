#![forbid(unsafe_code)]

//! kioskterm binary entry point.

use std::path::Path;
use std::process;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use kioskterm_dash::cli;
use kioskterm_dash::config::Config;
use kioskterm_dash::error::DashboardError;
use kioskterm_dash::input::{InputRouter, KeyBindings};
use kioskterm_dash::launch_env::LaunchEnv;
use kioskterm_dash::logging;
use kioskterm_dash::render::{RenderConfig, RenderLoop};
use kioskterm_dash::signals::SignalGuard;
use kioskterm_dash::surface::{CrosstermKeys, CrosstermSurface};
use kioskterm_dash::DashboardContext;
use time::UtcOffset;

fn main() {
    // The local offset can only be read while the process is single-threaded.
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let opts = cli::Opts::parse();

    match logging::init(opts.log_file.as_deref()) {
        Ok(path) => tracing::info!(version = cli::VERSION, log = %path.display(), "kioskterm starting"),
        Err(e) => eprintln!("kioskterm: logging disabled: {e}"),
    }

    let (mut cfg, _) = Config::load_or_default(opts.config.as_deref());
    if let Some(layout) = opts.layout {
        cfg.ui.layout = layout;
    }
    if let Some(fps) = opts.fps {
        cfg.ui.active_fps = fps;
    }

    let bindings = KeyBindings::from_config(&cfg.keys.reserved).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "reserved keys ignored; using defaults");
        KeyBindings::default()
    });
    let router = InputRouter::new(bindings, cfg.ui.layout);

    let launch = LaunchEnv::discover(Path::new("/proc"), &cfg.service);
    let mut ctx = DashboardContext::from_config(&cfg, &launch, utc_offset);

    let quit = Arc::new(AtomicBool::new(false));
    let _signals = SignalGuard::install(Arc::clone(&quit))
        .inspect_err(|err| tracing::warn!(error = %err, "signal handlers not installed"))
        .ok();

    let mut render_cfg = RenderConfig::from_config(&cfg);
    if opts.exit_after_ms > 0 {
        render_cfg.exit_after = Some(Duration::from_millis(opts.exit_after_ms));
    }
    let mut render = RenderLoop::new(render_cfg, router).quit_flag(quit);

    let mut surface = match CrosstermSurface::new().map_err(DashboardError::Surface) {
        Ok(surface) => surface,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            eprintln!("kioskterm: {err}");
            process::exit(1);
        }
    };
    let result = render.run(&mut ctx, &mut surface, &mut CrosstermKeys);
    // Leave the alternate screen before reporting anything.
    drop(surface);

    if let Err(err) = result {
        tracing::error!(error = %err, "render loop failed");
        eprintln!("kioskterm: {err}");
        process::exit(1);
    }
    tracing::info!("kioskterm exited");
}
