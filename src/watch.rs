// gRPC Gen - Watch Mode
// Re-runs the pipeline when the config or any source changes

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Notify, mpsc};
use tokio::task::{JoinError, JoinHandle};

use crate::compiler::CompilerLocator;
use crate::config;
use crate::error::{GenError, GenResult};
use crate::log;
use crate::pipeline::{PipelineRunner, RunSummary};
use crate::which::ToolResolver;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 600;

/// What the loop should do after a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    StartRun,
    /// A run is in flight; one rerun is queued
    Deferred,
    Idle,
}

/// Debounce state: at most one run in flight and one queued behind it.
///
/// Sources are watched through their parent directories so a save that
/// replaces the file is still seen; events are matched against
/// `watched_paths`.
#[derive(Debug, Default)]
pub struct WatchState {
    watched_paths: BTreeSet<PathBuf>,
    watched_dirs: BTreeSet<PathBuf>,
    /// Watched for the whole session (the config directory)
    pinned_dir: Option<PathBuf>,
    in_flight: bool,
    rerun_requested: bool,
}

impl WatchState {
    pub fn new(pinned_dir: PathBuf) -> Self {
        Self {
            pinned_dir: Some(pinned_dir),
            ..Self::default()
        }
    }

    pub fn on_change(&mut self) -> WatchAction {
        if self.in_flight {
            self.rerun_requested = true;
            WatchAction::Deferred
        } else {
            self.in_flight = true;
            WatchAction::StartRun
        }
    }

    pub fn on_run_complete(&mut self) -> WatchAction {
        if self.rerun_requested {
            self.rerun_requested = false;
            WatchAction::StartRun
        } else {
            self.in_flight = false;
            WatchAction::Idle
        }
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched_paths.contains(path)
    }

    /// Replace the watched sources, returning the directories to start
    /// and stop watching as `(added, removed)`
    pub fn resubscribe(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
        self.watched_paths = paths.into_iter().collect();

        let dirs: BTreeSet<PathBuf> = self
            .watched_paths
            .iter()
            .filter_map(|path| path.parent())
            .filter(|dir| self.pinned_dir.as_deref() != Some(*dir))
            .map(Path::to_path_buf)
            .collect();
        let added = dirs.difference(&self.watched_dirs).cloned().collect();
        let removed = self.watched_dirs.difference(&dirs).cloned().collect();
        self.watched_dirs = dirs;
        (added, removed)
    }
}

/// Stops a running `WatchController` from another task
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<Notify>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.notify_one();
    }
}

pub struct WatchController {
    explicit_config: Option<PathBuf>,
    cwd: PathBuf,
    poll_interval: Option<Duration>,
    locator: Arc<dyn CompilerLocator>,
    resolver: ToolResolver,
    stop: Arc<Notify>,
}

impl WatchController {
    pub fn new(
        explicit_config: Option<PathBuf>,
        cwd: PathBuf,
        locator: Arc<dyn CompilerLocator>,
        resolver: ToolResolver,
    ) -> Self {
        Self {
            explicit_config,
            cwd,
            poll_interval: None,
            locator,
            resolver,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Poll the filesystem every `interval` instead of using native events
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    /// Run once immediately, then on every relevant change until stopped
    pub async fn run(self) -> GenResult<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
        let mut watcher = self.create_watcher(tx)?;

        let config_paths = config::watch_candidates(self.explicit_config.as_deref(), &self.cwd);
        let config_dir = match &self.explicit_config {
            Some(_) => config_paths
                .first()
                .and_then(|path| path.parent())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.cwd.clone()),
            None => self.cwd.clone(),
        };
        watcher.watch(&config_dir, RecursiveMode::NonRecursive)?;

        let mode = match self.poll_interval {
            Some(interval) => format!("polling every {}ms", interval.as_millis()),
            None => "native events".to_string(),
        };
        log::status("Watching", format!("{} ({})", config_dir.display(), mode));

        let mut state = WatchState::new(config_dir.clone());
        state.on_change();
        let mut running = self.begin_run(&mut watcher, &mut state);

        loop {
            tokio::select! {
                Some(paths) = rx.recv() => {
                    let relevant = paths
                        .iter()
                        .any(|path| state.is_watched(path) || config_paths.contains(path));
                    if !relevant {
                        continue;
                    }

                    match state.on_change() {
                        WatchAction::StartRun => running = self.begin_run(&mut watcher, &mut state),
                        _ => log::verbose("change during run, queued one rerun"),
                    }
                }
                result = join_run(&mut running) => {
                    running = None;
                    report(result);
                    match state.on_run_complete() {
                        WatchAction::StartRun => running = self.begin_run(&mut watcher, &mut state),
                        _ => waiting(),
                    }
                }
                _ = self.stop.notified() => break,
            }
        }

        if let Some(handle) = running {
            log::verbose("waiting for the current run to finish");
            report(handle.await);
        }
        log::status("Stopped", "watching");
        Ok(())
    }

    fn create_watcher(&self, tx: mpsc::UnboundedSender<Vec<PathBuf>>) -> GenResult<Box<dyn Watcher + Send>> {
        let handler = move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    let _ = tx.send(event.paths);
                }
            }
            Err(e) => log::verbose(format!("watch error: {}", e)),
        };

        let watcher: Box<dyn Watcher + Send> = match self.poll_interval {
            Some(interval) => Box::new(PollWatcher::new(
                handler,
                Config::default().with_poll_interval(interval),
            )?),
            None => Box::new(RecommendedWatcher::new(handler, Config::default())?),
        };
        Ok(watcher)
    }

    /// Load the config, re-subscribe to its sources and spawn a run.
    ///
    /// Returns `None` when nothing was started; the state is then idle again.
    fn begin_run(
        &self,
        watcher: &mut Box<dyn Watcher + Send>,
        state: &mut WatchState,
    ) -> Option<JoinHandle<GenResult<RunSummary>>> {
        log::status(
            &format!("[{}]", log::timestamp()),
            "generating".white(),
        );

        let loaded = config::discover(self.explicit_config.as_deref(), &self.cwd)
            .and_then(|path| config::load(&path));

        match loaded {
            Ok(config) => {
                self.resubscribe(watcher, state, config.source_paths());
                let runner = PipelineRunner::new(config, self.locator.clone(), self.resolver.clone());
                Some(tokio::spawn(async move { runner.run_once().await }))
            }
            Err(e) => {
                log::error(&e);
                // Loading is synchronous, so nothing can have been queued
                state.on_run_complete();
                waiting();
                None
            }
        }
    }

    fn resubscribe(&self, watcher: &mut Box<dyn Watcher + Send>, state: &mut WatchState, paths: Vec<PathBuf>) {
        let (added, removed) = state.resubscribe(paths);

        for dir in removed {
            if let Err(e) = watcher.unwatch(&dir) {
                log::verbose(format!("could not unwatch {}: {}", dir.display(), e));
            }
        }
        for dir in added {
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => log::verbose(format!("watching {}", dir.display())),
                Err(e) => log::error(&GenError::Watch(e)),
            }
        }
    }
}

async fn join_run(
    running: &mut Option<JoinHandle<GenResult<RunSummary>>>,
) -> Result<GenResult<RunSummary>, JoinError> {
    match running {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn report(result: Result<GenResult<RunSummary>, JoinError>) {
    match result {
        Ok(Ok(summary)) => log::status(
            &format!("[{}]", log::timestamp()),
            format!(
                "generated {} output(s) with {} compiler run(s) in {:.2?}",
                summary.outputs, summary.invocations, summary.elapsed
            ),
        ),
        Ok(Err(e)) => log::error(&e),
        Err(e) => log::error(&GenError::Io(std::io::Error::other(e))),
    }
}

fn waiting() {
    println!(
        "{} {}",
        format!("[{}]", log::timestamp()).bright_black(),
        "waiting for changes".bright_black()
    );
}
