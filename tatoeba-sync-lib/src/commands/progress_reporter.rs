use crate::fetch::Progress;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

type ProgressCallback = Box<dyn Fn() -> (u64, u64, String) + Send + Sync>;

const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

const DETERMINATE_TEMPLATE: &str = "{prefix:>12.bold.cyan} [{bar:30}] {bytes}/{total_bytes} {msg}";
const DETERMINATE_TEMPLATE_NO_COLOR: &str = "{prefix:>12} [{bar:30}] {bytes}/{total_bytes} {msg}";
const INDETERMINATE_TEMPLATE: &str = "{prefix:>12.bold.cyan} {spinner} {elapsed} {msg}";
const INDETERMINATE_TEMPLATE_NO_COLOR: &str = "{prefix:>12} {spinner} {elapsed} {msg}";
const SPINNER_TICKS: &[&str] = &["|", "/", "-", "\\", " "];

/// When the bar may appear, and whether it has.
#[derive(Debug)]
struct Visibility {
    after: Instant,
    shown: AtomicBool,
}

/// Download progress on stderr, shown only once an operation has lasted past a delay.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    visibility: Arc<Visibility>,
    callback: Arc<Mutex<ProgressCallback>>,
    refresh_task: Arc<JoinHandle<()>>,
    use_colors: bool,
}

impl ProgressReporter {
    /// Create a reporter whose bar stays hidden for `delay`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(delay: Duration, use_colors: bool) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        let visibility = Arc::new(Visibility {
            after: Instant::now() + delay,
            shown: AtomicBool::new(false),
        });
        let callback = Arc::new(Mutex::new(Box::new(|| (0u64, 0u64, String::new())) as ProgressCallback));

        Self {
            refresh_task: Arc::new(tokio::spawn(refresh(bar.clone(), Arc::clone(&visibility), Arc::clone(&callback)))),
            bar,
            visibility,
            callback,
            use_colors,
        }
    }

    fn style(&self, colored: &str, plain: &str, determinate: bool) -> ProgressStyle {
        let template = if self.use_colors { colored } else { plain };
        let base = if determinate {
            ProgressStyle::default_bar()
        } else {
            ProgressStyle::default_spinner()
        };

        base.template(template)
            .expect("invalid progress template")
            .progress_chars("=> ")
            .tick_strings(SPINNER_TICKS)
    }
}

impl Progress for ProgressReporter {
    fn set_phase(&self, phase: &str) {
        self.bar.set_prefix(phase.to_string());
        self.bar.reset_elapsed();
    }

    fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {
        *self.callback.lock().expect("lock poisoned") = callback;
        self.bar.disable_steady_tick();
        self.bar.set_length(0);
        self.bar.set_position(0);
        self.bar
            .set_style(self.style(DETERMINATE_TEMPLATE, DETERMINATE_TEMPLATE_NO_COLOR, true));
    }

    fn set_indeterminate(&self, callback: Box<dyn Fn() -> String + Send + Sync + 'static>) {
        *self.callback.lock().expect("lock poisoned") = Box::new(move || (0, 0, callback()));
        self.bar.reset_elapsed();
        self.bar.enable_steady_tick(REFRESH_INTERVAL);
        self.bar
            .set_style(self.style(INDETERMINATE_TEMPLATE, INDETERMINATE_TEMPLATE_NO_COLOR, false));
    }

    fn done(&self) {
        self.refresh_task.abort();
        if self.visibility.shown.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("bar", &self.bar)
            .field("visibility", &self.visibility)
            .field("callback", &"<callback>")
            .field("use_colors", &self.use_colors)
            .finish_non_exhaustive()
    }
}

/// Pulls the latest values from the callback into the bar until aborted.
async fn refresh(bar: ProgressBar, visibility: Arc<Visibility>, callback: Arc<Mutex<ProgressCallback>>) {
    let mut interval = tokio::time::interval(REFRESH_INTERVAL);
    #[expect(clippy::infinite_loop, reason = "task runs until aborted")]
    loop {
        let _ = interval.tick().await;

        if !visibility.shown.load(Ordering::Relaxed) {
            if Instant::now() < visibility.after {
                continue;
            }
            visibility.shown.store(true, Ordering::Relaxed);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }

        let (length, position, message) = {
            let guard = callback.lock().expect("lock poisoned");
            guard()
        };

        if length > 0 {
            bar.set_length(length);
            bar.set_position(position);
        }
        bar.set_message(message);
    }
}
