use std::collections::HashMap;
use std::sync::Mutex;

use console::style;
use emag_desk::sync::{StatusTransition, SyncEvent};
use emag_desk::{Resource, SyncStatus};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Fetch bar of one integration and resource.
struct FetchState {
    bar: ProgressBar,
    done: bool,
}

/// Consolidated progress state to avoid multiple mutex locks.
#[derive(Default)]
struct ProgressState {
    /// Fetch bars keyed by integration label and resource.
    fetch_bars: HashMap<(String, Resource), FetchState>,
    /// Single bar for database writes.
    save_bar: Option<ProgressBar>,
    inserted: u64,
    skipped: u64,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    fn prefix(integration: &str, resource: Resource) -> String {
        format!("{:>14} {:6}", integration, resource)
    }

    fn save_bar(&self, state: &mut ProgressState) -> ProgressBar {
        state
            .save_bar
            .get_or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::counter_style());
                bar.set_prefix(format!("{:>21}", "Saving"));
                bar.enable_steady_tick(std::time::Duration::from_millis(100));
                bar
            })
            .clone()
    }

    pub fn handle(&self, event: SyncEvent) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            SyncEvent::Counting {
                integration,
                resource,
            } => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::spinner_style());
                bar.enable_steady_tick(std::time::Duration::from_millis(100));
                bar.set_prefix(Self::prefix(&integration, resource));
                bar.set_message("Counting...");
                state
                    .fetch_bars
                    .insert((integration, resource), FetchState { bar, done: false });
            }

            SyncEvent::Counted {
                integration,
                resource,
                total,
                pages,
                window_start,
            } => {
                if let Some(fetch) = state.fetch_bars.get(&(integration, resource))
                    && !fetch.done
                {
                    fetch.bar.disable_steady_tick();
                    fetch.bar.set_length(100);
                    fetch.bar.set_style(Self::bar_style());
                    let since = window_start
                        .map(|start| format!(" since {}", start.format("%Y-%m-%d %H:%M")))
                        .unwrap_or_default();
                    fetch
                        .bar
                        .set_message(format!("{} records in {} pages{}", total, pages, since));
                }
            }

            SyncEvent::FetchedPage {
                integration,
                resource,
                page,
                fetched_so_far,
                percent,
                ..
            } => {
                if let Some(fetch) = state.fetch_bars.get(&(integration, resource))
                    && !fetch.done
                {
                    fetch.bar.set_position(u64::from(percent));
                    fetch
                        .bar
                        .set_message(format!("page {} ({} records)", page, fetched_so_far));
                }
            }

            SyncEvent::BatchComplete { .. } | SyncEvent::WindowFiltered { .. } => {}

            SyncEvent::PersistingBatch {
                count,
                final_batch,
                ..
            } => {
                let bar = self.save_bar(&mut state);
                let message = if final_batch {
                    format!("Flushing final batch ({} rows)...", count)
                } else {
                    format!("Flushing batch ({} rows)...", count)
                };
                bar.set_message(message);
            }

            SyncEvent::Persisted {
                inserted, skipped, ..
            } => {
                state.inserted += inserted;
                state.skipped += skipped;
                let bar = self.save_bar(&mut state);
                bar.inc(inserted + skipped);
                bar.set_message(format!(
                    "{} new, {} already stored",
                    state.inserted, state.skipped
                ));
            }

            SyncEvent::PersistError {
                resource, error, ..
            } => {
                let bar = self.save_bar(&mut state);
                bar.set_message(format!("✗ {}: {}", resource, error));
            }

            SyncEvent::RateLimitBackoff {
                resource,
                page,
                retry_after_ms,
                attempt,
            } => {
                let waiting = state
                    .fetch_bars
                    .iter()
                    .find(|((_, r), fetch)| *r == resource && !fetch.done);
                if let Some((_, fetch)) = waiting {
                    fetch.bar.set_message(format!(
                        "⏳ page {} rate limited, retry {} in {:.1}s",
                        page,
                        attempt,
                        retry_after_ms as f64 / 1000.0
                    ));
                }
            }

            SyncEvent::Warning { message } => {
                drop(state);
                self.multi.println(format!("⚠ {}", message)).ok();
            }

            SyncEvent::ResourceComplete {
                integration,
                resource,
                fetched,
                inserted,
                skipped,
            } => {
                if let Some(fetch) = state.fetch_bars.get_mut(&(integration, resource))
                    && !fetch.done
                {
                    fetch.done = true;
                    fetch.bar.set_position(100);
                    fetch.bar.finish_with_message(format!(
                        "✓ {} fetched, {} new, {} skipped",
                        fetched, inserted, skipped
                    ));
                }
            }

            _ => {}
        }
    }

    pub fn status(&self, transition: &StatusTransition) {
        let line = match transition.to {
            SyncStatus::Loading => return,
            SyncStatus::Success => format!(
                "{} {} synced",
                style("✓").green().bold(),
                style(&transition.integration).cyan()
            ),
            SyncStatus::Error => format!(
                "{} {} failed: {}",
                style("✗").red().bold(),
                style(&transition.integration).cyan(),
                transition.error.as_deref().unwrap_or("unknown error")
            ),
            SyncStatus::Idle => format!(
                "{} {} reset to idle",
                style("·").dim(),
                style(&transition.integration).cyan()
            ),
        };
        self.multi.println(line).ok();
    }

    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for fetch in state.fetch_bars.values() {
            if !fetch.bar.is_finished() {
                fetch.bar.abandon();
            }
        }
        if let Some(ref bar) = state.save_bar
            && !bar.is_finished()
        {
            bar.finish();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn counter_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {pos:>6} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_follow_a_resource_to_completion() {
        let reporter = InteractiveReporter::new();
        reporter.handle(SyncEvent::Counting {
            integration: "shop-ro".to_string(),
            resource: Resource::Orders,
        });
        reporter.handle(SyncEvent::Counted {
            integration: "shop-ro".to_string(),
            resource: Resource::Orders,
            total: 250,
            pages: 3,
            window_start: None,
        });
        reporter.handle(SyncEvent::FetchedPage {
            integration: "shop-ro".to_string(),
            resource: Resource::Orders,
            page: 1,
            count: 100,
            fetched_so_far: 100,
            percent: 40,
        });
        reporter.handle(SyncEvent::Persisted {
            resource: Resource::Orders,
            inserted: 90,
            skipped: 10,
        });
        reporter.handle(SyncEvent::ResourceComplete {
            integration: "shop-ro".to_string(),
            resource: Resource::Orders,
            fetched: 250,
            inserted: 240,
            skipped: 10,
        });

        let state = reporter.state.lock().unwrap();
        let fetch = &state.fetch_bars[&("shop-ro".to_string(), Resource::Orders)];
        assert!(fetch.done);
        assert_eq!(fetch.bar.position(), 100);
        assert_eq!(state.inserted, 90);
        assert_eq!(state.save_bar.as_ref().map(|b| b.position()), Some(100));
    }

    #[test]
    fn events_for_unknown_bars_are_ignored() {
        let reporter = InteractiveReporter::new();
        reporter.handle(SyncEvent::FetchedPage {
            integration: "ghost".to_string(),
            resource: Resource::ProductOffers,
            page: 2,
            count: 10,
            fetched_so_far: 20,
            percent: 50,
        });
        reporter.finish();
        assert!(reporter.state.lock().unwrap().fetch_bars.is_empty());
    }
}
