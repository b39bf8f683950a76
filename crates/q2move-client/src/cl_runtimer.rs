// cl_runtimer.rs -- Time attack run timer
//
// Idle until the player presses a movement key in time attack, then counts
// frame time until the finish trigger. Leaving time attack or recalling to
// the spawn throws the run away.

use q2move_common::common::com_printf;
use q2move_common::pmove::GameMode;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunTimer {
    /// Seconds since the run started.
    run_time: f64,
    running: bool,
    finished: bool,
}

impl RunTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed(&self) -> f64 {
        self.run_time
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stopped at the finish and not reset since.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run once per frame. `moving` is true while any movement key is held.
    pub fn update(&mut self, mode: GameMode, moving: bool, delta: f32) {
        if !self.running {
            if !self.finished && mode == GameMode::TimeAttack && moving {
                self.start();
            }
            return;
        }

        if mode != GameMode::TimeAttack {
            self.reset();
            return;
        }

        if delta > 0.0 {
            self.run_time += delta as f64;
        }
    }

    fn start(&mut self) {
        self.running = true;
        self.finished = false;
        self.run_time = 0.0;
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.finished = false;
        self.run_time = 0.0;
    }

    /// Stop at the finish. Returns the formatted time, or None when no run
    /// was in progress.
    pub fn finish(&mut self) -> Option<String> {
        if !self.running {
            return None;
        }
        self.running = false;
        self.finished = true;

        let time = format_run_time(self.run_time);
        com_printf(&format!("Map completed with time {}\n", time));
        Some(time)
    }
}

/// `SS.mmm` under a minute, `MM:SS.mmm` under an hour, `HH:MM:SS` beyond.
pub fn format_run_time(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let millis = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let seconds = total_secs % 60;
    let minutes = (total_secs / 60) % 60;
    let hours = total_secs / 3600;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{:02}:{:02}:", hours, minutes));
    } else if minutes > 0 {
        out.push_str(&format!("{:02}:", minutes));
    }
    out.push_str(&format!("{:02}", seconds));
    if hours == 0 {
        out.push_str(&format!(".{:03}", millis));
    }
    out
}
