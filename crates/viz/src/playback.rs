//! Epoch playback: the frame-driven state machine that advances time.
//!
//! Playback and manual seeks are mutually exclusive control paths: a seek
//! cancels playback before it applies, and a stop request takes effect at the
//! top of the next frame, so at most one more frame is drawn after a cancel.
//! The same cursor drives both the map and the graph view.

use bevy::prelude::*;
use std::time::Duration;

/// Playback pacing, inserted by the binary from CLI/config.
#[derive(Resource, Debug, Clone)]
pub struct PlaybackSettings {
    /// Wall-clock duration of one epoch.
    pub epoch_duration: Duration,
    /// Start playing as soon as a world with history is loaded.
    pub autoplay: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            epoch_duration: Duration::from_millis(1200),
            autoplay: false,
        }
    }
}

/// Emitted exactly once per epoch boundary crossed during playback.
#[derive(Event, Debug)]
pub struct EpochCrossed {
    pub epoch: u64,
}

/// Emitted when playback reaches the final epoch and stops on its own.
#[derive(Event, Debug)]
pub struct PlaybackFinished;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlaybackMode {
    Idle,
    Playing {
        start_epoch: u64,
        /// Wall-clock seconds of the first played frame; captured on the
        /// first advance after `play`, not when `play` is called.
        started_at: Option<f64>,
    },
}

/// What one frame of playback produced.
#[derive(Debug, Default)]
pub struct FrameAdvance {
    /// Epoch boundaries crossed this frame, ascending.
    pub crossings: Vec<u64>,
    /// True when this frame clamped to the final epoch and stopped.
    pub finished: bool,
}

/// The playback cursor. Single owner of epoch/progress state.
#[derive(Resource, Debug)]
pub struct PlaybackState {
    pub current_epoch: u64,
    /// Fraction of the current epoch, in `[0,1)`; exactly 1.0 only after a
    /// clamped completion.
    pub progress: f32,
    pub max_epoch: u64,
    mode: PlaybackMode,
    cancel_requested: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_epoch: 0,
            progress: 0.0,
            max_epoch: 0,
            mode: PlaybackMode::Idle,
            cancel_requested: false,
        }
    }
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self.mode, PlaybackMode::Playing { .. })
    }

    /// Continuous epoch position, `current + progress`.
    pub fn fractional_epoch(&self) -> f64 {
        self.current_epoch as f64 + self.progress as f64
    }

    /// Starts playback from the current epoch. Starting at the clamped end
    /// restarts from epoch 0.
    pub fn play(&mut self) {
        if self.is_playing() {
            return;
        }
        if self.current_epoch >= self.max_epoch && self.progress >= 1.0 {
            self.current_epoch = 0;
            self.progress = 0.0;
        }
        self.cancel_requested = false;
        self.mode = PlaybackMode::Playing {
            start_epoch: self.current_epoch,
            started_at: None,
        };
    }

    /// Requests a stop; honored at the top of the next [`advance`] call.
    ///
    /// [`advance`]: PlaybackState::advance
    pub fn request_stop(&mut self) {
        if self.is_playing() {
            self.cancel_requested = true;
        }
    }

    /// Manual seek. Cancels playback first so the two control paths never
    /// fight, then jumps to the clamped epoch.
    pub fn seek(&mut self, epoch: u64) {
        self.mode = PlaybackMode::Idle;
        self.cancel_requested = false;
        self.current_epoch = epoch.min(self.max_epoch);
        self.progress = 0.0;
    }

    /// Seek relative to the current epoch.
    pub fn step(&mut self, delta: i64) {
        let target = self.current_epoch.saturating_add_signed(delta);
        self.seek(target);
    }

    /// Updates the known timeline end, clamping the cursor if it shrank.
    pub fn set_max_epoch(&mut self, max_epoch: u64) {
        self.max_epoch = max_epoch;
        if self.current_epoch > max_epoch {
            self.current_epoch = max_epoch;
            self.progress = 0.0;
        }
    }

    /// Advances the cursor for one frame at wall-clock `now` seconds.
    ///
    /// A pending cancel is honored before any movement. Crossings are
    /// reported exactly once each; the cursor never moves past `max_epoch`.
    pub fn advance(&mut self, now: f64, epoch_duration: Duration) -> FrameAdvance {
        let mut result = FrameAdvance::default();

        if self.cancel_requested {
            self.cancel_requested = false;
            self.mode = PlaybackMode::Idle;
            return result;
        }
        let PlaybackMode::Playing {
            start_epoch,
            ref mut started_at,
        } = self.mode
        else {
            return result;
        };

        let t0 = *started_at.get_or_insert(now);
        let duration = epoch_duration.as_secs_f64().max(1e-3);
        let target = start_epoch as f64 + (now - t0) / duration;

        let previous = self.current_epoch;
        let target_epoch = target.floor() as u64;

        if target_epoch > self.max_epoch {
            self.current_epoch = self.max_epoch;
            self.progress = 1.0;
            self.mode = PlaybackMode::Idle;
            result.finished = true;
        } else {
            self.current_epoch = target_epoch;
            self.progress = (target - target_epoch as f64) as f32;
        }

        result.crossings = (previous + 1..=self.current_epoch).collect();
        result
    }
}

/// Plugin wiring the cursor into the frame loop and the keyboard.
pub struct PlaybackPlugin;

impl Plugin for PlaybackPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<PlaybackSettings>() {
            app.init_resource::<PlaybackSettings>();
        }
        app.init_resource::<PlaybackState>()
            .add_event::<EpochCrossed>()
            .add_event::<PlaybackFinished>()
            .add_systems(Update, (handle_playback_keys, advance_playback).chain());
    }
}

/// Space toggles play/pause; comma/period step; Digit0/End jump.
fn handle_playback_keys(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut playback: ResMut<PlaybackState>,
) {
    if keyboard.just_pressed(KeyCode::Space) {
        if playback.is_playing() {
            playback.request_stop();
        } else {
            playback.play();
        }
    }
    if keyboard.just_pressed(KeyCode::Comma) {
        playback.step(-1);
    }
    if keyboard.just_pressed(KeyCode::Period) {
        playback.step(1);
    }
    if keyboard.just_pressed(KeyCode::Digit0) {
        playback.seek(0);
    }
    if keyboard.just_pressed(KeyCode::End) {
        let end = playback.max_epoch;
        playback.seek(end);
    }
}

fn advance_playback(
    time: Res<Time>,
    settings: Res<PlaybackSettings>,
    mut playback: ResMut<PlaybackState>,
    mut crossings: EventWriter<EpochCrossed>,
    mut finished: EventWriter<PlaybackFinished>,
) {
    if !playback.is_playing() {
        return;
    }
    let advance = playback.advance(time.elapsed_seconds_f64(), settings.epoch_duration);
    for epoch in advance.crossings {
        tracing::info!(epoch, "entering epoch");
        crossings.send(EpochCrossed { epoch });
    }
    if advance.finished {
        tracing::info!(max_epoch = playback.max_epoch, "playback finished");
        finished.send(PlaybackFinished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH: Duration = Duration::from_secs(1);

    fn playing(max_epoch: u64) -> PlaybackState {
        let mut state = PlaybackState {
            max_epoch,
            ..Default::default()
        };
        state.play();
        state
    }

    #[test]
    fn test_reaches_end_and_stops() {
        let mut state = playing(3);
        let mut finished = false;
        let mut now = 0.0;
        // Simulated 60fps frames; must finish in finite time.
        for _ in 0..600 {
            let advance = state.advance(now, EPOCH);
            assert!(state.current_epoch <= state.max_epoch);
            if advance.finished {
                finished = true;
                break;
            }
            now += 1.0 / 60.0;
        }
        assert!(finished);
        assert_eq!(state.current_epoch, 3);
        assert_eq!(state.progress, 1.0);
        assert!(!state.is_playing());
    }

    #[test]
    fn test_crossings_fire_once_each() {
        let mut state = playing(5);
        let mut seen = Vec::new();
        let mut now = 0.0;
        for _ in 0..600 {
            let advance = state.advance(now, EPOCH);
            seen.extend(advance.crossings);
            if advance.finished {
                break;
            }
            now += 1.0 / 60.0;
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_large_frame_gap_reports_every_crossing() {
        let mut state = playing(10);
        state.advance(0.0, EPOCH);
        // One huge frame hop straight past the end.
        let advance = state.advance(100.0, EPOCH);
        assert!(advance.finished);
        assert_eq!(advance.crossings, (1..=10).collect::<Vec<_>>());
        assert_eq!(state.current_epoch, 10);
    }

    #[test]
    fn test_progress_stays_in_unit_range() {
        let mut state = playing(4);
        let mut now = 0.0;
        for _ in 0..200 {
            let advance = state.advance(now, EPOCH);
            if advance.finished {
                break;
            }
            assert!((0.0..1.0).contains(&state.progress));
            now += 0.017;
        }
    }

    #[test]
    fn test_cancel_takes_effect_next_frame() {
        let mut state = playing(10);
        state.advance(0.0, EPOCH);
        state.advance(0.5, EPOCH);
        state.request_stop();
        assert!(state.is_playing());

        // The very next frame honors the cancel and moves nothing.
        let advance = state.advance(3.0, EPOCH);
        assert!(!state.is_playing());
        assert!(advance.crossings.is_empty());
        assert_eq!(state.current_epoch, 0);
    }

    #[test]
    fn test_seek_cancels_playback_first() {
        let mut state = playing(10);
        state.advance(0.0, EPOCH);
        state.seek(7);
        assert!(!state.is_playing());
        assert_eq!(state.current_epoch, 7);
        assert_eq!(state.progress, 0.0);

        // A stale stop request must not leak into the next play.
        state.play();
        let advance = state.advance(0.0, EPOCH);
        assert!(state.is_playing());
        assert!(advance.crossings.is_empty());
    }

    #[test]
    fn test_seek_clamps_to_max() {
        let mut state = PlaybackState {
            max_epoch: 4,
            ..Default::default()
        };
        state.seek(99);
        assert_eq!(state.current_epoch, 4);
        state.step(-2);
        assert_eq!(state.current_epoch, 2);
        state.step(-10);
        assert_eq!(state.current_epoch, 0);
    }

    #[test]
    fn test_play_after_finish_restarts() {
        let mut state = playing(2);
        state.advance(0.0, EPOCH);
        state.advance(10.0, EPOCH);
        assert_eq!((state.current_epoch, state.progress), (2, 1.0));

        state.play();
        assert!(state.is_playing());
        assert_eq!(state.current_epoch, 0);
    }

    #[test]
    fn test_start_timestamp_is_first_frame() {
        let mut state = playing(5);
        // play() was called "long before" the first frame arrives; elapsed
        // time counts from the first advance, not from play().
        let advance = state.advance(1000.0, EPOCH);
        assert!(advance.crossings.is_empty());
        assert_eq!(state.current_epoch, 0);

        state.advance(1001.5, EPOCH);
        assert_eq!(state.current_epoch, 1);
    }

    #[test]
    fn test_shrinking_max_clamps_cursor() {
        let mut state = PlaybackState {
            max_epoch: 9,
            ..Default::default()
        };
        state.seek(8);
        state.set_max_epoch(3);
        assert_eq!(state.current_epoch, 3);
    }
}
