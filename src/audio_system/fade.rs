/// Fade scheduling
///
/// One fade state machine per bus (`Idle -> Fading -> Idle`), advanced by
/// the host's frame delta. Starting a fade on a bus supersedes whatever that
/// bus was doing; the superseded fade's target is abandoned.

use super::backend::ChannelId;
use super::source::Bus;

/// Linear gain interpolation over a duration in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    start: f32,
    end: f32,
    duration: f32,
    elapsed: f32,
}

impl Ramp {
    pub fn new(start: f32, end: f32, duration: f32) -> Self {
        Self {
            start,
            end,
            duration,
            elapsed: 0.0,
        }
    }

    /// Advance by `dt` seconds and return the new gain
    pub fn advance(&mut self, dt: f32) -> f32 {
        if !self.is_complete() {
            self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        }
        self.value()
    }

    pub fn value(&self) -> f32 {
        if self.is_complete() {
            self.end
        } else {
            self.start + (self.end - self.start) * (self.elapsed / self.duration)
        }
    }

    /// Zero or negative durations complete immediately
    pub fn is_complete(&self) -> bool {
        self.duration <= 0.0 || self.elapsed >= self.duration
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn retarget(&mut self, end: f32) {
        self.end = end;
    }
}

/// What happens to a faded channel once its ramp completes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeEnd {
    /// Keep playing at the final gain
    Hold,

    /// Stop playback, then put the channel back at `restore_gain`
    Stop { restore_gain: f32 },
}

/// An in-flight transition on one bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeTask {
    Fade {
        channel: ChannelId,
        ramp: Ramp,
        on_complete: FadeEnd,
    },
    Crossfade {
        outgoing: ChannelId,
        incoming: ChannelId,
        out_ramp: Ramp,
        in_ramp: Ramp,
    },
}

impl FadeTask {
    pub fn fade_in(channel: ChannelId, target: f32, duration: f32) -> Self {
        FadeTask::Fade {
            channel,
            ramp: Ramp::new(0.0, target, duration),
            on_complete: FadeEnd::Hold,
        }
    }

    pub fn fade_out(channel: ChannelId, from: f32, duration: f32) -> Self {
        FadeTask::Fade {
            channel,
            ramp: Ramp::new(from, 0.0, duration),
            on_complete: FadeEnd::Stop { restore_gain: from },
        }
    }

    pub fn crossfade(
        outgoing: ChannelId,
        from: f32,
        incoming: ChannelId,
        target: f32,
        duration: f32,
    ) -> Self {
        FadeTask::Crossfade {
            outgoing,
            incoming,
            out_ramp: Ramp::new(from, 0.0, duration),
            in_ramp: Ramp::new(0.0, target, duration),
        }
    }

    /// Move the audible end point, e.g. after a bus volume change.
    ///
    /// Fade-ins and crossfades head for the new gain; fade-outs restore to it.
    pub fn retarget(&mut self, gain: f32) {
        match self {
            FadeTask::Fade {
                ramp,
                on_complete: FadeEnd::Hold,
                ..
            } => ramp.retarget(gain),
            FadeTask::Fade {
                on_complete: FadeEnd::Stop { restore_gain },
                ..
            } => *restore_gain = gain,
            FadeTask::Crossfade { in_ramp, .. } => in_ramp.retarget(gain),
        }
    }
}

/// Result of a finished fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeOutcome {
    /// Channel reached its target and keeps playing
    Held { channel: ChannelId },

    /// Channel must be stopped and reset to `restore_gain`
    Stopped { channel: ChannelId, restore_gain: f32 },

    /// Outgoing must stop; incoming becomes the bus's steady channel
    Crossfaded {
        outgoing: ChannelId,
        incoming: ChannelId,
    },
}

/// One instruction produced by a tick, applied in order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    Gain { channel: ChannelId, gain: f32 },
    Finished { bus: Bus, outcome: FadeOutcome },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeState {
    Idle,
    Fading,
}

/// Per-bus fade state machines
#[derive(Debug, Default)]
pub struct FadeScheduler {
    slots: [Option<FadeTask>; 2],
}

impl FadeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fade on `bus`, returning the fade it superseded
    pub fn start(&mut self, bus: Bus, task: FadeTask) -> Option<FadeTask> {
        let previous = self.slots[bus.index()].replace(task);
        if previous.is_some() {
            tracing::debug!("Superseded running fade on {} bus", bus);
        }
        previous
    }

    /// Drop the fade on `bus` without completing it
    pub fn cancel(&mut self, bus: Bus) -> Option<FadeTask> {
        self.slots[bus.index()].take()
    }

    pub fn state(&self, bus: Bus) -> FadeState {
        if self.slots[bus.index()].is_some() {
            FadeState::Fading
        } else {
            FadeState::Idle
        }
    }

    pub fn active(&self, bus: Bus) -> Option<&FadeTask> {
        self.slots[bus.index()].as_ref()
    }

    pub fn active_mut(&mut self, bus: Bus) -> Option<&mut FadeTask> {
        self.slots[bus.index()].as_mut()
    }

    /// Advance every running fade by `dt` seconds of unscaled time
    pub fn tick(&mut self, dt: f32) -> Vec<FadeStep> {
        let mut steps = Vec::new();

        for bus in Bus::ALL {
            let slot = &mut self.slots[bus.index()];
            let Some(task) = slot.as_mut() else {
                continue;
            };

            let finished = match task {
                FadeTask::Fade {
                    channel,
                    ramp,
                    on_complete,
                } => {
                    let gain = ramp.advance(dt);
                    steps.push(FadeStep::Gain {
                        channel: *channel,
                        gain,
                    });
                    ramp.is_complete().then(|| match on_complete {
                        FadeEnd::Hold => FadeOutcome::Held { channel: *channel },
                        FadeEnd::Stop { restore_gain } => FadeOutcome::Stopped {
                            channel: *channel,
                            restore_gain: *restore_gain,
                        },
                    })
                }
                FadeTask::Crossfade {
                    outgoing,
                    incoming,
                    out_ramp,
                    in_ramp,
                } => {
                    steps.push(FadeStep::Gain {
                        channel: *outgoing,
                        gain: out_ramp.advance(dt),
                    });
                    steps.push(FadeStep::Gain {
                        channel: *incoming,
                        gain: in_ramp.advance(dt),
                    });
                    (out_ramp.is_complete() && in_ramp.is_complete()).then_some(
                        FadeOutcome::Crossfaded {
                            outgoing: *outgoing,
                            incoming: *incoming,
                        },
                    )
                }
            };

            if let Some(outcome) = finished {
                *slot = None;
                steps.push(FadeStep::Finished { bus, outcome });
            }
        }

        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const A: ChannelId = ChannelId(1);
    const B: ChannelId = ChannelId(2);

    fn gain_of(steps: &[FadeStep], channel: ChannelId) -> Option<f32> {
        steps.iter().rev().find_map(|s| match s {
            FadeStep::Gain { channel: c, gain } if *c == channel => Some(*gain),
            _ => None,
        })
    }

    #[test]
    fn test_ramp_interpolates_and_clamps() {
        let mut ramp = Ramp::new(0.0, 0.8, 2.0);
        assert_relative_eq!(ramp.advance(0.5), 0.2);
        assert_relative_eq!(ramp.advance(0.5), 0.4);
        assert!(!ramp.is_complete());
        assert_eq!(ramp.advance(5.0), 0.8);
        assert!(ramp.is_complete());
        assert_eq!(ramp.elapsed(), 2.0);
    }

    #[test]
    fn test_zero_duration_is_instant() {
        let mut ramp = Ramp::new(1.0, 0.0, 0.0);
        assert!(ramp.is_complete());
        assert_eq!(ramp.value(), 0.0);
        assert_eq!(ramp.advance(0.0), 0.0);

        let ramp = Ramp::new(1.0, 0.3, -1.0);
        assert_eq!(ramp.value(), 0.3);
    }

    #[test]
    fn test_fade_in_is_monotonic_and_exact() {
        let mut scheduler = FadeScheduler::new();
        scheduler.start(Bus::Music, FadeTask::fade_in(A, 0.7, 1.0));

        let mut last = 0.0;
        for _ in 0..9 {
            let steps = scheduler.tick(0.1);
            let gain = gain_of(&steps, A).unwrap();
            assert!(gain >= last);
            last = gain;
        }
        assert_eq!(scheduler.state(Bus::Music), FadeState::Fading);

        let steps = scheduler.tick(0.2);
        assert_eq!(gain_of(&steps, A), Some(0.7));
        assert_eq!(
            steps.last(),
            Some(&FadeStep::Finished {
                bus: Bus::Music,
                outcome: FadeOutcome::Held { channel: A }
            })
        );
        assert_eq!(scheduler.state(Bus::Music), FadeState::Idle);
        assert!(scheduler.tick(0.1).is_empty());
    }

    #[test]
    fn test_fade_out_reports_stop_with_restore_gain() {
        let mut scheduler = FadeScheduler::new();
        scheduler.start(Bus::Music, FadeTask::fade_out(A, 0.6, 0.5));

        let steps = scheduler.tick(0.25);
        assert_relative_eq!(gain_of(&steps, A).unwrap(), 0.3);

        let steps = scheduler.tick(0.25);
        assert_eq!(gain_of(&steps, A), Some(0.0));
        assert!(steps.contains(&FadeStep::Finished {
            bus: Bus::Music,
            outcome: FadeOutcome::Stopped {
                channel: A,
                restore_gain: 0.6
            }
        }));
    }

    #[test]
    fn test_new_fade_supersedes_previous() {
        let mut scheduler = FadeScheduler::new();
        scheduler.start(Bus::Music, FadeTask::fade_in(A, 1.0, 2.0));
        scheduler.tick(1.0);

        let previous = scheduler.start(Bus::Music, FadeTask::fade_out(A, 0.5, 1.0));
        assert!(matches!(previous, Some(FadeTask::Fade { .. })));

        let steps = scheduler.tick(1.0);
        assert_eq!(gain_of(&steps, A), Some(0.0));
        assert!(matches!(
            steps.last(),
            Some(FadeStep::Finished {
                outcome: FadeOutcome::Stopped { .. },
                ..
            })
        ));
        // The first fade's 1.0 target is never reached
        assert!(steps
            .iter()
            .all(|s| !matches!(s, FadeStep::Gain { gain, .. } if *gain == 1.0)));
    }

    #[test]
    fn test_crossfade_shares_one_completion() {
        let mut scheduler = FadeScheduler::new();
        scheduler.start(Bus::Music, FadeTask::crossfade(A, 1.0, B, 0.6, 2.0));

        let steps = scheduler.tick(1.0);
        assert_relative_eq!(gain_of(&steps, A).unwrap(), 0.5);
        assert_relative_eq!(gain_of(&steps, B).unwrap(), 0.3);
        assert_eq!(steps.len(), 2);

        let steps = scheduler.tick(1.5);
        assert_eq!(gain_of(&steps, A), Some(0.0));
        assert_eq!(gain_of(&steps, B), Some(0.6));
        assert_eq!(
            steps.last(),
            Some(&FadeStep::Finished {
                bus: Bus::Music,
                outcome: FadeOutcome::Crossfaded {
                    outgoing: A,
                    incoming: B
                }
            })
        );
    }

    #[test]
    fn test_retarget() {
        let mut task = FadeTask::fade_in(A, 1.0, 1.0);
        task.retarget(0.4);
        assert!(matches!(task, FadeTask::Fade { ramp, .. } if ramp.end() == 0.4));

        let mut task = FadeTask::fade_out(A, 1.0, 1.0);
        task.retarget(0.2);
        assert!(matches!(
            task,
            FadeTask::Fade {
                on_complete: FadeEnd::Stop { restore_gain },
                ..
            } if restore_gain == 0.2
        ));
    }

    #[test]
    fn test_buses_are_independent() {
        let mut scheduler = FadeScheduler::new();
        scheduler.start(Bus::Music, FadeTask::fade_in(A, 1.0, 1.0));
        scheduler.start(Bus::Effects, FadeTask::fade_in(B, 1.0, 1.0));
        assert!(scheduler.cancel(Bus::Effects).is_some());
        assert_eq!(scheduler.state(Bus::Effects), FadeState::Idle);
        assert_eq!(scheduler.state(Bus::Music), FadeState::Fading);
    }
}
