//! Scheduler and synthesizer against a rendering mixer.

use mindbell_core::{
    AudioDestination, BellSynthesizer, BellType, EntryId, Event, EventScheduler, Mixer,
    ScheduleOptions, SchedulerConfig, SynthConfig,
};
use mindbell_core::scheduler::EntryState;

const SR: u32 = 8_000;

fn scheduler() -> EventScheduler<Mixer> {
    EventScheduler::new(
        Mixer::new(SR),
        SchedulerConfig::default(),
        SynthConfig {
            sample_rate: SR,
            stop_ramp_ms: 100,
        },
    )
}

fn render(s: &mut EventScheduler<Mixer>, frames: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; frames];
    for block in out.chunks_mut(128) {
        s.destination_mut().render(block);
    }
    out
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

#[test]
fn test_voice_starts_on_target_frame_not_on_pass() {
    let mut s = scheduler();
    let (id, _) = s.schedule(BellType::Small, 50, ScheduleOptions::default());

    // 50ms target is inside the 100ms lookahead of the first pass.
    let events = s.poll();
    assert!(matches!(&events[..], [Event::AudioLoaded { .. }]));
    assert_eq!(s.entry(id).unwrap().state, EntryState::Materialized);

    let out = render(&mut s, 800);
    let target = (0.05 * SR as f64) as usize;
    assert!(out[..=target].iter().all(|&x| x == 0.0));
    assert!(out[target + 1..].iter().any(|&x| x != 0.0));
}

#[test]
fn test_cancel_materialized_entry_silences_within_ramp() {
    let mut s = scheduler();
    let (id, _) = s.schedule(BellType::Big, 0, ScheduleOptions::default());
    s.poll();
    let head = render(&mut s, SR as usize);
    assert!(rms(&head) > 0.01);

    assert!(s.cancel(id));
    assert!(s.entry(id).is_none());
    assert_eq!(s.active().count(), 0);

    // 100ms ramp at 8kHz.
    let ramp = render(&mut s, 800);
    assert!(ramp.iter().any(|&x| x != 0.0));
    let after = render(&mut s, 1_600);
    assert!(after.iter().all(|&x| x == 0.0));
    assert_eq!(s.destination().active_voices(), 0);

    // Idempotent.
    assert!(!s.cancel(id));
    s.poll();
    assert!(!s.is_running());
}

#[test]
fn test_overlapping_bells_mix_independently() {
    let mut s = scheduler();
    let (big, _) = s.schedule(BellType::Big, 0, ScheduleOptions::default());
    let (small, _) = s.schedule(BellType::Small, 0, ScheduleOptions::default());
    s.poll();
    assert_eq!(s.destination().active_voices(), 2);
    render(&mut s, 4_000);

    let canceled = s.cancel_type(BellType::Small);
    assert_eq!(canceled.iter().map(|e| e.id).collect::<Vec<EntryId>>(), vec![small]);
    render(&mut s, 1_600);
    assert_eq!(s.destination().active_voices(), 1);
    assert!(s.entry(big).is_some());
    assert!(rms(&render(&mut s, 800)) > 0.0);
}

#[test]
fn test_capacity_error_drops_entry_and_reports() {
    let mut s = EventScheduler::new(
        Mixer::new(SR).with_max_voices(1),
        SchedulerConfig::default(),
        SynthConfig::default(),
    );
    s.schedule(BellType::Big, 0, ScheduleOptions::default());
    let (second, _) = s.schedule(BellType::Small, 0, ScheduleOptions::default());
    let events = s.poll();

    let errors: Vec<Option<EntryId>> = events
        .iter()
        .filter_map(|e| match e {
            Event::AudioError { entry_id, .. } => Some(*entry_id),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![Some(second)]);
    assert!(s.entry(second).is_none());
    assert_eq!(s.active().count(), 1);
}

#[test]
fn test_offline_render_big_bell_fully_releases() {
    let synth = BellSynthesizer::new(SynthConfig {
        sample_rate: SR,
        stop_ramp_ms: 100,
    });
    let buffer = synth.render_offline(BellType::Big).unwrap();
    assert_eq!(buffer.len(), (synth.duration_s(BellType::Big) * SR as f64) as usize);

    let second = SR as usize;
    let early = rms(&buffer[second..2 * second]);
    let last = rms(&buffer[buffer.len() - second / 10..]);
    assert!(early > 0.01, "early rms {early}");
    assert!(last < 1e-4, "tail rms {last}");
}
