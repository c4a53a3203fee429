use polyvoice::{
    engine::{AllocPolicy, PoolId, VoiceState},
    error::AssetError,
    io::{Font, Instrument, LoadStatus, MemoryBank, SampleId, TunedSample},
    sequencing::{ChannelId, LayerId, NoteStatus, PlayerId, SequenceCapacity},
    synth::VoiceId,
    AudioEngine, BufferParams, EngineConfig, NoteOn, NoteOnOutcome, Settings,
};

fn engine(voices: usize) -> AudioEngine<MemoryBank> {
    let mut bank = MemoryBank::new();
    bank.add_font(Font::loaded(
        vec![Some(Instrument::single(
            TunedSample::new(SampleId(7), 1.0),
            Default::default(),
        ))],
        vec![],
    ));
    AudioEngine::new(
        EngineConfig {
            voices,
            sequences: SequenceCapacity {
                players: 2,
                channels: 8,
                layers: 32,
            },
            buffer: BufferParams::default(),
        },
        bank,
    )
}

fn channel(engine: &mut AudioEngine<MemoryBank>, player: PlayerId, priority: u8, policy: u8) -> ChannelId {
    let seq = engine.sequences_mut();
    let id = seq.add_channel(player).unwrap();
    let channel = seq.channel_mut(id).unwrap();
    channel.note_priority = priority;
    channel.alloc_policy = AllocPolicy(policy);
    id
}

fn layer(engine: &mut AudioEngine<MemoryBank>, channel: ChannelId) -> LayerId {
    engine.sequences_mut().add_layer(channel).unwrap()
}

fn note() -> NoteOn {
    NoteOn {
        semitone: 39,
        velocity: 1.0,
        pan: 64,
    }
}

fn playing(outcome: NoteOnOutcome) -> VoiceId {
    match outcome {
        NoteOnOutcome::Playing(voice) => voice,
        other => panic!("expected a voice, got {other:?}"),
    }
}

#[test]
fn steals_the_earliest_lowest_priority_voice() {
    let mut engine = engine(4);
    let settings = Settings::default();
    let player = engine.sequences_mut().add_player().unwrap();
    let low = channel(&mut engine, player, 5, AllocPolicy::GLOBAL_ONLY);
    let high = channel(&mut engine, player, 10, AllocPolicy::GLOBAL_ONLY);
    let lowest = channel(&mut engine, player, 3, AllocPolicy::GLOBAL_ONLY);

    let mut first = Vec::new();
    for _ in 0..4 {
        let l = layer(&mut engine, low);
        first.push((l, playing(engine.note_on(l, note()))));
    }
    let voices: Vec<VoiceId> = first.iter().map(|(_, v)| *v).collect();
    assert_eq!(voices.len(), 4);
    assert!(voices.iter().all(|v| engine.pool().state(*v) == Some(VoiceState::Active)));
    engine.tick(&settings);

    let intruder = layer(&mut engine, high);
    let stolen = playing(engine.note_on(intruder, note()));
    assert_eq!(stolen, first[0].1, "earliest allocated voice is evicted");
    assert_eq!(engine.pool().state(stolen), Some(VoiceState::Releasing));
    assert_eq!(engine.voice(stolen).unwrap().pending(), Some(intruder));
    assert_eq!(engine.voice(stolen).unwrap().priority(), 10);
    for (l, v) in &first[1..] {
        assert_eq!(engine.voice(*v).unwrap().parent(), Some(*l));
    }

    let starved = layer(&mut engine, lowest);
    assert_eq!(engine.note_on(starved, note()), NoteOnOutcome::Dropped);
    assert_eq!(engine.sequences().layer(starved).unwrap().status, NoteStatus::Idle);

    for _ in 0..8 {
        engine.tick(&settings);
    }
    assert_eq!(engine.voice(stolen).unwrap().parent(), Some(intruder));
    assert_eq!(engine.pool().state(stolen), Some(VoiceState::Active));
}

#[test]
fn never_evicts_equal_or_higher_priority() {
    let mut engine = engine(2);
    let player = engine.sequences_mut().add_player().unwrap();
    let a = channel(&mut engine, player, 6, AllocPolicy::GLOBAL_ONLY);
    for _ in 0..2 {
        let l = layer(&mut engine, a);
        playing(engine.note_on(l, note()));
    }

    let same = layer(&mut engine, a);
    assert_eq!(engine.note_on(same, note()), NoteOnOutcome::Dropped);
}

#[test]
fn free_voices_come_before_stealing() {
    let mut engine = engine(3);
    let settings = Settings::default();
    let player = engine.sequences_mut().add_player().unwrap();
    let ch = channel(&mut engine, player, 5, 0);
    let pool = engine.sequences().channel(ch).unwrap().pool();
    assert_eq!(engine.reset_pool(pool, 1), 1);

    let a = layer(&mut engine, ch);
    let b = layer(&mut engine, ch);
    let first = playing(engine.note_on(a, note()));
    assert_eq!(engine.pool().home(first), pool, "channel pool is tried first");
    engine.tick(&settings);

    let second = playing(engine.note_on(b, note()));
    assert_eq!(engine.pool().home(second), PoolId::GLOBAL);
    assert_eq!(engine.pool().state(second), Some(VoiceState::Active));
    assert_eq!(engine.voice(first).unwrap().pending(), None);
}

#[test]
fn decaying_voices_are_reclaimed_before_active_ones() {
    let mut engine = engine(2);
    let settings = Settings::default();
    let player = engine.sequences_mut().add_player().unwrap();
    let ch = channel(&mut engine, player, 5, AllocPolicy::GLOBAL_ONLY);
    let a = layer(&mut engine, ch);
    let b = layer(&mut engine, ch);
    let va = playing(engine.note_on(a, note()));
    let vb = playing(engine.note_on(b, note()));
    engine.tick(&settings);

    engine.note_off(a);
    assert_eq!(engine.pool().state(va), Some(VoiceState::Decaying));

    let c = layer(&mut engine, ch);
    let vc = playing(engine.note_on(c, note()));
    assert_eq!(vc, va);
    assert_eq!(engine.pool().state(va), Some(VoiceState::Releasing));
    assert_eq!(engine.voice(vb).unwrap().parent(), Some(b));
}

#[test]
fn reuse_last_repossesses_the_released_voice() {
    let mut engine = engine(2);
    let settings = Settings::default();
    let player = engine.sequences_mut().add_player().unwrap();
    let ch = channel(
        &mut engine,
        player,
        5,
        AllocPolicy::REUSE_LAST | AllocPolicy::GLOBAL_ONLY,
    );
    let l = layer(&mut engine, ch);

    let voice = playing(engine.note_on(l, note()));
    engine.tick(&settings);
    engine.note_off(l);
    assert_eq!(engine.voice(voice).unwrap().previous(), Some(l));

    let again = playing(engine.note_on(l, note()));
    assert_eq!(again, voice, "free voice ignored in favour of the previous one");
    assert_eq!(engine.pool().state(voice), Some(VoiceState::Releasing));
    assert_eq!(engine.voice(voice).unwrap().pending(), Some(l));
}

#[test]
fn unheard_voice_goes_straight_back_to_disabled() {
    let mut engine = engine(1);
    let player = engine.sequences_mut().add_player().unwrap();
    let ch = channel(&mut engine, player, 5, 0);
    let l = layer(&mut engine, ch);
    let voice = playing(engine.note_on(l, note()));

    engine.note_off(l);

    assert_eq!(engine.pool().state(voice), Some(VoiceState::Disabled));
    assert!(engine.voice(voice).unwrap().is_idle());
}

#[test]
fn channel_pool_policy_stays_inside_the_channel() {
    let mut engine = engine(2);
    let player = engine.sequences_mut().add_player().unwrap();
    let ch = channel(&mut engine, player, 5, AllocPolicy::CHANNEL_ONLY);

    let l = layer(&mut engine, ch);

    // Global voices exist but the channel pool is empty
    assert_eq!(engine.note_on(l, note()), NoteOnOutcome::Dropped);

    let pool = engine.sequences().channel(ch).unwrap().pool();
    engine.reset_pool(pool, 1);
    let voice = playing(engine.note_on(l, note()));
    assert_eq!(engine.pool().home(voice), pool);
}

#[test]
fn reset_pool_is_clamped_to_free_voices() {
    let mut engine = engine(3);
    let player = engine.sequences_mut().add_player().unwrap();
    let player_pool = engine.sequences().player(player).unwrap().pool();
    let ch = channel(&mut engine, player, 5, 0);
    let channel_pool = engine.sequences().channel(ch).unwrap().pool();

    assert_eq!(engine.reset_pool(player_pool, 2), 2);
    assert_eq!(engine.reset_pool(channel_pool, 4), 1);
    assert_eq!(engine.reset_pool(player_pool, 1), 1);
    assert_eq!(engine.pool().len(PoolId::GLOBAL, VoiceState::Disabled), 1);
    assert!(engine.pool().check_membership().is_ok());
}

#[test]
fn missing_instrument_marks_the_layer_failed() {
    let mut engine = engine(2);
    engine.bank_mut().set_status(0, LoadStatus::Loading);
    let player = engine.sequences_mut().add_player().unwrap();
    let ch = channel(&mut engine, player, 5, 0);
    let l = layer(&mut engine, ch);

    let outcome = engine.note_on(l, note());

    assert_eq!(outcome, NoteOnOutcome::AssetNotReady(AssetError::NotLoaded { font: 0 }));
    assert_eq!(engine.sequences().layer(l).unwrap().status, NoteStatus::Failed);
    assert_eq!(engine.pool().len(PoolId::GLOBAL, VoiceState::Disabled), 2);

    engine.bank_mut().set_status(0, LoadStatus::Loaded);
    playing(engine.note_on(l, note()));
    assert_eq!(engine.sequences().layer(l).unwrap().status, NoteStatus::Playing);
}

#[test]
fn detached_layer_is_refused() {
    let mut engine = engine(1);
    let player = engine.sequences_mut().add_player().unwrap();
    let ch = channel(&mut engine, player, 5, 0);
    let l = layer(&mut engine, ch);
    engine.sequences_mut().detach_player(player);

    assert_eq!(engine.note_on(l, note()), NoteOnOutcome::Detached);
}

/// Small deterministic generator so the workload is reproducible.
struct Lcg(u32);

impl Lcg {
    fn next(&mut self, bound: u32) -> u32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.0 >> 16) % bound
    }
}

#[test]
fn pools_stay_disjoint_and_priority_is_respected_under_load() {
    let mut engine = engine(6);
    let settings = Settings::default();
    let player = engine.sequences_mut().add_player().unwrap();
    let channels: Vec<ChannelId> = [(2u8, 0u8), (5, 4), (9, 8), (12, 1)]
        .into_iter()
        .map(|(priority, policy)| channel(&mut engine, player, priority, policy))
        .collect();
    let pool = engine.sequences().player(player).unwrap().pool();
    engine.reset_pool(pool, 2);
    let first_pool = engine.sequences().channel(channels[1]).unwrap().pool();
    engine.reset_pool(first_pool, 1);

    let mut layers: Vec<(LayerId, u8)> = Vec::new();
    for ch in &channels {
        let priority = engine.sequences().channel(*ch).unwrap().note_priority;
        for _ in 0..4 {
            layers.push((layer(&mut engine, *ch), priority));
        }
    }

    let mut rng = Lcg(0x5eed);
    for _ in 0..2_000 {
        let (l, priority) = layers[rng.next(layers.len() as u32) as usize];
        match rng.next(4) {
            0 | 1 => {
                let before: Vec<(VoiceId, Option<LayerId>, u8)> = engine
                    .pool()
                    .voices()
                    .filter(|(id, _)| engine.pool().state(*id) == Some(VoiceState::Active))
                    .map(|(id, v)| (id, v.parent(), v.priority()))
                    .collect();
                engine.note_on(l, note());
                for (id, parent, held) in before {
                    if held >= priority && parent != Some(l) {
                        assert_eq!(
                            engine.voice(id).unwrap().parent(),
                            parent,
                            "voice {id:?} at priority {held} evicted by {priority}"
                        );
                    }
                }
            }
            2 => engine.note_off(l),
            _ => engine.tick(&settings),
        }
        assert_eq!(engine.pool().check_membership(), Ok(()));
        assert_eq!(engine.pool().capacity(), 6);
    }
}
