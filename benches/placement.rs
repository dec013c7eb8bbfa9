use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uno_overlay::overlay::codec;
use uno_overlay::overlay::model::{Color, OpponentId, PanelState, Position};
use uno_overlay::overlay::placement::{default_opponent_position, LayoutMetrics, ScreenMetrics};

/// Full ring walk for the largest opponent table.
fn bench_ring_placement(c: &mut Criterion) {
    let screen = ScreenMetrics::new(1080, 2280, 2.75);
    let layout = LayoutMetrics::default();
    let anchor = Position::new(400, 900);
    c.bench_function("default_opponent_position_12", |b| {
        b.iter(|| {
            for index in 0..12 {
                black_box(default_opponent_position(
                    black_box(index),
                    anchor,
                    None,
                    screen,
                    &layout,
                ));
            }
        })
    });
}

fn bench_codec(c: &mut Criterion) {
    let mut state = PanelState::default().with_max_opponents(12);
    for i in 0..12 {
        let id = OpponentId::from(format!("id{i}"));
        state = state
            .with_added_opponent(id.clone(), "Opponent; [x]")
            .with_toggled_color(&id, Color::Blue)
            .with_opponent_offset(&id, Position::new(i * 10, i * 20));
    }
    let raw = codec::encode(&state);
    c.bench_function("encode_full_state", |b| {
        b.iter(|| codec::encode(black_box(&state)))
    });
    c.bench_function("decode_full_state", |b| {
        b.iter(|| codec::decode(black_box(&raw)))
    });
}

criterion_group!(benches, bench_ring_placement, bench_codec);
criterion_main!(benches);
