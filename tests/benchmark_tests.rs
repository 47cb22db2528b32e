//! Performance benchmarks for critical client systems

use client::decoder::PacketDecoder;
use client::game::GameState;
use client::motion::MotionExtrapolator;
use client::network::ClientContext;
use client::network::FrameQueue;
use client::view::ViewMapper;
use shared::packet::{decode_minimap, encode_frame, encode_minimap, Packet, PacketType};
use shared::secret::solve;
use shared::{Coordinate, MINIMAP_SIDE};
use std::time::Instant;

fn snake_frame(id: u16, parts: usize) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&id.to_be_bytes());
    payload.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0]);
    payload.extend_from_slice(&5000u16.to_be_bytes());
    payload.extend_from_slice(&[0, 0, 0, 1]);
    for value in [50_000u32, 50_000] {
        payload.extend_from_slice(&value.to_be_bytes()[1..]);
    }
    payload.push(0);
    payload.push(0);
    for value in [40_000u32, 50_000] {
        payload.extend_from_slice(&value.to_be_bytes()[1..]);
    }
    for _ in 0..parts {
        payload.push(137);
        payload.push(127);
    }
    encode_frame(0, PacketType::SnakeData, &payload)
}

/// Benchmarks decoding of large snake data frames
#[test]
fn benchmark_snake_decode() {
    let frame = snake_frame(1, 400);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let packet = Packet::decode(&frame);
        assert!(packet.is_ok());
    }

    let duration = start.elapsed();
    println!(
        "Snake decode: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks applying a mixed stream of small frames to the state
#[test]
fn benchmark_frame_apply() {
    let mut state = GameState::new();
    let mut decoder = PacketDecoder::new();
    decoder.handle(&mut state, &snake_frame(1, 50), 0);

    let frames: Vec<Vec<u8>> = (0..1000u16)
        .map(|i| match i % 4 {
            0 => encode_frame(0, PacketType::MoveRelative, &[0, 1, 129, 128]),
            1 => encode_frame(0, PacketType::FoodSpawn, &[1, 0, (i % 200) as u8, 0, 10, 20]),
            2 => encode_frame(0, PacketType::RotateWithSpeed, &[0, 1, 10, 20, 90]),
            _ => encode_frame(0, PacketType::FamUpdate, &[0, 1, 0x40, 0, 0]),
        })
        .collect();

    let rounds = 100;
    let start = Instant::now();

    for round in 0..rounds {
        for frame in &frames {
            decoder.handle(&mut state, frame, round * 1_000);
        }
        state.maintain();
    }

    let duration = start.elapsed();
    let total = rounds as usize * frames.len();
    println!(
        "Frame apply: {} frames in {:?} ({:.2} ns/frame)",
        total,
        duration,
        duration.as_nanos() as f64 / total as f64
    );

    assert_eq!(decoder.dropped, 0);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks head extrapolation across many snakes
#[test]
fn benchmark_extrapolation() {
    let mut state = GameState::new();
    for id in 0..200u16 {
        let snake = state.snake_mut(id);
        snake.length = 10;
        for i in 0..10 {
            snake.body.push_back(Coordinate::new(1000 + i * 10, 1000 + id as i32));
        }
        snake.speed = Some(5.0);
        snake.angle = Some(0.3);
    }
    let motion = MotionExtrapolator::new();

    let iterations = 1_000u64;
    let start = Instant::now();

    for i in 0..iterations {
        motion.advance(&mut state, i * 16_000);
    }

    let duration = start.elapsed();
    println!(
        "Extrapolation: {} passes over 200 snakes in {:?} ({:.2} μs/pass)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks minimap run-length decoding
#[test]
fn benchmark_minimap_decode() {
    let cells: Vec<bool> = (0..MINIMAP_SIDE * MINIMAP_SIDE)
        .map(|i| (i / 7) % 3 == 0)
        .collect();
    let encoded = encode_minimap(&cells);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let decoded = decode_minimap(&encoded);
        assert_eq!(decoded.len(), cells.len());
    }

    let duration = start.elapsed();
    println!(
        "Minimap decode: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(decode_minimap(&encoded), cells);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the challenge solver
#[test]
fn benchmark_challenge_solve() {
    let mut challenge = [b'q'; 165];
    challenge[..3].copy_from_slice(&[0, 0, b'6']);

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let response = solve(&challenge);
        assert_eq!(response.len(), 24);
    }

    let duration = start.elapsed();
    println!(
        "Challenge solve: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks full render ticks with a populated world
#[test]
fn benchmark_render_tick() {
    let queue = FrameQueue::new();
    let mut context = ClientContext::new(ViewMapper::new(800, 600), queue.clone());
    for id in 0..50u16 {
        queue.push(snake_frame(id, 100));
    }
    queue.push(encode_frame(0, PacketType::SectorAdd, &[33, 33]));

    let iterations = 1_000u64;
    let start = Instant::now();

    for i in 0..iterations {
        let snapshot = context.tick(i * 16_667);
        assert_eq!(snapshot.snakes.len(), 50);
    }

    let duration = start.elapsed();
    println!(
        "Render tick: {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 3 seconds
    assert!(duration.as_millis() < 3000);
}
