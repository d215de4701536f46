// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end scenarios for the sliding-window matcher.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use fabric::checker::{is_matching, matching_size};
use fabric::{SchedulerConfiguration, SlidingWindow, SwitchScheduler};

fn sw_scheduler(ports: usize, window: usize, seed: u64) -> SwitchScheduler {
    SwitchScheduler::new(
        "sw_qps_test",
        ports,
        window,
        seed,
        SchedulerConfiguration::default(),
    )
    .unwrap()
}

#[test]
fn test_single_hot_voq_drains_exactly() -> anyhow::Result<()> {
    let mut sched = SwitchScheduler::new(
        "hot_voq",
        8,
        16,
        12345,
        SchedulerConfiguration::default(),
    )?;
    for _ in 0..10 {
        sched.add_arrival(0, 0);
    }
    let mut served = 0;
    for _ in 0..100 {
        let matching = sched.tick();
        assert!(is_matching(&matching));
        // Nothing but the (0, 0) pair may ever appear.
        for (output, input) in matching.iter().enumerate() {
            if output == 0 {
                assert!(input.is_none() || *input == Some(0));
            } else {
                assert!(input.is_none());
            }
        }
        served += matching_size(&matching);
    }
    assert_eq!(served, 10);
    assert_eq!(sched.queue_length(0, 0), 0);
    let stats = sched.stats();
    assert_eq!(stats.matches, 10);
    assert_eq!(stats.max_voq, 0);
    Ok(())
}

#[test]
fn test_single_packet_matched_exactly_once() {
    // One packet (3 -> 5): exactly one slot carries it, everything else
    // stays idle.
    let mut sched = sw_scheduler(8, 16, 12345);
    sched.add_arrival(3, 5);
    let mut hits = 0;
    for _ in 0..32 {
        let matching = sched.tick();
        for (output, input) in matching.iter().enumerate() {
            match (output, input) {
                (5, Some(3)) => hits += 1,
                (_, Some(_)) => panic!("unexpected match {:?} on output {}", input, output),
                _ => {}
            }
        }
    }
    assert_eq!(hits, 1);
}

#[test]
fn test_empty_queues_stay_idle() {
    let mut sched = sw_scheduler(4, 8, 7);
    for _ in 0..10 {
        let matching = sched.tick();
        assert_eq!(matching_size(&matching), 0);
    }
    assert_eq!(sched.stats().matches, 0);
}

#[test]
fn test_single_port_switch() {
    // N = 1: the only possible configuration is {0 -> 0}, present exactly
    // while packets are pending.
    let mut sched = sw_scheduler(1, 8, 3);
    for _ in 0..3 {
        sched.add_arrival(0, 0);
    }
    for cycle in 0..8 {
        let matching = sched.tick();
        if cycle < 3 {
            assert_eq!(matching[0], Some(0), "cycle {}", cycle);
        } else {
            assert_eq!(matching[0], None, "cycle {}", cycle);
        }
    }
}

#[test]
fn test_full_mesh_window_fill() {
    // Every VOQ preloaded to 5: a window's worth of iterations must bind
    // at least one full matching's worth of pairs, all of them valid.
    let _logger = env_logger::builder().is_test(true).try_init();
    let ports = 8;
    let window = 16;
    let mut sw = SlidingWindow::new(ports, window, 3, 12345);
    sw.load_traffic(&vec![vec![5u32; ports]; ports]);
    for _ in 0..window {
        sw.run_iteration();
    }
    let mut served = 0;
    for _ in 0..window {
        let matching = sw.graduate();
        assert!(is_matching(&matching));
        served += matching_size(&matching);
    }
    assert!(served >= ports, "only {} pairs bound", served);
    assert!(sw.audit());
}

#[test]
fn test_uniform_half_load_tracks_offered_rate() {
    // Bernoulli(0.5) arrivals per input: the post-warm-up mean matching
    // size settles at the offered N/2.
    let ports = 8;
    let mut sched = sw_scheduler(ports, 16, 12345);
    let mut traffic = Pcg64::seed_from_u64(2024);
    let mut served = 0usize;
    for cycle in 0..1000 {
        for input in 0..ports {
            if traffic.gen_bool(0.5) {
                sched.add_arrival(input, traffic.gen_range(0..ports));
            }
        }
        let matching = sched.tick();
        if cycle >= 200 {
            served += matching_size(&matching);
        }
    }
    let mean = served as f64 / 800.0;
    assert!((3.5..=4.5).contains(&mean), "mean matching size {}", mean);
    assert!(sched.stats().stable);
}

#[test]
fn test_saturation_matching_quality() {
    // Full offered load: one arrival per input per slot. The window must
    // sustain matchings of at least 0.8 N once it is warm.
    let ports = 8;
    let mut sched = sw_scheduler(ports, 16, 12345);
    let mut traffic = Pcg64::seed_from_u64(99);
    let mut served = 0usize;
    for cycle in 0..500 {
        for input in 0..ports {
            sched.add_arrival(input, traffic.gen_range(0..ports));
        }
        let matching = sched.tick();
        if cycle >= 200 {
            served += matching_size(&matching);
        }
    }
    let mean = served as f64 / 300.0;
    assert!(mean >= 0.8 * ports as f64, "mean matching size {}", mean);
}

#[test]
fn test_reset_replays_bit_for_bit() {
    let ports = 8;
    let script = |sched: &mut SwitchScheduler| {
        let mut traffic = Pcg64::seed_from_u64(5150);
        let mut trace = Vec::new();
        for _ in 0..300 {
            for input in 0..ports {
                if traffic.gen_bool(0.7) {
                    sched.add_arrival(input, traffic.gen_range(0..ports));
                }
            }
            trace.push(sched.tick());
        }
        trace
    };
    let mut sched = sw_scheduler(ports, 16, 424242);
    let first = script(&mut sched);
    sched.reset();
    let replay = script(&mut sched);
    assert_eq!(first, replay);
    // A fresh instance under the same seed agrees as well.
    let mut fresh = sw_scheduler(ports, 16, 424242);
    assert_eq!(script(&mut fresh), first);
}

#[test]
fn test_cheap_mode_prefills_window() {
    // One iteration per tick: the first window's worth of ticks only
    // pre-fill, after which the backlog graduates one slot per tick.
    let config = SchedulerConfiguration {
        iterations_per_slot: 1,
        ..Default::default()
    };
    let mut sched = SwitchScheduler::new("cheap", 8, 16, 7, config).unwrap();
    for _ in 0..5 {
        sched.add_arrival(0, 0);
    }
    for _ in 0..16 {
        assert_eq!(matching_size(&sched.tick()), 0);
    }
    let mut served = 0;
    for _ in 0..16 {
        served += matching_size(&sched.tick());
    }
    assert_eq!(served, 5);
}
