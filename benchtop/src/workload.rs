use csmt::Operation;
use rand::{Rng, SeedableRng};
use std::time::Duration;

// Mean inter-arrival gap of the generated stream.
const MEAN_GAP_US: f64 = 20.0;

/// One timestamped operation. Arrivals are offsets from the start of the
/// stream; playback sleeps until each offset before submitting.
pub struct Event {
    pub arrival: Duration,
    pub op: Operation,
}

/// Generate `total_ops` operations with exponentially distributed
/// inter-arrival times. `read_percent` of them are reads, split evenly
/// between root and random-leaf reads; the rest are updates of random leaves
/// with small numeric string values.
pub fn generate(depth: usize, total_ops: usize, read_percent: u8, seed: u64) -> Vec<Event> {
    let mut rng = rand_pcg::Pcg32::seed_from_u64(seed);
    let mut stream = Vec::with_capacity(total_ops);
    let mut arrival_us = 0.0f64;

    for _ in 0..total_ops {
        // Inverse-transform sample of the exponential gap.
        let uniform: f64 = rng.gen();
        arrival_us += -MEAN_GAP_US * (1.0 - uniform).ln();

        let op = if rng.gen_range(0..100u8) < read_percent {
            if rng.gen::<bool>() {
                Operation::ReadRoot
            } else {
                Operation::ReadLeaf {
                    key: random_key(&mut rng, depth),
                }
            }
        } else {
            Operation::Update {
                key: random_key(&mut rng, depth),
                value: rng.gen_range(0..1000u32).to_string(),
            }
        };

        stream.push(Event {
            arrival: Duration::from_micros(arrival_us as u64),
            op,
        });
    }

    stream
}

fn random_key(rng: &mut impl Rng, depth: usize) -> String {
    (0..depth).map(|_| if rng.gen() { '1' } else { '0' }).collect()
}
