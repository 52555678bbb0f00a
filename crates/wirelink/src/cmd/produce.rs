use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use wirelink_frame::Message;
use wirelink_peer::{Client, PeerError};

use crate::cmd::ProduceArgs;
use crate::exit::{peer_error, CliError, CliResult, FAILURE, SUCCESS};

/// Pause between messages.
const MESSAGE_INTERVAL: Duration = Duration::from_millis(10);
/// Pause between blocks.
const BLOCK_INTERVAL: Duration = Duration::from_secs(10);
/// Payload length bounds, in elements.
const MIN_PAYLOAD_LEN: usize = 600;
const MAX_PAYLOAD_LEN: usize = 1600;

const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ProduceArgs) -> CliResult<i32> {
    let client = Client::connect(&args.address);

    while !client.is_connected() && !client.is_finished() {
        std::thread::sleep(CONNECT_POLL_INTERVAL);
    }
    if !client.is_connected() {
        return Err(CliError::new(
            FAILURE,
            format!("could not connect to {}", args.address),
        ));
    }

    let mut generator = MessageGenerator::new();
    for block in 0..args.blocks {
        send_block(&client, &mut generator, args.block_length)?;
        info!(block = block + 1, of = args.blocks, "block sent");
        if block + 1 < args.blocks {
            std::thread::sleep(BLOCK_INTERVAL);
        }
    }

    client.stop();
    while !client.is_finished() {
        std::thread::sleep(CONNECT_POLL_INTERVAL);
    }

    Ok(SUCCESS)
}

fn send_block(client: &Client, generator: &mut MessageGenerator, count: u32) -> CliResult<()> {
    for _ in 0..count {
        let msg = generator.next_message();
        let sequence = msg.sequence;
        let elements = msg.payload.len();

        match client.send(msg) {
            Ok(()) => info!(sequence, elements, "sent"),
            Err(err @ PeerError::NotConnected) => {
                return Err(peer_error("connection lost", err));
            }
            Err(err) => return Err(peer_error("send failed", err)),
        }

        std::thread::sleep(MESSAGE_INTERVAL);
    }
    Ok(())
}

/// Owns the sequence counter and the randomized-length generator, so
/// multiple producers (or tests) never share state.
struct MessageGenerator {
    next_sequence: u32,
    rng: StdRng,
}

impl MessageGenerator {
    fn new() -> Self {
        Self {
            next_sequence: 0,
            rng: StdRng::from_entropy(),
        }
    }

    #[cfg(test)]
    fn with_seed(seed: u64) -> Self {
        Self {
            next_sequence: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn next_message(&mut self) -> Message {
        self.next_sequence += 1;
        let len = self.rng.gen_range(MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN);
        let payload: Vec<u16> = (0..len as u16).collect();
        Message::new(self.next_sequence, now_secs(), payload)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_monotonic_from_one() {
        let mut generator = MessageGenerator::with_seed(7);
        for expected in 1..=10u32 {
            assert_eq!(generator.next_message().sequence, expected);
        }
    }

    #[test]
    fn payload_lengths_stay_in_bounds() {
        let mut generator = MessageGenerator::with_seed(42);
        for _ in 0..100 {
            let msg = generator.next_message();
            assert!(msg.payload.len() >= MIN_PAYLOAD_LEN);
            assert!(msg.payload.len() <= MAX_PAYLOAD_LEN);
        }
    }

    #[test]
    fn payload_is_an_ascending_ramp() {
        let mut generator = MessageGenerator::with_seed(1);
        let msg = generator.next_message();
        for (i, &value) in msg.payload.iter().enumerate() {
            assert_eq!(value, i as u16);
        }
    }

    #[test]
    fn independent_generators_do_not_interfere() {
        let mut a = MessageGenerator::with_seed(1);
        let mut b = MessageGenerator::with_seed(2);
        a.next_message();
        a.next_message();
        assert_eq!(b.next_message().sequence, 1);
        assert_eq!(a.next_message().sequence, 3);
    }
}
