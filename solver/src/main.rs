use std::time::Instant;

use sokoroom::builder::BoardBuilder;
use sokoroom::variant::compress_path;
use sokoroom::RoomNetwork;
use tracing::{info, trace, warn};
use tracing_subscriber::EnvFilter;
use unordered_pair::UnorderedPair;

// microban 1
const LEVEL: &str = "####
# .#
#  ###
#*@  #
#  $ #
#  ###
####";

/// The neighbor pair whose product state space is smallest.
fn cheapest_pair(network: &RoomNetwork) -> Option<UnorderedPair<sokoroom::RoomId>> {
    network.neighbor_pairs().into_iter().min_by_key(|pair| {
        let states = |id| network.room(id).map_or(usize::MAX, |room| room.states().len());
        states(pair.0).saturating_mul(states(pair.1))
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let level = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path).unwrap(),
        None => LEVEL.to_string(),
    };
    let board = BoardBuilder::parse(&level).build().unwrap();
    print!("{}", board);

    let started = Instant::now();
    let mut network = RoomNetwork::from_board(board).unwrap();
    let mut progress = |status: &str| {
        trace!(status, "progress");
        true
    };

    network.scan_all(&mut progress).unwrap();
    while let Some(pair) = cheapest_pair(&network) {
        let id = match network.merge(pair.0, pair.1, &mut progress) {
            Ok(id) => id,
            Err(err) => {
                warn!(%err, rooms = network.len(), "giving up");
                return;
            }
        };
        network.scan_deadlocks(id, &mut progress).unwrap();
    }

    match network.best_solution() {
        Some(solution) => {
            info!(%solution, elapsed = ?started.elapsed(), "solved");
            println!("{}", compress_path(&solution.path));
        }
        None => warn!(elapsed = ?started.elapsed(), "no solution"),
    }
}
