use rand::seq::SliceRandom;
use rand::Rng;

/// One generated round-robin pairing within a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub match_number: i64,
    pub round_number: i64,
    pub restaurant1_id: i64,
    pub restaurant2_id: i64,
}

/// Round-robin fixtures for one group: every participant faces every other
/// exactly once, C(N,2) matches in total.
///
/// The round number advances every two matches scheduled. That is the
/// historical behavior this engine reproduces; it is not a proper
/// round-robin round assignment for odd group sizes.
pub fn round_robin_fixtures(participants: &[i64]) -> Vec<Fixture> {
    let mut fixtures = Vec::new();
    let mut match_number = 1i64;

    for (i, &first) in participants.iter().enumerate() {
        for &second in &participants[i + 1..] {
            fixtures.push(Fixture {
                match_number,
                round_number: (match_number - 1) / 2 + 1,
                restaurant1_id: first,
                restaurant2_id: second,
            });
            match_number += 1;
        }
    }

    fixtures
}

/// Single-elimination pairings: shuffle the advancing list and pair
/// consecutive entries.
///
/// An odd participant count drops the last shuffled entry; there is no bye
/// advancement.
pub fn knockout_pairings<R: Rng>(advancing: &[i64], rng: &mut R) -> Vec<(i64, i64)> {
    let mut shuffled = advancing.to_vec();
    shuffled.shuffle(rng);

    shuffled
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}

/// Distribute shuffled participants round-robin across at least
/// `group_count` groups, opening extra groups when the configured
/// `group_size` would otherwise be exceeded. Group sizes stay within one of
/// each other.
pub fn assign_groups<R: Rng>(
    participants: &[i64],
    group_count: usize,
    group_size: usize,
    rng: &mut R,
) -> Vec<Vec<i64>> {
    let mut shuffled = participants.to_vec();
    shuffled.shuffle(rng);

    let needed = participants.len().div_ceil(group_size.max(1));
    let group_count = group_count.max(1).max(needed);
    let mut groups: Vec<Vec<i64>> = vec![Vec::new(); group_count];

    for (i, id) in shuffled.into_iter().enumerate() {
        groups[i % group_count].push(id);
    }

    groups.retain(|g| !g.is_empty());
    groups
}
