use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// ---- Factions ----
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Villager,
    Werewolf,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Villager => write!(f, "villager"),
            Role::Werewolf => write!(f, "werewolf"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Winner {
    Villagers,
    Werewolves,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Villagers => write!(f, "villagers"),
            Winner::Werewolves => write!(f, "werewolves"),
        }
    }
}

/// ---- Phases ----
///
/// A round alternates Night -> Day; Ended is terminal and accepts no
/// further mutation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Night,
    Day,
    Ended,
}

/// ---- Public views ----
///
/// Roster entry shared with every client. Never carries a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: Uuid,
    pub name: String,
    pub is_creator: bool,
    pub alive: bool,
}

/// One selectable vote target. Target lists only ever contain alive players.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInfo {
    pub id: Uuid,
    pub name: String,
}

/// ---- Role assignment ----
///
/// Partitions `player_ids` into exactly `werewolf_count` werewolves and the
/// rest villagers, via a uniform Fisher-Yates permutation: shuffle all ids,
/// the first W become werewolves. Total over the input set.
pub fn assign_roles(player_ids: &[Uuid], werewolf_count: usize) -> HashMap<Uuid, Role> {
    let mut shuffled = player_ids.to_vec();
    shuffled.shuffle(&mut thread_rng());

    let werewolves: HashSet<Uuid> = shuffled[..werewolf_count].iter().copied().collect();

    player_ids
        .iter()
        .map(|id| {
            let role = if werewolves.contains(id) {
                Role::Werewolf
            } else {
                Role::Villager
            };
            (*id, role)
        })
        .collect()
}

/// ---- Vote ledger ----
///
/// One phase's votes, at most one entry per voter. Insertion order is the
/// tie-break policy: `resolve` scans targets in the order they first appear
/// and a later target only takes the lead with a strictly greater count.
/// A re-vote overwrites the voter's entry in place, keeping its position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteLedger {
    entries: Vec<(Uuid, Uuid)>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, voter: Uuid, target: Uuid) {
        if let Some(entry) = self.entries.iter_mut().find(|(v, _)| *v == voter) {
            entry.1 = target;
        } else {
            self.entries.push((voter, target));
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Count per target, ordered by first appearance in the ledger.
    pub fn counts(&self) -> Vec<(Uuid, u32)> {
        let mut counts: Vec<(Uuid, u32)> = Vec::new();
        for (_, target) in &self.entries {
            match counts.iter_mut().find(|(t, _)| t == target) {
                Some((_, n)) => *n += 1,
                None => counts.push((*target, 1)),
            }
        }
        counts
    }

    /// Plurality winner. The first target to reach the top count keeps it
    /// against later targets tying that count. `None` on an empty ledger.
    pub fn resolve(&self) -> Option<Uuid> {
        let mut best: Option<(Uuid, u32)> = None;
        for (target, count) in self.counts() {
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((target, count)),
            }
        }
        best.map(|(target, _)| target)
    }
}

/// Count per eligible target, zero included, for live vote display.
/// Ledger entries for targets outside `eligible` are appended after.
pub fn counts_for_targets(ledger: &VoteLedger, eligible: &[Uuid]) -> Vec<(Uuid, u32)> {
    let mut counts: Vec<(Uuid, u32)> = eligible.iter().map(|id| (*id, 0)).collect();
    for (target, n) in ledger.counts() {
        match counts.iter_mut().find(|(t, _)| *t == target) {
            Some((_, slot)) => *slot = n,
            None => counts.push((target, n)),
        }
    }
    counts
}

/// ---- Wire messages ----
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientToServer {
    CreateRoom {
        name: String,
        room: String,
        werewolf_count: usize,
        capacity: usize,
    },
    JoinRoom {
        name: String,
        room: String,
    },
    WerewolfVote {
        room: String,
        target_id: Uuid,
    },
    VillagerVote {
        room: String,
        target_id: Uuid,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerToClient {
    Hello {
        your_id: Uuid,
    },
    RoomCreated {
        room: String,
        player: PublicPlayer,
    },
    RoomJoined {
        room: String,
        player: PublicPlayer,
    },
    PlayerJoined {
        players: Vec<PublicPlayer>,
    },
    PlayerLeft {
        player_id: Uuid,
        players: Vec<PublicPlayer>,
    },
    StartCountdown,
    RoleAssigned {
        role: Role,
    },
    NightPhaseStarted,
    /// Unicast to werewolves only: the alive players they may target.
    WerewolfTurn {
        targets: Vec<TargetInfo>,
    },
    NightResult {
        eliminated: String,
        players: Vec<PublicPlayer>,
    },
    DayPhaseStarted {
        targets: Vec<TargetInfo>,
    },
    VoteUpdate {
        counts: Vec<(Uuid, u32)>,
    },
    DayResult {
        eliminated: String,
        players: Vec<PublicPlayer>,
    },
    GameOver {
        winner: Winner,
        werewolves: Vec<PublicPlayer>,
    },
    Error {
        message: String,
    },
}
