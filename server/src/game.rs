use uuid::Uuid;
use werewolf_protocol::*;

/// One seat in a room. `conn` is a lookup key into the connection registry,
/// never an owning handle; a room outlives any of its sockets.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub conn: Uuid,
    pub name: String,
    pub is_creator: bool,
    pub role: Option<Role>,
    pub alive: bool,
    pub voted: bool,
}

/// One game's full state: players in join order, the current phase, and the
/// current phase's vote ledger. All mutation happens under the room's lock,
/// one inbound action at a time.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub capacity: usize,
    pub werewolf_count: usize,
    pub players: Vec<Player>,
    pub phase: Phase,
    pub votes: VoteLedger,
}

impl Room {
    pub fn new(id: String, capacity: usize, werewolf_count: usize) -> Self {
        Room {
            id,
            capacity,
            werewolf_count,
            players: Vec::new(),
            phase: Phase::Lobby,
            votes: VoteLedger::new(),
        }
    }

    pub fn add_player(&mut self, conn: Uuid, name: String, is_creator: bool) -> PublicPlayer {
        let player = Player {
            id: Uuid::new_v4(),
            conn,
            name,
            is_creator,
            role: None,
            alive: true,
            voted: false,
        };
        let view = public_view(&player);
        self.players.push(player);
        view
    }

    pub fn remove_player_by_conn(&mut self, conn: Uuid) -> Option<Player> {
        let pos = self.players.iter().position(|p| p.conn == conn)?;
        Some(self.players.remove(pos))
    }

    pub fn player_by_conn(&self, conn: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.conn == conn)
    }

    pub fn player_by_id(&self, id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn started(&self) -> bool {
        self.phase != Phase::Lobby
    }

    /// Assigns every player a faction. Called exactly once per room, when
    /// the start countdown fires with the room still full and in lobby.
    pub fn start_game(&mut self) {
        let ids: Vec<Uuid> = self.players.iter().map(|p| p.id).collect();
        let roles = assign_roles(&ids, self.werewolf_count);
        for player in self.players.iter_mut() {
            player.role = roles.get(&player.id).copied();
        }
    }

    pub fn begin_night(&mut self) {
        self.phase = Phase::Night;
        self.reset_votes();
    }

    pub fn begin_day(&mut self) {
        self.phase = Phase::Day;
        self.reset_votes();
    }

    pub fn end(&mut self) {
        self.phase = Phase::Ended;
    }

    fn reset_votes(&mut self) {
        self.votes.clear();
        for player in self.players.iter_mut() {
            player.voted = false;
        }
    }

    /// Night vote. Recorded only from an alive werewolf during the night
    /// phase; anything else is a no-op. A re-vote overwrites in the ledger.
    pub fn record_werewolf_vote(&mut self, voter: Uuid, target: Uuid) -> bool {
        if self.phase != Phase::Night {
            return false;
        }
        let eligible = self
            .players
            .iter()
            .any(|p| p.id == voter && p.alive && p.role == Some(Role::Werewolf));
        if !eligible {
            return false;
        }
        self.votes.record(voter, target);
        self.mark_voted(voter);
        true
    }

    /// Day vote. Any living player may cast one; everything else is a no-op.
    pub fn record_day_vote(&mut self, voter: Uuid, target: Uuid) -> bool {
        if self.phase != Phase::Day {
            return false;
        }
        let eligible = self.players.iter().any(|p| p.id == voter && p.alive);
        if !eligible {
            return false;
        }
        self.votes.record(voter, target);
        self.mark_voted(voter);
        true
    }

    fn mark_voted(&mut self, id: Uuid) {
        if let Some(p) = self.players.iter_mut().find(|p| p.id == id) {
            p.voted = true;
        }
    }

    pub fn all_werewolves_voted(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.alive && p.role == Some(Role::Werewolf))
            .all(|p| p.voted)
    }

    pub fn all_alive_voted(&self) -> bool {
        self.players.iter().filter(|p| p.alive).all(|p| p.voted)
    }

    pub fn eliminate(&mut self, id: Uuid) {
        if let Some(p) = self.players.iter_mut().find(|p| p.id == id) {
            p.alive = false;
        }
    }

    pub fn alive_count(&self, role: Role) -> usize {
        self.players
            .iter()
            .filter(|p| p.alive && p.role == Some(role))
            .count()
    }

    /// Win check, run immediately after every elimination. Villagers win
    /// once no werewolf is left; werewolves win once they are not
    /// outnumbered by villagers.
    pub fn winner(&self) -> Option<Winner> {
        let wolves = self.alive_count(Role::Werewolf);
        let villagers = self.alive_count(Role::Villager);
        if wolves == 0 {
            Some(Winner::Villagers)
        } else if wolves >= villagers {
            Some(Winner::Werewolves)
        } else {
            None
        }
    }

    pub fn roster(&self) -> Vec<PublicPlayer> {
        self.players.iter().map(public_view).collect()
    }

    /// Alive players only; this is the list clients pick vote targets from.
    pub fn alive_targets(&self) -> Vec<TargetInfo> {
        self.players
            .iter()
            .filter(|p| p.alive)
            .map(|p| TargetInfo {
                id: p.id,
                name: p.name.clone(),
            })
            .collect()
    }

    pub fn alive_ids(&self) -> Vec<Uuid> {
        self.players
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.id)
            .collect()
    }

    pub fn werewolves(&self) -> impl Iterator<Item = &Player> {
        self.players
            .iter()
            .filter(|p| p.role == Some(Role::Werewolf))
    }

    pub fn werewolves_public(&self) -> Vec<PublicPlayer> {
        self.werewolves().map(public_view).collect()
    }
}

fn public_view(p: &Player) -> PublicPlayer {
    PublicPlayer {
        id: p.id,
        name: p.name.clone(),
        is_creator: p.is_creator,
        alive: p.alive,
    }
}
