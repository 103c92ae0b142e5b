use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::profile::{NO_LOBBY, Profile, ProfileStage};

/// Mints lobby ids. Starts at 1 so that 0 stays free for "no lobby".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyCounter {
    next: u32,
}

impl Default for LobbyCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl LobbyCounter {
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: first.max(1),
        }
    }

    fn mint(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LobbySummary {
    pub lobbies: usize,
    pub largest: usize,
    pub grouped_profiles: usize,
}

/// Group profiles into lobbies from their reported teammates.
///
/// Two profiles share an edge when either one lists the other; teammates
/// outside `profiles` are ignored. Every connected component with at least
/// two members gets a fresh id from `counter`, numbered in order of the
/// component's first member in `profiles`. Singletons keep lobby 0.
pub fn assign_lobbies(profiles: &mut [Profile], counter: &mut LobbyCounter) -> LobbySummary {
    let adjacency = build_adjacency(profiles);
    let mut visited = vec![false; profiles.len()];
    let mut queue = VecDeque::new();
    let mut summary = LobbySummary::default();

    for start in 0..profiles.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let mut component = Vec::new();
        while let Some(node) = queue.pop_front() {
            component.push(node);
            for &next in &adjacency[node] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        let lobby_id = if component.len() >= 2 {
            summary.lobbies += 1;
            summary.largest = summary.largest.max(component.len());
            summary.grouped_profiles += component.len();
            counter.mint()
        } else {
            NO_LOBBY
        };
        for idx in component {
            profiles[idx].lobby_id = lobby_id;
            profiles[idx].stage = ProfileStage::LobbyAssigned;
        }
    }

    log::debug!(
        "lobby inference: {} profiles, {} lobbies, largest {}",
        profiles.len(),
        summary.lobbies,
        summary.largest
    );
    summary
}

fn build_adjacency(profiles: &[Profile]) -> Vec<Vec<usize>> {
    let index: HashMap<u64, usize> = profiles
        .iter()
        .enumerate()
        .map(|(idx, p)| (p.id, idx))
        .collect();
    let mut adjacency = vec![Vec::new(); profiles.len()];
    for (from, profile) in profiles.iter().enumerate() {
        for mate in &profile.recent_teammates {
            let Some(&to) = index.get(&mate.id) else {
                continue;
            };
            if to == from {
                continue;
            }
            adjacency[from].push(to);
            adjacency[to].push(from);
        }
    }
    adjacency
}
