use std::collections::HashMap;

use tracing::info;

use crate::services::{audio::OutputDevice, control::Player, sendspin::ClientIdentity};

/// Label of the row that plays through the system default output.
pub const THIS_COMPUTER_LABEL: &str = "This Computer (Music Assistant GTK)";
/// Local output name of the default row.
pub const SYSTEM_DEFAULT_NAME: &str = "System Default";

/// Row identity: Music Assistant player plus optional local output.
pub type TargetKey = (String, Option<String>);

/// One selectable place to send audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    /// Music Assistant player id
    pub player_id: String,
    /// Row label
    pub display_name: String,
    /// Local output id when the row routes this computer's receiver
    pub local_output_id: Option<String>,
    /// Local output name when the row routes this computer's receiver
    pub local_output_name: Option<String>,
}

impl OutputTarget {
    /// Key this row is stored under.
    pub fn key(&self) -> TargetKey {
        (self.player_id.clone(), self.local_output_id.clone())
    }
}

/// The output selection list.
///
/// Remote players become one row each. This computer's own Sendspin player
/// expands into a default row plus one row per local output device, so the
/// user can pick both the player and the device it plays through.
#[derive(Debug)]
pub struct OutputTargets {
    identity: ClientIdentity,
    local_device_names: Vec<String>,
    rows: Vec<OutputTarget>,
    index: HashMap<TargetKey, usize>,
    sendspin_player_id: Option<String>,
    preferred_player_id: Option<String>,
    preferred_local_output_id: Option<String>,
    preferred_local_output_name: Option<String>,
    selected: Option<TargetKey>,
}

impl OutputTargets {
    /// Empty list for the receiver identified by `identity`.
    pub fn new(identity: ClientIdentity) -> Self {
        Self {
            identity,
            local_device_names: Vec::new(),
            rows: Vec::new(),
            index: HashMap::new(),
            sendspin_player_id: None,
            preferred_player_id: None,
            preferred_local_output_id: None,
            preferred_local_output_name: None,
            selected: None,
        }
    }

    /// Names of players that also live on this computer.
    ///
    /// Matching players are labelled "(This Computer)".
    pub fn with_local_device_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.local_device_names = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        self
    }

    /// Restores a persisted selection preference.
    pub fn with_preference(
        mut self,
        player_id: Option<String>,
        local_output_id: Option<String>,
    ) -> Self {
        self.preferred_player_id = player_id;
        self.preferred_local_output_id = local_output_id;
        self
    }

    /// Rows in display order.
    pub fn rows(&self) -> &[OutputTarget] {
        &self.rows
    }

    /// Row for `key`.
    pub fn row(&self, key: &TargetKey) -> Option<&OutputTarget> {
        self.index.get(key).map(|&position| &self.rows[position])
    }

    /// Currently selected row.
    pub fn selected(&self) -> Option<&OutputTarget> {
        self.selected.as_ref().and_then(|key| self.row(key))
    }

    /// Player id of this computer's receiver, once seen in a player list.
    pub fn sendspin_player_id(&self) -> Option<&str> {
        self.sendspin_player_id.as_deref()
    }

    /// Player the user last chose.
    pub fn preferred_player_id(&self) -> Option<&str> {
        self.preferred_player_id.as_deref()
    }

    /// Local output the receiver should play through, `None` for the
    /// system default.
    pub fn preferred_local_output_id(&self) -> Option<&str> {
        self.preferred_local_output_id.as_deref()
    }

    /// Name of the preferred local output.
    pub fn preferred_local_output_name(&self) -> Option<&str> {
        self.preferred_local_output_name.as_deref()
    }

    /// Rebuilds the rows from a player list and the local outputs.
    ///
    /// Returns whether the selection changed.
    pub fn populate(&mut self, players: &[Player], local_outputs: &[OutputDevice]) -> bool {
        self.rows.clear();
        self.index.clear();
        self.sendspin_player_id = None;

        for player in players {
            if self.is_sendspin_player(player) {
                self.sendspin_player_id = Some(player.player_id.clone());
                self.add_sendspin_rows(player, local_outputs);
                continue;
            }
            let label = if self.is_local_player(player) {
                format!("{} (This Computer)", player.name)
            } else {
                player.name.clone()
            };
            self.add_row(OutputTarget {
                player_id: player.player_id.clone(),
                display_name: label,
                local_output_id: None,
                local_output_name: None,
            });
        }

        for row in &self.rows {
            info!("Output option: {} (id={})", row.display_name, row.player_id);
        }

        match self.pick_default_key() {
            Some((player_id, local_output_id)) => {
                self.set_selection(Some(&player_id), local_output_id.as_deref())
            }
            None if players.is_empty() => self.set_selection(None, None),
            None => false,
        }
    }

    /// Row to select after a refresh.
    ///
    /// Tries the preferred row, the preferred player's default row, then the
    /// same two lookups for this computer's receiver, then the first row.
    pub fn pick_default_key(&self) -> Option<TargetKey> {
        let first = self.rows.first()?;

        let candidates = [&self.preferred_player_id, &self.sendspin_player_id];
        for player_id in candidates.into_iter().flatten() {
            let preferred = (player_id.clone(), self.preferred_local_output_id.clone());
            if self.index.contains_key(&preferred) {
                return Some(preferred);
            }
            let fallback = (player_id.clone(), None);
            if self.index.contains_key(&fallback) {
                return Some(fallback);
            }
        }
        Some(first.key())
    }

    /// Selects a row. Returns whether the selection changed.
    ///
    /// Selecting this computer's receiver also records the local output it
    /// should play through.
    pub fn select(&mut self, player_id: &str, local_output_id: Option<&str>) -> bool {
        self.set_selection(Some(player_id), local_output_id)
    }

    /// Whether `player` is this computer's own Sendspin player.
    pub fn is_sendspin_player(&self, player: &Player) -> bool {
        if player.player_id.is_empty() {
            return false;
        }
        if player.player_id == self.identity.client_id {
            return true;
        }
        let name = player.name.trim();
        !name.is_empty()
            && !self.identity.name.is_empty()
            && name.to_lowercase() == self.identity.name.to_lowercase()
    }

    /// Whether `player_id` refers to this computer's own Sendspin player.
    pub fn is_sendspin_player_id(&self, player_id: &str) -> bool {
        if player_id.is_empty() {
            return false;
        }
        self.sendspin_player_id.as_deref() == Some(player_id)
            || player_id == self.identity.client_id
    }

    fn is_local_player(&self, player: &Player) -> bool {
        if self.is_sendspin_player(player) {
            return true;
        }
        let name = player.name.to_lowercase();
        self.local_device_names
            .iter()
            .any(|local| name == *local || name.contains(local.as_str()))
    }

    fn add_sendspin_rows(&mut self, player: &Player, local_outputs: &[OutputDevice]) {
        self.add_row(OutputTarget {
            player_id: player.player_id.clone(),
            display_name: THIS_COMPUTER_LABEL.to_string(),
            local_output_id: None,
            local_output_name: Some(SYSTEM_DEFAULT_NAME.to_string()),
        });
        for output in local_outputs {
            let label = if output.is_usb && !output.name.to_lowercase().contains("usb") {
                format!("{} (USB DAC, This Computer)", output.name)
            } else {
                format!("{} (This Computer)", output.name)
            };
            self.add_row(OutputTarget {
                player_id: player.player_id.clone(),
                display_name: label,
                local_output_id: Some(output.id.clone()),
                local_output_name: Some(output.name.clone()),
            });
        }
    }

    fn add_row(&mut self, row: OutputTarget) {
        let key = row.key();
        match self.index.get(&key) {
            Some(&position) => self.rows[position] = row,
            None => {
                self.index.insert(key, self.rows.len());
                self.rows.push(row);
            }
        }
    }

    fn set_selection(&mut self, player_id: Option<&str>, local_output_id: Option<&str>) -> bool {
        let previous = self.selected.take();
        self.preferred_player_id = player_id.map(str::to_string);

        if let Some(player_id) = player_id.filter(|id| self.is_sendspin_player_id(id)) {
            self.preferred_local_output_id = local_output_id.map(str::to_string);
            let key = (player_id.to_string(), self.preferred_local_output_id.clone());
            self.preferred_local_output_name = self
                .row(&key)
                .and_then(|row| row.local_output_name.clone());
        }

        self.selected =
            player_id.map(|player_id| (player_id.to_string(), local_output_id.map(str::to_string)));
        previous != self.selected
    }
}
