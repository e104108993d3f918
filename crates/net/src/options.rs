//! Lobby settings blob shared by HostGame, SyncSettings and game searches.

use crate::buffer::{CodecResult, Reader, Writer};
use auproxy_core::{KillDistance, Language, MapId, TaskBarUpdate, Wire};
use serde::{Deserialize, Serialize};

/// Settings for one lobby.
///
/// The blob is versioned: `emergency_cooldown` exists from version 2,
/// `confirm_ejects`/`visual_tasks` from 3, `anonymous_voting`/`task_bar_updates`
/// from 4. Each group is read only when the version allows it *and* enough bytes
/// remain, so a host that sends a short blob is still accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
    /// Blob layout version.
    pub version: u8,
    /// Lobby capacity.
    pub max_players: u8,
    /// Chat language.
    pub language: Language,
    /// Map.
    pub map: Wire<MapId>,
    /// Player speed multiplier.
    pub player_speed: f32,
    /// Crewmate vision multiplier.
    pub crew_vision: f32,
    /// Impostor vision multiplier.
    pub impostor_vision: f32,
    /// Seconds between kills.
    pub kill_cooldown: f32,
    /// Common task count.
    pub common_tasks: u8,
    /// Long task count.
    pub long_tasks: u8,
    /// Short task count.
    pub short_tasks: u8,
    /// Emergency meetings per player.
    pub emergencies: i32,
    /// Number of impostors.
    pub impostor_count: u8,
    /// Kill range.
    pub kill_distance: Wire<KillDistance>,
    /// Discussion seconds.
    pub discussion_time: i32,
    /// Voting seconds.
    pub voting_time: i32,
    /// Whether these are the stock settings.
    pub is_default: bool,
    /// Seconds before the emergency button can be used (v2+).
    pub emergency_cooldown: Option<u8>,
    /// Whether ejections reveal the role (v3+).
    pub confirm_ejects: Option<bool>,
    /// Whether visual tasks are shown (v3+).
    pub visual_tasks: Option<bool>,
    /// Anonymous votes (v4).
    pub anonymous_voting: Option<bool>,
    /// Task bar refresh mode (v4).
    pub task_bar_updates: Option<Wire<TaskBarUpdate>>,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            version: 3,
            max_players: 10,
            language: Language::ENGLISH,
            map: Wire::Known(MapId::Skeld),
            player_speed: 1.0,
            crew_vision: 1.0,
            impostor_vision: 1.25,
            kill_cooldown: 25.0,
            common_tasks: 1,
            long_tasks: 1,
            short_tasks: 2,
            emergencies: 1,
            impostor_count: 2,
            kill_distance: Wire::Known(KillDistance::Medium),
            discussion_time: 15,
            voting_time: 120,
            is_default: false,
            emergency_cooldown: Some(15),
            confirm_ejects: Some(true),
            visual_tasks: Some(true),
            anonymous_voting: None,
            task_bar_updates: None,
        }
    }
}

impl GameOptions {
    /// Read a packed-length-prefixed options blob.
    pub fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let len = reader.packed()? as usize;
        let mut r = reader.sub(len)?;

        let version = r.u8()?;
        let mut options = GameOptions {
            version,
            max_players: r.u8()?,
            language: Language(r.u32_le()?),
            map: Wire::from_byte(r.u8()?),
            player_speed: r.f32_le()?,
            crew_vision: r.f32_le()?,
            impostor_vision: r.f32_le()?,
            kill_cooldown: r.f32_le()?,
            common_tasks: r.u8()?,
            long_tasks: r.u8()?,
            short_tasks: r.u8()?,
            emergencies: r.i32_le()?,
            impostor_count: r.u8()?,
            kill_distance: Wire::from_byte(r.u8()?),
            discussion_time: r.i32_le()?,
            voting_time: r.i32_le()?,
            is_default: r.bool()?,
            emergency_cooldown: None,
            confirm_ejects: None,
            visual_tasks: None,
            anonymous_voting: None,
            task_bar_updates: None,
        };

        if matches!(version, 2..=4) && r.remaining() >= 1 {
            options.emergency_cooldown = Some(r.u8()?);
        }
        if matches!(version, 3 | 4) && r.remaining() >= 2 {
            options.confirm_ejects = Some(r.bool()?);
            options.visual_tasks = Some(r.bool()?);
        }
        if version == 4 && r.remaining() >= 2 {
            options.anonymous_voting = Some(r.bool()?);
            options.task_bar_updates = Some(Wire::from_byte(r.u8()?));
        }

        Ok(options)
    }

    /// Write the blob with its packed length prefix.
    ///
    /// Trailing groups the version allows but the struct leaves unset are filled
    /// with stock values so the blob keeps the length the version implies.
    pub fn encode(&self, writer: &mut Writer) {
        let mut w = Writer::new();
        w.u8(self.version)
            .u8(self.max_players)
            .u32_le(self.language.0)
            .u8(self.map.byte())
            .f32_le(self.player_speed)
            .f32_le(self.crew_vision)
            .f32_le(self.impostor_vision)
            .f32_le(self.kill_cooldown)
            .u8(self.common_tasks)
            .u8(self.long_tasks)
            .u8(self.short_tasks)
            .i32_le(self.emergencies)
            .u8(self.impostor_count)
            .u8(self.kill_distance.byte())
            .i32_le(self.discussion_time)
            .i32_le(self.voting_time)
            .bool(self.is_default);

        if matches!(self.version, 2..=4) {
            w.u8(self.emergency_cooldown.unwrap_or(15));
        }
        if matches!(self.version, 3 | 4) {
            w.bool(self.confirm_ejects.unwrap_or(true))
                .bool(self.visual_tasks.unwrap_or(true));
        }
        if self.version == 4 {
            w.bool(self.anonymous_voting.unwrap_or(false))
                .u8(self
                    .task_bar_updates
                    .unwrap_or(Wire::Known(TaskBarUpdate::Always))
                    .byte());
        }

        writer.packed(w.len() as u32);
        writer.bytes(w.as_slice());
    }
}
