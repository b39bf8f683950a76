// cl_spawn.rs — entity spawn table, think and touch behaviour
//
// Each entity in the map is matched against a fixed classname table when the
// map is loaded. The table decides whether the entity collides with the
// player, whether it thinks every frame and what happens when the player box
// touches its trigger volume. Trigger volumes are kept in physics units.

use q2move_common::common::{com_dprintf, com_warn};
use q2move_common::entity::Entity;
use q2move_common::q_shared::{vector_is_zero, vector_scale, Vec3, VEC3_ORIGIN, YAW};

/// Default func_rotating speed, degrees per second.
const ROTATING_DEFAULT_SPEED: f32 = 200.0;
/// Pickup model spin, degrees per second.
const WEAPON_SPIN_SPEED: f32 = 100.0;

const WEAPON_HALF_EXTENT: f32 = 16.0;
const TELEPORTER_HALF_EXTENTS: Vec3 = [32.0, 24.0, 32.0];

/// trigger_gravity only works with both of its first two spawnflags set.
const GRAVITY_ACTIVE_SPAWNFLAGS: i32 = 3;

// ============================================================
// Behaviour table
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeaponKind {
    Railgun,
    RocketLauncher,
}

impl WeaponKind {
    pub fn classname(self) -> &'static str {
        match self {
            WeaponKind::Railgun => "weapon_railgun",
            WeaponKind::RocketLauncher => "weapon_rocketlauncher",
        }
    }
}

/// What an entity does in the running world, chosen by classname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityBehavior {
    World,
    PlayerStart,
    Light,
    /// Solid brush model the player collides with.
    ClipModel,
    Plat,
    Rotating,
    TriggerTeleport,
    MiscTeleporter,
    TeleportDestination,
    TriggerGravity,
    Finish,
    Weapon(WeaponKind),
}

static SPAWN_TABLE: &[(&str, EntityBehavior)] = &[
    ("worldspawn", EntityBehavior::World),
    ("info_player_start", EntityBehavior::PlayerStart),
    ("info_player_deathmatch", EntityBehavior::PlayerStart),
    ("weapon_finish", EntityBehavior::Finish),
    ("weapon_railgun", EntityBehavior::Weapon(WeaponKind::Railgun)),
    ("weapon_rocketlauncher", EntityBehavior::Weapon(WeaponKind::RocketLauncher)),
    ("light", EntityBehavior::Light),
    ("func_rotating", EntityBehavior::Rotating),
    ("func_plat", EntityBehavior::Plat),
    ("func_wall", EntityBehavior::ClipModel),
    ("func_door", EntityBehavior::ClipModel),
    ("func_door_rotating", EntityBehavior::ClipModel),
    ("func_train", EntityBehavior::ClipModel),
    ("trigger_teleport", EntityBehavior::TriggerTeleport),
    ("misc_teleporter", EntityBehavior::MiscTeleporter),
    ("trigger_gravity", EntityBehavior::TriggerGravity),
    ("misc_teleporter_dest", EntityBehavior::TeleportDestination),
];

impl EntityBehavior {
    pub fn from_classname(classname: &str) -> Option<Self> {
        SPAWN_TABLE
            .iter()
            .find(|(name, _)| *name == classname)
            .map(|&(_, behavior)| behavior)
    }

    pub fn thinks(self) -> bool {
        matches!(
            self,
            EntityBehavior::Rotating | EntityBehavior::Finish | EntityBehavior::Weapon(_)
        )
    }

    /// Whether the entity reacts to the player box. trigger_gravity also
    /// depends on its spawnflags, see `SpawnedEntity::touches`.
    pub fn touches(self) -> bool {
        matches!(
            self,
            EntityBehavior::TriggerTeleport
                | EntityBehavior::MiscTeleporter
                | EntityBehavior::TriggerGravity
                | EntityBehavior::Finish
                | EntityBehavior::Weapon(_)
        )
    }

    pub fn is_clip_model(self) -> bool {
        matches!(
            self,
            EntityBehavior::ClipModel | EntityBehavior::Plat | EntityBehavior::Rotating
        )
    }
}

// ============================================================
// Touch events
// ============================================================

/// Result of the player touching a trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchEvent {
    /// Destination origin in physics units and facing angles.
    Teleport { origin: Vec3, angles: Vec3 },
    Gravity(f32),
    RunFinished,
    WeaponPickup(WeaponKind),
}

// ============================================================
// Spawned entities
// ============================================================

/// Axis-aligned trigger box, physics units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerVolume {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl TriggerVolume {
    fn around(center: &Vec3, half: &Vec3) -> Self {
        Self {
            mins: [center[0] - half[0], center[1] - half[1], center[2] - half[2]],
            maxs: [center[0] + half[0], center[1] + half[1], center[2] + half[2]],
        }
    }

    pub fn overlaps(&self, mins: &Vec3, maxs: &Vec3) -> bool {
        (0..3).all(|i| mins[i] <= self.maxs[i] && maxs[i] >= self.mins[i])
    }
}

/// Where the player appears on load and on a recall without a stored
/// position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    /// Physics units.
    pub origin: Vec3,
    pub angles: Vec3,
}

impl Default for SpawnPoint {
    fn default() -> Self {
        Self {
            origin: VEC3_ORIGIN,
            angles: VEC3_ORIGIN,
        }
    }
}

/// Runtime record for one map entity that matched the spawn table.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedEntity {
    /// Index into the map's entity list.
    pub entity: usize,
    pub behavior: EntityBehavior,
    pub trigger: Option<TriggerVolume>,
    /// Entities whose targetname matches this entity's target.
    pub targets: Vec<usize>,
    /// Display spin of pickup models, degrees.
    pub spin: f32,
}

impl SpawnedEntity {
    pub fn touches(&self) -> bool {
        self.trigger.is_some()
    }

    pub fn thinks(&self) -> bool {
        self.behavior.thinks()
    }

    /// Event fired when the player box overlaps the trigger volume.
    pub fn touch(&self, entities: &[Entity], scale: f32) -> Option<TouchEvent> {
        let ent = entities.get(self.entity)?;
        match self.behavior {
            EntityBehavior::TriggerTeleport | EntityBehavior::MiscTeleporter => {
                let Some(dest) = self.targets.first().and_then(|&t| entities.get(t)) else {
                    com_dprintf("touch trigger tele, but it has no target\n");
                    return None;
                };
                let origin = vector_scale(&dest.origin, 1.0 / scale);
                com_dprintf(&format!(
                    "touch trigger tele, target is ({} {} {})\n",
                    origin[0], origin[1], origin[2]
                ));
                Some(TouchEvent::Teleport {
                    origin,
                    angles: dest.angles(),
                })
            }
            EntityBehavior::TriggerGravity => {
                com_dprintf(&format!("trigger_gravity: setting gravity to {}\n", ent.gravity));
                Some(TouchEvent::Gravity(ent.gravity as f32))
            }
            EntityBehavior::Finish => Some(TouchEvent::RunFinished),
            // the railgun pickup doubles as a finish line
            EntityBehavior::Weapon(WeaponKind::Railgun) => Some(TouchEvent::RunFinished),
            EntityBehavior::Weapon(kind) => Some(TouchEvent::WeaponPickup(kind)),
            _ => None,
        }
    }

    /// Advance per-frame animation.
    pub fn think(&mut self, ent: &mut Entity, frametime: f32) {
        match self.behavior {
            EntityBehavior::Rotating => {
                let speed = if ent.speed == 0.0 { ROTATING_DEFAULT_SPEED } else { ent.speed };
                ent.move_angles[YAW] = (ent.move_angles[YAW] + speed * frametime) % 360.0;
            }
            EntityBehavior::Weapon(_) => {
                self.spin = (self.spin + WEAPON_SPIN_SPEED * frametime) % 360.0;
            }
            _ => {}
        }
    }
}

/// Trigger volume for an entity, or `None` when it has no active trigger.
/// Brush triggers use their inline model bounds (world units, divided back
/// by `scale`); pickups and teleporter pads use fixed boxes at their origin.
fn trigger_volume(
    behavior: EntityBehavior,
    ent: &Entity,
    model_bounds: Option<(Vec3, Vec3)>,
    scale: f32,
) -> Option<TriggerVolume> {
    let inv = 1.0 / scale;
    match behavior {
        EntityBehavior::TriggerGravity if ent.spawnflags != GRAVITY_ACTIVE_SPAWNFLAGS => None,
        EntityBehavior::TriggerTeleport | EntityBehavior::TriggerGravity | EntityBehavior::Finish => {
            let (mins, maxs) = model_bounds?;
            Some(TriggerVolume {
                mins: vector_scale(&mins, inv),
                maxs: vector_scale(&maxs, inv),
            })
        }
        EntityBehavior::Weapon(_) => Some(TriggerVolume::around(
            &vector_scale(&ent.origin, inv),
            &[WEAPON_HALF_EXTENT; 3],
        )),
        EntityBehavior::MiscTeleporter => Some(TriggerVolume::around(
            &vector_scale(&ent.origin, inv),
            &TELEPORTER_HALF_EXTENTS,
        )),
        _ => None,
    }
}

/// Everything the spawn pass produces.
#[derive(Debug, Clone, Default)]
pub struct SpawnResult {
    pub entities: Vec<SpawnedEntity>,
    pub spawn: SpawnPoint,
}

/// Match every entity against the spawn table. `model_bounds` returns the
/// world-unit bounds of an inline model. Pickups are moved to their origin;
/// info_player_start wins over info_player_deathmatch for the spawn point.
pub fn spawn_entities<F>(entities: &mut [Entity], scale: f32, model_bounds: F) -> SpawnResult
where
    F: Fn(usize) -> Option<(Vec3, Vec3)>,
{
    let mut result = SpawnResult::default();
    let mut spawn_from_start = false;
    let mut have_spawn = false;

    for (i, ent) in entities.iter_mut().enumerate() {
        let Some(behavior) = EntityBehavior::from_classname(&ent.classname) else {
            com_warn(&format!("No definition for entity {}.\n", ent.classname));
            continue;
        };

        match behavior {
            EntityBehavior::PlayerStart => {
                let is_start = ent.classname == "info_player_start";
                if !have_spawn || (is_start && !spawn_from_start) {
                    result.spawn = SpawnPoint {
                        origin: vector_scale(&ent.origin, 1.0 / scale),
                        angles: ent.angles(),
                    };
                    have_spawn = true;
                    spawn_from_start = is_start;
                }
            }
            EntityBehavior::Weapon(_) => {
                ent.move_origin = ent.origin;
                ent.move_angles = ent.angles();
            }
            // brush models built around an origin brush are placed at it
            b if b.is_clip_model() && vector_is_zero(&ent.move_origin) => {
                ent.move_origin = ent.origin;
            }
            _ => {}
        }

        let bounds = ent.model_index().and_then(&model_bounds);
        result.entities.push(SpawnedEntity {
            entity: i,
            behavior,
            trigger: trigger_volume(behavior, ent, bounds, scale),
            targets: Vec::new(),
            spin: 0.0,
        });
    }

    resolve_targets(entities, &mut result.entities);
    result
}

fn resolve_targets(entities: &[Entity], spawned: &mut [SpawnedEntity]) {
    for s in spawned.iter_mut() {
        let target = &entities[s.entity].target;
        if target.is_empty() {
            continue;
        }
        s.targets = entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.targetname == *target)
            .map(|(i, _)| i)
            .collect();
        if s.targets.is_empty() {
            com_dprintf(&format!(
                "{}: no entity with targetname {}\n",
                entities[s.entity].classname, target
            ));
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use q2move_common::common::{com_begin_redirect, com_end_redirect};

    const SCALE: f32 = 0.5;

    fn ent(classname: &str) -> Entity {
        Entity {
            classname: classname.to_string(),
            ..Entity::default()
        }
    }

    fn no_models(_: usize) -> Option<(Vec3, Vec3)> {
        None
    }

    #[test]
    fn test_table_covers_every_classname() {
        for (name, behavior) in SPAWN_TABLE {
            assert_eq!(EntityBehavior::from_classname(name), Some(*behavior));
        }
        assert_eq!(SPAWN_TABLE.len(), 17);
        assert_eq!(EntityBehavior::from_classname("monster_soldier"), None);
    }

    #[test]
    fn test_capabilities() {
        use EntityBehavior::*;
        assert!(Rotating.thinks() && Rotating.is_clip_model() && !Rotating.touches());
        assert!(ClipModel.is_clip_model() && !ClipModel.thinks());
        assert!(Plat.is_clip_model());
        assert!(TriggerTeleport.touches() && !TriggerTeleport.is_clip_model());
        assert!(Finish.touches() && Finish.thinks());
        assert!(Weapon(WeaponKind::Railgun).touches());
        assert!(!TeleportDestination.touches());
        assert!(!World.thinks() && !Light.touches() && !PlayerStart.touches());
    }

    #[test]
    fn test_unknown_classname_warns() {
        let mut ents = vec![ent("worldspawn"), ent("monster_tank")];
        com_begin_redirect();
        let result = spawn_entities(&mut ents, SCALE, no_models);
        let out = com_end_redirect().unwrap();
        assert_eq!(result.entities.len(), 1);
        assert!(out.contains("WARNING: No definition for entity monster_tank."));
    }

    #[test]
    fn test_spawn_point_prefers_player_start() {
        let mut dm = ent("info_player_deathmatch");
        dm.origin = [8.0, 0.0, 0.0];
        let mut start = ent("info_player_start");
        start.origin = [1.0, 2.0, 3.0];
        start.angle = 90.0;
        let mut ents = vec![dm, start];

        let result = spawn_entities(&mut ents, SCALE, no_models);
        assert_eq!(result.spawn.origin, [2.0, 4.0, 6.0]);
        assert_eq!(result.spawn.angles, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_deathmatch_spawn_fallback() {
        let mut dm = ent("info_player_deathmatch");
        dm.origin = [8.0, 0.0, 0.0];
        let mut ents = vec![dm];
        let result = spawn_entities(&mut ents, SCALE, no_models);
        assert_eq!(result.spawn.origin, [16.0, 0.0, 0.0]);
    }

    #[test]
    fn test_target_links() {
        let mut tele = ent("misc_teleporter");
        tele.target = "dest1".to_string();
        let mut dest = ent("misc_teleporter_dest");
        dest.targetname = "dest1".to_string();
        dest.origin = [5.0, 10.0, 0.0];
        dest.angle = 0.0;
        let mut ents = vec![tele, dest];

        let result = spawn_entities(&mut ents, SCALE, no_models);
        let pad = &result.entities[0];
        assert_eq!(pad.targets, vec![1]);

        // 64x48x64 box around the pad origin
        let vol = pad.trigger.unwrap();
        assert_eq!(vol.mins, [-32.0, -24.0, -32.0]);
        assert_eq!(vol.maxs, [32.0, 24.0, 32.0]);

        match pad.touch(&ents, SCALE) {
            Some(TouchEvent::Teleport { origin, angles }) => {
                assert_eq!(origin, [10.0, 20.0, 0.0]);
                assert_eq!(angles, [0.0, 90.0, 0.0]);
            }
            other => panic!("expected teleport, got {:?}", other),
        }
    }

    #[test]
    fn test_teleport_without_target() {
        let mut ents = vec![ent("misc_teleporter")];
        let result = spawn_entities(&mut ents, SCALE, no_models);
        assert!(result.entities[0].targets.is_empty());
        assert_eq!(result.entities[0].touch(&ents, SCALE), None);
    }

    #[test]
    fn test_brush_trigger_uses_model_bounds() {
        let mut tele = ent("trigger_teleport");
        tele.model = "*1".to_string();
        let mut ents = vec![tele];
        let bounds = |i: usize| (i == 1).then_some(([-1.0, 0.0, -1.0], [1.0, 2.0, 1.0]));

        let result = spawn_entities(&mut ents, SCALE, bounds);
        let vol = result.entities[0].trigger.unwrap();
        assert_eq!(vol.mins, [-2.0, 0.0, -2.0]);
        assert_eq!(vol.maxs, [2.0, 4.0, 2.0]);
    }

    #[test]
    fn test_gravity_trigger_needs_spawnflags() {
        let bounds = |_: usize| Some(([0.0; 3], [1.0; 3]));

        let mut off = ent("trigger_gravity");
        off.model = "*1".to_string();
        off.spawnflags = 1;
        let mut on = off.clone();
        on.spawnflags = 3;
        on.gravity = 200;
        let mut ents = vec![off, on];

        let result = spawn_entities(&mut ents, SCALE, bounds);
        assert!(!result.entities[0].touches());
        assert!(result.entities[1].touches());
        assert_eq!(result.entities[1].touch(&ents, SCALE), Some(TouchEvent::Gravity(200.0)));
    }

    #[test]
    fn test_weapon_touches() {
        let mut rail = ent("weapon_railgun");
        rail.origin = [1.0, 1.0, 1.0];
        let mut ents = vec![rail, ent("weapon_rocketlauncher"), ent("weapon_finish")];
        let result = spawn_entities(&mut ents, SCALE, no_models);

        let vol = result.entities[0].trigger.unwrap();
        assert_eq!(vol.mins, [-14.0, -14.0, -14.0]);
        assert_eq!(vol.maxs, [18.0, 18.0, 18.0]);
        assert_eq!(ents[0].move_origin, [1.0, 1.0, 1.0]);

        assert_eq!(result.entities[0].touch(&ents, SCALE), Some(TouchEvent::RunFinished));
        assert_eq!(
            result.entities[1].touch(&ents, SCALE),
            Some(TouchEvent::WeaponPickup(WeaponKind::RocketLauncher))
        );
        // brush finish line without a model has no volume
        assert!(!result.entities[2].touches());
    }

    #[test]
    fn test_think() {
        let mut ents = vec![ent("func_rotating"), ent("weapon_rocketlauncher")];
        ents[0].model = "*1".to_string();
        let mut result = spawn_entities(&mut ents, SCALE, no_models);

        let (rot, weapon) = result.entities.split_at_mut(1);
        rot[0].think(&mut ents[0], 0.5);
        assert_eq!(ents[0].move_angles[YAW], 100.0);

        ents[0].speed = 90.0;
        rot[0].think(&mut ents[0], 1.0);
        assert_eq!(ents[0].move_angles[YAW], 190.0);

        weapon[0].think(&mut ents[1], 0.5);
        assert_eq!(weapon[0].spin, 50.0);
    }

    #[test]
    fn test_rotating_placed_at_origin() {
        let mut rot = ent("func_rotating");
        rot.origin = [4.0, 0.0, 4.0];
        let mut wall = ent("func_wall");
        wall.move_origin = [1.0, 1.0, 1.0];
        wall.origin = [9.0, 9.0, 9.0];
        let mut ents = vec![rot, wall];
        spawn_entities(&mut ents, SCALE, no_models);
        assert_eq!(ents[0].move_origin, [4.0, 0.0, 4.0]);
        assert_eq!(ents[1].move_origin, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_volume_overlap() {
        let vol = TriggerVolume { mins: [0.0; 3], maxs: [10.0; 3] };
        assert!(vol.overlaps(&[-5.0; 3], &[0.0; 3]));
        assert!(vol.overlaps(&[2.0; 3], &[3.0; 3]));
        assert!(!vol.overlaps(&[11.0, 0.0, 0.0], &[12.0, 1.0, 1.0]));
    }
}
