// cl_world.rs — the loaded map as the player moves through it
//
// Owns the map, the spawned entity records and the list of brush models the
// player collides with. Implements the movement callbacks: world first, then
// every clip model in registration order.

use q2move_common::bspfile::{load_bsp, LoadedMap, NodeRef};
use q2move_common::cmodel::clip_to_entity;
use q2move_common::common::{com_dprintf, com_printf};
use q2move_common::error::MapLoadError;
use q2move_common::pmove::{GameMode, PmoveCallbacks};
use q2move_common::q_shared::{vector_add, vector_scale, Contents, Trace, Vec3};

use crate::cl_spawn::{spawn_entities, SpawnPoint, SpawnedEntity, TouchEvent};
use crate::files::{entity_override_path, map_path, MapSource};

/// A brush model registered for player collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipModel {
    /// Index into the map's entity list.
    pub entity: usize,
    /// Inline model number.
    pub model: usize,
    pub head: NodeRef,
}

pub struct ClientWorld {
    map: LoadedMap,
    world_head: NodeRef,
    spawned: Vec<SpawnedEntity>,
    clip_models: Vec<ClipModel>,
    spawn: SpawnPoint,
}

impl ClientWorld {
    /// Load `maps/<name>.bsp` from `source`, preferring `ent/<name>.ent` for
    /// the entity list when present.
    pub fn load(source: &dyn MapSource, name: &str, scale: f32) -> Result<Self, MapLoadError> {
        let path = map_path(name);
        let data = source.load(&path).ok_or(MapLoadError::NotFound(path))?;

        let entity_override = source
            .load(&entity_override_path(name))
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

        let map = load_bsp(name, &data, scale, entity_override.as_deref())?;
        Self::from_map(map)
    }

    /// Spawn entities and register clip models for an already loaded map.
    pub fn from_map(mut map: LoadedMap) -> Result<Self, MapLoadError> {
        let world_head = map.world_head().ok_or(MapLoadError::NoModels)?;

        let bounds: Vec<(Vec3, Vec3)> = map.models.iter().map(|m| (m.mins, m.maxs)).collect();
        let scale = map.scale;
        let result = spawn_entities(&mut map.entities, scale, |i| bounds.get(i).copied());

        let mut clip_models = Vec::new();
        for s in result.entities.iter().filter(|s| s.behavior.is_clip_model()) {
            let ent = &map.entities[s.entity];
            match ent.model_index().filter(|&i| i > 0).and_then(|i| map.models.get(i).map(|m| (i, m))) {
                Some((model, m)) => clip_models.push(ClipModel {
                    entity: s.entity,
                    model,
                    head: m.head,
                }),
                None => com_dprintf(&format!(
                    "{}: bad model \"{}\", not solid\n",
                    ent.classname, ent.model
                )),
            }
        }

        com_printf(&format!(
            "{}: {} entities, {} clip models\n",
            map.name,
            result.entities.len(),
            clip_models.len()
        ));

        Ok(Self {
            map,
            world_head,
            spawned: result.entities,
            clip_models,
            spawn: result.spawn,
        })
    }

    pub fn map(&self) -> &LoadedMap {
        &self.map
    }

    pub fn scale(&self) -> f32 {
        self.map.scale
    }

    pub fn spawn_point(&self) -> SpawnPoint {
        self.spawn
    }

    pub fn entities(&self) -> &[SpawnedEntity] {
        &self.spawned
    }

    pub fn clip_models(&self) -> &[ClipModel] {
        &self.clip_models
    }

    /// Placement of a clip model in physics space.
    fn clip_transform(&self, cm: &ClipModel) -> (Vec3, Vec3) {
        let ent = &self.map.entities[cm.entity];
        (vector_scale(&ent.move_origin, 1.0 / self.map.scale), ent.move_angles)
    }

    /// Triggers overlapping the player box at `origin`, each at most once.
    /// Nothing fires while flying or spectating.
    pub fn touches(
        &self,
        origin: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        mode: GameMode,
    ) -> Vec<(usize, TouchEvent)> {
        if matches!(mode, GameMode::Flying | GameMode::Spectating) {
            return Vec::new();
        }

        let absmin = vector_add(origin, mins);
        let absmax = vector_add(origin, maxs);
        self.spawned
            .iter()
            .filter(|s| s.trigger.is_some_and(|v| v.overlaps(&absmin, &absmax)))
            .filter_map(|s| Some((s.entity, s.touch(&self.map.entities, self.map.scale)?)))
            .collect()
    }

    /// Run every thinking entity for one frame.
    pub fn think(&mut self, frametime: f32) {
        for s in self.spawned.iter_mut().filter(|s| s.thinks()) {
            if let Some(ent) = self.map.entities.get_mut(s.entity) {
                s.think(ent, frametime);
            }
        }
    }
}

/// Replace the world held in `slot`. The old map is dropped before loading
/// starts, so a failed load leaves the slot empty.
pub fn load_into<'a>(
    slot: &'a mut Option<ClientWorld>,
    source: &dyn MapSource,
    name: &str,
    scale: f32,
) -> Result<&'a mut ClientWorld, MapLoadError> {
    *slot = None;
    let world = ClientWorld::load(source, name, scale)?;
    Ok(slot.insert(world))
}

impl PmoveCallbacks for ClientWorld {
    fn trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3) -> Trace {
        // check against world
        let mut tr = self.map.box_trace(start, end, mins, maxs, self.world_head, Contents::MASK_PLAYERSOLID);

        // check all other solid models
        for (i, cm) in self.clip_models.iter().enumerate() {
            if tr.allsolid {
                break;
            }
            let (origin, angles) = self.clip_transform(cm);
            let t = self.map.transformed_box_trace(
                start,
                end,
                mins,
                maxs,
                cm.head,
                Contents::MASK_PLAYERSOLID,
                &origin,
                &angles,
            );
            clip_to_entity(&mut tr, t, i);
        }
        tr
    }

    fn point_contents(&self, point: &Vec3) -> Contents {
        self.map.world_contents(point)
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::files::tests::MemSource;
    use q2move_common::pmove::{pmove, units_to_fixed, MoveCmd, PmFlags, PmoveData};
    use q2move_common::q_shared::{vector_normalize, UP, YAW};
    use q2move_common::testmap::{box_world, MapBuilder};
    use std::collections::HashMap;

    const SCALE: f32 = 0.015625;
    const FRAMETIME: f32 = 1.0 / 120.0;

    /// Floor with its top at height 0, ±1024 wide.
    pub(crate) fn floor_builder() -> MapBuilder {
        box_world(&[([-1024.0, -1024.0, -64.0], [1024.0, 1024.0, 0.0], Contents::SOLID)])
    }

    /// Add an inline model made of one brush, bounded by the brush.
    pub(crate) fn add_brush_model(b: &mut MapBuilder, mins: Vec3, maxs: Vec3, contents: Contents) -> usize {
        let brush = b.add_brush(mins, maxs, contents);
        let leaf = b.add_leaf(contents, &[brush]);
        let model = b.add_model(leaf);
        b.models[model].mins = mins;
        b.models[model].maxs = maxs;
        model
    }

    pub(crate) fn source_with(name: &str, b: &MapBuilder) -> MemSource {
        let mut files = HashMap::new();
        files.insert(map_path(name), b.build());
        MemSource(files)
    }

    pub(crate) fn world_from(b: &MapBuilder) -> ClientWorld {
        ClientWorld::load(&source_with("test", b), "test", SCALE).unwrap()
    }

    fn walk_toward(dir: Vec3) -> MoveCmd {
        let mut forward = dir;
        vector_normalize(&mut forward);
        MoveCmd {
            forward_move: 1.0,
            forward,
            right: [-forward[2], 0.0, forward[0]],
            ..MoveCmd::default()
        }
    }

    fn player_at(origin: &Vec3) -> PmoveData {
        PmoveData {
            origin: units_to_fixed(origin),
            frametime: FRAMETIME,
            ..PmoveData::default()
        }
    }

    #[test]
    fn test_missing_map() {
        let src = MemSource(HashMap::new());
        let err = ClientWorld::load(&src, "nowhere", SCALE).err().unwrap();
        assert!(matches!(err, MapLoadError::NotFound(ref p) if p == "maps/nowhere.bsp"));
    }

    #[test]
    fn test_bad_map_is_an_error() {
        let mut files = HashMap::new();
        files.insert(map_path("junk"), vec![0u8; 16]);
        assert!(ClientWorld::load(&MemSource(files), "junk", SCALE).is_err());
    }

    #[test]
    fn test_failed_load_empties_slot() {
        let src = source_with("good", &floor_builder());
        let mut slot = None;
        load_into(&mut slot, &src, "good", SCALE).unwrap();
        assert!(slot.is_some());

        assert!(load_into(&mut slot, &src, "missing", SCALE).is_err());
        assert!(slot.is_none());
    }

    #[test]
    fn test_fall_from_player_start() {
        let mut b = floor_builder();
        b.set_entities(
            "{\n\"classname\" \"worldspawn\"\n}\n\
             {\n\"classname\" \"info_player_start\"\n\"origin\" \"0 0 64\"\n\"angle\" \"90\"\n}\n",
        );
        let world = world_from(&b);

        let spawn = world.spawn_point();
        assert_eq!(spawn.origin, [0.0, 64.0, 0.0]);
        assert_eq!(spawn.angles[YAW], 0.0);

        let mut pm = player_at(&spawn.origin);
        for _ in 0..240 {
            pmove(&mut pm, &world);
        }

        // feet settle 1/8 unit above the floor plane
        assert!((pm.origin[UP] - 193).abs() <= 1, "origin {:?}", pm.origin);
        assert!(pm.flags.contains(PmFlags::ON_GROUND));
        assert_eq!(pm.velocity, [0, 0, 0]);
    }

    #[test]
    fn test_entity_override_preferred() {
        let mut b = floor_builder();
        b.set_entities("{\n\"classname\" \"info_player_start\"\n\"origin\" \"0 0 64\"\n}\n");
        let mut src = source_with("ovr", &b);
        src.0.insert(
            entity_override_path("ovr"),
            b"{\n\"classname\" \"info_player_start\"\n\"origin\" \"32 0 128\"\n}\n".to_vec(),
        );

        let world = ClientWorld::load(&src, "ovr", SCALE).unwrap();
        assert_eq!(world.spawn_point().origin, [32.0, 128.0, 0.0]);
    }

    #[test]
    fn test_clip_model_stops_and_slides() {
        let mut b = floor_builder();
        // wall face at x = 64, only as an inline model
        add_brush_model(&mut b, [64.0, -1024.0, 0.0], [128.0, 1024.0, 256.0], Contents::SOLID);
        b.set_entities("{\n\"classname\" \"func_wall\"\n\"model\" \"*1\"\n}\n");
        let world = world_from(&b);
        assert_eq!(world.clip_models().len(), 1);
        assert_eq!(world.clip_models()[0].model, 1);

        let mut pm = player_at(&[0.0, 24.125, 0.0]);
        pm.cmd = walk_toward([1.0, 0.0, 1.0]);
        for _ in 0..120 {
            pmove(&mut pm, &world);
        }

        let origin = pm.origin_units();
        assert!(origin[0] <= 48.0, "went through the wall: {:?}", origin);
        assert!(origin[0] > 40.0, "never reached the wall: {:?}", origin);
        assert!(origin[2] > 64.0, "did not slide: {:?}", origin);
    }

    #[test]
    fn test_trace_reports_clip_model() {
        let mut b = floor_builder();
        add_brush_model(&mut b, [64.0, -64.0, 0.0], [128.0, 64.0, 64.0], Contents::SOLID);
        b.set_entities("{\n\"classname\" \"func_door\"\n\"model\" \"*1\"\n}\n");
        let world = world_from(&b);

        let mins = [-16.0, -24.0, -16.0];
        let maxs = [16.0, 32.0, 16.0];
        let tr = world.trace(&[0.0, 30.0, 0.0], &mins, &maxs, &[100.0, 30.0, 0.0]);
        assert!(tr.fraction < 1.0);
        assert_eq!(tr.clip_model, Some(0));
        assert!((tr.endpos[0] - 48.0).abs() < 0.1, "endpos {:?}", tr.endpos);

        // the floor itself is the world, not a clip model
        let down = world.trace(&[0.0, 30.0, 0.0], &mins, &maxs, &[0.0, 0.0, 0.0]);
        assert!(down.fraction < 1.0);
        assert_eq!(down.clip_model, None);
    }

    #[test]
    fn test_clip_model_without_model_is_not_solid() {
        let mut b = floor_builder();
        b.set_entities("{\n\"classname\" \"func_wall\"\n}\n{\n\"classname\" \"func_plat\"\n\"model\" \"*9\"\n}\n");
        let world = world_from(&b);
        assert_eq!(world.entities().len(), 2);
        assert!(world.clip_models().is_empty());
    }

    #[test]
    fn test_teleport_touch() {
        let mut b = floor_builder();
        let pad = add_brush_model(&mut b, [-32.0, -32.0, 0.0], [32.0, 32.0, 64.0], Contents::empty());
        assert_eq!(pad, 1);
        b.set_entities(
            "{\n\"classname\" \"trigger_teleport\"\n\"model\" \"*1\"\n\"target\" \"far\"\n}\n\
             {\n\"classname\" \"misc_teleporter_dest\"\n\"targetname\" \"far\"\n\"origin\" \"512 256 0\"\n\"angle\" \"0\"\n}\n",
        );
        let world = world_from(&b);

        let mins = [-16.0, -24.0, -16.0];
        let maxs = [16.0, 32.0, 16.0];
        let events: Vec<_> = world
            .touches(&[0.0, 24.125, 0.0], &mins, &maxs, GameMode::Training)
            .into_iter()
            .map(|(_, ev)| ev)
            .collect();
        assert_eq!(
            events,
            vec![TouchEvent::Teleport {
                origin: [512.0, 0.0, 256.0],
                angles: [0.0, 90.0, 0.0],
            }]
        );

        assert!(world.touches(&[0.0, 24.125, 0.0], &mins, &maxs, GameMode::Flying).is_empty());
        assert!(world.touches(&[0.0, 24.125, 0.0], &mins, &maxs, GameMode::Spectating).is_empty());
        assert!(world.touches(&[200.0, 24.125, 0.0], &mins, &maxs, GameMode::Training).is_empty());
    }

    #[test]
    fn test_think_turns_rotating_model() {
        let mut b = floor_builder();
        add_brush_model(&mut b, [-8.0, -8.0, 0.0], [8.0, 8.0, 8.0], Contents::SOLID);
        b.set_entities("{\n\"classname\" \"func_rotating\"\n\"model\" \"*1\"\n\"speed\" \"45\"\n}\n");
        let mut world = world_from(&b);

        world.think(1.0);
        world.think(1.0);
        assert_eq!(world.map().entities[0].move_angles[YAW], 90.0);
        assert_eq!(world.clip_models().len(), 1);
    }
}
