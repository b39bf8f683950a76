// entity.rs — typed entity records built from raw entity dictionaries

use crate::common::com_warn;
use crate::entstring::EntityDict;
use crate::q_shared::{vector_is_zero, vector_scale, Vec3};

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================
// Field definition table
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    LString,
    Int,
    Float,
    /// Three numbers in map order, flipped to x/up/z.
    Vector,
    /// A vector that is a position and takes the world scale.
    Position,
}

/// Identifies the destination field on an `Entity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    Classname,
    Model,
    Target,
    Targetname,
    Pathtarget,
    Deathtarget,
    Killtarget,
    Combattarget,
    Message,
    Team,
    Map,
    Noise,
    Item,
    Sky,
    Nextmap,

    Spawnflags,
    Style,
    Count,
    Health,
    Sounds,
    Dmg,
    Mass,
    Lip,
    Distance,
    Height,
    Gravity,

    Speed,
    Accel,
    Decel,
    Wait,
    Delay,
    Random,
    Volume,
    Attenuation,
    Angle,
    Pausetime,
    Skyrotate,
    Minyaw,
    Maxyaw,
    Minpitch,
    Maxpitch,

    MoveOrigin,
    MoveAngles,
    Origin,
    Angles,
    Skyaxis,
}

pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub target: FieldTarget,
}

pub static FIELDS: &[FieldDef] = &[
    FieldDef { name: "classname",    field_type: FieldType::LString,  target: FieldTarget::Classname },
    FieldDef { name: "model",        field_type: FieldType::LString,  target: FieldTarget::Model },
    FieldDef { name: "target",       field_type: FieldType::LString,  target: FieldTarget::Target },
    FieldDef { name: "targetname",   field_type: FieldType::LString,  target: FieldTarget::Targetname },
    FieldDef { name: "pathtarget",   field_type: FieldType::LString,  target: FieldTarget::Pathtarget },
    FieldDef { name: "deathtarget",  field_type: FieldType::LString,  target: FieldTarget::Deathtarget },
    FieldDef { name: "killtarget",   field_type: FieldType::LString,  target: FieldTarget::Killtarget },
    FieldDef { name: "combattarget", field_type: FieldType::LString,  target: FieldTarget::Combattarget },
    FieldDef { name: "message",      field_type: FieldType::LString,  target: FieldTarget::Message },
    FieldDef { name: "team",         field_type: FieldType::LString,  target: FieldTarget::Team },
    FieldDef { name: "map",          field_type: FieldType::LString,  target: FieldTarget::Map },
    FieldDef { name: "noise",        field_type: FieldType::LString,  target: FieldTarget::Noise },
    FieldDef { name: "item",         field_type: FieldType::LString,  target: FieldTarget::Item },
    FieldDef { name: "sky",          field_type: FieldType::LString,  target: FieldTarget::Sky },
    FieldDef { name: "nextmap",      field_type: FieldType::LString,  target: FieldTarget::Nextmap },

    FieldDef { name: "spawnflags",   field_type: FieldType::Int,      target: FieldTarget::Spawnflags },
    FieldDef { name: "style",        field_type: FieldType::Int,      target: FieldTarget::Style },
    FieldDef { name: "count",        field_type: FieldType::Int,      target: FieldTarget::Count },
    FieldDef { name: "health",       field_type: FieldType::Int,      target: FieldTarget::Health },
    FieldDef { name: "sounds",       field_type: FieldType::Int,      target: FieldTarget::Sounds },
    FieldDef { name: "dmg",          field_type: FieldType::Int,      target: FieldTarget::Dmg },
    FieldDef { name: "mass",         field_type: FieldType::Int,      target: FieldTarget::Mass },
    FieldDef { name: "lip",          field_type: FieldType::Int,      target: FieldTarget::Lip },
    FieldDef { name: "distance",     field_type: FieldType::Int,      target: FieldTarget::Distance },
    FieldDef { name: "height",       field_type: FieldType::Int,      target: FieldTarget::Height },
    FieldDef { name: "gravity",      field_type: FieldType::Int,      target: FieldTarget::Gravity },

    FieldDef { name: "speed",        field_type: FieldType::Float,    target: FieldTarget::Speed },
    FieldDef { name: "accel",        field_type: FieldType::Float,    target: FieldTarget::Accel },
    FieldDef { name: "decel",        field_type: FieldType::Float,    target: FieldTarget::Decel },
    FieldDef { name: "wait",         field_type: FieldType::Float,    target: FieldTarget::Wait },
    FieldDef { name: "delay",        field_type: FieldType::Float,    target: FieldTarget::Delay },
    FieldDef { name: "random",       field_type: FieldType::Float,    target: FieldTarget::Random },
    FieldDef { name: "volume",       field_type: FieldType::Float,    target: FieldTarget::Volume },
    FieldDef { name: "attenuation",  field_type: FieldType::Float,    target: FieldTarget::Attenuation },
    FieldDef { name: "angle",        field_type: FieldType::Float,    target: FieldTarget::Angle },
    FieldDef { name: "pausetime",    field_type: FieldType::Float,    target: FieldTarget::Pausetime },
    FieldDef { name: "skyrotate",    field_type: FieldType::Float,    target: FieldTarget::Skyrotate },
    FieldDef { name: "minyaw",       field_type: FieldType::Float,    target: FieldTarget::Minyaw },
    FieldDef { name: "maxyaw",       field_type: FieldType::Float,    target: FieldTarget::Maxyaw },
    FieldDef { name: "minpitch",     field_type: FieldType::Float,    target: FieldTarget::Minpitch },
    FieldDef { name: "maxpitch",     field_type: FieldType::Float,    target: FieldTarget::Maxpitch },

    FieldDef { name: "move_origin",  field_type: FieldType::Position, target: FieldTarget::MoveOrigin },
    FieldDef { name: "move_angles",  field_type: FieldType::Vector,   target: FieldTarget::MoveAngles },
    FieldDef { name: "origin",       field_type: FieldType::Position, target: FieldTarget::Origin },
    FieldDef { name: "angles",       field_type: FieldType::Vector,   target: FieldTarget::Angles },
    FieldDef { name: "skyaxis",      field_type: FieldType::Vector,   target: FieldTarget::Skyaxis },
];

static FIELDS_INDEX: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();

fn get_fields_index() -> &'static HashMap<&'static str, usize> {
    FIELDS_INDEX.get_or_init(|| {
        FIELDS.iter().enumerate()
            .map(|(i, f)| (f.name, i))
            .collect()
    })
}

// ============================================================
// Entity record
// ============================================================

/// One entity with every known key resolved to its typed slot. Keys that
/// were absent or failed to parse keep their zero default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub classname: String,
    pub model: String,
    pub target: String,
    pub targetname: String,
    pub pathtarget: String,
    pub deathtarget: String,
    pub killtarget: String,
    pub combattarget: String,
    pub message: String,
    pub team: String,
    pub map: String,
    pub noise: String,
    pub item: String,
    pub sky: String,
    pub nextmap: String,

    pub spawnflags: i32,
    pub style: i32,
    pub count: i32,
    pub health: i32,
    pub sounds: i32,
    pub dmg: i32,
    pub mass: i32,
    pub lip: i32,
    pub distance: i32,
    pub height: i32,
    pub gravity: i32,

    pub speed: f32,
    pub accel: f32,
    pub decel: f32,
    pub wait: f32,
    pub delay: f32,
    pub random: f32,
    pub volume: f32,
    pub attenuation: f32,
    pub angle: f32,
    pub pausetime: f32,
    pub skyrotate: f32,
    pub minyaw: f32,
    pub maxyaw: f32,
    pub minpitch: f32,
    pub maxpitch: f32,

    /// World units.
    pub move_origin: Vec3,
    pub move_angles: Vec3,
    /// World units.
    pub origin: Vec3,
    /// The "angles" key as written; see `angles()` for the derived value.
    pub raw_angles: Vec3,
    pub skyaxis: Vec3,
}

impl Entity {
    /// Resolve a raw dictionary. Unknown keys and unparseable values are
    /// reported and skipped.
    pub fn from_dict(dict: &EntityDict, scale: f32) -> Self {
        let mut ent = Entity::default();
        for (key, value) in dict.iter() {
            ent.parse_field(key, value, scale);
        }
        ent
    }

    fn parse_field(&mut self, key: &str, value: &str, scale: f32) {
        let f = match get_fields_index().get(key) {
            Some(&idx) => &FIELDS[idx],
            None => {
                com_warn(&format!("Entity property \"{}\" not found!\n", key));
                return;
            }
        };

        let parsed = match f.field_type {
            FieldType::LString => {
                self.set_string(f.target, value.to_string());
                true
            }
            FieldType::Int => value.trim().parse::<i32>().map(|v| self.set_int(f.target, v)).is_ok(),
            FieldType::Float => parse_float(value).map(|v| self.set_float(f.target, v)).is_some(),
            FieldType::Vector => parse_vector(value).map(|v| self.set_vec3(f.target, v)).is_some(),
            FieldType::Position => parse_vector(value)
                .map(|v| self.set_vec3(f.target, vector_scale(&v, scale)))
                .is_some(),
        };

        if !parsed {
            com_warn(&format!(
                "Couldn't parse entity property \"{}\" value: {}\n",
                key, value
            ));
        }
    }

    fn set_string(&mut self, target: FieldTarget, val: String) {
        match target {
            FieldTarget::Classname    => self.classname = val,
            FieldTarget::Model        => self.model = val,
            FieldTarget::Target       => self.target = val,
            FieldTarget::Targetname   => self.targetname = val,
            FieldTarget::Pathtarget   => self.pathtarget = val,
            FieldTarget::Deathtarget  => self.deathtarget = val,
            FieldTarget::Killtarget   => self.killtarget = val,
            FieldTarget::Combattarget => self.combattarget = val,
            FieldTarget::Message      => self.message = val,
            FieldTarget::Team         => self.team = val,
            FieldTarget::Map          => self.map = val,
            FieldTarget::Noise        => self.noise = val,
            FieldTarget::Item         => self.item = val,
            FieldTarget::Sky          => self.sky = val,
            FieldTarget::Nextmap      => self.nextmap = val,
            _ => {}
        }
    }

    fn set_int(&mut self, target: FieldTarget, val: i32) {
        match target {
            FieldTarget::Spawnflags => self.spawnflags = val,
            FieldTarget::Style      => self.style = val,
            FieldTarget::Count      => self.count = val,
            FieldTarget::Health     => self.health = val,
            FieldTarget::Sounds     => self.sounds = val,
            FieldTarget::Dmg        => self.dmg = val,
            FieldTarget::Mass       => self.mass = val,
            FieldTarget::Lip        => self.lip = val,
            FieldTarget::Distance   => self.distance = val,
            FieldTarget::Height     => self.height = val,
            FieldTarget::Gravity    => self.gravity = val,
            _ => {}
        }
    }

    fn set_float(&mut self, target: FieldTarget, val: f32) {
        match target {
            FieldTarget::Speed       => self.speed = val,
            FieldTarget::Accel       => self.accel = val,
            FieldTarget::Decel       => self.decel = val,
            FieldTarget::Wait        => self.wait = val,
            FieldTarget::Delay       => self.delay = val,
            FieldTarget::Random      => self.random = val,
            FieldTarget::Volume      => self.volume = val,
            FieldTarget::Attenuation => self.attenuation = val,
            FieldTarget::Angle       => self.angle = val,
            FieldTarget::Pausetime   => self.pausetime = val,
            FieldTarget::Skyrotate   => self.skyrotate = val,
            FieldTarget::Minyaw      => self.minyaw = val,
            FieldTarget::Maxyaw      => self.maxyaw = val,
            FieldTarget::Minpitch    => self.minpitch = val,
            FieldTarget::Maxpitch    => self.maxpitch = val,
            _ => {}
        }
    }

    fn set_vec3(&mut self, target: FieldTarget, val: Vec3) {
        match target {
            FieldTarget::MoveOrigin => self.move_origin = val,
            FieldTarget::MoveAngles => self.move_angles = val,
            FieldTarget::Origin     => self.origin = val,
            FieldTarget::Angles     => self.raw_angles = val,
            FieldTarget::Skyaxis    => self.skyaxis = val,
            _ => {}
        }
    }

    /// Facing in engine orientation. A written "angles" vector is mirrored
    /// about 90 degrees on every axis; otherwise only the yaw comes from
    /// "angle" and pitch and roll stay zero.
    pub fn angles(&self) -> Vec3 {
        if !vector_is_zero(&self.raw_angles) {
            [
                90.0 - self.raw_angles[0],
                90.0 - self.raw_angles[1],
                90.0 - self.raw_angles[2],
            ]
        } else {
            [0.0, 90.0 - self.angle, 0.0]
        }
    }

    /// Inline model index from a `"*N"` model key.
    pub fn model_index(&self) -> Option<usize> {
        self.model.strip_prefix('*')?.parse().ok()
    }
}

fn parse_float(s: &str) -> Option<f32> {
    s.trim().replace(',', ".").parse::<f32>().ok()
}

/// Parse up to three space separated numbers in map order (x, y, z with z
/// up) into engine order. Missing trailing numbers stay zero; any number
/// that fails to parse rejects the whole vector.
pub fn parse_vector(s: &str) -> Option<Vec3> {
    let mut v = [0.0f32; 3];
    let mut parts = s.split_whitespace().take(3).peekable();
    parts.peek()?;
    for (i, part) in parts.enumerate() {
        let n = parse_float(part)?;
        match i {
            0 => v[0] = n,
            1 => v[2] = n,
            _ => v[1] = n,
        }
    }
    Some(v)
}

// ============================================================
// Tests
// ============================================================
