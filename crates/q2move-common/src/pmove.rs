// pmove.rs — player movement
//
// Runs in physics space: source units with index 1 pointing up. Origins and
// velocities cross the boundary as integer eighths of a unit.

use crate::q_shared::{
    cross_product, dot_product, vector_is_zero, vector_length, vector_ma, vector_normalize,
    vector_scale, CSurface, Contents, SurfaceFlags, Trace, Vec3, UP, VEC3_ORIGIN,
};

// ============================================================
// Constants
// ============================================================

const STEPSIZE: f32 = 18.0;
const MIN_STEP_NORMAL: f32 = 0.7;
const MAX_CLIP_PLANES: usize = 5;
const MAX_BUMPS: usize = 4;
const OVERBOUNCE: f32 = 1.01;
const PARALLEL_PLANE_DOT: f32 = 0.99;

const GROUND_TRACE_DIST: f32 = 0.25;
const GROUND_SKIP_SPEED: f32 = 180.0;
const INPUT_SCALE: f32 = 300.0;

// Movement parameters
const PM_STOPSPEED: f32 = 100.0;
const PM_MAXSPEED: f32 = 300.0;
const PM_DUCKSPEED: f32 = 100.0;
const PM_ACCELERATE: f32 = 10.0;
const PM_AIRACCELERATE: f32 = 1.0;
const PM_WATERACCELERATE: f32 = 10.0;
const PM_FRICTION: f32 = 6.0;
const PM_WATERFRICTION: f32 = 1.0;
const PM_FLYFRICTION: f32 = 9.0;
const PM_WATERMULT: f32 = 0.5;

const WATERJUMP_TIME: f32 = 0.255;

const STAND_VIEWHEIGHT: f32 = 22.0;
const DUCK_VIEWHEIGHT: f32 = -2.0;
const STAND_MAXS_UP: f32 = 32.0;
const DUCK_MAXS_UP: f32 = 4.0;

/// Snap candidates, cheapest adjustments first.
const JITTER_BITS: [u8; 8] = [0, 4, 1, 2, 3, 5, 6, 7];

// ============================================================
// Public movement types
// ============================================================

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PmFlags: u8 {
        const DUCKED         = 1;
        const JUMP_HELD      = 2;
        const ON_GROUND      = 4;
        /// pm_time is a water jump countdown
        const TIME_WATERJUMP = 8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    Flying,
    Spectating,
    Training,
    TimeAttack,
}

impl GameMode {
    /// Accepts a mode name or its index 0-3.
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg.to_ascii_lowercase().as_str() {
            "flying" | "fly" | "0" => Some(GameMode::Flying),
            "spectating" | "1" => Some(GameMode::Spectating),
            "training" | "2" => Some(GameMode::Training),
            "timeattack" | "3" => Some(GameMode::TimeAttack),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GameMode::Flying => "flying",
            GameMode::Spectating => "spectating",
            GameMode::Training => "training",
            GameMode::TimeAttack => "timeattack",
        }
    }
}

/// One frame of player intent. Moves are in `-1..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveCmd {
    pub forward_move: f32,
    pub side_move: f32,
    pub up_move: f32,
    /// Camera basis in physics space.
    pub forward: Vec3,
    pub right: Vec3,
    /// Look pitch in degrees, negative looking up.
    pub pitch: f32,
}

/// In/out block for one `pmove` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PmoveData {
    // state (in/out)
    /// 12.3 fixed point
    pub origin: [i32; 3],
    /// 12.3 fixed point
    pub velocity: [i32; 3],
    pub flags: PmFlags,
    /// Water jump countdown in seconds.
    pub timer: f32,

    // in
    pub mode: GameMode,
    pub noclip: bool,
    pub cmd: MoveCmd,
    /// Impulses queued since the last frame, units per second.
    pub add_velocity: Vec3,
    pub frametime: f32,
    pub gravity: f32,
    pub flyspeed: f32,
    /// Nudge the origin out of solids before moving.
    pub initial_snap: bool,

    // out
    pub mins: Vec3,
    pub maxs: Vec3,
    pub viewheight: f32,
    pub waterlevel: i32,
    pub watertype: Contents,
    pub on_ground: bool,
    pub jumped: bool,
    /// Set when the origin changed height by a step or duck, so the view can
    /// ease into the new height.
    pub step_smooth: bool,
}

impl Default for PmoveData {
    fn default() -> Self {
        Self {
            origin: [0; 3],
            velocity: [0; 3],
            flags: PmFlags::empty(),
            timer: 0.0,
            mode: GameMode::Training,
            noclip: false,
            cmd: MoveCmd::default(),
            add_velocity: VEC3_ORIGIN,
            frametime: 0.0,
            gravity: 800.0,
            flyspeed: 300.0,
            initial_snap: false,
            mins: VEC3_ORIGIN,
            maxs: VEC3_ORIGIN,
            viewheight: 0.0,
            waterlevel: 0,
            watertype: Contents::empty(),
            on_ground: false,
            jumped: false,
            step_smooth: false,
        }
    }
}

impl PmoveData {
    /// Origin in physics units.
    pub fn origin_units(&self) -> Vec3 {
        fixed_to_units(&self.origin)
    }

    pub fn velocity_units(&self) -> Vec3 {
        fixed_to_units(&self.velocity)
    }
}

pub fn fixed_to_units(v: &[i32; 3]) -> Vec3 {
    [v[0] as f32 * 0.125, v[1] as f32 * 0.125, v[2] as f32 * 0.125]
}

/// Truncating conversion to 12.3 fixed point.
pub fn units_to_fixed(v: &Vec3) -> [i32; 3] {
    [(v[0] * 8.0) as i32, (v[1] * 8.0) as i32, (v[2] * 8.0) as i32]
}

// ============================================================
// Callbacks trait — the world the mover collides with
// ============================================================

pub trait PmoveCallbacks {
    /// Sweep the player box against everything solid to the player.
    fn trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3) -> Trace;
    /// World contents at a point, for water sampling and ledge checks.
    fn point_contents(&self, point: &Vec3) -> Contents;
}

// ============================================================
// Pmove local state — rebuilt for each pmove
// ============================================================

#[derive(Clone, Default)]
struct PmLocal {
    origin: Vec3,
    velocity: Vec3,
    frametime: f32,

    ground: bool,
    groundsurface: Option<CSurface>,

    ladder: bool,
}

struct PmoveContext<'a, C: PmoveCallbacks> {
    pm: &'a mut PmoveData,
    pml: PmLocal,
    cb: &'a C,
}

/// Slide off of the impacting surface. Backoff into the plane is scaled up
/// by `overbounce`, backoff away from it scaled down.
fn pm_clip_velocity(inv: &Vec3, normal: &Vec3, overbounce: f32) -> Vec3 {
    let mut backoff = dot_product(inv, normal);
    if backoff < 0.0 {
        backoff *= overbounce;
    } else {
        backoff /= overbounce;
    }

    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = inv[i] - normal[i] * backoff;
    }
    out
}

/// Horizontal copy of `v`, normalized.
fn flatten(v: &Vec3) -> Vec3 {
    let mut flat = *v;
    flat[UP] = 0.0;
    vector_normalize(&mut flat);
    flat
}

impl<'a, C: PmoveCallbacks> PmoveContext<'a, C> {
    fn trace(&self, start: &Vec3, end: &Vec3) -> Trace {
        self.cb.trace(start, &self.pm.mins, &self.pm.maxs, end)
    }

    // --------------------------------------------------------
    // Slide move
    // --------------------------------------------------------

    /// Move along the velocity, clipping against whatever is hit.
    fn slide_move(&mut self) {
        let primal_velocity = self.pml.velocity;
        let mut numplanes: usize = 0;
        let mut planes = [[0.0f32; 3]; MAX_CLIP_PLANES];

        let mut time_left = self.pml.frametime;

        for _bumpcount in 0..MAX_BUMPS {
            let end = vector_ma(&self.pml.origin, time_left, &self.pml.velocity);
            let trace = self.trace(&self.pml.origin, &end);

            if trace.allsolid {
                // trapped in another solid
                self.pml.velocity[UP] = 0.0;
                return;
            }

            if trace.fraction > 0.0 {
                // actually covered some distance
                self.pml.origin = trace.endpos;
                numplanes = 0;
            }

            if trace.fraction == 1.0 {
                break; // moved the entire distance
            }

            let normal = match trace.plane {
                Some(plane) => plane.normal,
                None => break,
            };

            time_left -= time_left * trace.fraction;

            if numplanes >= MAX_CLIP_PLANES {
                self.pml.velocity = VEC3_ORIGIN;
                break;
            }

            // same plane as before, push off it instead of clipping again
            if planes[..numplanes]
                .iter()
                .any(|p| dot_product(&normal, p) > PARALLEL_PLANE_DOT)
            {
                for i in 0..3 {
                    self.pml.velocity[i] += normal[i];
                }
                continue;
            }

            planes[numplanes] = normal;
            numplanes += 1;

            // modify velocity so it parallels all of the clip planes
            let mut found = false;
            for i in 0..numplanes {
                self.pml.velocity = pm_clip_velocity(&self.pml.velocity, &planes[i], OVERBOUNCE);
                let ok = (0..numplanes)
                    .filter(|&j| j != i)
                    .all(|j| dot_product(&self.pml.velocity, &planes[j]) >= 0.0);
                if ok {
                    found = true;
                    break;
                }
            }

            if !found {
                // go along the crease
                if numplanes != 2 {
                    self.pml.velocity = VEC3_ORIGIN;
                    break;
                }
                let dir = cross_product(&planes[0], &planes[1]);
                let d = dot_product(&dir, &self.pml.velocity);
                self.pml.velocity = vector_scale(&dir, d);
            }

            // turned against the original velocity, stop dead
            if dot_product(&self.pml.velocity, &primal_velocity) <= 0.0 {
                self.pml.velocity = VEC3_ORIGIN;
                break;
            }
        }
    }

    /// Slide move, then retry from a step higher and keep whichever went
    /// farther horizontally.
    fn step_slide_move(&mut self) {
        let start_o = self.pml.origin;
        let start_v = self.pml.velocity;

        self.slide_move();

        let down_o = self.pml.origin;
        let down_v = self.pml.velocity;

        let mut up = start_o;
        up[UP] += STEPSIZE;

        let trace = self.trace(&up, &up);
        if trace.allsolid {
            return; // can't step up
        }

        // try sliding above
        self.pml.origin = up;
        self.pml.velocity = start_v;

        self.slide_move();

        // push down the final amount
        let mut down = self.pml.origin;
        down[UP] -= STEPSIZE;
        let trace = self.trace(&self.pml.origin, &down);
        if !trace.allsolid {
            self.pml.origin = trace.endpos;
        }

        let up = self.pml.origin;

        let down_dist = (down_o[0] - start_o[0]).powi(2) + (down_o[2] - start_o[2]).powi(2);
        let up_dist = (up[0] - start_o[0]).powi(2) + (up[2] - start_o[2]).powi(2);

        let steep = match trace.plane {
            Some(plane) => plane.normal[UP] < MIN_STEP_NORMAL,
            None => true,
        };

        if down_dist > up_dist || steep {
            self.pml.origin = down_o;
            self.pml.velocity = down_v;
            return;
        }

        // walking along a plane, keep the vertical speed of the flat move
        self.pml.velocity[UP] = down_v[UP];
        self.pm.step_smooth = true;
    }

    // --------------------------------------------------------
    // Friction and acceleration
    // --------------------------------------------------------

    /// Handles both ground friction and water friction.
    fn friction(&mut self) {
        let vel = &mut self.pml.velocity;
        let speed = vector_length(vel);

        if speed < 1.0 {
            vel[0] = 0.0;
            vel[2] = 0.0;
            return;
        }

        let mut drop = 0.0;

        // apply ground friction
        let slick = self
            .pml
            .groundsurface
            .as_ref()
            .is_some_and(|s| s.flags.contains(SurfaceFlags::SLICK));
        if (self.pml.ground && !slick) || self.pml.ladder {
            let control = if speed < PM_STOPSPEED { PM_STOPSPEED } else { speed };
            drop += control * PM_FRICTION * self.pml.frametime;
        }

        // apply water friction
        if self.pm.waterlevel > 0 && !self.pml.ladder {
            drop += speed * PM_WATERFRICTION * self.pm.waterlevel as f32 * self.pml.frametime;
        }

        // scale the velocity
        let newspeed = (speed - drop).max(0.0) / speed;
        *vel = vector_scale(vel, newspeed);
    }

    fn accelerate(&mut self, wishdir: &Vec3, wishspeed: f32, accel: f32) {
        let currentspeed = dot_product(&self.pml.velocity, wishdir);
        let addspeed = wishspeed - currentspeed;
        if addspeed <= 0.0 {
            return;
        }
        let accelspeed = (accel * self.pml.frametime * wishspeed).min(addspeed);
        self.pml.velocity = vector_ma(&self.pml.velocity, accelspeed, wishdir);
    }

    /// Ladder climbing overrides the vertical wish.
    fn add_currents(&self, wishvel: &mut Vec3) {
        if !self.pml.ladder || self.pml.velocity[UP].abs() > 200.0 {
            return;
        }

        let cmd = &self.pm.cmd;
        wishvel[UP] = if cmd.pitch <= -15.0 && cmd.forward_move > 0.0 {
            200.0
        } else if cmd.pitch >= 15.0 && cmd.forward_move > 0.0 {
            -200.0
        } else if cmd.up_move > 0.0 {
            200.0
        } else if cmd.up_move < 0.0 {
            -200.0
        } else {
            0.0
        };

        wishvel[0] = wishvel[0].clamp(-25.0, 25.0);
        wishvel[2] = wishvel[2].clamp(-25.0, 25.0);
    }

    // --------------------------------------------------------
    // Water, air and fly movement
    // --------------------------------------------------------

    fn water_move(&mut self) {
        let cmd = self.pm.cmd;
        let fmove = cmd.forward_move * INPUT_SCALE;
        let smove = cmd.side_move * INPUT_SCALE;
        let umove = cmd.up_move * INPUT_SCALE;

        // user intentions
        let mut wishvel = [0.0; 3];
        for i in 0..3 {
            wishvel[i] = cmd.forward[i] * fmove + cmd.right[i] * smove;
        }

        if fmove == 0.0 && smove == 0.0 && umove == 0.0 {
            wishvel[UP] -= 60.0; // drift towards bottom
        } else {
            wishvel[UP] += umove;
        }

        self.add_currents(&mut wishvel);

        let mut wishdir = wishvel;
        let mut wishspeed = vector_normalize(&mut wishdir);

        if wishspeed > PM_MAXSPEED {
            wishspeed = PM_MAXSPEED;
        }
        wishspeed *= PM_WATERMULT;

        self.accelerate(&wishdir, wishspeed, PM_WATERACCELERATE);
        self.step_slide_move();
    }

    fn air_move(&mut self) {
        let cmd = self.pm.cmd;
        let fmove = cmd.forward_move * INPUT_SCALE;
        let smove = cmd.side_move * INPUT_SCALE;

        let flatforward = flatten(&cmd.forward);
        let flatright = flatten(&cmd.right);

        let mut wishvel = [0.0; 3];
        wishvel[0] = flatforward[0] * fmove + flatright[0] * smove;
        wishvel[2] = flatforward[2] * fmove + flatright[2] * smove;

        self.add_currents(&mut wishvel);

        let mut wishdir = wishvel;
        let mut wishspeed = vector_normalize(&mut wishdir);

        // clamp to server defined max speed
        let maxspeed = if self.pm.flags.contains(PmFlags::DUCKED) {
            PM_DUCKSPEED
        } else {
            PM_MAXSPEED
        };

        if wishspeed > maxspeed {
            wishvel = vector_scale(&wishvel, maxspeed / wishspeed);
            wishspeed = maxspeed;
        }

        let gravity = self.pm.gravity * self.pml.frametime;

        if self.pml.ladder {
            self.accelerate(&wishdir, wishspeed, PM_ACCELERATE);
            if wishvel[UP] == 0.0 {
                // settle toward zero instead of falling
                let v = &mut self.pml.velocity[UP];
                if *v > 0.0 {
                    *v = (*v - gravity).max(0.0);
                } else {
                    *v = (*v + gravity).min(0.0);
                }
            }
        } else if self.pml.ground {
            // walking on ground
            self.pml.velocity[UP] = 0.0;
            self.accelerate(&wishdir, wishspeed, PM_ACCELERATE);
        } else {
            // not on ground, so little effect on velocity
            self.accelerate(&wishdir, wishspeed, PM_AIRACCELERATE);
            self.pml.velocity[UP] -= gravity;
        }

        self.step_slide_move();
    }

    fn fly_move(&mut self) {
        self.pm.viewheight = STAND_VIEWHEIGHT;

        if !self.pm.noclip {
            self.pm.mins = [-16.0, -24.0, -16.0];
            self.pm.maxs = [16.0, STAND_MAXS_UP, 16.0];
        }

        // friction
        let speed = vector_length(&self.pml.velocity);
        if speed < 1.0 {
            self.pml.velocity = VEC3_ORIGIN;
        } else {
            let control = if speed < PM_STOPSPEED { PM_STOPSPEED } else { speed };
            let drop = control * PM_FLYFRICTION * self.pml.frametime;
            let newspeed = (speed - drop).max(0.0) / speed;
            self.pml.velocity = vector_scale(&self.pml.velocity, newspeed);
        }

        // accelerate
        let cmd = self.pm.cmd;
        let maxspeed = self.pm.flyspeed;
        let fmove = cmd.forward_move * maxspeed;
        let smove = cmd.side_move * maxspeed;

        let mut wishvel = [0.0; 3];
        for i in 0..3 {
            wishvel[i] = cmd.forward[i] * fmove + cmd.right[i] * smove;
        }
        wishvel[UP] += cmd.up_move * maxspeed;

        let mut wishdir = wishvel;
        let mut wishspeed = vector_normalize(&mut wishdir);
        if wishspeed > maxspeed {
            wishspeed = maxspeed;
        }

        self.accelerate(&wishdir, wishspeed, PM_ACCELERATE);
    }

    // --------------------------------------------------------
    // Position classification
    // --------------------------------------------------------

    /// Ground entity and water level.
    fn categorize_position(&mut self) {
        if self.pml.velocity[UP] > GROUND_SKIP_SPEED {
            self.pml.ground = false;
            self.pm.flags.remove(PmFlags::ON_GROUND);
        } else {
            let mut point = self.pml.origin;
            point[UP] -= GROUND_TRACE_DIST;
            let trace = self.trace(&self.pml.origin, &point);
            self.pml.groundsurface = trace.surface;

            let standable = match trace.plane {
                Some(plane) => plane.normal[UP] >= MIN_STEP_NORMAL || trace.startsolid,
                None => false,
            };

            if !standable {
                self.pml.ground = false;
                self.pm.flags.remove(PmFlags::ON_GROUND);
            } else {
                self.pml.ground = true;

                // hitting solid ground will end a waterjump
                if self.pm.flags.contains(PmFlags::TIME_WATERJUMP) {
                    self.pm.flags.remove(PmFlags::TIME_WATERJUMP);
                    self.pm.timer = 0.0;
                }
                self.pm.flags.insert(PmFlags::ON_GROUND);
            }
        }

        // get waterlevel, accounting for ducking
        self.pm.waterlevel = 0;
        self.pm.watertype = Contents::empty();

        let sample2 = self.pm.viewheight as i32 - self.pm.mins[UP] as i32;
        let sample1 = sample2 / 2;
        let feet = self.pml.origin[UP] + self.pm.mins[UP];

        let mut point = self.pml.origin;
        point[UP] = feet + 1.0;
        let cont = self.cb.point_contents(&point);
        if !cont.intersects(Contents::MASK_WATER) {
            return;
        }
        self.pm.watertype = cont;
        self.pm.waterlevel = 1;

        point[UP] = feet + sample1 as f32;
        if !self.cb.point_contents(&point).intersects(Contents::MASK_WATER) {
            return;
        }
        self.pm.waterlevel = 2;

        point[UP] = feet + sample2 as f32;
        if self.cb.point_contents(&point).intersects(Contents::MASK_WATER) {
            self.pm.waterlevel = 3;
        }
    }

    /// Ladder contact and jumping out of water.
    fn check_special_movement(&mut self) {
        if self.pm.timer > 0.0 {
            return;
        }

        self.pml.ladder = false;

        // check for ladder
        let flatforward = flatten(&self.pm.cmd.forward);
        let spot = vector_ma(&self.pml.origin, 1.0, &flatforward);
        let trace = self.trace(&self.pml.origin, &spot);
        if trace.fraction < 1.0 && trace.contents.contains(Contents::LADDER) {
            self.pml.ladder = true;
        }

        // check for water jump
        if self.pm.waterlevel != 2 {
            return;
        }

        let mut spot = vector_ma(&self.pml.origin, 30.0, &flatforward);
        spot[UP] += 4.0;
        if !self.cb.point_contents(&spot).contains(Contents::SOLID) {
            return;
        }

        spot[UP] += 16.0;
        if !self.cb.point_contents(&spot).is_empty() {
            return;
        }

        // jump out of water
        self.pml.velocity = vector_scale(&flatforward, 50.0);
        self.pml.velocity[UP] = 350.0;

        self.pm.flags.insert(PmFlags::TIME_WATERJUMP);
        self.pm.timer = WATERJUMP_TIME;
    }

    fn check_jump(&mut self) {
        if self.pm.cmd.up_move <= 0.0 {
            // not holding jump
            self.pm.flags.remove(PmFlags::JUMP_HELD);
            return;
        }

        // must wait for jump to be released
        if self.pm.flags.contains(PmFlags::JUMP_HELD) {
            return;
        }

        if self.pm.waterlevel >= 2 {
            // swimming, not jumping
            self.pml.ground = false;

            if self.pml.velocity[UP] <= -300.0 {
                return;
            }

            self.pml.velocity[UP] = if self.pm.watertype == Contents::WATER {
                100.0
            } else if self.pm.watertype == Contents::SLIME {
                80.0
            } else {
                50.0
            };
            return;
        }

        if !self.pml.ground {
            return; // in air, so no effect
        }

        self.pm.flags.insert(PmFlags::JUMP_HELD);
        self.pml.ground = false;
        self.pm.flags.remove(PmFlags::ON_GROUND);

        self.pml.velocity[UP] = (self.pml.velocity[UP] + 270.0).max(270.0);
        self.pm.jumped = true;
    }

    /// Sets mins, maxs and viewheight.
    fn check_duck(&mut self) {
        self.pm.mins = [-16.0, -24.0, -16.0];
        self.pm.maxs[0] = 16.0;
        self.pm.maxs[2] = 16.0;

        if self.pm.cmd.up_move < 0.0 && self.pm.flags.contains(PmFlags::ON_GROUND) {
            // duck
            self.pm.flags.insert(PmFlags::DUCKED);
            self.pm.step_smooth = true;
        } else if self.pm.flags.contains(PmFlags::DUCKED) {
            // stand up if possible
            self.pm.maxs[UP] = STAND_MAXS_UP;
            let trace = self.trace(&self.pml.origin, &self.pml.origin);
            if !trace.allsolid {
                self.pm.flags.remove(PmFlags::DUCKED);
            }
        }

        if self.pm.flags.contains(PmFlags::DUCKED) {
            self.pm.maxs[UP] = DUCK_MAXS_UP;
            self.pm.viewheight = DUCK_VIEWHEIGHT;
        } else {
            self.pm.maxs[UP] = STAND_MAXS_UP;
            self.pm.viewheight = STAND_VIEWHEIGHT;
        }
    }

    // --------------------------------------------------------
    // Snapping
    // --------------------------------------------------------

    fn good_position(&self, pos: &Vec3) -> bool {
        !self.trace(pos, pos).allsolid
    }

    /// Try whole-unit offsets around the origin until one is clear.
    fn initial_snap_position(&mut self) {
        const OFFSET: [f32; 3] = [0.0, -1.0, 1.0];
        let base = self.pml.origin;

        for &oy in &OFFSET {
            for &oz in &OFFSET {
                for &ox in &OFFSET {
                    let pos = [base[0] + ox, base[1] + oy, base[2] + oz];
                    if self.good_position(&pos) {
                        self.pml.origin = pos;
                        return;
                    }
                }
            }
        }

        self.pml.origin = base;
    }

    /// On exit, the origin has to be valid in 12.3 fixed point and must not
    /// be in a solid. Falls back to the input origin.
    fn snap_position(&mut self, in_origin: [i32; 3]) {
        self.pm.velocity = units_to_fixed(&self.pml.velocity);

        let mut sign = [0i32; 3];
        let base = units_to_fixed(&self.pml.origin);
        for i in 0..3 {
            sign[i] = if self.pml.origin[i] >= 0.0 { 1 } else { -1 };
            if base[i] as f32 * 0.125 == self.pml.origin[i] {
                sign[i] = 0;
            }
        }

        // try all single bits first
        for &bits in &JITTER_BITS {
            let mut candidate = base;
            for i in 0..3 {
                if bits & (1 << i) != 0 {
                    candidate[i] += sign[i];
                }
            }

            if self.good_position(&fixed_to_units(&candidate)) {
                self.pm.origin = candidate;
                return;
            }
        }

        // go back to the last position
        self.pm.origin = in_origin;
    }

    // --------------------------------------------------------
    // Frame driver
    // --------------------------------------------------------

    fn finish(&mut self, in_origin: [i32; 3], noclip: bool) {
        if noclip {
            self.pm.origin = units_to_fixed(&self.pml.origin);
            self.pm.velocity = units_to_fixed(&self.pml.velocity);
        } else {
            self.snap_position(in_origin);
        }
        self.pm.on_ground = self.pml.ground;
    }

    fn execute(&mut self) {
        let in_origin = self.pm.origin;

        self.pm.mins = VEC3_ORIGIN;
        self.pm.maxs = VEC3_ORIGIN;
        self.pm.waterlevel = 0;
        self.pm.watertype = Contents::empty();
        self.pm.on_ground = false;
        self.pm.jumped = false;
        self.pm.step_smooth = false;

        self.pml.origin = fixed_to_units(&self.pm.origin);
        self.pml.velocity = fixed_to_units(&self.pm.velocity);
        self.pml.frametime = self.pm.frametime;

        if !vector_is_zero(&self.pm.add_velocity) {
            for i in 0..3 {
                self.pml.velocity[i] += self.pm.add_velocity[i];
            }
        }

        if self.pm.mode == GameMode::Flying {
            self.fly_move();

            let noclip = self.pm.noclip;
            if noclip {
                self.pml.origin = vector_ma(&self.pml.origin, self.pml.frametime, &self.pml.velocity);
            } else {
                self.slide_move();
            }
            self.finish(in_origin, noclip);
            return;
        }

        self.check_duck();

        if self.pm.initial_snap {
            self.initial_snap_position();
        }

        self.categorize_position();
        self.check_special_movement();

        // drop timing counter
        if self.pm.timer > 0.0 {
            let msec = if self.pml.frametime == 0.0 { 1.0 } else { self.pml.frametime };
            if msec >= self.pm.timer {
                self.pm.flags.remove(PmFlags::TIME_WATERJUMP);
                self.pm.timer = 0.0;
            } else {
                self.pm.timer -= msec;
            }
        }

        if self.pm.flags.contains(PmFlags::TIME_WATERJUMP) {
            self.pml.velocity[UP] -= self.pm.gravity * self.pml.frametime;
            if self.pml.velocity[UP] < 0.0 {
                // cancel as soon as we are falling down again
                self.pm.flags.remove(PmFlags::TIME_WATERJUMP);
                self.pm.timer = 0.0;
            }

            self.step_slide_move();
        } else {
            self.check_jump();
            self.friction();

            if self.pm.waterlevel >= 2 {
                self.water_move();
            } else {
                self.air_move();
            }
        }

        // set groundentity, watertype, and waterlevel for final spot
        self.categorize_position();

        self.finish(in_origin, false);
    }
}

/// Advance the player one frame.
pub fn pmove(pm: &mut PmoveData, callbacks: &impl PmoveCallbacks) {
    let mut ctx = PmoveContext {
        pm,
        pml: PmLocal::default(),
        cb: callbacks,
    };
    ctx.execute();
}

// ============================================================
// Unit tests
// ============================================================
