// cl_pred.rs -- Player movement driver
//
// Keeps two copies of the player state. The authoritative one only advances
// in whole physics steps of 1/maxfps seconds. The display one is rebuilt
// every frame by simulating the time since the last physics step on top of
// the authoritative state, so drawing can run at any rate while physics stays
// deterministic. With async disabled, every frame is a physics step of its
// own length and its result is authoritative directly.

use q2move_common::common::{com_dprintf, com_printf};
use q2move_common::cvar::MoveSettings;
use q2move_common::pmove::{pmove, units_to_fixed, GameMode, MoveCmd, PmoveData};
use q2move_common::q_shared::{Vec3, PITCH, UP, VEC3_ORIGIN, YAW};

use crate::cl_runtimer::RunTimer;
use crate::cl_spawn::{SpawnPoint, TouchEvent};
use crate::cl_timing::MoveTiming;
use crate::cl_world::ClientWorld;

/// Lift applied when placing the player at a spawn or stored position.
const RECALL_LIFT: f32 = 0.125;
/// Lift applied at teleport destinations.
const TELEPORT_LIFT: f32 = 1.125;

/// Movement keys for one frame, each in `-1..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveInput {
    pub forward: f32,
    pub side: f32,
    pub up: f32,
}

impl MoveInput {
    /// Any movement key held, jump and crouch included.
    pub fn is_moving(&self) -> bool {
        self.forward != 0.0 || self.side != 0.0 || self.up != 0.0
    }
}

/// What happened during a frame that the caller has to act on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameOutcome {
    /// Physics steps run this frame.
    pub steps: u32,
    pub jumped: bool,
    /// Touch events the clock does not handle itself (run finished, pickups).
    pub events: Vec<TouchEvent>,
    /// Entities already touched this frame.
    fired: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StoredPosition {
    origin: Vec3,
    yaw: f32,
}

/// Camera basis for view angles in degrees, pitch negative looking up.
pub fn view_vectors(angles: &Vec3) -> (Vec3, Vec3) {
    let (sy, cy) = angles[YAW].to_radians().sin_cos();
    let (sp, cp) = angles[PITCH].to_radians().sin_cos();
    let forward = [sy * cp, -sp, cy * cp];
    let right = [cy, 0.0, -sy];
    (forward, right)
}

pub struct MoveClock {
    auth: PmoveData,
    display: PmoveData,
    /// Impulses waiting for the next physics step.
    pending_impulse: Vec3,
    snap_auth: bool,
    snap_display: bool,

    mode: GameMode,
    noclip: bool,
    gravity: f32,
    flyspeed: f32,
    maxfps: i32,
    timing: MoveTiming,
    run: RunTimer,

    view_angles: Vec3,
    store: Option<StoredPosition>,
    spawn: SpawnPoint,
}

impl MoveClock {
    pub fn new(settings: &MoveSettings) -> Self {
        let mut timing = MoveTiming::new();
        timing.set_async(settings.async_physics);
        Self {
            auth: PmoveData::default(),
            display: PmoveData::default(),
            pending_impulse: VEC3_ORIGIN,
            snap_auth: false,
            snap_display: false,
            mode: GameMode::Flying,
            noclip: settings.noclip,
            gravity: settings.gravity,
            flyspeed: settings.flyspeed,
            maxfps: settings.maxfps,
            timing,
            run: RunTimer::new(),
            view_angles: VEC3_ORIGIN,
            store: None,
            spawn: SpawnPoint::default(),
        }
    }

    /// Pick up changed cvars. Gravity is left alone, it belongs to the map.
    pub fn apply_settings(&mut self, settings: &MoveSettings) {
        self.noclip = settings.noclip;
        self.flyspeed = settings.flyspeed;
        self.maxfps = settings.maxfps;
        if settings.async_physics != self.timing.async_enabled {
            self.set_async(settings.async_physics);
        }
    }

    /// Reset for a freshly loaded map and place the player at its spawn.
    pub fn map_loaded(&mut self, world: &ClientWorld, settings: &MoveSettings) {
        self.apply_settings(settings);
        self.mode = GameMode::Flying;
        self.gravity = settings.gravity;
        self.store = None;
        self.pending_impulse = VEC3_ORIGIN;
        self.spawn = world.spawn_point();
        self.auth = PmoveData::default();
        self.display = PmoveData::default();
        self.timing.reset();
        self.recall();
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn authoritative(&self) -> &PmoveData {
        &self.auth
    }

    pub fn display(&self) -> &PmoveData {
        &self.display
    }

    pub fn run_timer(&self) -> &RunTimer {
        &self.run
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn view_angles(&self) -> Vec3 {
        self.view_angles
    }

    pub fn is_async(&self) -> bool {
        self.timing.async_enabled
    }

    /// Eye position of the display state, physics units.
    pub fn view_origin(&self) -> Vec3 {
        let mut o = self.display.origin_units();
        o[UP] += self.display.viewheight;
        o
    }

    /// Horizontal speed of the display state.
    pub fn speed(&self) -> f32 {
        let v = self.display.velocity_units();
        (v[0] * v[0] + v[2] * v[2]).sqrt()
    }

    // ============================================================
    // Controls
    // ============================================================

    /// Spectating is refused. Starting a time attack puts the player back
    /// at the spawn point.
    pub fn set_mode(&mut self, mode: GameMode) -> bool {
        if mode == GameMode::Spectating {
            com_dprintf("spectator not yet implemented\n");
            return false;
        }
        if mode != self.mode {
            self.run.reset();
        }
        self.mode = mode;
        com_printf(&format!("Game mode {}\n", mode.name().to_uppercase()));
        if mode == GameMode::TimeAttack {
            self.recall();
        }
        true
    }

    pub fn set_noclip(&mut self, on: bool) {
        self.noclip = on;
    }

    pub fn set_gravity(&mut self, gravity: f32) {
        self.gravity = gravity;
    }

    pub fn set_view_angles(&mut self, pitch: f32, yaw: f32) {
        self.view_angles = [pitch.clamp(-90.0, 90.0), yaw, 0.0];
    }

    /// Queue a velocity change for the next physics step.
    pub fn add_impulse(&mut self, v: &Vec3) {
        for i in 0..3 {
            self.pending_impulse[i] += v[i];
        }
    }

    /// Switch between fixed-step and per-frame physics. Both snapshots are
    /// made equal to what is currently displayed.
    pub fn set_async(&mut self, enabled: bool) {
        self.timing.set_async(enabled);
        copy_state(&mut self.auth, &self.display);
    }

    // ============================================================
    // Store / recall / teleport
    // ============================================================

    pub fn store(&mut self) {
        self.store = Some(StoredPosition {
            origin: self.display.origin_units(),
            yaw: self.view_angles[YAW],
        });
    }

    pub fn remove_store(&mut self) {
        self.store = None;
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Back to the stored position when practicing, otherwise to the spawn.
    /// Any run in progress is abandoned.
    pub fn recall(&mut self) {
        self.run.reset();
        let stored = match self.mode {
            GameMode::Training | GameMode::Flying => self.store,
            _ => None,
        };

        match stored {
            Some(s) => {
                self.view_angles = [0.0, s.yaw, 0.0];
                self.place(&s.origin, RECALL_LIFT);
            }
            None => {
                let spawn = self.spawn;
                self.view_angles = [spawn.angles[PITCH], spawn.angles[YAW], 0.0];
                self.place(&spawn.origin, RECALL_LIFT);
            }
        }
    }

    /// Move to `origin` (physics units) facing `angles`. Ignored while flying
    /// or spectating.
    pub fn teleport(&mut self, origin: &Vec3, angles: &Vec3) -> bool {
        if matches!(self.mode, GameMode::Flying | GameMode::Spectating) {
            return false;
        }
        com_dprintf(&format!("teleport angle: {}\n", angles[YAW]));
        self.view_angles = [0.0, angles[YAW], 0.0];
        self.place(origin, TELEPORT_LIFT);
        true
    }

    fn place(&mut self, origin: &Vec3, lift: f32) {
        let mut o = *origin;
        o[UP] += lift;
        let fixed = units_to_fixed(&o);
        for pm in [&mut self.auth, &mut self.display] {
            pm.origin = fixed;
            pm.velocity = [0; 3];
        }
        self.snap_auth = true;
        self.snap_display = true;
    }

    // ============================================================
    // Frame
    // ============================================================

    fn command(&self, input: &MoveInput) -> MoveCmd {
        let (forward, right) = view_vectors(&self.view_angles);
        MoveCmd {
            forward_move: input.forward,
            side_move: input.side,
            up_move: input.up,
            forward,
            right,
            pitch: self.view_angles[PITCH],
        }
    }

    fn prepare(&self, pm: &mut PmoveData, cmd: &MoveCmd, frametime: f32) {
        pm.mode = self.mode;
        pm.noclip = self.noclip && self.mode == GameMode::Flying;
        pm.cmd = *cmd;
        pm.frametime = frametime;
        pm.gravity = self.gravity;
        pm.flyspeed = self.flyspeed;
    }

    /// Advance by `delta` seconds.
    pub fn frame(&mut self, world: &mut ClientWorld, delta: f32, input: &MoveInput) -> FrameOutcome {
        self.timing.accumulate(delta as f64);
        self.advance(world, delta, input)
    }

    /// Advance by the wall-clock time since the previous call.
    pub fn frame_now(&mut self, world: &mut ClientWorld, input: &MoveInput) -> FrameOutcome {
        let delta = self.timing.update() as f32;
        self.advance(world, delta, input)
    }

    fn advance(&mut self, world: &mut ClientWorld, delta: f32, input: &MoveInput) -> FrameOutcome {
        world.think(delta);
        self.run.update(self.mode, input.is_moving(), delta);
        let cmd = self.command(input);
        let mut out = FrameOutcome::default();

        if self.timing.async_enabled {
            out.steps = self.timing.should_physics(self.maxfps);
            let frametime = self.timing.physics_frametime(self.maxfps);
            for _ in 0..out.steps {
                self.physics_step(world, &cmd, frametime, &mut out);
            }
            if out.steps > 0 {
                self.display.flags = self.auth.flags;
            }

            let remaining = self.timing.remaining();
            if remaining > 0.0 {
                let mut pm = self.auth.clone();
                pm.flags = self.display.flags;
                self.prepare(&mut pm, &cmd, remaining);
                pm.add_velocity = self.pending_impulse;
                pm.initial_snap = self.snap_display;
                pmove(&mut pm, &*world);
                out.jumped |= pm.jumped;
                self.display = pm;
                self.snap_display = false;
            } else if out.steps > 0 {
                self.display = self.auth.clone();
                self.snap_display = false;
            }
        } else {
            out.steps = 1;
            let mut pm = self.display.clone();
            self.prepare(&mut pm, &cmd, delta);
            pm.add_velocity = std::mem::replace(&mut self.pending_impulse, VEC3_ORIGIN);
            pm.initial_snap = self.snap_display || self.snap_auth;
            pmove(&mut pm, &*world);
            out.jumped = pm.jumped;
            self.snap_auth = false;
            self.snap_display = false;
            self.auth = pm.clone();
            self.display = pm;
            self.run_touches(world, &mut out);
        }

        out
    }

    fn physics_step(&mut self, world: &ClientWorld, cmd: &MoveCmd, frametime: f32, out: &mut FrameOutcome) {
        let mut pm = std::mem::take(&mut self.auth);
        self.prepare(&mut pm, cmd, frametime);
        pm.add_velocity = std::mem::replace(&mut self.pending_impulse, VEC3_ORIGIN);
        pm.initial_snap = std::mem::replace(&mut self.snap_auth, false);
        pmove(&mut pm, &*world);
        self.auth = pm;
        self.run_touches(world, out);
    }

    /// Fire triggers against the authoritative position, once per entity
    /// per frame. Teleports and gravity changes are applied here, the rest
    /// go to the caller.
    fn run_touches(&mut self, world: &ClientWorld, out: &mut FrameOutcome) {
        let origin = self.auth.origin_units();
        let events = world.touches(&origin, &self.auth.mins, &self.auth.maxs, self.mode);
        for (ent, ev) in events {
            if out.fired.contains(&ent) {
                continue;
            }
            out.fired.push(ent);
            match ev {
                TouchEvent::Teleport { origin, angles } => {
                    self.teleport(&origin, &angles);
                }
                TouchEvent::Gravity(g) => self.gravity = g,
                TouchEvent::RunFinished => {
                    self.run.finish();
                    out.events.push(TouchEvent::RunFinished);
                }
                other => out.events.push(other),
            }
        }
    }
}

/// Copy the simulation state (not the per-call inputs and outputs).
fn copy_state(dst: &mut PmoveData, src: &PmoveData) {
    dst.origin = src.origin;
    dst.velocity = src.velocity;
    dst.flags = src.flags;
    dst.timer = src.timer;
}

// ============================================================
// Tests
// ============================================================
