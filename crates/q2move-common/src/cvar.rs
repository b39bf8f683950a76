// cvar.rs — console variables that tune loading and movement

use crate::common::{com_printf, set_developer};
use crate::q_shared::{CVAR_ARCHIVE, CVAR_NOSET};

use std::collections::HashMap;

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

/// All registered variables, in registration order.
pub struct CvarContext {
    pub vars: Vec<Cvar>,
    by_name: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self {
            vars: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn find(&self, name: &str) -> Option<&Cvar> {
        self.index_of(name).map(|i| &self.vars[i])
    }

    /// Numeric value, 0 for unknown names.
    pub fn value(&self, name: &str) -> f32 {
        self.find(name).map_or(0.0, |var| var.value)
    }

    /// Text value, empty for unknown names.
    pub fn string(&self, name: &str) -> &str {
        self.find(name).map_or("", |var| var.string.as_str())
    }

    /// Register a variable. An existing one keeps its value and gains `flags`.
    /// Returns None when the name is new and there is no default.
    pub fn get(&mut self, name: &str, default: Option<&str>, flags: i32) -> Option<usize> {
        if let Some(i) = self.index_of(name) {
            self.vars[i].flags |= flags;
            return Some(i);
        }

        let default = default?;
        let i = self.vars.len();
        self.vars.push(Cvar {
            name: name.to_owned(),
            string: default.to_owned(),
            flags,
            modified: true,
            value: parse_value(default),
        });
        self.by_name.insert(name.to_owned(), i);
        Some(i)
    }

    fn assign(&mut self, name: &str, text: &str, force: bool) -> Option<usize> {
        let Some(i) = self.index_of(name) else {
            return self.get(name, Some(text), 0);
        };

        if !force && self.vars[i].flags & CVAR_NOSET != 0 {
            com_printf(&format!("{} is write protected.\n", name));
            return Some(i);
        }
        if self.vars[i].string == text {
            return Some(i);
        }

        let var = &mut self.vars[i];
        var.modified = true;
        var.string = text.to_owned();
        var.value = parse_value(text);
        if var.name == "developer" {
            set_developer(var.value != 0.0);
        }
        Some(i)
    }

    /// Change a variable from the console. Protected variables refuse.
    pub fn set(&mut self, name: &str, text: &str) -> Option<usize> {
        self.assign(name, text, false)
    }

    /// Change a variable from code, protected or not.
    pub fn force_set(&mut self, name: &str, text: &str) -> Option<usize> {
        self.assign(name, text, true)
    }

    /// `name` prints the value, `name value` sets it.
    /// False when `name` is not a variable.
    pub fn command(&mut self, name: &str, arg: Option<&str>) -> bool {
        let Some(i) = self.index_of(name) else {
            return false;
        };

        match arg {
            None => {
                let var = &self.vars[i];
                com_printf(&format!("\"{}\" is \"{}\"\n", var.name, var.string));
            }
            Some(text) => {
                let name = self.vars[i].name.clone();
                self.set(&name, text);
            }
        }
        true
    }

    /// Dump archived variables as `set` lines for a config file.
    pub fn write_variables(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in self.vars.iter().filter(|v| v.flags & CVAR_ARCHIVE != 0) {
            writeln!(out, "set {} \"{}\"", var.name, var.string)?;
        }
        Ok(())
    }
}

impl Default for CvarContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Lenient numeric parse: unparseable strings count as zero.
fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

// ============================================================
// Movement and loader variables
// ============================================================

pub const DEFAULT_SCALE: f32 = 0.015625;
pub const DEFAULT_FLYSPEED: f32 = 300.0;
pub const DEFAULT_GRAVITY: f32 = 800.0;
pub const DEFAULT_MAXFPS: i32 = 120;

const MIN_MAXFPS: i32 = 20;
const MAX_MAXFPS: i32 = 200;

/// Register every variable the loader and mover read. Safe to call twice.
pub fn register_movement_cvars(ctx: &mut CvarContext) {
    // scale is baked into loaded geometry, so only code may change it
    ctx.get("scale", Some("0.015625"), CVAR_NOSET);
    ctx.get("flyspeed", Some("300"), CVAR_ARCHIVE);
    ctx.get("noclip", Some("0"), 0);
    ctx.get("gravity", Some("800"), 0);
    ctx.get("maxfps", Some("120"), CVAR_ARCHIVE);
    ctx.get("async", Some("1"), CVAR_ARCHIVE);
    ctx.get("developer", Some("0"), 0);
}

/// Typed snapshot of the movement variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveSettings {
    pub scale: f32,
    pub flyspeed: f32,
    pub noclip: bool,
    pub gravity: f32,
    /// Fixed-step rate in Hz, clamped to 20..=200.
    pub maxfps: i32,
    pub async_physics: bool,
}

impl Default for MoveSettings {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            flyspeed: DEFAULT_FLYSPEED,
            noclip: false,
            gravity: DEFAULT_GRAVITY,
            maxfps: DEFAULT_MAXFPS,
            async_physics: true,
        }
    }
}

impl MoveSettings {
    pub fn from_cvars(ctx: &CvarContext) -> Self {
        let defaults = Self::default();
        let or_default = |name: &str, fallback: f32| match ctx.find(name) {
            Some(var) => var.value,
            None => fallback,
        };

        let mut scale = or_default("scale", defaults.scale);
        if scale <= 0.0 {
            com_printf(&format!("scale {} is not positive, using {}\n", scale, DEFAULT_SCALE));
            scale = DEFAULT_SCALE;
        }

        Self {
            scale,
            flyspeed: or_default("flyspeed", defaults.flyspeed),
            noclip: or_default("noclip", 0.0) != 0.0,
            gravity: or_default("gravity", defaults.gravity),
            maxfps: (or_default("maxfps", defaults.maxfps as f32) as i32).clamp(MIN_MAXFPS, MAX_MAXFPS),
            async_physics: or_default("async", 1.0) != 0.0,
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{com_begin_redirect, com_end_redirect};

    fn registered() -> CvarContext {
        let mut ctx = CvarContext::new();
        register_movement_cvars(&mut ctx);
        ctx
    }

    #[test]
    fn test_register_keeps_user_values() {
        let mut ctx = registered();
        ctx.set("flyspeed", "500");
        register_movement_cvars(&mut ctx);
        assert_eq!(ctx.value("flyspeed"), 500.0);
        assert_eq!(ctx.string("flyspeed"), "500");
        assert!(ctx.find("flyspeed").is_some_and(|v| v.modified));
    }

    #[test]
    fn test_unknown_names() {
        let mut ctx = registered();
        assert_eq!(ctx.value("sv_cheats"), 0.0);
        assert_eq!(ctx.string("sv_cheats"), "");
        assert_eq!(ctx.get("sv_cheats", None, 0), None);
    }

    #[test]
    fn test_set_creates_missing() {
        let mut ctx = CvarContext::new();
        ctx.set("gravity", "600");
        assert_eq!(ctx.value("gravity"), 600.0);
        assert_eq!(ctx.value("gravity_typo"), 0.0);
    }

    #[test]
    fn test_scale_is_protected() {
        let mut ctx = registered();
        com_begin_redirect();
        ctx.set("scale", "1");
        let out = com_end_redirect();
        assert_eq!(out.as_deref(), Some("scale is write protected.\n"));
        assert_eq!(MoveSettings::from_cvars(&ctx).scale, DEFAULT_SCALE);

        ctx.force_set("scale", "0.5");
        assert_eq!(MoveSettings::from_cvars(&ctx).scale, 0.5);
    }

    #[test]
    fn test_bad_scale_falls_back() {
        let mut ctx = registered();
        ctx.force_set("scale", "-2");
        com_begin_redirect();
        let s = MoveSettings::from_cvars(&ctx);
        com_end_redirect();
        assert_eq!(s.scale, DEFAULT_SCALE);
    }

    #[test]
    fn test_console_command() {
        let mut ctx = registered();
        assert!(ctx.command("flyspeed", Some("450")));
        assert_eq!(ctx.value("flyspeed"), 450.0);

        com_begin_redirect();
        assert!(ctx.command("flyspeed", None));
        assert!(!ctx.command("no_such_var", None));
        assert_eq!(com_end_redirect().as_deref(), Some("\"flyspeed\" is \"450\"\n"));
    }

    #[test]
    fn test_write_variables() {
        let ctx = registered();
        let mut buf = Vec::new();
        ctx.write_variables(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "set flyspeed \"300\"\nset maxfps \"120\"\nset async \"1\"\n"
        );
    }

    #[test]
    fn test_movement_defaults() {
        let ctx = registered();
        assert_eq!(MoveSettings::from_cvars(&ctx), MoveSettings::default());
        assert_eq!(ctx.value("scale"), 0.015625);
        assert_eq!(ctx.value("gravity"), 800.0);
    }

    #[test]
    fn test_maxfps_is_clamped() {
        let mut ctx = registered();
        ctx.set("maxfps", "1000");
        assert_eq!(MoveSettings::from_cvars(&ctx).maxfps, 200);
        ctx.set("maxfps", "5");
        assert_eq!(MoveSettings::from_cvars(&ctx).maxfps, 20);
        ctx.set("noclip", "1");
        ctx.set("async", "0");
        let s = MoveSettings::from_cvars(&ctx);
        assert!(s.noclip);
        assert!(!s.async_physics);
    }

    #[test]
    fn test_developer_mirrors_cvar() {
        let mut ctx = registered();
        ctx.set("developer", "1");
        assert!(crate::common::developer());
        ctx.set("developer", "0");
        assert!(!crate::common::developer());
    }
}
