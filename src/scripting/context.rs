//! One interpreter bound to one loaded script.
//!
//! ```text
//! Unloaded ──load──► Loaded ──prepare──► Prepared ◄──prepare── Released
//!    │                  │                   │                     ▲
//!    └─(load fails)─► Failed                └──────release────────┘
//!                       Loaded ──release──► Released
//! ```
//!
//! A context is single-use: a second `load` is refused. A context whose load
//! failed is inert; prepare, release and render do nothing.

use crate::config::EngineLimits;
use crate::error::{NodeError, Result};
use crate::render::{AudioBuffer, MidiPipe, RenderBridge};
use crate::scripting::engine::ScriptEngine;
use crate::scripting::hooks;
use rhai::{Dynamic, FuncArgs, Map, Scope, AST, FLOAT, INT};

/// Lifecycle state of a [`ScriptContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Unloaded,
    Failed,
    Loaded,
    Prepared,
    Released,
}

/// Which optional hooks the script defines, resolved once at load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hooks {
    pub io_ports: bool,
    pub params: bool,
    pub prepare: bool,
    pub release: bool,
}

impl Hooks {
    fn scan(ast: &AST) -> Self {
        Self {
            io_ports: defines(ast, hooks::IO_PORTS, 0),
            params: defines(ast, hooks::PARAMS, 0),
            prepare: defines(ast, hooks::PREPARE, 2),
            release: defines(ast, hooks::RELEASE, 0),
        }
    }
}

fn defines(ast: &AST, name: &str, arity: usize) -> bool {
    ast.iter_functions()
        .any(|f| f.name == name && f.params.len() == arity)
}

/// Everything that exists only once a script has loaded.
struct LoadedScript {
    ast: AST,
    scope: Scope<'static>,
    /// Length of `scope` right after the top-level statements ran
    globals: usize,
    /// Object bound to `this` in every hook call
    this: Dynamic,
    hooks: Hooks,
}

/// One interpreter instance and the script loaded into it.
pub struct ScriptContext {
    engine: ScriptEngine,
    bridge: RenderBridge,
    script: Option<LoadedScript>,
    state: ContextState,
    limits: EngineLimits,
}

impl ScriptContext {
    pub fn new(limits: &EngineLimits) -> Self {
        Self {
            engine: ScriptEngine::new(limits),
            bridge: RenderBridge::new(),
            script: None,
            state: ContextState::Unloaded,
            limits: limits.clone(),
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Limits this context's interpreter was built with.
    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// True once a script has loaded successfully.
    pub fn ready(&self) -> bool {
        matches!(
            self.state,
            ContextState::Loaded | ContextState::Prepared | ContextState::Released
        )
    }

    /// Hooks resolved at load, if loaded.
    pub fn hooks(&self) -> Option<Hooks> {
        self.script.as_ref().map(|s| s.hooks)
    }

    /// Compile `source`, run its top-level statements and resolve its hooks.
    pub fn load(&mut self, source: &str) -> Result<()> {
        if self.state != ContextState::Unloaded {
            tracing::error!("load() called on a context in state {:?}", self.state);
            return Err(NodeError::AlreadyLoaded);
        }

        match self.try_load(source) {
            Ok(script) => {
                tracing::debug!(
                    "Script loaded (hooks: {:?}, {} globals)",
                    script.hooks,
                    script.globals
                );
                self.script = Some(script);
                self.state = ContextState::Loaded;
                Ok(())
            }
            Err(e) => {
                self.state = ContextState::Failed;
                Err(e)
            }
        }
    }

    fn try_load(&self, source: &str) -> Result<LoadedScript> {
        let ast = self.engine.compile(source)?;
        if !defines(&ast, hooks::RENDER, 2) {
            return Err(NodeError::LoadFailed(format!(
                "script does not define {}(audio, midi)",
                hooks::RENDER
            )));
        }

        let mut scope = Scope::new();
        self.engine.run_top_level(&mut scope, &ast)?;
        let globals = scope.len();

        Ok(LoadedScript {
            hooks: Hooks::scan(&ast),
            ast,
            scope,
            globals,
            this: Dynamic::from(Map::new()),
        })
    }

    /// Call the optional prepare hook, then trim the scope.
    ///
    /// Does not guard against repeated calls; the node does that.
    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) -> Result<()> {
        if !self.ready() {
            return Ok(());
        }
        let args = (sample_rate as FLOAT, block_size as INT);
        let result = self.call_optional(|h| h.prepare, hooks::PREPARE, args);
        self.trim_scope();
        result?;
        self.state = ContextState::Prepared;
        Ok(())
    }

    /// Call the optional release hook, then trim the scope.
    ///
    /// Does nothing if the context is not ready or already released.
    pub fn release(&mut self) -> Result<()> {
        if !self.ready() || self.state == ContextState::Released {
            return Ok(());
        }
        let result = self.call_optional(|h| h.release, hooks::RELEASE, ());
        self.trim_scope();
        result?;
        self.state = ContextState::Released;
        Ok(())
    }

    /// Run the render hook on the host buffers.
    ///
    /// Nothing happens if no script is loaded. A fault raised by the script is
    /// returned as-is; this call is not isolated.
    pub fn render(&mut self, audio: &mut AudioBuffer, midi: &mut MidiPipe) -> Result<()> {
        let Some(script) = self.script.as_mut() else {
            return Ok(());
        };
        let engine = &self.engine;
        self.bridge
            .lend(audio, midi, |audio, midi| {
                engine.call_hook(
                    &mut script.scope,
                    &script.ast,
                    &mut script.this,
                    hooks::RENDER,
                    (audio, midi),
                )
            })
            .map(|_| ())
            .map_err(NodeError::from_rhai_error)
    }

    /// Call a declaration hook and hand back its raw value.
    ///
    /// `None` when no script is loaded or the hook is not defined.
    pub(crate) fn declaration(
        &mut self,
        name: &str,
    ) -> Option<std::result::Result<Dynamic, Box<rhai::EvalAltResult>>> {
        let script = self.script.as_mut()?;
        let defined = match name {
            hooks::IO_PORTS => script.hooks.io_ports,
            hooks::PARAMS => script.hooks.params,
            _ => false,
        };
        if !defined {
            return None;
        }
        Some(self.engine.call_hook(
            &mut script.scope,
            &script.ast,
            &mut script.this,
            name,
            (),
        ))
    }

    fn call_optional(
        &mut self,
        defined: impl FnOnce(&Hooks) -> bool,
        name: &str,
        args: impl FuncArgs,
    ) -> Result<()> {
        let Some(script) = self.script.as_mut() else {
            return Ok(());
        };
        if !defined(&script.hooks) {
            return Ok(());
        }
        self.engine
            .call_hook(
                &mut script.scope,
                &script.ast,
                &mut script.this,
                name,
                args,
            )
            .map(|_| ())
            .map_err(NodeError::from_rhai_error)
    }

    /// Drop scope entries added after load, keeping the script's globals.
    ///
    /// Rhai frees values by reference counting as soon as they are dropped,
    /// so there is no collector to run. Hook calls already rewind the scope;
    /// this only removes entries pushed onto it from outside a hook.
    fn trim_scope(&mut self) {
        if let Some(script) = self.script.as_mut() {
            let before = script.scope.len();
            if before > script.globals {
                script.scope.rewind(script.globals);
                tracing::trace!("Trimmed script scope ({} -> {} entries)", before, script.globals);
            }
        }
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("state", &self.state)
            .field("hooks", &self.hooks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTING: &str = r#"
fn bump(key) {
    let n = this[key];
    this[key] = if type_of(n) == "()" { 1 } else { n + 1 };
}

fn node_prepare(rate, block) {
    this.bump("prepares");
    this.rate = rate;
    this.block = block;
}

fn node_release() {
    this.bump("releases");
}

fn node_render(audio, midi) {
    audio.set(0, 0, this.prepares.to_float());
    audio.set(0, 1, this.block.to_float());
    let r = this.releases;
    audio.set(0, 2, if type_of(r) == "()" { 0.0 } else { r.to_float() });
}
"#;

    fn loaded(source: &str) -> ScriptContext {
        let mut ctx = ScriptContext::new(&EngineLimits::default());
        ctx.load(source).unwrap();
        ctx
    }

    #[test]
    fn test_lifecycle_states() {
        let mut ctx = ScriptContext::new(&EngineLimits::default());
        assert_eq!(ctx.state(), ContextState::Unloaded);
        assert!(!ctx.ready());

        ctx.load(COUNTING).unwrap();
        assert_eq!(ctx.state(), ContextState::Loaded);
        assert!(ctx.hooks().unwrap().prepare);
        assert!(!ctx.hooks().unwrap().io_ports);

        ctx.prepare(48_000.0, 256).unwrap();
        assert_eq!(ctx.state(), ContextState::Prepared);
        ctx.release().unwrap();
        assert_eq!(ctx.state(), ContextState::Released);
        ctx.prepare(48_000.0, 256).unwrap();
        assert_eq!(ctx.state(), ContextState::Prepared);
    }

    #[test]
    fn test_release_straight_from_loaded() {
        let mut ctx = loaded(COUNTING);
        ctx.release().unwrap();
        assert_eq!(ctx.state(), ContextState::Released);
    }

    #[test]
    fn test_second_load_is_refused() {
        let mut ctx = loaded(COUNTING);
        let err = ctx.load(COUNTING).unwrap_err();
        assert!(matches!(err, NodeError::AlreadyLoaded));
        assert_eq!(ctx.state(), ContextState::Loaded);
    }

    #[test]
    fn test_failed_context_is_inert_and_single_use() {
        let mut ctx = ScriptContext::new(&EngineLimits::default());
        let err = ctx.load("fn node_render(audio, midi) { ").unwrap_err();
        assert!(matches!(err, NodeError::LoadFailed(_)));
        assert_eq!(ctx.state(), ContextState::Failed);

        let mut audio = AudioBuffer::new(1, 4);
        audio.fill(0.25);
        ctx.prepare(44_100.0, 4).unwrap();
        ctx.render(&mut audio, &mut MidiPipe::default()).unwrap();
        ctx.release().unwrap();
        assert_eq!(audio.sample(0, 3), Some(0.25));
        assert_eq!(ctx.state(), ContextState::Failed);

        assert!(matches!(
            ctx.load(COUNTING).unwrap_err(),
            NodeError::AlreadyLoaded
        ));
    }

    #[test]
    fn test_missing_render_hook() {
        let mut ctx = ScriptContext::new(&EngineLimits::default());
        let err = ctx.load("fn node_prepare(rate, block) { }").unwrap_err();
        assert!(err.to_string().contains("node_render"));
    }

    #[test]
    fn test_top_level_fault_is_load_failure() {
        let mut ctx = ScriptContext::new(&EngineLimits::default());
        let err = ctx
            .load("let x = 1 / 0;\nfn node_render(audio, midi) { }")
            .unwrap_err();
        assert!(matches!(err, NodeError::LoadFailed(_)));
    }

    #[test]
    fn test_state_persists_between_hooks() {
        let mut ctx = loaded(COUNTING);
        ctx.prepare(44_100.0, 128).unwrap();
        ctx.release().unwrap();
        ctx.prepare(44_100.0, 64).unwrap();

        let mut audio = AudioBuffer::new(1, 4);
        ctx.render(&mut audio, &mut MidiPipe::default()).unwrap();
        assert_eq!(audio.sample(0, 0), Some(2.0));
        assert_eq!(audio.sample(0, 1), Some(64.0));
        assert_eq!(audio.sample(0, 2), Some(1.0));
    }

    #[test]
    fn test_render_fault_propagates() {
        let mut ctx = loaded(
            r#"
fn node_render(audio, midi) {
    throw "boom";
}
"#,
        );
        let err = ctx
            .render(&mut AudioBuffer::new(1, 1), &mut MidiPipe::default())
            .unwrap_err();
        assert!(matches!(err, NodeError::RuntimeFault(ref m) if m.contains("boom")));
    }

    #[test]
    fn test_prepare_fault_keeps_state() {
        let mut ctx = loaded(
            r#"
fn node_prepare(rate, block) { throw "no"; }
fn node_render(audio, midi) { }
"#,
        );
        assert!(ctx.prepare(44_100.0, 64).is_err());
        assert_eq!(ctx.state(), ContextState::Loaded);
    }

    #[test]
    fn test_scope_trimmed_to_globals() {
        let mut ctx = loaded(
            r#"
let greeting = "hello";
fn node_render(audio, midi) { }
"#,
        );
        let script = ctx.script.as_mut().unwrap();
        assert_eq!(script.globals, 1);
        script.scope.push("leftover", 42_i64);
        assert_eq!(script.scope.len(), 2);

        ctx.prepare(44_100.0, 64).unwrap();
        let script = ctx.script.as_ref().unwrap();
        assert_eq!(script.scope.len(), 1);
        assert!(script.scope.contains("greeting"));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut ctx = loaded(COUNTING);
        ctx.prepare(44_100.0, 64).unwrap();
        ctx.release().unwrap();
        ctx.release().unwrap();
        ctx.prepare(44_100.0, 64).unwrap();

        let mut audio = AudioBuffer::new(1, 4);
        ctx.render(&mut audio, &mut MidiPipe::default()).unwrap();
        assert_eq!(audio.sample(0, 2), Some(1.0));
    }
}
