//! The scriptable node: owns the live script context and swaps it on reload.
//!
//! Two paths use a node concurrently:
//!
//! - the **render path** calls [`ScriptNode::render`] once per block and only
//!   ever takes the swap lock around the current context
//! - the **control path** loads scripts, restores state and forwards
//!   prepare/release. It is serialized by the control lock and does all
//!   validation, loading, port building and preparation of an incoming
//!   context before touching the swap lock.
//!
//! Locks are always taken control first, then swap.

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::node::builder::build_ports;
use crate::node::port::PortList;
use crate::node::state::NodeState;
use crate::render::{AudioBuffer, MidiPipe};
use crate::scripting::{builtins, validate, ScriptContext};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

/// The node's own view of whether the host engine is running.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderState {
    pub sample_rate: f64,
    pub block_size: usize,
    pub prepared: bool,
}

/// Notifications sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A new script went live
    ScriptLoaded,
    /// `set_state` finished; `error` is set if the stored script was rejected
    StateRestored { error: Option<String> },
}

struct ControlState {
    render: RenderState,
    script: String,
    draft: String,
    /// Ports of the live context, built before it was swapped in
    staged_ports: PortList,
    /// Ports advertised to the host
    ports: PortList,
}

/// A host-graph node whose ports and processing come from a Rhai script.
pub struct ScriptNode {
    config: NodeConfig,
    control: Mutex<ControlState>,
    context: Mutex<Box<ScriptContext>>,
    observers: Mutex<Vec<Sender<NodeEvent>>>,
}

impl ScriptNode {
    /// Create a node running the built-in default script.
    pub fn new() -> Self {
        Self::with_config(NodeConfig::default())
    }

    pub fn with_config(config: NodeConfig) -> Self {
        let node = Self {
            control: Mutex::new(ControlState {
                render: RenderState::default(),
                script: String::new(),
                draft: String::new(),
                staged_ports: PortList::new(),
                ports: PortList::new(),
            }),
            context: Mutex::new(Box::new(ScriptContext::new(&config.limits))),
            observers: Mutex::new(Vec::new()),
            config,
        };

        if let Err(e) = node.load_script(builtins::DEFAULT_SCRIPT) {
            tracing::error!("Default script failed to load: {}", e);
        }
        node.create_ports();
        node
    }

    /// Validate `source` and, if it passes, make it the live script.
    ///
    /// On failure the live script, draft and ports are left untouched. On
    /// success call [`create_ports`](Self::create_ports) to publish the new
    /// port list.
    pub fn load_script(&self, source: &str) -> Result<()> {
        {
            let mut control = self.lock_control()?;
            self.load_locked(&mut control, source)?;
        }
        self.notify(NodeEvent::ScriptLoaded);
        Ok(())
    }

    fn load_locked(&self, control: &mut ControlState, source: &str) -> Result<()> {
        if let Err(e) = validate(source, &self.config.validation, &self.config.limits) {
            tracing::warn!("Script rejected: {}", e);
            return Err(e);
        }

        let mut incoming = Box::new(ScriptContext::new(&self.config.limits));
        incoming.load(source)?;
        let ports = build_ports(&mut incoming)?;
        let render = control.render;
        if render.prepared {
            incoming.prepare(render.sample_rate, render.block_size)?;
        }

        let mut outgoing = {
            let mut current = self.lock_context()?;
            std::mem::replace(&mut *current, incoming)
        };

        if let Err(e) = outgoing.release() {
            tracing::warn!("Outgoing script failed to release: {}", e);
        }
        drop(outgoing);

        control.script = source.to_string();
        control.draft = source.to_string();
        control.staged_ports = ports;
        tracing::debug!("Script swapped in ({} ports staged)", control.staged_ports.len());
        Ok(())
    }

    /// Record draft text from the editor without validating it.
    pub fn set_draft(&self, text: &str) {
        if let Ok(mut control) = self.control.lock() {
            control.draft = text.to_string();
        }
    }

    /// Start rendering at the given rate and block size.
    ///
    /// Does nothing if the node is already prepared.
    pub fn prepare_to_render(&self, sample_rate: f64, block_size: usize) -> Result<()> {
        let mut control = self.lock_control()?;
        if control.render.prepared {
            return Ok(());
        }
        control.render = RenderState {
            sample_rate,
            block_size,
            prepared: true,
        };
        tracing::debug!("Prepare to render ({} Hz, {} frames)", sample_rate, block_size);
        self.lock_context()?.prepare(sample_rate, block_size)
    }

    /// Stop rendering. Does nothing if the node is not prepared.
    pub fn release_resources(&self) -> Result<()> {
        let mut control = self.lock_control()?;
        if !control.render.prepared {
            return Ok(());
        }
        control.render.prepared = false;
        tracing::debug!("Release resources");
        self.lock_context()?.release()
    }

    /// Render one block through the live script.
    ///
    /// Buffers are left as they are when no script is loaded. A fault raised
    /// by the script is returned to the caller.
    pub fn render(&self, audio: &mut AudioBuffer, midi: &mut MidiPipe) -> Result<()> {
        self.lock_context()?.render(audio, midi)
    }

    /// Serialize the active and draft script text.
    pub fn get_state(&self) -> Result<Vec<u8>> {
        let control = self.lock_control()?;
        NodeState::new(control.script.as_str(), control.draft.as_str()).encode()
    }

    /// Restore a blob written by [`get_state`](Self::get_state).
    ///
    /// An empty blob is ignored. Otherwise the stored script is loaded, the
    /// ports are republished and subscribers receive
    /// [`NodeEvent::StateRestored`] whether or not the load succeeded.
    pub fn set_state(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let result = NodeState::decode(bytes).and_then(|state| {
            let mut control = self.lock_control()?;
            self.load_locked(&mut control, &state.script)?;
            control.draft = state.draft;
            Ok(())
        });

        match &result {
            Ok(()) => {
                self.create_ports();
                self.notify(NodeEvent::ScriptLoaded);
                self.notify(NodeEvent::StateRestored { error: None });
            }
            Err(e) => {
                tracing::warn!("Failed to restore node state: {}", e);
                self.notify(NodeEvent::StateRestored {
                    error: Some(e.to_string()),
                });
            }
        }
        result
    }

    /// Publish the ports of the live script to [`ports`](Self::ports).
    pub fn create_ports(&self) {
        if let Ok(mut control) = self.control.lock() {
            control.ports = control.staged_ports.clone();
        }
    }

    /// Ports currently advertised to the host.
    pub fn ports(&self) -> PortList {
        self.control
            .lock()
            .map(|c| c.ports.clone())
            .unwrap_or_default()
    }

    /// Text of the live script.
    pub fn script(&self) -> String {
        self.control
            .lock()
            .map(|c| c.script.clone())
            .unwrap_or_default()
    }

    /// Last text submitted by the editor.
    pub fn draft(&self) -> String {
        self.control
            .lock()
            .map(|c| c.draft.clone())
            .unwrap_or_default()
    }

    pub fn render_state(&self) -> RenderState {
        self.control.lock().map(|c| c.render).unwrap_or_default()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Receive [`NodeEvent`]s from this node.
    pub fn subscribe(&self) -> Receiver<NodeEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(tx);
        }
        rx
    }

    fn notify(&self, event: NodeEvent) {
        if let Ok(mut observers) = self.observers.lock() {
            // dropped receivers unsubscribe
            observers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    fn lock_control(&self) -> Result<MutexGuard<'_, ControlState>> {
        self.control
            .lock()
            .map_err(|e| NodeError::Lock(format!("Failed to acquire control lock: {}", e)))
    }

    fn lock_context(&self) -> Result<MutexGuard<'_, Box<ScriptContext>>> {
        self.context
            .lock()
            .map_err(|e| NodeError::Lock(format!("Failed to acquire context lock: {}", e)))
    }
}

impl Default for ScriptNode {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptNode")
            .field("render_state", &self.render_state())
            .field("ports", &self.ports().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::port::{PortDirection, PortKind};

    const MONO_MARK: &str = r#"
fn node_io_ports() { #{ audio_ins: 1, audio_outs: 1 } }
fn node_render(audio, midi) { audio.set(0, 0, 7.0); }
"#;

    #[test]
    fn test_new_node_runs_default_script() {
        let node = ScriptNode::new();
        assert_eq!(node.script(), builtins::DEFAULT_SCRIPT);
        assert_eq!(node.draft(), builtins::DEFAULT_SCRIPT);
        let ports = node.ports();
        assert_eq!(ports.len(), 7);
        assert_eq!(ports.count(PortKind::Control, PortDirection::Input), 1);
    }

    #[test]
    fn test_ports_published_by_create_ports() {
        let node = ScriptNode::new();
        node.load_script(MONO_MARK).unwrap();
        assert_eq!(node.ports().len(), 7);
        node.create_ports();
        assert_eq!(node.ports().len(), 2);
    }

    #[test]
    fn test_render_uses_live_script() {
        let node = ScriptNode::new();
        node.load_script(MONO_MARK).unwrap();
        let mut audio = AudioBuffer::new(1, 4);
        node.render(&mut audio, &mut MidiPipe::default()).unwrap();
        assert_eq!(audio.sample(0, 0), Some(7.0));
    }

    #[test]
    fn test_rejected_script_keeps_everything() {
        let node = ScriptNode::new();
        node.set_draft("work in progress");
        let err = node.load_script("fn node_render(audio) {}").unwrap_err();
        assert!(matches!(err, NodeError::LoadFailed(_)));
        assert_eq!(node.script(), builtins::DEFAULT_SCRIPT);
        assert_eq!(node.draft(), "work in progress");
    }

    #[test]
    fn test_prepare_and_release_are_guarded() {
        let node = ScriptNode::new();
        node.prepare_to_render(48_000.0, 128).unwrap();
        node.prepare_to_render(96_000.0, 64).unwrap();
        assert_eq!(
            node.render_state(),
            RenderState {
                sample_rate: 48_000.0,
                block_size: 128,
                prepared: true
            }
        );
        node.release_resources().unwrap();
        node.release_resources().unwrap();
        assert!(!node.render_state().prepared);
    }

    #[test]
    fn test_subscribers_see_loads() {
        let node = ScriptNode::new();
        let events = node.subscribe();
        node.load_script(MONO_MARK).unwrap();
        assert_eq!(events.try_recv().unwrap(), NodeEvent::ScriptLoaded);
        assert!(node.load_script("").is_err());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_empty_state_is_ignored() {
        let node = ScriptNode::new();
        let events = node.subscribe();
        node.set_state(&[]).unwrap();
        assert!(events.try_recv().is_err());
        assert_eq!(node.script(), builtins::DEFAULT_SCRIPT);
    }

    #[test]
    fn test_garbage_state_is_rejected() {
        let node = ScriptNode::new();
        let events = node.subscribe();
        let err = node.set_state(b"not json").unwrap_err();
        assert!(matches!(err, NodeError::State(_)));
        assert!(matches!(
            events.try_recv().unwrap(),
            NodeEvent::StateRestored { error: Some(_) }
        ));
        assert_eq!(node.script(), builtins::DEFAULT_SCRIPT);
    }
}
