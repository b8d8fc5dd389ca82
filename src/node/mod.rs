//! The scriptable node and the port list it advertises
//!
//! - [`ScriptNode`] - façade used by the host graph and the editor
//! - [`build_ports`] - derives a [`PortList`] from a loaded script
//! - [`NodeState`] - the persisted `{script, draft}` blob

pub mod builder;
pub mod port;
pub mod script_node;
pub mod state;

pub use builder::{build_ports, IoCounts};
pub use port::{ControlRange, PortDescriptor, PortDirection, PortKind, PortList};
pub use script_node::{NodeEvent, RenderState, ScriptNode};
pub use state::NodeState;
