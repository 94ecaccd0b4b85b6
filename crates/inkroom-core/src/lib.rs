//! Inkroom Core Library
//!
//! Platform-agnostic shape model, wire protocol and client-side sync logic for
//! the Inkroom collaborative whiteboard.

pub mod collaboration;
pub mod presence;
pub mod protocol;
pub mod render;
pub mod selection;
pub mod shapes;
pub mod store;
#[cfg(not(target_arch = "wasm32"))]
pub mod sync;
pub mod viewport;

pub use collaboration::{RoomClient, RoomEvent};
pub use presence::{CursorThrottle, PresenceTracker, RemoteCursor};
pub use protocol::{ClientMessage, DropReason, Participant, ProtocolError, RoomId, ServerMessage, ShapeRecord, UserId};
pub use render::{RedrawScheduler, RenderContext, Renderer};
pub use selection::{Handle, HandleKind, Manipulation};
pub use shapes::{Shape, ShapeId};
pub use store::{ShapeStore, StoredShape, SyncState};
#[cfg(not(target_arch = "wasm32"))]
pub use sync::{ConnectionState, NativeSocket, TransportError, TransportEvent};
pub use viewport::Viewport;
