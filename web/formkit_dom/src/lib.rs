//! Browser backend: keeps a mirror of the page's DOM, renders forms and
//! dialogs into it and ships the mutations to a host as framed JSON.

mod backend;
mod canvas;
mod document;
mod error;
mod host;
mod protocol;
mod visitor;

pub use backend::{DomBackend, DomMenuSurface};
pub use canvas::CANVAS_ATTR;
pub use document::{Dom, Handler, IdPool, Node, NodeId, RemovalListener};
pub use error::ProtocolError;
pub use host::DomHost;
pub use protocol::{
    DomEnvelope, DomOp, HOST_TO_UI_CAP, HostEvent, UI_TO_HOST_CAP, decode_event, encode_envelope,
    read_frame, reader_loop, ready_envelope, recv_event, send_envelope, write_frame, writer_loop,
};
pub use visitor::{DomVisitor, PATH_ATTR};
pub use serde_json;
