use crate::document::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Read, Write};
use std::sync::mpsc::Receiver;

pub const UI_TO_HOST_CAP: usize = 1_048_576;
pub const HOST_TO_UI_CAP: usize = 65_536;

/// One mutation of the real DOM, replayed in order by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DomOp {
    Create { id: NodeId, tag: String },
    SetAttr { id: NodeId, name: String, value: String },
    RemoveAttr { id: NodeId, name: String },
    SetText { id: NodeId, text: String },
    Append { parent: NodeId, child: NodeId },
    Remove { id: NodeId },
    SetHidden { id: NodeId, hidden: bool },
    SetValue { id: NodeId, value: String },
    SetChecked { id: NodeId, checked: bool },
    ShowModal { id: NodeId },
    Show { id: NodeId },
    Close { id: NodeId, return_value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum DomEnvelope {
    Ready { capabilities: Value },
    Ops { seq: u64, ops: Vec<DomOp> },
}

/// What the host reports back about the real DOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum HostEvent {
    Input {
        id: NodeId,
        value: String,
    },
    Toggle {
        id: NodeId,
        checked: bool,
    },
    Click {
        id: NodeId,
    },
    /// A `<dialog>` closed on the host side, e.g. through Escape.
    Closed {
        id: NodeId,
        #[serde(default)]
        return_value: String,
    },
    Files {
        id: NodeId,
        names: Vec<String>,
    },
    Pointer {
        id: NodeId,
        x: f32,
        y: f32,
        pressed: bool,
    },
}

impl HostEvent {
    pub fn target(&self) -> NodeId {
        match self {
            HostEvent::Input { id, .. }
            | HostEvent::Toggle { id, .. }
            | HostEvent::Click { id }
            | HostEvent::Closed { id, .. }
            | HostEvent::Files { id, .. }
            | HostEvent::Pointer { id, .. } => *id,
        }
    }
}

pub fn ready_envelope() -> DomEnvelope {
    DomEnvelope::Ready {
        capabilities: serde_json::json!({
            "dialogs": "poll",
            "framing": "u32-be-length"
        }),
    }
}

/// Bytes in the big-endian length that precedes every frame body.
const LEN_PREFIX: usize = 4;

fn invalid(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn over_cap(len: usize, cap: usize) -> io::Error {
    invalid(format!("{len}-byte frame exceeds the {cap}-byte cap"))
}

/// Reads one frame body of at most `cap` bytes. End of input before the
/// length prefix is `UnexpectedEof`; a body cut short is `InvalidData`.
pub fn read_frame(reader: &mut impl Read, cap: usize) -> io::Result<Vec<u8>> {
    let mut prefix = [0_u8; LEN_PREFIX];
    reader.read_exact(&mut prefix)?;
    let len = usize::try_from(u32::from_be_bytes(prefix)).map_err(|_| over_cap(usize::MAX, cap))?;
    if len > cap {
        return Err(over_cap(len, cap));
    }

    let mut body = Vec::with_capacity(len);
    Read::take(&mut *reader, len as u64).read_to_end(&mut body)?;
    if body.len() != len {
        return Err(invalid(format!("frame cut short: {} of {len} bytes", body.len())));
    }
    Ok(body)
}

/// Writes `body` as one frame, prefix and body in a single write.
pub fn write_frame(writer: &mut impl Write, body: &[u8], cap: usize) -> io::Result<()> {
    let len = u32::try_from(body.len())
        .ok()
        .filter(|_| body.len() <= cap)
        .ok_or_else(|| over_cap(body.len(), cap))?;

    let mut frame = Vec::with_capacity(LEN_PREFIX + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(body);
    writer.write_all(&frame)
}

pub fn encode_envelope(envelope: &DomEnvelope) -> io::Result<Vec<u8>> {
    serde_json::to_vec(envelope).map_err(invalid)
}

pub fn decode_event(body: &[u8]) -> io::Result<HostEvent> {
    serde_json::from_slice(body).map_err(invalid)
}

/// Frames, writes and flushes one envelope.
pub fn send_envelope(writer: &mut impl Write, envelope: &DomEnvelope) -> io::Result<()> {
    write_frame(writer, &encode_envelope(envelope)?, UI_TO_HOST_CAP)?;
    writer.flush()
}

/// The next host event, or `None` once the host closed its end between
/// frames.
pub fn recv_event(reader: &mut impl Read) -> io::Result<Option<HostEvent>> {
    match read_frame(reader, HOST_TO_UI_CAP) {
        Ok(body) => decode_event(&body).map(Some),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err),
    }
}

/// Sends every queued envelope until the UI side hangs up.
pub fn writer_loop(rx: Receiver<DomEnvelope>, mut writer: impl Write) -> io::Result<()> {
    rx.into_iter()
        .try_for_each(|envelope| send_envelope(&mut writer, &envelope))
}

/// Hands every host event to `on_event` until the host closes its end.
pub fn reader_loop(mut reader: impl Read, mut on_event: impl FnMut(HostEvent)) -> io::Result<()> {
    while let Some(event) = recv_event(&mut reader)? {
        on_event(event);
    }
    Ok(())
}
