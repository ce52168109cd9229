//! Wire types shared with the edge daemon.
//!
//! The core never speaks Telnet or WebSocket negotiation itself; the edge
//! terminates client protocols and forwards everything as JSON frames over a
//! single duplex channel. Client ids are assigned by the edge and are stable
//! for the life of that edge connection.

use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorType {
    NoColor,
    Standard,
    Xterm256,
    TrueColor,
}

impl Default for ColorType {
    fn default() -> Self {
        ColorType::NoColor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Telnet,
    WebSocket,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Telnet
    }
}

/// What one client at the edge is capable of. Updated whenever the edge
/// renegotiates with the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolCapabilities {
    pub protocol: Protocol,
    pub encryption: bool,
    pub client_name: String,
    pub client_version: String,
    pub host_address: String,
    pub host_port: u16,
    pub host_names: Vec<String>,
    pub encoding: String,
    pub utf8: bool,
    pub color: ColorType,
    pub width: u16,
    pub height: u16,
    pub gmcp: bool,
    pub msdp: bool,
    pub mssp: bool,
    pub mxp: bool,
    pub mccp2: bool,
    pub mccp3: bool,
    pub ttype: bool,
    pub naws: bool,
    pub sga: bool,
    pub linemode: bool,
    pub force_endline: bool,
    pub oob: bool,
    pub tls: bool,
    pub screen_reader: bool,
    pub mouse_tracking: bool,
    pub vt100: bool,
    pub osc_color_palette: bool,
    pub proxy: bool,
    pub mnes: bool,
}

impl Default for ProtocolCapabilities {
    fn default() -> Self {
        ProtocolCapabilities {
            protocol: Protocol::default(),
            encryption: false,
            client_name: "UNKNOWN".into(),
            client_version: "UNKNOWN".into(),
            host_address: "UNKNOWN".into(),
            host_port: 0,
            host_names: Vec::new(),
            encoding: String::new(),
            utf8: false,
            color: ColorType::default(),
            width: 80,
            height: 52,
            gmcp: false,
            msdp: false,
            mssp: false,
            mxp: false,
            mccp2: false,
            mccp3: false,
            ttype: false,
            naws: true,
            sga: true,
            linemode: false,
            force_endline: false,
            oob: false,
            tls: false,
            screen_reader: false,
            mouse_tracking: false,
            vt100: false,
            osc_color_palette: false,
            proxy: false,
            mnes: false,
        }
    }
}

/// One GMCP-style message to or from a client: `text` plus free-form
/// structured events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: serde_json::Map<String, Value>,
}

impl ClientMessage {
    pub fn text(body: impl Into<String>) -> Self {
        ClientMessage {
            cmd: "text".into(),
            args: vec![Value::String(body.into())],
            kwargs: serde_json::Map::new(),
        }
    }
}

/// The outbound framing for client payloads.
pub fn client_data_frame(id: i64, messages: &[ClientMessage]) -> Value {
    json!({
        "kind": "client_data",
        "id": id,
        "data": messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_tolerate_sparse_frames() {
        let caps: ProtocolCapabilities = serde_json::from_value(json!({
            "protocol": "WebSocket",
            "color": "Xterm256",
            "width": 120,
        }))
        .unwrap();
        assert_eq!(caps.protocol, Protocol::WebSocket);
        assert_eq!(caps.color, ColorType::Xterm256);
        assert_eq!(caps.width, 120);
        // everything else keeps its default
        assert_eq!(caps.height, 52);
        assert_eq!(caps.client_name, "UNKNOWN");
        assert!(caps.naws);
    }

    #[test]
    fn outbound_frames_have_the_agreed_shape() {
        let frame = client_data_frame(42, &[ClientMessage::text("hello")]);
        assert_eq!(frame["kind"], "client_data");
        assert_eq!(frame["id"], 42);
        assert_eq!(frame["data"][0]["cmd"], "text");
        assert_eq!(frame["data"][0]["args"][0], "hello");
    }
}
