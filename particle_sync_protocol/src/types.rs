// Core value types shared by the server and its clients.
//
// `ClientId` is the server-assigned connection identifier. The two snapshot
// structs are point-in-time copies of simulation entities, produced fresh for
// every broadcast. Their serde field names are the wire names clients
// expect (`x_coord`, `client_id`, ...), so renaming a Rust field must never
// change the JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned connection ID. Sequential, never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One particle as seen by clients. `angle` is a heading in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleSnapshot {
    #[serde(rename = "x_coord")]
    pub x: f64,
    #[serde(rename = "y_coord")]
    pub y: f64,
    pub velocity: f64,
    pub angle: f64,
}

/// One client-controlled explorer marker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplorerSnapshot {
    pub client_id: ClientId,
    #[serde(rename = "x_coord")]
    pub x: f64,
    #[serde(rename = "y_coord")]
    pub y: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_uses_wire_field_names() {
        let p = ParticleSnapshot {
            x: 1.5,
            y: 2.0,
            velocity: 3.0,
            angle: 45.0,
        };
        let json = serde_json::to_value(p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"x_coord": 1.5, "y_coord": 2.0, "velocity": 3.0, "angle": 45.0})
        );
    }

    #[test]
    fn explorer_client_id_is_a_bare_integer() {
        let e = ExplorerSnapshot {
            client_id: ClientId(7),
            x: 10.5,
            y: 20.25,
        };
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"client_id":7,"x_coord":10.5,"y_coord":20.25}"#);
    }
}
