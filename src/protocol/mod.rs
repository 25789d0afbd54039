//! The client-facing wire protocol: field size caps, the request header, and
//! the operation enumeration (§6).
pub mod framing;

pub use framing::ProtocolError;

/// Field size caps, in bytes, from §6.
pub const MAX_OPERATION_LEN: usize = 64;
pub const MAX_TIMESTAMP_LEN: usize = 64;
pub const MAX_USERNAME_LEN: usize = 255;
pub const MAX_PATH_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 256;
pub const MAX_IP_LEN: usize = 16;
/// Generous cap for a decimal port tail field; ports never exceed 5 digits.
pub const MAX_PORT_FIELD_LEN: usize = 16;

/// The set of operations the dispatcher understands. An operation string
/// that matches none of these is handled by the unknown-operation path
/// (§4.2 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Unregister,
    Connect,
    Disconnect,
    Publish,
    Delete,
    ListUsers,
    ListContent,
    GetMultifile,
}

impl Operation {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "REGISTER" => Self::Register,
            "UNREGISTER" => Self::Unregister,
            "CONNECT" => Self::Connect,
            "DISCONNECT" => Self::Disconnect,
            "PUBLISH" => Self::Publish,
            "DELETE" => Self::Delete,
            "LIST_USERS" => Self::ListUsers,
            "LIST_CONTENT" => Self::ListContent,
            "GET_MULTIFILE" => Self::GetMultifile,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "REGISTER",
            Self::Unregister => "UNREGISTER",
            Self::Connect => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::Publish => "PUBLISH",
            Self::Delete => "DELETE",
            Self::ListUsers => "LIST_USERS",
            Self::ListContent => "LIST_CONTENT",
            Self::GetMultifile => "GET_MULTIFILE",
        }
    }
}
