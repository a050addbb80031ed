use std::net::IpAddr;

/// All error types that can occur when interacting with Kasa devices.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No reply arrived within the per-request deadline.
    #[error("request timed out")]
    Timeout,

    /// A reply arrived but could not be parsed after deobfuscation.
    #[error("could not parse device reply: {0:?}")]
    MalformedReply(serde_json::Error),

    /// A reply parsed but did not contain the expected section.
    #[error("device reply missing `{0}` section")]
    MissingSection(&'static str),

    /// Failed to serialize an outgoing payload to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data (configuration or reply subtrees).
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A network socket operation failed while communicating with a device.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// A state update consumed its whole retry budget without an ack.
    #[error("update exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// The device answered a status query but is not a smart bulb.
    #[error("device {ip} is not a smart bulb")]
    WrongDeviceClass { ip: IpAddr },

    /// Attempted to send an [`crate::UpdateIntent`] with no attributes set.
    #[error("update intent has no attributes set")]
    EmptyIntent,

    /// Failed to read the configuration file.
    #[error("failed to read config file: {0:?}")]
    ConfigRead(std::io::Error),
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
