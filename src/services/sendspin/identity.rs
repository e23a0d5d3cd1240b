use uuid::Uuid;

use super::MANUFACTURER;

const CLIENT_ID_PREFIX: &str = "ma_gtk_";
const CLIENT_ID_HEX_LEN: usize = 10;

/// How this client presents itself to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Persistent client id
    pub client_id: String,
    /// Display name
    pub name: String,
}

impl ClientIdentity {
    /// Identity for `client_id`, named after this host.
    ///
    /// A blank id is replaced by a freshly generated one.
    pub fn new(client_id: &str) -> Self {
        let client_id = match client_id.trim() {
            "" => generate_client_id(),
            id => id.to_string(),
        };
        Self {
            client_id,
            name: client_name(),
        }
    }
}

/// Fresh `ma_gtk_` id with ten random hex characters.
pub fn generate_client_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{CLIENT_ID_PREFIX}{}", &hex[..CLIENT_ID_HEX_LEN])
}

/// Display name including the host name when it is known.
pub fn client_name() -> String {
    let host = hostname::get()
        .map(|name| name.to_string_lossy().trim().to_string())
        .unwrap_or_default();
    client_name_for(&host)
}

pub(crate) fn client_name_for(host: &str) -> String {
    if host.is_empty() {
        MANUFACTURER.to_string()
    } else {
        format!("{MANUFACTURER} ({host})")
    }
}
