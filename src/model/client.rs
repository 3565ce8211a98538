use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub klient_id: u64,
    pub nimi: String,
    pub perekonnanimi: String,
    pub kood: String,
    pub tel: Option<String>,
    pub aadres: Option<String>,
    pub status: Option<String>,
}

impl Client {
    /// Stored statuses come in any casing ("BLOCKED", "blocked", "Blocked").
    pub fn is_blocked(&self) -> bool {
        is_blocked_status(self.status.as_deref())
    }
}

fn is_blocked_status(status: Option<&str>) -> bool {
    status.is_some_and(|s| s.trim().eq_ignore_ascii_case("blocked"))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ClientStatus {
    #[strum(to_string = "ACTIVE")]
    Active,
    #[strum(to_string = "BLOCKED")]
    Blocked,
}

/// Insert payload after validation.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub nimi: String,
    pub perekonnanimi: String,
    pub kood: String,
    pub tel: Option<String>,
    pub aadres: Option<String>,
    pub status: ClientStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn client(status: Option<&str>) -> Client {
        Client {
            klient_id: 1,
            nimi: "Mari".into(),
            perekonnanimi: "Maasikas".into(),
            kood: "49403136515".into(),
            tel: None,
            aadres: None,
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn blocked_is_case_insensitive() {
        for status in ["blocked", "BLOCKED", "Blocked", "bLoCkEd"] {
            assert!(client(Some(status)).is_blocked(), "{status}");
        }
        assert!(!client(Some("ACTIVE")).is_blocked());
        assert!(!client(Some("Active")).is_blocked());
        assert!(!client(None).is_blocked());
    }

    #[test]
    fn status_parses_any_casing() {
        assert_eq!(ClientStatus::from_str("blocked").unwrap(), ClientStatus::Blocked);
        assert_eq!(ClientStatus::from_str("Active").unwrap(), ClientStatus::Active);
        assert!(ClientStatus::from_str("suspended").is_err());
        assert_eq!(ClientStatus::Blocked.to_string(), "BLOCKED");
    }
}
