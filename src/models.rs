// Data shapes exchanged with the backend. Records coming from the API carry
// `created_at` as epoch milliseconds; once parsed they are local datetimes and
// serialize back out as RFC 3339 for reports and dumps.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};

/// A backend user. `vms` is never sent by the server; it is filled in by
/// [`add_vms_to_users`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(deserialize_with = "created_at_from_api")]
    pub created_at: DateTime<Local>,
    #[serde(default)]
    pub vms: Vec<VirtualMachine>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VirtualMachine {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub operating_system: String,
    pub cpu_cores: u32,
    pub ram_gb: u32,
    pub disk_gb: u32,
    pub status: VmStatus,
    #[serde(deserialize_with = "created_at_from_api")]
    pub created_at: DateTime<Local>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    Running,
    Stopped,
    Paused,
    Provisioning,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl VmStatus {
    pub const ALL: [VmStatus; 5] = [
        VmStatus::Running,
        VmStatus::Stopped,
        VmStatus::Paused,
        VmStatus::Provisioning,
        VmStatus::Deleting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VmStatus::Running => "running",
            VmStatus::Stopped => "stopped",
            VmStatus::Paused => "paused",
            VmStatus::Provisioning => "provisioning",
            VmStatus::Deleting => "deleting",
            VmStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for VmStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VmStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown VM status: {s}"))
    }
}

/// Payload returned by `/auth/me`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Request body for `POST /user`.
#[derive(Serialize, Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Request body for `POST /vm`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewVm {
    pub user_id: i64,
    pub name: String,
    pub operating_system: String,
    pub cpu_cores: u32,
    pub ram_gb: u32,
    pub disk_gb: u32,
    pub status: VmStatus,
}

/// Partial update for `PATCH /user/{id}`; unset fields are not sent.
#[derive(Serialize, Debug, Clone, Default)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Partial update for `PATCH /vm/{id}`; unset fields are not sent.
#[derive(Serialize, Debug, Clone, Default)]
pub struct VmUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VmStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

/// Convert epoch milliseconds into a local datetime.
pub fn parse_unix_timestamp(ms: i64) -> Option<DateTime<Local>> {
    DateTime::from_timestamp_millis(ms).map(|utc| utc.with_timezone(&Local))
}

/// Accepts epoch milliseconds (the API's format) or an RFC 3339 string (our
/// own dumps), so reports and generated datasets can be read back.
fn created_at_from_api<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Float(f64),
        Text(String),
    }

    use serde::de::Error as _;
    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => parse_unix_timestamp(ms),
        Raw::Float(ms) => parse_unix_timestamp(ms.round() as i64),
        Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|dt| dt.with_timezone(&Local)),
    }
    .ok_or_else(|| D::Error::custom("created_at is out of range or malformed"))
}

/// Attach to each user the VMs whose `user_id` matches theirs.
///
/// Each user's list is replaced rather than extended, so running the join
/// twice gives the same result. The VMs themselves are only cloned.
pub fn add_vms_to_users(users: &mut [User], vms: &[VirtualMachine]) {
    for user in users.iter_mut() {
        user.vms = vms
            .iter()
            .filter(|vm| vm.user_id == user.id)
            .cloned()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: i64) -> User {
        User {
            id,
            name: format!("user {id}"),
            email: format!("u{id}@corp.com"),
            created_at: parse_unix_timestamp(1_700_000_000_000).unwrap(),
            vms: Vec::new(),
        }
    }

    fn vm(id: i64, user_id: i64) -> VirtualMachine {
        VirtualMachine {
            id,
            user_id,
            name: format!("web-{id}"),
            operating_system: "Debian 11".into(),
            cpu_cores: 2,
            ram_gb: 4,
            disk_gb: 50,
            status: VmStatus::Running,
            created_at: parse_unix_timestamp(1_700_000_000_000).unwrap(),
        }
    }

    #[test]
    fn timestamp_round_trips_to_the_millisecond() {
        for ts in [0_i64, 1, 999, 1_640_995_200_000, 1_718_901_234_567, -86_400_123] {
            let parsed = parse_unix_timestamp(ts).unwrap();
            assert_eq!(parsed.timestamp_millis(), ts);
        }
    }

    #[test]
    fn out_of_range_timestamp_is_none() {
        assert!(parse_unix_timestamp(i64::MAX).is_none());
    }

    #[test]
    fn user_deserializes_from_api_shape() {
        let raw = json!({
            "id": 7,
            "created_at": 1_640_995_200_000_i64,
            "name": "Inès Bouvet",
            "email": "ines.bouvet@tech.io"
        });
        let user: User = serde_json::from_value(raw).unwrap();
        assert_eq!(user.created_at.timestamp_millis(), 1_640_995_200_000);
        assert!(user.vms.is_empty());
    }

    #[test]
    fn unknown_status_is_tolerated() {
        let raw = json!({
            "id": 1, "user_id": 2, "name": "db-Core", "operating_system": "Fedora 38",
            "cpu_cores": 4, "ram_gb": 8, "disk_gb": 100, "status": "rebooting",
            "created_at": 1_700_000_000_000_i64
        });
        let vm: VirtualMachine = serde_json::from_value(raw).unwrap();
        assert_eq!(vm.status, VmStatus::Unknown);
    }

    #[test]
    fn serialized_user_reads_back() {
        let mut u = user(3);
        u.vms.push(vm(9, 3));
        let text = serde_json::to_string(&u).unwrap();
        let back: User = serde_json::from_str(&text).unwrap();
        assert_eq!(back, u);
    }

    #[test]
    fn each_vm_lands_under_its_owner_only() {
        let mut users = vec![user(1), user(2), user(3)];
        let vms = vec![vm(10, 1), vm(11, 2), vm(12, 1), vm(13, 99)];

        add_vms_to_users(&mut users, &vms);

        let ids = |u: &User| u.vms.iter().map(|v| v.id).collect::<Vec<_>>();
        assert_eq!(ids(&users[0]), vec![10, 12]);
        assert_eq!(ids(&users[1]), vec![11]);
        assert!(users[2].vms.is_empty());
        for u in &users {
            assert!(u.vms.iter().all(|v| v.user_id == u.id));
        }
    }

    #[test]
    fn join_is_idempotent() {
        let mut users = vec![user(1), user(2)];
        let vms = vec![vm(10, 1), vm(11, 2)];
        add_vms_to_users(&mut users, &vms);
        let once = users.clone();
        add_vms_to_users(&mut users, &vms);
        assert_eq!(users, once);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Running".parse::<VmStatus>().unwrap(), VmStatus::Running);
        assert!("exploded".parse::<VmStatus>().is_err());
    }

    #[test]
    fn updates_skip_unset_fields() {
        let update = VmUpdate {
            status: Some(VmStatus::Stopped),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(update).unwrap(), json!({"status": "stopped"}));
    }
}
