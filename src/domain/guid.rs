use uuid::Uuid;

/// GnuCash identifies every object by a 32 character lowercase hex GUID.
pub type Guid = String;

pub fn new_guid() -> Guid {
    Uuid::new_v4().simple().to_string()
}
