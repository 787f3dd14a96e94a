use uuid::Uuid;

pub const MANUFACTURER: &str = "Tuya";
pub const MODEL: &str = "ProWarm Wi-Fi";

/// Stable accessory UUID for a device id, so the hub recognises the same
/// heater across restarts without persisting anything here.
pub fn accessory_uuid(device_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, device_id.as_bytes())
        .hyphenated()
        .to_string()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn uuid_is_stable_per_device() {
        assert_eq!(accessory_uuid("bfd909"), accessory_uuid("bfd909"));
        assert_ne!(accessory_uuid("bfd909"), accessory_uuid("bfd90a"));
    }

    #[test]
    fn uuid_is_name_based_v5() {
        assert_eq!(
            accessory_uuid("bfd909"),
            "EF2FD31E-B86A-534D-B5EE-6D5DA8528FB2"
        );

        let parsed = Uuid::parse_str(&accessory_uuid("bfd909")).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
    }
}
