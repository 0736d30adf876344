//! Parser for `zoneadm list -cp` used by the task queue (serialization
//! domain) and the devices collector (PCI-to-zone cross-reference).

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSummary {
    pub zone_id: Option<i64>,
    pub name: String,
    pub state: String,
    pub path: Option<String>,
    pub uuid: Option<String>,
    pub brand: Option<String>,
}

/// Parses one line of `zoneadm list -cp`:
/// `id:name:state:path:uuid:brand:ip-type`.
pub fn parse_zoneadm_list_line(line: &str) -> Result<ZoneSummary, ParseError> {
    let fields: Vec<&str> = line.split(':').collect();
    let name = fields.get(1).ok_or_else(|| ParseError::new("zoneadm list: missing name"))?;
    let state = fields.get(2).ok_or_else(|| ParseError::new("zoneadm list: missing state"))?;
    Ok(ZoneSummary {
        zone_id: fields.first().and_then(|s| s.parse().ok()),
        name: name.to_string(),
        state: state.to_string(),
        path: fields.get(3).map(|s| s.to_string()).filter(|s| !s.is_empty()),
        uuid: fields.get(4).map(|s| s.to_string()).filter(|s| !s.is_empty()),
        brand: fields.get(5).map(|s| s.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_running_zone() {
        let z = parse_zoneadm_list_line("1:webapp:running:/zones/webapp:abc-123:bhyve:excl").unwrap();
        assert_eq!(z.zone_id, Some(1));
        assert_eq!(z.name, "webapp");
        assert_eq!(z.state, "running");
        assert_eq!(z.brand.as_deref(), Some("bhyve"));
    }

    #[test]
    fn global_zone_has_no_uuid() {
        let z = parse_zoneadm_list_line("0:global:running:/::native:shared").unwrap();
        assert_eq!(z.zone_id, Some(0));
        assert_eq!(z.uuid, None);
    }
}
