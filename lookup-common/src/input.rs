/// A raw item pushed by an input handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputItem {
    /// A plain name, or a `rank,name` line in ranked-list mode.
    Line(String),
    /// A record read from a zone file.
    Zone(ZoneRecord),
}

/// Record data the pipeline distinguishes between. Everything other than NS is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneRecordData {
    Ns { nameserver: String },
    Other { record_type: String, rdata: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRecord {
    /// Fully qualified owner name, with its trailing dot.
    pub owner: String,
    pub ttl: Option<u32>,
    pub class: Option<String>,
    pub data: ZoneRecordData,
}

impl ZoneRecord {
    pub fn record_type(&self) -> &str {
        match &self.data {
            ZoneRecordData::Ns { .. } => "NS",
            ZoneRecordData::Other { record_type, .. } => record_type,
        }
    }

    /// The owner name without its trailing dot. Empty for the root.
    pub fn owner_name(&self) -> &str {
        self.owner.strip_suffix('.').unwrap_or(&self.owner)
    }

    /// The delegated name server of an NS record, lowercased and without its trailing dot.
    pub fn nameserver(&self) -> Option<String> {
        match &self.data {
            ZoneRecordData::Ns { nameserver } => {
                let nameserver = nameserver.to_lowercase();
                Some(
                    nameserver
                        .strip_suffix('.')
                        .unwrap_or(&nameserver)
                        .to_owned(),
                )
            }
            ZoneRecordData::Other { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: &str, data: ZoneRecordData) -> ZoneRecord {
        ZoneRecord {
            owner: owner.to_owned(),
            ttl: None,
            class: None,
            data,
        }
    }

    #[test]
    fn test_nameserver_only_for_ns_records() {
        let ns = record(
            "example.com.",
            ZoneRecordData::Ns {
                nameserver: "NS1.Example.COM.".to_owned(),
            },
        );
        assert_eq!(ns.nameserver().as_deref(), Some("ns1.example.com"));
        assert_eq!(ns.record_type(), "NS");

        let a = record(
            "example.com.",
            ZoneRecordData::Other {
                record_type: "A".to_owned(),
                rdata: "1.2.3.4".to_owned(),
            },
        );
        assert_eq!(a.nameserver(), None);
        assert_eq!(a.record_type(), "A");
    }

    #[test]
    fn test_owner_name_trims_trailing_dot() {
        let data = ZoneRecordData::Other {
            record_type: "SOA".to_owned(),
            rdata: String::new(),
        };
        assert_eq!(record("example.com.", data.clone()).owner_name(), "example.com");
        assert_eq!(record(".", data).owner_name(), "");
    }
}
